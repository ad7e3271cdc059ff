use super::basename;
use super::xml_stream::{
    SubtreeReader,
    XmlNode,
    XmlStreamEvent,
};
use crate::errors::EvidenceReadingError;
use crate::models::{
    Attrs,
    Modification,
};
use fdrcalib::Distribution;
use std::io::{
    BufRead,
    BufReader,
};
use std::path::Path;
use tracing::{
    debug,
    warn,
};

/// Top hit of one `search_result`.
#[derive(Debug, Clone, PartialEq)]
pub struct PepXmlHit {
    pub peptide: String,
    pub protein: String,
    pub other_seqids: Vec<String>,
    pub modified_sequence: String,
    pub modifications: Vec<Modification>,
    pub num_missed_cleavages: Option<f64>,
    pub massdiff: Option<f64>,
    pub num_matched_ions: Option<u32>,
    pub tot_num_ions: Option<u32>,
    /// PeptideProphet probability.
    pub probability: Option<f64>,
    /// Error estimate matching `probability`, `None` when it could not be calibrated.
    pub fpe: Option<f64>,
    /// `search_score` values and PeptideProphet parameters by name.
    pub scores: Attrs,
}

impl PepXmlHit {
    pub fn expect(&self) -> Option<f64> {
        self.scores.get_number("expect")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PepXmlScan {
    pub index: String,
    pub start_scan: String,
    pub assumed_charge: Option<i64>,
    pub precursor_neutral_mass: Option<f64>,
    pub retention_time_sec: Option<f64>,
    /// Base name of the run this scan belongs to.
    pub source: Option<String>,
    pub hits: Vec<PepXmlHit>,
}

/// Streams the spectrum queries of a PeptideProphet pepXML document.
///
/// The error distribution is read from `peptideprophet_summary`, which
/// precedes the runs in well formed files. Scans seen before it get no
/// error estimate.
pub struct PepXmlReader<R: BufRead> {
    inner: SubtreeReader<R>,
    distribution: Option<Distribution>,
    source_names: Vec<String>,
}

impl PepXmlReader<BufReader<std::fs::File>> {
    pub fn from_path(path: &Path) -> Result<Self, EvidenceReadingError> {
        Ok(Self::wrap(SubtreeReader::from_path(
            path,
            &Self::OPEN_TAGS,
            &Self::RECORD_TAGS,
        )?))
    }
}

impl<R: BufRead> PepXmlReader<R> {
    const OPEN_TAGS: [&'static str; 1] = ["msms_run_summary"];
    const RECORD_TAGS: [&'static str; 2] = ["peptideprophet_summary", "spectrum_query"];

    pub fn new(inner: R) -> Self {
        Self::wrap(SubtreeReader::new(inner, &Self::OPEN_TAGS, &Self::RECORD_TAGS))
    }

    fn wrap(inner: SubtreeReader<R>) -> Self {
        Self {
            inner,
            distribution: None,
            source_names: Vec::new(),
        }
    }

    pub fn distribution(&self) -> Option<&Distribution> {
        self.distribution.as_ref()
    }

    /// Run names seen so far, in document order.
    pub fn source_names(&self) -> &[String] {
        &self.source_names
    }

    fn handle(&mut self, event: XmlStreamEvent) -> Result<Option<PepXmlScan>, EvidenceReadingError> {
        match event {
            XmlStreamEvent::Opened(node) => {
                let name = basename(node.attr("base_name").unwrap_or_default());
                debug!("Reading pepXML run {}", name);
                self.source_names.push(name);
                Ok(None)
            }
            XmlStreamEvent::Record(node) if node.name == "peptideprophet_summary" => {
                let dist = parse_peptide_distribution(&node)?;
                debug!("PeptideProphet distribution with {} points", dist.len());
                self.distribution = Some(dist);
                Ok(None)
            }
            XmlStreamEvent::Record(node) => {
                let mut scan = parse_scan(&node)?;
                scan.source = self.source_names.last().cloned();
                for hit in scan.hits.iter_mut() {
                    hit.fpe = match (&self.distribution, hit.probability) {
                        (Some(dist), Some(prob)) => dist.probability_to_error(prob).ok(),
                        _ => None,
                    };
                }
                Ok(Some(scan))
            }
        }
    }
}

impl<R: BufRead> Iterator for PepXmlReader<R> {
    type Item = Result<PepXmlScan, EvidenceReadingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let event = match self.inner.next()? {
                Ok(event) => event,
                Err(e) => return Some(Err(e)),
            };
            match self.handle(event) {
                Ok(Some(scan)) => return Some(Ok(scan)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Reads `error_point`s directly under the summary, falling back to the
/// ones of `roc_error_data charge="all"`. The result is padded with sentinels.
fn parse_peptide_distribution(node: &XmlNode) -> Result<Distribution, EvidenceReadingError> {
    let mut points: Vec<&XmlNode> = node.children_named("error_point").collect();
    if points.is_empty() {
        if let Some(all) = node
            .children_named("roc_error_data")
            .find(|x| x.attr("charge") == Some("all"))
        {
            points = all.children_named("error_point").collect();
        }
    }
    if points.is_empty() {
        warn!("peptideprophet_summary has no error points, using a linear table");
        return Ok(Distribution::new([(0.0, 1.0), (1.0, 0.0)])?);
    }
    let pairs = points
        .into_iter()
        .map(|p| Ok((p.require_parsed::<f64>("error")?, p.require_parsed::<f64>("min_prob")?)))
        .collect::<Result<Vec<(f64, f64)>, EvidenceReadingError>>()?;
    Ok(Distribution::new(pairs)?.with_sentinels())
}

fn parse_scan(node: &XmlNode) -> Result<PepXmlScan, EvidenceReadingError> {
    let hits = node
        .children_named("search_result")
        .filter_map(|result| result.child("search_hit"))
        .map(parse_hit)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PepXmlScan {
        index: node.attr("index").unwrap_or_default().to_string(),
        start_scan: node.require_attr("start_scan")?.to_string(),
        assumed_charge: node.parse_attr("assumed_charge")?,
        precursor_neutral_mass: node.parse_attr("precursor_neutral_mass")?,
        retention_time_sec: node.parse_attr("retention_time_sec")?,
        source: None,
        hits,
    })
}

fn parse_hit(node: &XmlNode) -> Result<PepXmlHit, EvidenceReadingError> {
    let peptide = node.require_attr("peptide")?.to_string();
    let other_seqids = node
        .children_named("alternative_protein")
        .filter_map(|x| x.attr("protein"))
        .map(str::to_string)
        .collect();

    let mut modified_sequence = peptide.clone();
    let mut modifications = Vec::new();
    for mod_info in node.children_named("modification_info") {
        if let Some(x) = mod_info.attr("modified_peptide") {
            modified_sequence = x.to_string();
        }
        modifications.extend(parse_modifications(mod_info, &peptide)?);
    }

    let mut scores = Attrs::new();
    for score in node.children_named("search_score") {
        if let (Some(name), Some(value)) = (score.attr("name"), score.attr("value")) {
            scores.insert_raw(name, value);
        }
    }

    let mut probability = None;
    if let Some(result) = node
        .children_named("analysis_result")
        .find_map(|x| x.child("peptideprophet_result"))
    {
        probability = result.parse_attr::<f64>("probability")?;
        for param in result.find_all("parameter") {
            if let (Some(name), Some(value)) = (param.attr("name"), param.attr("value")) {
                scores.insert_raw(name, value);
            }
        }
    }

    Ok(PepXmlHit {
        protein: node.require_attr("protein")?.to_string(),
        other_seqids,
        modified_sequence,
        modifications,
        num_missed_cleavages: node.parse_attr("num_missed_cleavages")?,
        massdiff: node.parse_attr("massdiff")?,
        num_matched_ions: node.parse_attr("num_matched_ions")?,
        tot_num_ions: node.parse_attr("tot_num_ions")?,
        probability,
        fpe: None,
        scores,
        peptide,
    })
}

/// Positions in `mod_aminoacid_mass` are 1-based. Terminal masses become
/// offsets -1 and `peptide.len()`.
pub(crate) fn parse_modifications(
    mod_info: &XmlNode,
    peptide: &str,
) -> Result<Vec<Modification>, EvidenceReadingError> {
    let mut out = Vec::new();
    if let Some(mass) = mod_info.parse_attr::<f64>("mod_nterm_mass")? {
        out.push(Modification::new(-1, mass).with_kind("n-term"));
    }
    for aa_mod in mod_info.children_named("mod_aminoacid_mass") {
        let position: usize = aa_mod.require_parsed("position")?;
        let mass = match ["variable", "static", "mass"]
            .iter()
            .find_map(|key| aa_mod.attr(key))
        {
            Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
                EvidenceReadingError::InvalidValue {
                    field: "mod_aminoacid_mass@mass".into(),
                    value: raw.to_string(),
                }
            })?,
            None => {
                return Err(EvidenceReadingError::MissingAttribute {
                    element: aa_mod.name.clone(),
                    attribute: "mass".into(),
                });
            }
        };
        let offset = position as isize - 1;
        let mut modification = Modification::new(offset, mass);
        if let Some(residue) = peptide.chars().nth(offset.max(0) as usize) {
            modification = modification.with_kind(residue.to_string());
        }
        out.push(modification);
    }
    if let Some(mass) = mod_info.parse_attr::<f64>("mod_cterm_mass")? {
        out.push(Modification::new(peptide.len() as isize, mass).with_kind("c-term"));
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const PEPXML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<msms_pipeline_analysis xmlns="http://regis-web.systemsbiology.net/pepXML">
 <analysis_summary analysis="peptideprophet">
  <peptideprophet_summary min_prob="0.05">
   <roc_error_data charge="2">
    <error_point error="0.5" min_prob="0.1"/>
   </roc_error_data>
   <roc_error_data charge="all">
    <error_point error="0.0" min_prob="1.0"/>
    <error_point error="0.1" min_prob="0.8"/>
    <error_point error="0.5" min_prob="0.2"/>
   </roc_error_data>
  </peptideprophet_summary>
 </analysis_summary>
 <msms_run_summary base_name="/data/runs/run_A">
  <spectrum_query spectrum="run_A.100.100.2" start_scan="100" end_scan="100"
      precursor_neutral_mass="1000.5" assumed_charge="2" index="1" retention_time_sec="600.0">
   <search_result>
    <search_hit hit_rank="1" peptide="PEPMK" protein="sp|P1|ONE" num_missed_cleavages="1"
        massdiff="0.01" num_matched_ions="5" tot_num_ions="8" num_tot_proteins="2">
     <alternative_protein protein="sp|P2|TWO"/>
     <modification_info modified_peptide="PEPM[147]K" mod_nterm_mass="43.0">
      <mod_aminoacid_mass position="4" mass="147.035"/>
     </modification_info>
     <search_score name="expect" value="1e-5"/>
     <search_score name="ionscore" value="42.0"/>
     <analysis_result analysis="peptideprophet">
      <peptideprophet_result probability="0.9">
       <search_score_summary>
        <parameter name="fval" value="3.2"/>
       </search_score_summary>
      </peptideprophet_result>
     </analysis_result>
    </search_hit>
    <search_hit hit_rank="2" peptide="OTHER" protein="sp|P9|NINE"/>
   </search_result>
  </spectrum_query>
  <spectrum_query start_scan="101" assumed_charge="3" index="2">
   <search_result>
    <search_hit peptide="AAK" protein="sp|P3|THREE">
     <search_score name="expect" value="0.5"/>
    </search_hit>
   </search_result>
  </spectrum_query>
 </msms_run_summary>
</msms_pipeline_analysis>
"#;

    #[test]
    fn test_read_pepxml() {
        let mut reader = PepXmlReader::new(PEPXML.as_bytes());
        let scans = reader.by_ref().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(scans.len(), 2);
        assert_eq!(reader.source_names(), &["run_A".to_string()]);

        let dist = reader.distribution().unwrap();
        assert_eq!(dist.len(), 4);

        let scan = &scans[0];
        assert_eq!(scan.start_scan, "100");
        assert_eq!(scan.assumed_charge, Some(2));
        assert_eq!(scan.source.as_deref(), Some("run_A"));
        assert_eq!(scan.hits.len(), 1);

        let hit = &scan.hits[0];
        assert_eq!(hit.peptide, "PEPMK");
        assert_eq!(hit.other_seqids, vec!["sp|P2|TWO".to_string()]);
        assert_eq!(hit.modified_sequence, "PEPM[147]K");
        assert_eq!(hit.modifications.len(), 2);
        assert_eq!(hit.modifications[0].offset, -1);
        assert_eq!(hit.modifications[1].offset, 3);
        assert_eq!(hit.modifications[1].kind.as_deref(), Some("M"));
        assert_eq!(hit.expect(), Some(1e-5));
        assert_eq!(hit.scores.get_number("fval"), Some(3.2));
        assert_eq!(hit.probability, Some(0.9));
        // 0.9 lies halfway between (0.0, 1.0) and (0.1, 0.8).
        assert!((hit.fpe.unwrap() - 0.05).abs() < 1e-12);

        // No prophet result, no error estimate.
        assert_eq!(scans[1].hits[0].fpe, None);
    }

    #[test]
    fn test_cterm_modification_offset() {
        let mut info = XmlNode::new("modification_info");
        info.attributes.push(("mod_cterm_mass".into(), "17.0".into()));
        let mods = parse_modifications(&info, "PEPK").unwrap();
        assert_eq!(mods.len(), 1);
        assert!(mods[0].is_c_terminal(4));
    }
}
