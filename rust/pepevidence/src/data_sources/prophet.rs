//! Trans-Proteomic Pipeline results: one protXML plus its pepXML files.

use super::pepxml::{
    PepXmlHit,
    PepXmlReader,
    PepXmlScan,
};
use super::protxml::{
    ProtXmlPeptide,
    ProtXmlProtein,
    ProtXmlReader,
};
use super::{
    EvidenceSource,
    IngestSummary,
    basename,
};
use crate::cache::{
    FileStamp,
    Fingerprint,
};
use crate::calibration::{
    ERROR_ATTR,
    PROBABILITY_ATTR,
    minus_log_intensity,
    probability_cutoff,
};
use crate::errors::{
    EvidenceReadingError,
    Result,
};
use crate::models::{
    EvidenceSet,
    Match,
    Protein,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{
    Path,
    PathBuf,
};
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProphetParams {
    /// Hits with a larger error estimate are skipped.
    pub peptide_error: f64,
    /// Proteins below the probability matching this error are removed.
    pub protein_error: f64,
    /// Expect value mapped to full intensity.
    pub good_expect: f64,
    /// Hits with a larger expect value are skipped.
    pub cutoff_expect: f64,
}

impl Default for ProphetParams {
    fn default() -> Self {
        Self {
            peptide_error: 0.01,
            protein_error: 0.01,
            good_expect: 1e-8,
            cutoff_expect: 1e-2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProphetSource {
    pub protxml: PathBuf,
    pub pepxmls: Vec<PathBuf>,
    pub params: ProphetParams,
}

/// Proteins of a protXML plus the peptide evidence ProteinProphet used for them.
struct ProteinCatalog {
    set: EvidenceSet,
    peptides: HashMap<String, Vec<ProtXmlPeptide>>,
    // Primary and indistinguishable seqids to the primary one.
    index: HashMap<String, String>,
    // Protein probability matching the configured protein error.
    cutoff: Option<f64>,
}

fn protein_from_protxml(x: &ProtXmlProtein) -> Protein {
    let mut protein = Protein::new(x.name.clone(), 0);
    protein.description = x.description.clone();
    for other in &x.other_seqids {
        protein.add_other_seqid(other.clone());
    }
    protein.attr.insert("group_id", x.group_number.clone());
    if let Some(sibling) = &x.sibling {
        protein.attr.insert("sibling", sibling.clone());
    }
    protein.attr.insert(PROBABILITY_ATTR, x.probability);
    if let Some(coverage) = x.percent_coverage {
        protein.attr.insert("percent_coverage", coverage);
    }
    if let Some(length) = x.parameters.get_number("prot_length") {
        protein.attr.insert("length", length);
    }
    protein
}

impl ProteinCatalog {
    fn read<R: BufRead>(
        mut reader: ProtXmlReader<R>,
        params: &ProphetParams,
    ) -> std::result::Result<Self, EvidenceReadingError> {
        let mut set = EvidenceSet::new(Vec::new());
        let mut peptides = HashMap::new();
        for group in reader.by_ref() {
            for x in group?.proteins {
                if set.contains(&x.name) {
                    warn!("{} found in multiple protein groups", x.name);
                }
                set.insert_protein(protein_from_protxml(&x));
                peptides.insert(x.name, x.peptides);
            }
        }

        let cutoff = reader
            .distribution()
            .and_then(|dist| probability_cutoff(dist, params.protein_error));

        let mut index = HashMap::new();
        for protein in set.proteins() {
            for seqid in std::iter::once(&protein.seqid).chain(protein.other_seqids.iter()) {
                index
                    .entry(seqid.clone())
                    .or_insert_with(|| protein.seqid.clone());
            }
        }
        Ok(Self {
            set,
            peptides,
            index,
            cutoff,
        })
    }

    /// Drops proteins below the probability cutoff, once every pepXML is in.
    fn into_filtered_set(mut self, protein_error: f64) -> EvidenceSet {
        if let Some(cutoff) = self.cutoff {
            let removed = self.set.retain_proteins(|p| {
                p.attr
                    .get_number(PROBABILITY_ATTR)
                    .is_some_and(|prob| prob >= cutoff)
            });
            info!(
                "Removed {} proteins below probability {:.4} (error {})",
                removed, cutoff, protein_error
            );
        }
        self.set
    }
}

fn make_match(hit: &PepXmlHit, scan: &PepXmlScan, source: &str, params: &ProphetParams) -> Match {
    let mut m = Match::new(hit.peptide.clone());
    m.modifications = hit.modifications.clone();
    m.intensity = match hit.expect() {
        Some(expect) => {
            minus_log_intensity(expect, params.good_expect, params.cutoff_expect).clamp(0.0, 1.0)
        }
        None => hit.probability.unwrap_or(1.0),
    };
    let attr = &mut m.attr;
    attr.insert("modified_sequence", hit.modified_sequence.clone());
    attr.insert("pepxml_id", scan.index.clone());
    attr.insert("scan_id", scan.start_scan.clone());
    attr.insert("source", source);
    if let Some(charge) = scan.assumed_charge {
        attr.insert("charge", charge);
    }
    if let Some(mass) = scan.precursor_neutral_mass {
        attr.insert("mass", mass);
    }
    if let Some(rt) = scan.retention_time_sec {
        attr.insert("retention_time", rt);
    }
    if let Some(prob) = hit.probability {
        attr.insert(PROBABILITY_ATTR, prob);
    }
    if let Some(fpe) = hit.fpe {
        attr.insert(ERROR_ATTR, fpe);
    }
    if let Some(expect) = hit.expect() {
        attr.insert("expect", expect);
    }
    if let Some(missed) = hit.num_missed_cleavages {
        attr.insert("missed_cleavages", missed);
    }
    if let Some(diff) = hit.massdiff {
        attr.insert("mass_diff", diff);
    }
    for (key, score) in [
        ("score", "ionscore"),
        ("homology", "homologyscore"),
        ("identity", "identityscore"),
    ] {
        if let Some(value) = hit.scores.get(score) {
            attr.insert(key, value.clone());
        }
    }
    if let (Some(matched), Some(total)) = (hit.num_matched_ions, hit.tot_num_ions) {
        attr.insert("matched_ions", format!("{}/{}", matched, total));
    }
    m
}

impl ProphetSource {
    pub fn new(protxml: impl Into<PathBuf>, pepxmls: Vec<PathBuf>, params: ProphetParams) -> Self {
        Self {
            protxml: protxml.into(),
            pepxmls,
            params,
        }
    }

    /// Folds the scans of one pepXML into the catalog.
    ///
    /// Every run of the file gets a new slot, so two files that searched the
    /// same run never share one.
    fn load_pepxml<R: BufRead>(
        &self,
        catalog: &mut ProteinCatalog,
        reader: PepXmlReader<R>,
        fallback_source: &str,
        summary: &mut IngestSummary,
    ) -> std::result::Result<(), EvidenceReadingError> {
        let mut slots: HashMap<String, usize> = HashMap::new();
        for scan in reader {
            let scan = scan?;
            summary.records_seen += 1;
            let source = scan
                .source
                .clone()
                .unwrap_or_else(|| fallback_source.to_string());
            let i_source = *slots
                .entry(source.clone())
                .or_insert_with(|| catalog.set.add_source(source.as_str()));
            for hit in &scan.hits {
                summary.matches_seen += 1;
                let Some(fpe) = hit.fpe else {
                    debug!("Scan {} has no error estimate", scan.start_scan);
                    summary.calibration_unavailable += 1;
                    continue;
                };
                if fpe > self.params.peptide_error
                    || hit.expect().is_some_and(|e| e > self.params.cutoff_expect)
                {
                    summary.rejected_by_cutoff += 1;
                    continue;
                }
                if self.assign_hit(catalog, hit, &scan, &source, i_source, summary) {
                    summary.matches_assigned += 1;
                }
            }
        }
        Ok(())
    }

    fn assign_hit(
        &self,
        catalog: &mut ProteinCatalog,
        hit: &PepXmlHit,
        scan: &PepXmlScan,
        source: &str,
        i_source: usize,
        summary: &mut IngestSummary,
    ) -> bool {
        let mut assigned = false;
        for seqid in std::iter::once(&hit.protein).chain(hit.other_seqids.iter()) {
            let Some(primary) = catalog.index.get(seqid) else {
                warn!("{} from scan {} not found in protXML", seqid, scan.index);
                summary.unknown_references += 1;
                continue;
            };
            let Some(protein) = catalog.set.get_mut(primary) else {
                continue;
            };
            let slot = &mut protein.sources[i_source].matches;
            if slot
                .iter()
                .any(|m| m.attr.get_text("scan_id") == Some(scan.start_scan.as_str()))
            {
                summary.duplicate_spectra += 1;
                continue;
            }
            let mut m = make_match(hit, scan, source, &self.params);
            if let Some(peptide) = catalog.peptides.get(primary).and_then(|peptides| {
                peptides.iter().find(|p| {
                    p.charge == scan.assumed_charge && p.modified_sequence == hit.modified_sequence
                })
            }) {
                if let Some(prob) = peptide.nsp_adjusted_probability {
                    m.attr.insert("probability_protxml", prob);
                }
                m.attr
                    .insert("is_contributing_evidence", peptide.is_contributing_evidence);
            }
            slot.push(m);
            assigned = true;
        }
        assigned
    }

    pub fn load_from_readers<P: BufRead, Q: BufRead>(
        &self,
        protxml: ProtXmlReader<P>,
        pepxmls: Vec<(String, PepXmlReader<Q>)>,
        summary: &mut IngestSummary,
    ) -> std::result::Result<EvidenceSet, EvidenceReadingError> {
        let mut catalog = ProteinCatalog::read(protxml, &self.params)?;
        info!(
            "Read {} proteins from {}",
            catalog.set.len(),
            self.protxml.display()
        );
        for (name, reader) in pepxmls {
            info!("Loading pepXML {}", name);
            self.load_pepxml(&mut catalog, reader, &name, summary)?;
        }
        Ok(catalog.into_filtered_set(self.params.protein_error))
    }
}

impl EvidenceSource for ProphetSource {
    fn describe(&self) -> String {
        format!("ProteinProphet {}", basename(&self.protxml.to_string_lossy()))
    }

    fn fingerprint(&self) -> Result<Fingerprint> {
        let stamps = std::iter::once(&self.protxml)
            .chain(self.pepxmls.iter())
            .map(|p| FileStamp::from_path(p).map_err(|e| EvidenceReadingError::io_at(e, p)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Fingerprint::new("prophet", &(stamps, self.params))?)
    }

    fn load(
        &self,
        summary: &mut IngestSummary,
    ) -> std::result::Result<EvidenceSet, EvidenceReadingError> {
        let protxml = ProtXmlReader::from_path(&self.protxml)?;
        let pepxmls = self
            .pepxmls
            .iter()
            .map(|p| Ok((file_stem(p), PepXmlReader::from_path(p)?)))
            .collect::<std::result::Result<Vec<_>, EvidenceReadingError>>()?;
        self.load_from_readers(protxml, pepxmls, summary)
    }
}

fn file_stem(path: &Path) -> String {
    basename(&path.to_string_lossy())
}
