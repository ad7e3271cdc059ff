//! Morpheus tab separated search results.
//!
//! Column names are matched case-insensitively.

use super::{
    EvidenceSource,
    IngestSummary,
    basename,
};
use crate::cache::{
    FileStamp,
    Fingerprint,
};
use crate::calibration::linear_intensity;
use crate::errors::{
    EvidenceReadingError,
    Result,
};
use crate::models::{
    EvidenceSet,
    Match,
    Modification,
    PipelineStage,
    Protein,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{
    debug,
    info,
    warn,
};

/// Bracketed or parenthesized modification names inside a peptide.
static MODIFICATION_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\[([^\]]*)\]|\(([^)]*)\)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorpheusParams {
    /// q-value (%) mapped to full intensity.
    pub q_good: f64,
    /// Rows with a larger q-value (%) are skipped.
    pub q_cutoff: f64,
}

impl Default for MorpheusParams {
    fn default() -> Self {
        Self {
            q_good: 0.0,
            q_cutoff: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorpheusSource {
    pub protein_groups: PathBuf,
    pub psms: PathBuf,
    pub modifications: Option<PathBuf>,
    pub params: MorpheusParams,
}

#[derive(Debug, Deserialize)]
struct ProteinGroupRow {
    #[serde(rename = "protein description")]
    description: String,
    #[serde(rename = "protein sequence")]
    sequence: String,
    #[serde(rename = "protein sequence coverage (%)", default)]
    coverage: Option<String>,
    #[serde(rename = "summed morpheus score", default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PsmRow {
    filename: String,
    #[serde(rename = "peptide sequence")]
    peptide: String,
    #[serde(rename = "base peptide sequence")]
    base_peptide: String,
    #[serde(rename = "protein description")]
    protein_description: String,
    #[serde(rename = "q-value (%)")]
    q_value: f64,
    #[serde(rename = "scan number", alias = "spectrum number", default)]
    scan: Option<String>,
    #[serde(
        rename = "retention time (min)",
        alias = "retention time (minutes)",
        default
    )]
    retention_time: Option<f64>,
    #[serde(rename = "morpheus score", default)]
    score: Option<f64>,
    #[serde(rename = "precursor mass (da)", default)]
    mass: Option<f64>,
    #[serde(rename = "precursor mass error (da)", default)]
    mass_diff: Option<f64>,
    #[serde(rename = "precursor m/z", default)]
    mz: Option<f64>,
    #[serde(rename = "missed cleavages", default)]
    missed_cleavages: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ModificationRow {
    description: String,
    #[serde(rename = "monoisotopic mass shift (da)")]
    mass_shift: f64,
}

fn tsv_reader<R: Read>(inner: R) -> std::result::Result<csv::Reader<R>, EvidenceReadingError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(inner);
    let headers: csv::StringRecord = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    rdr.set_headers(headers);
    Ok(rdr)
}

fn open_file(path: &std::path::Path) -> std::result::Result<std::fs::File, EvidenceReadingError> {
    std::fs::File::open(path).map_err(|e| EvidenceReadingError::io_at(e, path))
}

/// Delta masses by modification name.
pub fn read_modification_table<R: Read>(
    inner: R,
) -> std::result::Result<HashMap<String, f64>, EvidenceReadingError> {
    let mut out = HashMap::new();
    for row in tsv_reader(inner)?.deserialize() {
        let row: ModificationRow = row?;
        out.insert(row.description, row.mass_shift);
    }
    Ok(out)
}

/// Splits `K.PEP[Oxidation]TIDE.R` into its bare sequence and modifications.
///
/// A modification applies to the residue before it, leading ones are N-terminal.
/// Unknown names are skipped.
pub fn parse_peptide(text: &str, table: &HashMap<String, f64>) -> (String, Vec<Modification>) {
    let bytes = text.as_bytes();
    let core = if bytes.len() >= 4 && bytes[1] == b'.' && bytes[bytes.len() - 2] == b'.' {
        &text[2..text.len() - 2]
    } else {
        text
    };

    let mut sequence = String::with_capacity(core.len());
    let mut modifications = Vec::new();
    let mut last = 0;
    for cap in MODIFICATION_REGEX.captures_iter(core) {
        let Some(whole) = cap.get(0) else {
            continue;
        };
        sequence.push_str(&core[last..whole.start()]);
        last = whole.end();
        let name = cap
            .get(1)
            .or_else(|| cap.get(2))
            .map(|x| x.as_str())
            .unwrap_or_default();
        match table.get(name) {
            Some(mass) => modifications.push(
                Modification::new(sequence.len() as isize - 1, *mass).with_kind(name),
            ),
            None => debug!("Unknown modification {}", name),
        }
    }
    sequence.push_str(&core[last..]);
    (sequence, modifications)
}

fn first_words(description: &str) -> Vec<String> {
    description
        .split(" / ")
        .filter_map(|d| d.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

fn protein_from_row(i_group: usize, row: &ProteinGroupRow) -> Option<Protein> {
    let seqids = first_words(&row.description);
    let primary = seqids.first()?;
    let mut protein = Protein::new(primary.clone(), 0);
    protein.description = row
        .description
        .split(" / ")
        .next()
        .unwrap_or_default()
        .to_string();
    protein.sequence = row
        .sequence
        .split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    for other in &seqids[1..] {
        protein.add_other_seqid(other.clone());
    }
    protein.attr.insert("group_id", i_group);
    if let Some(coverage) = row.coverage.as_deref().and_then(|c| {
        c.split([';', '/'])
            .next()
            .and_then(|x| x.trim().parse::<f64>().ok())
    }) {
        protein.attr.insert("percent_coverage", coverage);
    }
    if let Some(score) = row.score {
        protein.attr.insert("morpheus_score", score);
    }
    Some(protein)
}

impl MorpheusSource {
    pub fn load_from_readers<A: Read, B: Read, C: Read>(
        &self,
        protein_groups: A,
        psms: B,
        modifications: Option<C>,
        summary: &mut IngestSummary,
    ) -> std::result::Result<EvidenceSet, EvidenceReadingError> {
        let table = match modifications {
            Some(x) => read_modification_table(x)?,
            None => HashMap::new(),
        };

        let mut set = EvidenceSet::new(Vec::new());
        for (i_group, row) in tsv_reader(protein_groups)?.deserialize().enumerate() {
            let row: ProteinGroupRow = row?;
            match protein_from_row(i_group, &row) {
                Some(protein) => {
                    set.insert_protein(protein);
                }
                None => warn!("Protein group {} has no seqid", i_group),
            }
        }
        let mut index: HashMap<String, String> = HashMap::new();
        for protein in set.proteins() {
            for seqid in std::iter::once(&protein.seqid).chain(protein.other_seqids.iter()) {
                index
                    .entry(seqid.clone())
                    .or_insert_with(|| protein.seqid.clone());
            }
        }
        info!("Read {} protein groups", set.len());

        for row in tsv_reader(psms)?.deserialize() {
            let row: PsmRow = row?;
            summary.records_seen += 1;
            if row.q_value > self.params.q_cutoff {
                summary.rejected_by_cutoff += 1;
                continue;
            }
            summary.matches_seen += 1;
            self.assign_row(&mut set, &index, &table, row, summary);
        }
        set.set_stage(PipelineStage::PositionMapped);
        Ok(set)
    }

    fn assign_row(
        &self,
        set: &mut EvidenceSet,
        index: &HashMap<String, String>,
        table: &HashMap<String, f64>,
        row: PsmRow,
        summary: &mut IngestSummary,
    ) {
        let (parsed, modifications) = parse_peptide(&row.peptide, table);
        if parsed != row.base_peptide {
            warn!(
                "Peptide sequences don't match: {} {} {}",
                row.peptide, parsed, row.base_peptide
            );
        }
        let peptide = row.base_peptide.clone();

        let mut known = false;
        let mut target = None;
        for seqid in first_words(&row.protein_description) {
            let Some(primary) = index.get(&seqid) else {
                continue;
            };
            known = true;
            let position = set
                .get(primary)
                .and_then(|p| p.sequence.find(peptide.as_str()));
            if let Some(position) = position {
                target = Some((primary.clone(), position));
                break;
            }
        }
        let Some((seqid, position)) = target else {
            if known {
                debug!("{} not found in any cited protein sequence", peptide);
                summary.unresolved_positions += 1;
            } else {
                warn!("Couldn't find protein for {}", peptide);
                summary.unknown_references += 1;
            }
            return;
        };

        let source = basename(&row.filename);
        let i_source = match set.source_index(&source) {
            Some(i) => i,
            None => set.add_source(source.clone()),
        };

        let mut m = Match::new(peptide);
        m.position = Some(position);
        m.intensity = linear_intensity(row.q_value, self.params.q_good, self.params.q_cutoff);
        let attr = &mut m.attr;
        attr.insert("source", source);
        attr.insert("q_value", row.q_value);
        if let Some(scan) = row.scan {
            attr.insert_raw("scan_id", &scan);
        }
        for (key, value) in [
            ("retention_time", row.retention_time),
            ("morpheus_score", row.score),
            ("mass", row.mass),
            ("mass_diff", row.mass_diff),
            ("m/z", row.mz),
            ("missed_cleavages", row.missed_cleavages),
        ] {
            if let Some(value) = value {
                attr.insert(key, value);
            }
        }
        if !modifications.is_empty() {
            attr.insert("modified_sequence", row.peptide.clone());
            m.modifications = modifications;
        }

        if let Some(protein) = set.get_mut(&seqid) {
            protein.sources[i_source].matches.push(m);
            summary.matches_assigned += 1;
        }
    }
}

impl EvidenceSource for MorpheusSource {
    fn describe(&self) -> String {
        format!("Morpheus {}", basename(&self.psms.to_string_lossy()))
    }

    fn fingerprint(&self) -> Result<Fingerprint> {
        let stamps = [Some(&self.protein_groups), Some(&self.psms), self.modifications.as_ref()]
            .into_iter()
            .flatten()
            .map(|p| FileStamp::from_path(p).map_err(|e| EvidenceReadingError::io_at(e, p)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Fingerprint::new("morpheus", &(stamps, self.params))?)
    }

    fn load(
        &self,
        summary: &mut IngestSummary,
    ) -> std::result::Result<EvidenceSet, EvidenceReadingError> {
        let groups = open_file(&self.protein_groups)?;
        let psms = open_file(&self.psms)?;
        let modifications = match &self.modifications {
            Some(path) => Some(open_file(path)?),
            None => None,
        };
        self.load_from_readers(groups, psms, modifications, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPS: &str = "\
Protein Description\tProtein Sequence\tProtein Sequence Coverage (%)\tSummed Morpheus Score
P1 first protein / P1b alias\tXXAAAYYMKR/XXAAAYY\t40.0;30.0\t12.5
P2 second protein\tCCCDDD\t50\t3.0
";

    const PSMS: &str = "\
Filename\tScan Number\tRetention Time (min)\tPeptide Sequence\tBase Peptide Sequence\tProtein Description\tMissed Cleavages\tQ-Value (%)\tMorpheus Score
/data/run1.raw\t10\t12.5\tX.AAA.Y\tAAA\tP1b alias\t0\t0.0\t20
/data/run2.raw\t11\t13.0\tK.M[Oxidation]KR.-\tMKR\tP1 first protein\t1\t0.3\t15
/data/run1.raw\t12\t14.0\tK.EEE.-\tEEE\tP2 second protein\t0\t0.1\t9
/data/run1.raw\t13\t14.5\tK.AAA.-\tAAA\tP7 missing\t0\t0.1\t9
/data/run1.raw\t14\t15.0\tK.AAA.-\tAAA\tP1 first protein\t0\t5.0\t1
";

    const MODS: &str = "\
Description\tMonoisotopic Mass Shift (Da)
Oxidation\t15.9949
";

    #[test]
    fn test_parse_peptide() {
        let mut table = HashMap::new();
        table.insert("Oxidation".to_string(), 15.9949);
        table.insert("Acetyl".to_string(), 42.01);
        let (seq, mods) = parse_peptide("-.[Acetyl]PEM(Oxidation)K[Unknown].R", &table);
        assert_eq!(seq, "PEMK");
        assert_eq!(mods.len(), 2);
        assert!(mods[0].is_n_terminal());
        assert_eq!(mods[1].offset, 2);
        assert_eq!(mods[1].kind.as_deref(), Some("Oxidation"));
    }

    #[test]
    fn test_load_morpheus() {
        let source = MorpheusSource {
            protein_groups: "groups.tsv".into(),
            psms: "psms.tsv".into(),
            modifications: None,
            params: MorpheusParams::default(),
        };
        let mut summary = IngestSummary::default();
        let set = source
            .load_from_readers(
                GROUPS.as_bytes(),
                PSMS.as_bytes(),
                Some(MODS.as_bytes()),
                &mut summary,
            )
            .unwrap();

        assert_eq!(set.source_labels(), &["run1.raw".to_string(), "run2.raw".to_string()]);
        assert_eq!(set.stage(), PipelineStage::PositionMapped);
        set.assert_aligned();

        let p1 = set.get("P1").unwrap();
        assert_eq!(p1.sequence, "XXAAAYYMKR");
        assert_eq!(p1.other_seqids, vec!["P1b".to_string()]);
        assert_eq!(p1.attr.get_number("percent_coverage"), Some(40.0));
        let first = &p1.sources[0].matches[0];
        assert_eq!(first.position, Some(2));
        assert!((first.intensity - 1.0).abs() < 1e-12);
        assert_eq!(first.attr.get_number("scan_id"), Some(10.0));
        let second = &p1.sources[1].matches[0];
        assert_eq!(second.position, Some(7));
        assert_eq!(second.modifications.len(), 1);
        assert_eq!(second.missed_cleavages(), Some(1.0));

        assert_eq!(summary.records_seen, 5);
        assert_eq!(summary.rejected_by_cutoff, 1);
        assert_eq!(summary.matches_seen, 4);
        assert_eq!(summary.matches_assigned, 2);
        assert_eq!(summary.unresolved_positions, 1);
        assert_eq!(summary.unknown_references, 1);
    }
}
