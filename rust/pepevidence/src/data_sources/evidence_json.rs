use super::{
    EvidenceSource,
    IngestSummary,
    basename,
};
use crate::cache::{
    FileStamp,
    Fingerprint,
};
use crate::calibration::annotate_error_estimates;
use crate::errors::{
    EvidenceReadingError,
    Result,
};
use crate::models::EvidenceSet;
use fdrcalib::Distribution;
use std::io::{
    BufReader,
    Read,
};
use std::path::PathBuf;
use tracing::info;

/// A previously serialized evidence set, optionally re-calibrated.
///
/// Both plain and zstd compressed (`.zst`) JSON are accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceJsonSource {
    pub path: PathBuf,
    pub distribution: Option<Distribution>,
}

impl EvidenceJsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            distribution: None,
        }
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = Some(distribution.with_sentinels());
        self
    }

    pub fn load_from_reader<R: Read>(
        &self,
        reader: R,
        summary: &mut IngestSummary,
    ) -> std::result::Result<EvidenceSet, EvidenceReadingError> {
        let mut set: EvidenceSet = serde_json::from_reader(BufReader::new(reader))?;
        // Serialized sets are trusted for their content, not their shape.
        if let Err(e) = set.check_alignment() {
            return Err(EvidenceReadingError::InvalidValue {
                field: "sources".into(),
                value: e.to_string(),
            });
        }
        summary.records_seen += set.len();
        summary.matches_seen += set.n_matches();
        summary.matches_assigned += set.n_matches();
        if let Some(dist) = &self.distribution {
            annotate_error_estimates(&mut set, dist, summary);
        }
        Ok(set)
    }
}

impl EvidenceSource for EvidenceJsonSource {
    fn describe(&self) -> String {
        format!("evidence {}", basename(&self.path.to_string_lossy()))
    }

    fn fingerprint(&self) -> Result<Fingerprint> {
        let stamp = FileStamp::from_path(&self.path)
            .map_err(|e| EvidenceReadingError::io_at(e, &self.path))?;
        Ok(Fingerprint::new("evidence", &(stamp, &self.distribution))?)
    }

    fn load(
        &self,
        summary: &mut IngestSummary,
    ) -> std::result::Result<EvidenceSet, EvidenceReadingError> {
        let file = std::fs::File::open(&self.path)
            .map_err(|e| EvidenceReadingError::io_at(e, &self.path))?;
        info!("Reading evidence set {}", self.path.display());
        if self.path.extension().is_some_and(|x| x == "zst") {
            let decoder =
                zstd::Decoder::new(file).map_err(|e| EvidenceReadingError::io_at(e, &self.path))?;
            self.load_from_reader(decoder, summary)
        } else {
            self.load_from_reader(file, summary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::ERROR_ATTR;
    use crate::models::{
        Match,
        Protein,
    };

    fn sample() -> EvidenceSet {
        let mut set = EvidenceSet::new(vec!["run1".into()]);
        let mut protein = Protein::new("P1", 1);
        let mut m = Match::new("AAA");
        m.attr.insert("probability", 0.5);
        protein.sources[0].matches.push(m);
        set.insert_protein(protein);
        set
    }

    #[test]
    fn test_reload_and_calibrate() {
        let json = serde_json::to_string(&sample()).unwrap();
        let source = EvidenceJsonSource::new("set.json")
            .with_distribution(Distribution::new([(0.0, 1.0), (1.0, 0.0)]).unwrap());
        let mut summary = IngestSummary::default();
        let set = source.load_from_reader(json.as_bytes(), &mut summary).unwrap();
        assert_eq!(summary.matches_seen, 1);
        let m = &set.get("P1").unwrap().sources[0].matches[0];
        assert!((m.attr.get_number(ERROR_ATTR).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_misaligned_set() {
        let json = r#"{"source_labels":["a","b"],"proteins":{"P1":{"seqid":"P1","sources":[{"matches":[]}]}}}"#;
        let mut summary = IngestSummary::default();
        let res = EvidenceJsonSource::new("x.json").load_from_reader(json.as_bytes(), &mut summary);
        assert!(matches!(res, Err(EvidenceReadingError::InvalidValue { .. })));
    }
}
