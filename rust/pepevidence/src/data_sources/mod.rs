pub mod evidence_json;
pub mod fasta;
pub mod morpheus;
pub mod pepxml;
pub mod prophet;
pub mod protxml;
pub mod xml_stream;

pub use evidence_json::EvidenceJsonSource;
pub use fasta::{
    FastaCatalog,
    FastaReader,
    FastaRecord,
};
pub use morpheus::MorpheusSource;
pub use prophet::ProphetSource;

use crate::cache::{
    EvidenceCache,
    Fingerprint,
};
use crate::errors::{
    EvidenceReadingError,
    Result,
};
use crate::models::EvidenceSet;
use std::path::Path;
use tracing::{
    info,
    warn,
};

/// Counters of the recoverable data-quality problems met while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub records_seen: usize,
    pub matches_seen: usize,
    pub matches_assigned: usize,
    pub unknown_references: usize,
    pub unresolved_positions: usize,
    pub calibration_unavailable: usize,
    pub duplicate_spectra: usize,
    pub rejected_by_cutoff: usize,
}

impl IngestSummary {
    pub fn merge(&mut self, other: &IngestSummary) {
        self.records_seen += other.records_seen;
        self.matches_seen += other.matches_seen;
        self.matches_assigned += other.matches_assigned;
        self.unknown_references += other.unknown_references;
        self.unresolved_positions += other.unresolved_positions;
        self.calibration_unavailable += other.calibration_unavailable;
        self.duplicate_spectra += other.duplicate_spectra;
        self.rejected_by_cutoff += other.rejected_by_cutoff;
    }

    pub fn has_problems(&self) -> bool {
        self.unknown_references > 0
            || self.unresolved_positions > 0
            || self.calibration_unavailable > 0
    }

    /// Emits the one line summary of an ingestion.
    pub fn log(&self, label: &str) {
        if self.has_problems() {
            warn!("{}: {}", label, self);
        } else {
            info!("{}: {}", label, self);
        }
    }
}

impl std::fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} matches assigned to a protein ({} records, {} unknown protein references, \
             {} unresolved positions, {} uncalibrated, {} duplicate spectra, {} below cutoff)",
            self.matches_assigned,
            self.matches_seen,
            self.records_seen,
            self.unknown_references,
            self.unresolved_positions,
            self.calibration_unavailable,
            self.duplicate_spectra,
            self.rejected_by_cutoff,
        )
    }
}

/// A format adapter that turns one evidence input into an [`EvidenceSet`].
pub trait EvidenceSource {
    /// Short human readable label, used in logs and progress bars.
    fn describe(&self) -> String;

    /// Identifies the inputs and parameters of this source for caching.
    fn fingerprint(&self) -> Result<Fingerprint>;

    fn load(
        &self,
        summary: &mut IngestSummary,
    ) -> std::result::Result<EvidenceSet, EvidenceReadingError>;
}

/// Loads a source through a cache. Fresh loads are stored, a failed store is
/// only logged.
pub fn load_with_cache(
    source: &dyn EvidenceSource,
    cache: &dyn EvidenceCache,
    summary: &mut IngestSummary,
) -> Result<EvidenceSet> {
    let fingerprint = source.fingerprint()?;
    if let Some(set) = cache.load(&fingerprint) {
        info!("Using cached evidence for {}", source.describe());
        return Ok(set);
    }
    let mut local = IngestSummary::default();
    let set = source.load(&mut local)?;
    local.log(&source.describe());
    summary.merge(&local);
    if let Err(e) = cache.store(&fingerprint, &set) {
        warn!("Could not cache evidence for {}: {}", source.describe(), e);
    }
    Ok(set)
}

/// File name without any directory part, for both separator styles.
pub fn basename(path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
}

/// Whitespace separated words of a text file.
pub fn read_word_file(path: &Path) -> std::result::Result<Vec<String>, EvidenceReadingError> {
    let text =
        std::fs::read_to_string(path).map_err(|e| EvidenceReadingError::io_at(e, path))?;
    Ok(text.split_whitespace().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoCache;
    use crate::models::Protein;
    use std::cell::Cell;

    #[test]
    fn test_basename() {
        assert_eq!(basename("/a/b/run1.mzML"), "run1.mzML");
        assert_eq!(basename(r"C:\data\run2.raw"), "run2.raw");
        assert_eq!(basename("run3"), "run3");
    }

    struct CountingSource {
        loads: Cell<usize>,
    }

    impl EvidenceSource for CountingSource {
        fn describe(&self) -> String {
            "counting".into()
        }

        fn fingerprint(&self) -> Result<Fingerprint> {
            Ok(Fingerprint::new("counting", &0)?)
        }

        fn load(
            &self,
            summary: &mut IngestSummary,
        ) -> std::result::Result<EvidenceSet, EvidenceReadingError> {
            self.loads.set(self.loads.get() + 1);
            summary.matches_seen += 2;
            summary.matches_assigned += 1;
            let mut set = EvidenceSet::new(vec!["run1".into()]);
            set.insert_protein(Protein::new("P1", 1));
            Ok(set)
        }
    }

    #[test]
    fn test_load_with_cache_merges_summary() {
        let source = CountingSource {
            loads: Cell::new(0),
        };
        let mut summary = IngestSummary::default();
        let set = load_with_cache(&source, &NoCache, &mut summary).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(source.loads.get(), 1);
        assert_eq!(summary.matches_seen, 2);
        assert_eq!(
            summary.to_string().split_whitespace().next(),
            Some("1/2")
        );
    }
}
