//! Per protein counters written into the protein attr sidecar.

use crate::models::{
    EvidenceSet,
    Protein,
};
use std::collections::HashSet;
use tracing::warn;

pub const CONTRIBUTING_ATTR: &str = "is_contributing_evidence";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProteinStats {
    /// Source slots holding at least one match.
    pub n_slice_populated: usize,
    /// Distinct peptide sequences.
    pub n_peptide: usize,
    pub n_match: usize,
    pub n_match_unique: usize,
    /// Percent of residues spanned by resolved matches, `None` without a sequence.
    pub coverage: Option<f64>,
    pub n_indep_spectra: usize,
}

impl ProteinStats {
    pub fn of(protein: &Protein) -> Self {
        let mut stats = ProteinStats::default();
        let mut peptides = HashSet::new();
        for source in &protein.sources {
            if !source.is_empty() {
                stats.n_slice_populated += 1;
            }
            for m in &source.matches {
                stats.n_match += 1;
                if m.is_unique {
                    stats.n_match_unique += 1;
                }
                if m.attr.get_flag(CONTRIBUTING_ATTR) == Some(true) {
                    stats.n_indep_spectra += 1;
                }
                peptides.insert(m.sequence.as_str());
            }
        }
        stats.n_peptide = peptides.len();
        stats.coverage = coverage(protein);
        stats
    }

    fn write_into(&self, protein: &mut Protein) {
        let attr = &mut protein.attr;
        attr.insert("n_slice_populated", self.n_slice_populated);
        attr.insert("n_peptide", self.n_peptide);
        attr.insert("n_match", self.n_match);
        attr.insert("n_match_unique", self.n_match_unique);
        attr.insert("n_indep_spectra", self.n_indep_spectra);
        match self.coverage {
            Some(x) => attr.insert("coverage", x),
            None => {
                attr.remove("coverage");
            }
        }
    }
}

/// Percent of the protein sequence covered by resolved matches of any slot.
pub fn coverage(protein: &Protein) -> Option<f64> {
    let len = protein.sequence.len();
    if len == 0 {
        return None;
    }
    let mut covered = vec![false; len];
    for span in protein.matches().filter_map(|m| m.span()) {
        let end = span.end.min(len);
        for residue in covered.iter_mut().take(end).skip(span.start) {
            *residue = true;
        }
    }
    let n_covered = covered.iter().filter(|&&x| x).count();
    Some(round_to(100.0 * n_covered as f64 / len as f64, 1))
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round() / scale
}

/// Computes [`ProteinStats`] for every protein and stores them in `attr`.
///
/// Also writes `percent_indep_spectra`, the share of the aggregate's
/// independent spectra carried by each protein. Unique match counts are only
/// meaningful when uniqueness tagging is current.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn compute_statistics(set: &mut EvidenceSet) {
    if !set.is_uniqueness_current() {
        warn!("Computing statistics over stale uniqueness flags");
    }
    let mut total_indep = 0;
    for protein in set.proteins_mut() {
        let stats = ProteinStats::of(protein);
        total_indep += stats.n_indep_spectra;
        stats.write_into(protein);
    }
    for protein in set.proteins_mut() {
        let n_indep = protein.attr.get_number("n_indep_spectra").unwrap_or(0.0);
        let percent = if total_indep == 0 {
            0.0
        } else {
            round_to(100.0 * n_indep / total_indep as f64, 2)
        };
        protein.attr.insert("percent_indep_spectra", percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Match;
    use crate::uniqueness::tag_uniqueness;

    fn placed(sequence: &str, position: usize) -> Match {
        let mut m = Match::new(sequence);
        m.position = Some(position);
        m
    }

    #[test]
    fn test_counters() {
        let mut protein = Protein::new("P1", 3);
        protein.sequence = "XXAAAYYCCC".into();
        protein.sources[0].matches.push(placed("AAA", 2));
        protein.sources[0].matches.push(placed("AAA", 2));
        protein.sources[2].matches.push(placed("AAAYY", 2));
        let stats = ProteinStats::of(&protein);
        assert_eq!(stats.n_slice_populated, 2);
        assert_eq!(stats.n_peptide, 2);
        assert_eq!(stats.n_match, 3);
        assert_eq!(stats.coverage, Some(50.0));
    }

    #[test]
    fn test_no_coverage_without_sequence() {
        let mut protein = Protein::new("P1", 1);
        protein.sources[0].matches.push(Match::new("AAA"));
        assert_eq!(coverage(&protein), None);
    }

    #[test]
    fn test_written_into_attr() {
        let mut set = EvidenceSet::new(vec!["a".into()]);
        for (seqid, flag) in [("P1", true), ("P2", true), ("P3", false)] {
            let mut protein = Protein::new(seqid, 1);
            let mut m = Match::new(format!("PEP{}", seqid));
            m.attr.insert(CONTRIBUTING_ATTR, flag);
            protein.sources[0].matches.push(m);
            set.insert_protein(protein);
        }
        tag_uniqueness(&mut set);
        compute_statistics(&mut set);

        let p1 = set.get("P1").unwrap();
        assert_eq!(p1.attr.get_number("n_match_unique"), Some(1.0));
        assert_eq!(p1.attr.get_number("percent_indep_spectra"), Some(50.0));
        let p3 = set.get("P3").unwrap();
        assert_eq!(p3.attr.get_number("n_indep_spectra"), Some(0.0));
        assert_eq!(p3.attr.get_number("percent_indep_spectra"), Some(0.0));
    }
}
