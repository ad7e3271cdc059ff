//! Error estimates and intensity scaling of matches.

use crate::data_sources::IngestSummary;
use crate::models::{
    EvidenceSet,
    PipelineStage,
};
use fdrcalib::Distribution;
use tracing::{
    debug,
    warn,
};

/// Match attribute holding the PeptideProphet style probability.
pub const PROBABILITY_ATTR: &str = "probability";
/// Match attribute written with the error estimate.
pub const ERROR_ATTR: &str = "fpe";

/// Linear map of `x` from `[low, high]` onto `[0.2, 1.0]`.
pub fn linear_intensity(x: f64, high: f64, low: f64) -> f64 {
    (x - low) / (high - low) * 0.8 + 0.2
}

/// Same as [`linear_intensity`] over `-ln(x)`. Zero maps to full intensity.
pub fn minus_log_intensity(x: f64, high: f64, low: f64) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    linear_intensity(-x.ln(), -high.ln(), -low.ln())
}

/// Writes the error estimate of every match that carries a probability.
///
/// Lookups outside of the table are counted, the match keeps no estimate.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn annotate_error_estimates(
    set: &mut EvidenceSet,
    distribution: &Distribution,
    summary: &mut IngestSummary,
) {
    for protein in set.proteins_mut() {
        for m in protein.matches_mut() {
            let Some(prob) = m.attr.get_number(PROBABILITY_ATTR) else {
                continue;
            };
            match distribution.probability_to_error(prob) {
                Ok(error) => m.attr.insert(ERROR_ATTR, error),
                Err(e) => {
                    debug!("No error estimate for {}: {}", m.sequence, e);
                    m.attr.remove(ERROR_ATTR);
                    summary.calibration_unavailable += 1;
                }
            }
        }
    }
    if summary.calibration_unavailable > 0 {
        warn!(
            "{} matches could not be calibrated",
            summary.calibration_unavailable
        );
    }
    set.set_stage(PipelineStage::Calibrated);
}

/// Probability that corresponds to an acceptable error, `None` if the
/// error is outside of the table.
pub fn probability_cutoff(distribution: &Distribution, error: f64) -> Option<f64> {
    match distribution.error_to_probability(error) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!("Error cutoff {} cannot be calibrated: {}", error, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Match,
        Protein,
    };

    #[test]
    fn test_intensity_bounds() {
        assert!((linear_intensity(0.0, 0.0, 0.75) - 1.0).abs() < 1e-12);
        assert!((linear_intensity(0.75, 0.0, 0.75) - 0.2).abs() < 1e-12);
        assert!((minus_log_intensity(1e-8, 1e-8, 1e-2) - 1.0).abs() < 1e-12);
        assert!((minus_log_intensity(1e-2, 1e-8, 1e-2) - 0.2).abs() < 1e-12);
        assert_eq!(minus_log_intensity(0.0, 1e-8, 1e-2), 1.0);
    }

    #[test]
    fn test_annotate_error_estimates() {
        let dist = Distribution::new([(0.0, 1.0), (1.0, 0.0)]).unwrap();
        let mut set = EvidenceSet::new(vec!["run1".into()]);
        let mut protein = Protein::new("P1", 1);
        let mut good = Match::new("AAA");
        good.attr.insert(PROBABILITY_ATTR, 0.75);
        let mut out_of_range = Match::new("CCC");
        out_of_range.attr.insert(PROBABILITY_ATTR, 1.5);
        protein.sources[0].matches = vec![good, out_of_range, Match::new("DDD")];
        set.insert_protein(protein);

        let mut summary = IngestSummary::default();
        annotate_error_estimates(&mut set, &dist, &mut summary);
        let matches = &set.get("P1").unwrap().sources[0].matches;
        assert!((matches[0].attr.get_number(ERROR_ATTR).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(matches[1].attr.get(ERROR_ATTR), None);
        assert_eq!(matches[2].attr.get(ERROR_ATTR), None);
        assert_eq!(summary.calibration_unavailable, 1);
        assert_eq!(set.stage(), PipelineStage::Calibrated);
    }

    #[test]
    fn test_probability_cutoff() {
        let dist = Distribution::new([(0.0, 1.0), (1.0, 0.0)]).unwrap();
        assert_eq!(probability_cutoff(&dist, 0.5), Some(0.5));
        assert_eq!(probability_cutoff(&dist, 1.0), None);
    }
}
