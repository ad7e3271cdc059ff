//! Conversion between false-discovery error and acceptance probability.
//!
//! Search-engine post-processors (PeptideProphet, ProteinProphet ...) report an
//! empirical table of `(error, min probability)` pairs. This crate turns that
//! table into a [`Distribution`] that can be queried in both directions using
//! piecewise-linear interpolation.

use tracing::debug;

/// Error of the implicit lower sentinel.
pub const MIN_ERROR: f64 = 0.0;

/// Error of the implicit upper sentinel.
pub const MAX_ERROR: f64 = 1.0;

/// Custom error types for the calibration library.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Returned when a distribution is built without any points.
    NoPoints,
    /// Returned when a point carries a NaN or infinite coordinate.
    NonFinite { error: f64, probability: f64 },
    /// Returned when a coordinate falls outside of `[0, 1]`.
    OutOfRange { error: f64, probability: f64 },
    /// Returned when probability increases while error increases.
    NotMonotonic { index: usize },
    /// Returned when a query falls outside of the range covered by the table.
    /// The payload is the query value.
    Unavailable(f64),
}

impl std::fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPoints => write!(f, "Distribution has no points"),
            Self::NonFinite { error, probability } => write!(
                f,
                "Distribution point is not finite (error={}, probability={})",
                error, probability
            ),
            Self::OutOfRange { error, probability } => write!(
                f,
                "Distribution point is outside of [0, 1] (error={}, probability={})",
                error, probability
            ),
            Self::NotMonotonic { index } => write!(
                f,
                "Probability increases with error at distribution point {}",
                index
            ),
            Self::Unavailable(x) => write!(f, "Value {} is outside of the calibrated range", x),
        }
    }
}

impl std::error::Error for CalibrationError {}

/// A single `(error, probability)` entry of a calibration table.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct DistributionPoint {
    pub error: f64,
    #[serde(rename = "prob")]
    pub probability: f64,
}

impl DistributionPoint {
    pub fn new(error: f64, probability: f64) -> Self {
        Self { error, probability }
    }
}

impl From<(f64, f64)> for DistributionPoint {
    fn from(x: (f64, f64)) -> Self {
        Self::new(x.0, x.1)
    }
}

/// Monotonic error vs. probability table.
///
/// # Invariants
/// * `points` is sorted by ascending error.
/// * probability never increases as error increases.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Distribution {
    points: Vec<DistributionPoint>,
}

impl Distribution {
    /// Builds a distribution from unsorted points.
    ///
    /// Both coordinates must lie in `[0, 1]`. Points are sorted by error (ties
    /// broken by descending probability) and checked for monotonicity. No sentinels are added, use
    /// [`Distribution::with_sentinels`] for that.
    pub fn new<T: Into<DistributionPoint>>(
        points: impl IntoIterator<Item = T>,
    ) -> Result<Self, CalibrationError> {
        let mut points: Vec<DistributionPoint> = points.into_iter().map(Into::into).collect();
        if points.is_empty() {
            return Err(CalibrationError::NoPoints);
        }
        if let Some(bad) = points
            .iter()
            .find(|p| !p.error.is_finite() || !p.probability.is_finite())
        {
            return Err(CalibrationError::NonFinite {
                error: bad.error,
                probability: bad.probability,
            });
        }

        let in_unit = |x: f64| (MIN_ERROR..=MAX_ERROR).contains(&x);
        if let Some(bad) = points
            .iter()
            .find(|p| !in_unit(p.error) || !in_unit(p.probability))
        {
            return Err(CalibrationError::OutOfRange {
                error: bad.error,
                probability: bad.probability,
            });
        }

        // Non-finite values were rejected above so total_cmp matches partial_cmp here.
        points.sort_by(|a, b| {
            a.error
                .total_cmp(&b.error)
                .then(b.probability.total_cmp(&a.probability))
        });

        if let Some(i) = points
            .windows(2)
            .position(|w| w[1].probability > w[0].probability)
        {
            return Err(CalibrationError::NotMonotonic { index: i + 1 });
        }

        Ok(Self { points })
    }

    /// Pads the table with the `(0, 1.0)` and `(1, 0.0)` boundary points
    /// when they are not already present.
    pub fn with_sentinels(mut self) -> Self {
        let needs_low = self
            .points
            .first()
            .is_none_or(|p| p.error > MIN_ERROR || p.probability < 1.0);
        if needs_low {
            self.points
                .insert(0, DistributionPoint::new(MIN_ERROR, 1.0));
        }
        let needs_high = self
            .points
            .last()
            .is_none_or(|p| p.error < MAX_ERROR || p.probability > 0.0);
        if needs_high {
            self.points.push(DistributionPoint::new(MAX_ERROR, 0.0));
        }
        debug!(
            "Padded distribution to {} points (low: {}, high: {})",
            self.points.len(),
            needs_low,
            needs_high
        );
        self
    }

    pub fn points(&self) -> &[DistributionPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the acceptance probability that corresponds to a false
    /// discovery error.
    ///
    /// Interpolates between the two adjacent points that satisfy
    /// `error[i-1] <= error < error[i]`. Errors outside of the table return
    /// [`CalibrationError::Unavailable`], including the upper bound itself.
    pub fn error_to_probability(&self, error: f64) -> Result<f64, CalibrationError> {
        // First point with an error strictly greater than the query.
        let i = self.points.partition_point(|p| p.error <= error);
        if i == 0 || i >= self.points.len() {
            return Err(CalibrationError::Unavailable(error));
        }
        let p0 = self.points[i - 1];
        let p1 = self.points[i];
        let f = fractionate(p0.error, p1.error, error);
        Ok(interpolate(p0.probability, p1.probability, f))
    }

    /// Returns the false discovery error that corresponds to an acceptance
    /// probability.
    ///
    /// Mirrors [`Distribution::error_to_probability`] relying on probability
    /// being non-increasing. A probability shared by several points maps to
    /// the lowest error among them.
    pub fn probability_to_error(&self, probability: f64) -> Result<f64, CalibrationError> {
        // First point with a probability lower or equal to the query.
        let i = self.points.partition_point(|p| p.probability > probability);
        if i >= self.points.len() {
            return Err(CalibrationError::Unavailable(probability));
        }
        let p1 = self.points[i];
        if i == 0 {
            // Only the exact top of the table is covered.
            return if p1.probability == probability {
                Ok(p1.error)
            } else {
                Err(CalibrationError::Unavailable(probability))
            };
        }
        let p0 = self.points[i - 1];
        let f = fractionate(p0.probability, p1.probability, probability);
        Ok(interpolate(p0.error, p1.error, f))
    }
}

fn fractionate(a0: f64, a1: f64, a: f64) -> f64 {
    (a - a0) / (a1 - a0)
}

fn interpolate(a0: f64, a1: f64, f: f64) -> f64 {
    a0 + f * (a1 - a0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Distribution {
        Distribution::new([(0.0, 1.0), (0.01, 0.9), (0.05, 0.5), (1.0, 0.0)]).unwrap()
    }

    #[test]
    fn test_points_get_sorted() {
        let dist = Distribution::new([(0.05, 0.5), (0.0, 1.0), (0.01, 0.9)]).unwrap();
        let errors: Vec<f64> = dist.points().iter().map(|p| p.error).collect();
        assert_eq!(errors, vec![0.0, 0.01, 0.05]);
    }

    #[test]
    fn test_rejects_increasing_probability() {
        let res = Distribution::new([(0.0, 0.5), (0.1, 0.9)]);
        assert_eq!(res, Err(CalibrationError::NotMonotonic { index: 1 }));
    }

    #[test]
    fn test_rejects_nan() {
        let res = Distribution::new([(f64::NAN, 0.5)]);
        assert!(matches!(res, Err(CalibrationError::NonFinite { .. })));
    }

    #[test]
    fn test_rejects_out_of_unit_range() {
        let res = Distribution::new([(0.5, 0.5), (1.5, 0.2)]);
        assert_eq!(
            res,
            Err(CalibrationError::OutOfRange {
                error: 1.5,
                probability: 0.2
            })
        );
        let res = Distribution::new([(0.1, 1.2)]);
        assert!(matches!(res, Err(CalibrationError::OutOfRange { .. })));
    }

    #[test]
    fn test_sentinels_added_once() {
        let dist = Distribution::new([(0.02, 0.8), (0.1, 0.3)])
            .unwrap()
            .with_sentinels();
        assert_eq!(dist.len(), 4);
        assert_eq!(dist.points()[0], DistributionPoint::new(0.0, 1.0));
        assert_eq!(dist.points()[3], DistributionPoint::new(1.0, 0.0));

        let again = dist.clone().with_sentinels();
        assert_eq!(again, dist);
    }

    #[test]
    fn test_error_to_probability_exact_points() {
        let dist = sample();
        assert_eq!(dist.error_to_probability(0.0).unwrap(), 1.0);
        assert_eq!(dist.error_to_probability(0.01).unwrap(), 0.9);
    }

    #[test]
    fn test_error_to_probability_interpolates() {
        let dist = sample();
        let p = dist.error_to_probability(0.03).unwrap();
        assert!((p - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_error_to_probability_out_of_range() {
        let dist = sample();
        assert_eq!(
            dist.error_to_probability(-0.1),
            Err(CalibrationError::Unavailable(-0.1))
        );
        // Upper bound is exclusive.
        assert_eq!(
            dist.error_to_probability(1.0),
            Err(CalibrationError::Unavailable(1.0))
        );
    }

    #[test]
    fn test_probability_to_error_interpolates() {
        let dist = sample();
        let e = dist.probability_to_error(0.7).unwrap();
        assert!((e - 0.03).abs() < 1e-9);
        assert_eq!(dist.probability_to_error(1.0).unwrap(), 0.0);
        assert_eq!(dist.probability_to_error(0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_probability_to_error_flat_segment() {
        let dist = Distribution::new([(0.0, 1.0), (0.1, 0.5), (0.2, 0.5), (1.0, 0.0)]).unwrap();
        assert_eq!(dist.probability_to_error(0.5).unwrap(), 0.1);
    }

    #[test]
    fn test_probability_to_error_out_of_range() {
        let dist = Distribution::new([(0.01, 0.9), (0.05, 0.5)]).unwrap();
        assert!(dist.probability_to_error(0.95).is_err());
        assert!(dist.probability_to_error(0.4).is_err());
    }
}
