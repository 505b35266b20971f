//! Cohort-wide metric distributions.
//!
//! Summarizes one metric's samples across every subject into min, max,
//! optional sum, and three equal-width breakpoints that split the observed
//! range into four bands.

use cohort_core::CohortError;
use serde::{Deserialize, Serialize};

/// Value some upstream tools emit in place of a measurement.
pub const MISSING_SENTINEL: f64 = -999.0;

/// Breakpoints reported when every sample has the same value. Not a real
/// threshold: it marks a distribution that cannot discriminate.
pub const DEGENERATE_BREAKPOINTS: [f64; 3] = [0.0; 3];

/// Drop values that do not represent a measurement.
///
/// `None`, the `-999` sentinel, NaN and infinities all become `None`.
///
/// # Examples
///
/// ```
/// use cohort_ranking::distribution::measured;
///
/// assert_eq!(measured(Some(3.5)), Some(3.5));
/// assert_eq!(measured(Some(-999.0)), None);
/// assert_eq!(measured(Some(f64::NAN)), None);
/// assert_eq!(measured(None), None);
/// ```
pub fn measured(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != MISSING_SENTINEL)
}

/// Summary of one metric across a cohort.
///
/// # Examples
///
/// ```
/// use cohort_ranking::distribution::CohortDistribution;
///
/// let dist = CohortDistribution {
///     name: "cc".into(),
///     min: 2.0,
///     max: 10.0,
///     entry_count: 2,
///     sum: None,
///     breakpoints: [4.0, 6.0, 8.0],
/// };
/// assert!(!dist.is_degenerate());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortDistribution {
    /// Metric name.
    pub name: String,
    /// Smallest measured value.
    pub min: f64,
    /// Largest measured value.
    pub max: f64,
    /// Number of measured samples.
    pub entry_count: usize,
    /// Sum of measured samples, only for additive metrics.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sum: Option<f64>,
    /// Ascending thresholds between the four bands.
    pub breakpoints: [f64; 3],
}

impl CohortDistribution {
    /// `true` when all samples were equal and no ranking is possible.
    pub fn is_degenerate(&self) -> bool {
        self.breakpoints == DEGENERATE_BREAKPOINTS
    }
}

/// Summarize one metric's samples across the cohort.
///
/// Missing samples (see [`measured`]) are ignored. Breakpoints are
/// `min + k * (max - min) / 4` for `k = 1, 2, 3`; when `min == max` they are
/// [`DEGENERATE_BREAKPOINTS`].
///
/// # Errors
///
/// Returns [`CohortError::EmptyDistribution`] when no sample is measured.
///
/// # Examples
///
/// ```
/// use cohort_ranking::distribution::summarize;
///
/// let dist = summarize("cc", &[Some(2.0), None, Some(10.0)], false).unwrap();
/// assert_eq!(dist.entry_count, 2);
/// assert_eq!(dist.breakpoints, [4.0, 6.0, 8.0]);
/// assert_eq!(dist.sum, None);
/// ```
pub fn summarize(
    name: &str,
    samples: &[Option<f64>],
    additive: bool,
) -> Result<CohortDistribution, CohortError> {
    let values: Vec<f64> = samples.iter().filter_map(|s| measured(*s)).collect();
    if values.is_empty() {
        return Err(CohortError::EmptyDistribution(name.to_string()));
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let breakpoints = if max == min {
        DEGENERATE_BREAKPOINTS
    } else {
        // Weighted form: `max - min` overflows for wide finite ranges.
        [0.25, 0.5, 0.75].map(|t| min * (1.0 - t) + max * t)
    };

    Ok(CohortDistribution {
        name: name.to_string(),
        min,
        max,
        entry_count: values.len(),
        sum: additive.then(|| values.iter().sum()),
        breakpoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_width_breakpoints() {
        let dist = summarize("cc", &[Some(2.0), Some(10.0)], false).unwrap();
        assert_eq!(dist.min, 2.0);
        assert_eq!(dist.max, 10.0);
        assert_eq!(dist.breakpoints, [4.0, 6.0, 8.0]);
        assert!(!dist.is_degenerate());
    }

    #[test]
    fn nulls_and_sentinels_are_ignored() {
        let samples = [Some(5.0), None, Some(MISSING_SENTINEL), Some(1.0), Some(f64::NAN)];
        let dist = summarize("mi", &samples, true).unwrap();
        assert_eq!(dist.entry_count, 2);
        assert_eq!(dist.min, 1.0);
        assert_eq!(dist.max, 5.0);
        assert_eq!(dist.sum, Some(6.0));
    }

    #[test]
    fn sum_only_for_additive_metrics() {
        let samples = [Some(1.0), Some(2.0), Some(3.0)];
        assert_eq!(summarize("loc", &samples, true).unwrap().sum, Some(6.0));
        assert_eq!(summarize("cc", &samples, false).unwrap().sum, None);
    }

    #[test]
    fn equal_values_are_degenerate() {
        let dist = summarize("cc", &[Some(7.0), Some(7.0), None], false).unwrap();
        assert_eq!(dist.breakpoints, DEGENERATE_BREAKPOINTS);
        assert!(dist.is_degenerate());
        assert_eq!(dist.entry_count, 2);
    }

    #[test]
    fn single_sample_is_degenerate() {
        let dist = summarize("cc", &[Some(3.0)], false).unwrap();
        assert!(dist.is_degenerate());
    }

    #[test]
    fn no_measured_samples_is_an_error() {
        let err = summarize("cc", &[None, Some(MISSING_SENTINEL)], false).unwrap_err();
        assert!(matches!(err, CohortError::EmptyDistribution(ref m) if m == "cc"));
        assert!(summarize("cc", &[], false).is_err());
    }

    #[test]
    fn negative_ranges_work() {
        let dist = summarize("delta", &[Some(-8.0), Some(0.0)], false).unwrap();
        assert_eq!(dist.breakpoints, [-6.0, -4.0, -2.0]);
    }

    #[test]
    fn band_count_and_ordering_hold_for_many_ranges() {
        for lo in -20..20 {
            for width in 1..15 {
                let min = lo as f64 * 0.75;
                let max = min + width as f64 * 1.3;
                let dist = summarize("m", &[Some(max), Some(min), Some((min + max) / 2.0)], false)
                    .unwrap();
                assert_eq!(dist.breakpoints.len(), 3);
                assert!(dist.breakpoints[0] < dist.breakpoints[1]);
                assert!(dist.breakpoints[1] < dist.breakpoints[2]);
                assert!(dist.breakpoints[0] > dist.min);
                assert!(dist.breakpoints[2] < dist.max);
            }
        }
    }

    #[test]
    fn extreme_finite_ranges_keep_ordered_breakpoints() {
        let ranges = [
            (-1e308, 1e308),
            (-f64::MAX, f64::MAX),
            (0.0, f64::MAX),
            (f64::MAX / 2.0, f64::MAX),
            (-f64::MAX, -1.0),
        ];
        for (min, max) in ranges {
            let dist = summarize("m", &[Some(min), Some(max)], false).unwrap();
            let bp = dist.breakpoints;
            assert!(bp.iter().all(|b| b.is_finite()), "{min} {max}: {bp:?}");
            assert!(min < bp[0] && bp[0] < bp[1] && bp[1] < bp[2] && bp[2] < max, "{bp:?}");
            assert_eq!(
                crate::classify::classify(Some(max), &bp, false),
                crate::classify::RankLabel::Top25
            );
            assert_eq!(
                crate::classify::classify(Some(min), &bp, false),
                crate::classify::RankLabel::Bottom25
            );
        }
    }

    #[test]
    fn serializes_output_shape() {
        let dist = summarize("loc", &[Some(10.0), Some(30.0)], true).unwrap();
        let json = serde_json::to_value(&dist).unwrap();
        assert_eq!(json["name"], "loc");
        assert_eq!(json["entryCount"], 2);
        assert_eq!(json["sum"], 40.0);
        assert_eq!(json["breakpoints"][1], 20.0);

        let dist = summarize("cc", &[Some(10.0)], false).unwrap();
        let json = serde_json::to_value(&dist).unwrap();
        assert!(json.get("sum").is_none());
    }
}
