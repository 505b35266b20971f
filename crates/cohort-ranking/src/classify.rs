//! Quality band classification against cohort breakpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::distribution::{measured, DEGENERATE_BREAKPOINTS};

/// Relative standing of one subject within the cohort for one metric.
///
/// The labels name standing, not literal percentiles: `"top 75%"` ranks
/// below `"top 50%"`, which ranks below `"top 25%"`.
///
/// # Examples
///
/// ```
/// use cohort_ranking::classify::RankLabel;
///
/// assert_eq!(RankLabel::Top25.to_string(), "top 25%");
/// assert_eq!(serde_json::to_string(&RankLabel::NotAvailable).unwrap(), "\"N/A\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankLabel {
    #[serde(rename = "N/A")]
    NotAvailable,
    #[serde(rename = "bottom 25%")]
    Bottom25,
    #[serde(rename = "top 75%")]
    Top75,
    #[serde(rename = "top 50%")]
    Top50,
    #[serde(rename = "top 25%")]
    Top25,
}

impl RankLabel {
    pub const ALL: [RankLabel; 5] = [
        RankLabel::NotAvailable,
        RankLabel::Bottom25,
        RankLabel::Top75,
        RankLabel::Top50,
        RankLabel::Top25,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RankLabel::NotAvailable => "N/A",
            RankLabel::Bottom25 => "bottom 25%",
            RankLabel::Top75 => "top 75%",
            RankLabel::Top50 => "top 50%",
            RankLabel::Top25 => "top 25%",
        }
    }

    /// Label for band `0..=3` (lowest values in band 0).
    ///
    /// Higher-is-better metrics put band 0 at the bottom; reversed metrics
    /// put it at the top. Bands above 3 are treated as 3.
    ///
    /// # Examples
    ///
    /// ```
    /// use cohort_ranking::classify::RankLabel;
    ///
    /// assert_eq!(RankLabel::from_band(0, false), RankLabel::Bottom25);
    /// assert_eq!(RankLabel::from_band(0, true), RankLabel::Top25);
    /// ```
    pub fn from_band(band: usize, reversed: bool) -> Self {
        match (band.min(3), reversed) {
            (0, false) | (3, true) => RankLabel::Bottom25,
            (1, false) | (2, true) => RankLabel::Top75,
            (2, false) | (1, true) => RankLabel::Top50,
            _ => RankLabel::Top25,
        }
    }
}

impl fmt::Display for RankLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of the first breakpoint `value` is strictly below, or 3.
///
/// # Examples
///
/// ```
/// use cohort_ranking::classify::band;
///
/// let bp = [4.0, 6.0, 8.0];
/// assert_eq!(band(3.0, &bp), 0);
/// assert_eq!(band(4.0, &bp), 1);
/// assert_eq!(band(9.0, &bp), 3);
/// ```
pub fn band(value: f64, breakpoints: &[f64; 3]) -> usize {
    breakpoints
        .iter()
        .position(|bp| value < *bp)
        .unwrap_or(breakpoints.len())
}

/// Classify one subject's value for one metric.
///
/// Missing values (null, `-999`, NaN) are `"N/A"`. A degenerate
/// distribution (all breakpoints zero) gives every measured subject
/// `"top 25%"`.
///
/// # Examples
///
/// ```
/// use cohort_ranking::classify::{classify, RankLabel};
///
/// let bp = [4.0, 6.0, 8.0];
/// assert_eq!(classify(Some(3.0), &bp, true), RankLabel::Top25);
/// assert_eq!(classify(Some(9.0), &bp, true), RankLabel::Bottom25);
/// assert_eq!(classify(Some(-999.0), &bp, true), RankLabel::NotAvailable);
/// ```
pub fn classify(value: Option<f64>, breakpoints: &[f64; 3], reversed: bool) -> RankLabel {
    let Some(value) = measured(value) else {
        return RankLabel::NotAvailable;
    };
    if *breakpoints == DEGENERATE_BREAKPOINTS {
        return RankLabel::Top25;
    }
    RankLabel::from_band(band(value, breakpoints), reversed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::MISSING_SENTINEL;

    const BP: [f64; 3] = [4.0, 6.0, 8.0];

    #[test]
    fn higher_is_better_table() {
        assert_eq!(classify(Some(1.0), &BP, false), RankLabel::Bottom25);
        assert_eq!(classify(Some(5.0), &BP, false), RankLabel::Top75);
        assert_eq!(classify(Some(7.0), &BP, false), RankLabel::Top50);
        assert_eq!(classify(Some(9.0), &BP, false), RankLabel::Top25);
    }

    #[test]
    fn lower_is_better_table() {
        assert_eq!(classify(Some(1.0), &BP, true), RankLabel::Top25);
        assert_eq!(classify(Some(5.0), &BP, true), RankLabel::Top50);
        assert_eq!(classify(Some(7.0), &BP, true), RankLabel::Top75);
        assert_eq!(classify(Some(9.0), &BP, true), RankLabel::Bottom25);
    }

    #[test]
    fn values_on_a_breakpoint_fall_into_the_upper_band() {
        assert_eq!(band(4.0, &BP), 1);
        assert_eq!(band(6.0, &BP), 2);
        assert_eq!(band(8.0, &BP), 3);
    }

    #[test]
    fn missing_values_are_not_available() {
        for reversed in [false, true] {
            assert_eq!(classify(None, &BP, reversed), RankLabel::NotAvailable);
            assert_eq!(
                classify(Some(MISSING_SENTINEL), &BP, reversed),
                RankLabel::NotAvailable
            );
            assert_eq!(
                classify(Some(MISSING_SENTINEL), &DEGENERATE_BREAKPOINTS, reversed),
                RankLabel::NotAvailable
            );
            assert_eq!(classify(Some(f64::NAN), &BP, reversed), RankLabel::NotAvailable);
        }
    }

    #[test]
    fn degenerate_distribution_ranks_everyone_top() {
        for value in [-5.0, 0.0, 3.0, 1e9] {
            assert_eq!(classify(Some(value), &DEGENERATE_BREAKPOINTS, false), RankLabel::Top25);
            assert_eq!(classify(Some(value), &DEGENERATE_BREAKPOINTS, true), RankLabel::Top25);
        }
    }

    #[test]
    fn classification_is_total() {
        let breakpoints = [BP, [-3.0, -1.0, 1.0], DEGENERATE_BREAKPOINTS];
        for bp in &breakpoints {
            for step in -400..400 {
                let value = step as f64 * 0.05;
                for reversed in [false, true] {
                    let label = classify(Some(value), bp, reversed);
                    assert!(RankLabel::ALL.contains(&label));
                    assert_ne!(label, RankLabel::NotAvailable);
                }
            }
        }
    }

    #[test]
    fn reversal_mirrors_bands() {
        let mirror = |label: RankLabel| match label {
            RankLabel::Bottom25 => RankLabel::Top25,
            RankLabel::Top25 => RankLabel::Bottom25,
            RankLabel::Top75 => RankLabel::Top50,
            RankLabel::Top50 => RankLabel::Top75,
            RankLabel::NotAvailable => RankLabel::NotAvailable,
        };
        for step in -100..200 {
            let value = step as f64 * 0.1;
            let forward = classify(Some(value), &BP, false);
            let reversed = classify(Some(value), &BP, true);
            assert_eq!(reversed, mirror(forward), "value {value}");
        }
    }

    #[test]
    fn labels_round_trip_through_serde() {
        for label in RankLabel::ALL {
            let json = serde_json::to_string(&label).unwrap();
            assert_eq!(json, format!("\"{}\"", label.as_str()));
        }
    }
}
