//! Whole-cohort ranking: metric feed in, distributions and labels out.
//!
//! Ranking is two-pass. Every subject's samples for a metric must be present
//! before that metric's distribution is computed; only then can any subject
//! be labelled.

use std::collections::BTreeMap;

use cohort_core::{CohortError, MetricTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::{classify, RankLabel};
use crate::distribution::{measured, summarize, CohortDistribution};

/// Nullable metric samples keyed by subject, then metric name.
///
/// Serializes as a plain nested JSON object:
/// `{"alice": {"cc": 2.0, "mi": null}}`.
///
/// # Examples
///
/// ```
/// use cohort_ranking::cohort::MetricFeed;
///
/// let mut feed = MetricFeed::default();
/// feed.insert("alice", "cc", Some(2.0));
/// feed.insert("bob", "cc", None);
/// assert_eq!(feed.samples("cc"), vec![Some(2.0), None]);
/// assert_eq!(feed.value("carol", "cc"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricFeed(BTreeMap<String, BTreeMap<String, Option<f64>>>);

impl MetricFeed {
    /// Record one sample. Each subject/metric pair is written once; a
    /// repeated write keeps the first value.
    pub fn insert(&mut self, subject: &str, metric: &str, value: Option<f64>) {
        self.0
            .entry(subject.to_string())
            .or_default()
            .entry(metric.to_string())
            .or_insert(value);
    }

    /// Register a subject that has no samples yet.
    pub fn add_subject(&mut self, subject: &str) {
        self.0.entry(subject.to_string()).or_default();
    }

    pub fn value(&self, subject: &str, metric: &str) -> Option<f64> {
        self.0.get(subject)?.get(metric).copied().flatten()
    }

    /// One metric's samples across all subjects, in subject order. Subjects
    /// without the metric contribute `None`.
    pub fn samples(&self, metric: &str) -> Vec<Option<f64>> {
        self.0
            .values()
            .map(|metrics| metrics.get(metric).copied().flatten())
            .collect()
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One subject's value and standing for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    /// Measured value, `None` when missing.
    pub value: Option<f64>,
    pub rank: RankLabel,
    pub description: String,
}

/// Distributions for every rankable metric plus per-subject records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortReport {
    /// One entry per metric with at least one measured sample.
    pub distributions: Vec<CohortDistribution>,
    /// Metrics with no measured sample anywhere in the cohort.
    pub unranked_metrics: Vec<String>,
    /// Records per subject, in metric-table order.
    pub subjects: BTreeMap<String, Vec<MetricRecord>>,
}

impl CohortReport {
    pub fn distribution(&self, metric: &str) -> Option<&CohortDistribution> {
        self.distributions.iter().find(|d| d.name == metric)
    }

    pub fn record(&self, subject: &str, metric: &str) -> Option<&MetricRecord> {
        self.subjects.get(subject)?.iter().find(|r| r.name == metric)
    }
}

/// Rank every subject in `feed` on every metric in `table`.
///
/// A metric with no measured samples is listed in
/// [`CohortReport::unranked_metrics`] and every subject gets `"N/A"` for it;
/// the rest of the cohort is still ranked.
///
/// # Examples
///
/// ```
/// use cohort_core::{MetricSpec, MetricTable};
/// use cohort_ranking::classify::RankLabel;
/// use cohort_ranking::cohort::{rank_cohort, MetricFeed};
///
/// let mut table = MetricTable::default();
/// table.insert(
///     "cc",
///     MetricSpec {
///         description: "complexity".into(),
///         reversed: true,
///         additive: false,
///     },
/// );
///
/// let mut feed = MetricFeed::default();
/// feed.insert("alice", "cc", Some(2.0));
/// feed.insert("bob", "cc", Some(10.0));
/// feed.insert("carol", "cc", Some(3.0));
///
/// let report = rank_cohort(&feed, &table);
/// assert_eq!(report.distribution("cc").unwrap().breakpoints, [4.0, 6.0, 8.0]);
/// assert_eq!(report.record("carol", "cc").unwrap().rank, RankLabel::Top25);
/// assert_eq!(report.record("bob", "cc").unwrap().rank, RankLabel::Bottom25);
/// ```
pub fn rank_cohort(feed: &MetricFeed, table: &MetricTable) -> CohortReport {
    let mut report = CohortReport::default();
    for subject in feed.subjects() {
        report.subjects.insert(subject.to_string(), Vec::new());
    }

    for (metric, spec) in table.iter() {
        let distribution = match summarize(metric, &feed.samples(metric), spec.additive) {
            Ok(distribution) => Some(distribution),
            Err(CohortError::EmptyDistribution(_)) => {
                warn!(metric, "no measured samples; every subject ranks N/A");
                report.unranked_metrics.push(metric.to_string());
                None
            }
            Err(e) => {
                warn!(metric, error = %e, "failed to summarize metric");
                report.unranked_metrics.push(metric.to_string());
                None
            }
        };

        for (subject, records) in report.subjects.iter_mut() {
            let value = measured(feed.value(subject, metric));
            let rank = match &distribution {
                Some(d) => classify(value, &d.breakpoints, spec.reversed),
                None => RankLabel::NotAvailable,
            };
            records.push(MetricRecord {
                name: metric.to_string(),
                value,
                rank,
                description: spec.description.clone(),
            });
        }

        if let Some(distribution) = distribution {
            debug!(
                metric,
                entries = distribution.entry_count,
                min = distribution.min,
                max = distribution.max,
                "summarized metric"
            );
            report.distributions.push(distribution);
        }
    }

    report
}
