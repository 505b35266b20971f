use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Static properties of one named metric.
///
/// # Examples
///
/// ```
/// use cohort_core::MetricSpec;
///
/// let cc = MetricSpec {
///     description: "Average cyclomatic complexity".into(),
///     reversed: true,
///     additive: false,
/// };
/// assert!(cc.reversed);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Human-readable description carried into output records.
    #[serde(default)]
    pub description: String,
    /// `true` when a smaller raw value indicates better quality.
    #[serde(default)]
    pub reversed: bool,
    /// `true` when summing the metric across the cohort is meaningful.
    #[serde(default)]
    pub additive: bool,
}

/// The set of metrics ranked in a cohort run, keyed by metric name.
///
/// # Examples
///
/// ```
/// use cohort_core::MetricTable;
///
/// let table = MetricTable::builtin();
/// assert!(table.get("cc").unwrap().reversed);
/// assert!(table.get("loc").unwrap().additive);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricTable(BTreeMap<String, MetricSpec>);

impl MetricTable {
    /// Table used when no `[metrics]` section is configured.
    pub fn builtin() -> Self {
        let mut table = Self::default();
        table.insert(
            "cc",
            MetricSpec {
                description: "Average cyclomatic complexity per block".into(),
                reversed: true,
                additive: false,
            },
        );
        table.insert(
            "mi",
            MetricSpec {
                description: "Maintainability index".into(),
                reversed: false,
                additive: false,
            },
        );
        table.insert(
            "loc",
            MetricSpec {
                description: "Lines of code".into(),
                reversed: false,
                additive: true,
            },
        );
        table.insert(
            "halstead_volume",
            MetricSpec {
                description: "Halstead volume".into(),
                reversed: true,
                additive: false,
            },
        );
        table
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: MetricSpec) {
        self.0.insert(name.into(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&MetricSpec> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Metrics in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricSpec)> {
        self.0.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use cohort_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_display() {
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
    }

    #[test]
    fn builtin_table_flags() {
        let table = MetricTable::builtin();
        assert_eq!(table.len(), 4);
        assert!(!table.get("mi").unwrap().reversed);
        assert!(table.get("halstead_volume").unwrap().reversed);
        let names: Vec<&str> = table.names().collect();
        assert_eq!(names, vec!["cc", "halstead_volume", "loc", "mi"]);
    }

    #[test]
    fn metric_spec_fields_default_to_false() {
        let spec: MetricSpec = toml::from_str("description = \"x\"").unwrap();
        assert!(!spec.reversed);
        assert!(!spec.additive);
    }
}
