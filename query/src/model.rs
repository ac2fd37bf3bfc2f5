//! Core data types for query results.
//!
//! Series identity is a [`Labels`] set. Labels are kept sorted by name so
//! that the derived ordering is a total order over series identity, which
//! is what [`Matrix::sort`] relies on.

use std::collections::BTreeMap;

/// The label holding the metric name.
pub const METRIC_NAME: &str = "__name__";

/// A label is a key-value pair that identifies a time series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    /// The label name (key).
    pub name: String,
    /// The label value.
    pub value: String,
}

impl Label {
    /// Creates a new label with the given name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a metric name label (`__name__`).
    pub fn metric_name(name: impl Into<String>) -> Self {
        Self::new(METRIC_NAME, name)
    }
}

/// A sorted set of labels identifying one series.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Labels(Vec<Label>);

impl Labels {
    /// Creates a label set, sorting by name and keeping the last value
    /// given for a duplicated name.
    pub fn new(mut labels: Vec<Label>) -> Self {
        labels.reverse();
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        labels.dedup_by(|a, b| a.name == b.name);
        Self(labels)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }

    /// Returns the metric name, or an empty string when absent.
    pub fn metric_name(&self) -> &str {
        self.get(METRIC_NAME).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy without the metric name label.
    pub fn without_metric_name(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|l| l.name != METRIC_NAME)
                .cloned()
                .collect(),
        )
    }

    /// Keeps only the labels for which `keep` returns true.
    pub fn retain(mut self, keep: impl Fn(&str) -> bool) -> Self {
        self.0.retain(|l| keep(&l.name));
        self
    }
}

impl From<Labels> for BTreeMap<String, String> {
    fn from(labels: Labels) -> Self {
        labels.0.into_iter().map(|l| (l.name, l.value)).collect()
    }
}

impl From<BTreeMap<String, String>> for Labels {
    fn from(map: BTreeMap<String, String>) -> Self {
        Labels::new(map.into_iter().map(|(k, v)| Label::new(k, v)).collect())
    }
}

impl std::fmt::Display for Labels {
    /// Formats as `name{k="v", ...}`, omitting braces when there are no
    /// labels besides the name.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.metric_name())?;
        let rest: Vec<String> = self
            .0
            .iter()
            .filter(|l| l.name != METRIC_NAME)
            .map(|l| format!("{}=\"{}\"", l.name, l.value))
            .collect();
        if !rest.is_empty() || self.get(METRIC_NAME).is_none() {
            write!(f, "{{{}}}", rest.join(", "))?;
        }
        Ok(())
    }
}

/// A single data point in a time series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Timestamp in milliseconds since Unix epoch.
    pub timestamp_ms: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// A stored time series with its identifying labels and data points.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: Labels,
    pub samples: Vec<Sample>,
}

impl Series {
    pub fn new(labels: Vec<Label>, samples: Vec<Sample>) -> Self {
        Self {
            labels: Labels::new(labels),
            samples,
        }
    }
}

/// One sample of an instant vector.
#[derive(Debug, Clone, PartialEq)]
pub struct InstantSample {
    pub labels: Labels,
    pub timestamp_ms: i64,
    pub value: f64,
}

/// All samples of one series within a range, as `(timestamp_ms, value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSample {
    pub labels: Labels,
    pub samples: Vec<(i64, f64)>,
}

/// Result of a range evaluation: one sample sequence per series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix(pub Vec<RangeSample>);

impl Matrix {
    /// Sorts the series by label set.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| a.labels.cmp(&b.labels));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RangeSample> {
        self.0.iter()
    }
}

impl From<Vec<RangeSample>> for Matrix {
    fn from(series: Vec<RangeSample>) -> Self {
        Self(series)
    }
}

/// The typed result of an instant evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Scalar { timestamp_ms: i64, value: f64 },
    Vector(Vec<InstantSample>),
    Matrix(Matrix),
    String { timestamp_ms: i64, value: String },
}

impl QueryValue {
    /// Type tag used when rendering the value.
    pub fn type_tag(&self) -> &'static str {
        match self {
            QueryValue::Scalar { .. } => "scalar",
            QueryValue::Vector(_) => "vector",
            QueryValue::Matrix(_) => "matrix",
            QueryValue::String { .. } => "string",
        }
    }
}
