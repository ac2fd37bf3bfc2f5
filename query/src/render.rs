//! Rendering of query results and errors.
//!
//! JSON output is wrapped in a typed envelope, `{"type": <tag>, "value": ...}`;
//! errors use the tag `"error"` and also carry an `errorType`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::model::{InstantSample, Matrix, QueryValue, RangeSample};

/// Output format of an instant query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

impl OutputFormat {
    pub fn content_type(&self) -> ContentType {
        match self {
            OutputFormat::Json => ContentType::Json,
            OutputFormat::Text => ContentType::PlainText,
        }
    }
}

/// Content type of a rendered response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    PlainText,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::PlainText => "text/plain",
        }
    }
}

/// Error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "type")]
    pub kind: String, // always "error"
    #[serde(rename = "errorType")]
    pub error_type: String,
    pub value: String,
}

/// Typed value envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedEnvelope<T> {
    #[serde(rename = "type")]
    pub kind: String, // "scalar", "vector", "matrix" or "string"
    pub value: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSeries {
    pub metric: BTreeMap<String, String>,
    pub value: (f64, String), // (timestamp, value)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixSeries {
    pub metric: BTreeMap<String, String>,
    pub values: Vec<(f64, String)>, // (timestamp, value)
}

fn secs(timestamp_ms: i64) -> f64 {
    timestamp_ms as f64 / 1000.0
}

impl From<&InstantSample> for VectorSeries {
    fn from(sample: &InstantSample) -> Self {
        Self {
            metric: sample.labels.clone().into(),
            value: (secs(sample.timestamp_ms), sample.value.to_string()),
        }
    }
}

impl From<&RangeSample> for MatrixSeries {
    fn from(series: &RangeSample) -> Self {
        Self {
            metric: series.labels.clone().into(),
            values: series
                .samples
                .iter()
                .map(|(ts, v)| (secs(*ts), v.to_string()))
                .collect(),
        }
    }
}

/// Renders an error as a JSON error envelope.
///
/// Never fails: if serialization itself fails a fixed envelope is returned.
pub fn error_to_json(err: &QueryError) -> String {
    let envelope = ErrorEnvelope {
        kind: "error".to_string(),
        error_type: err.error_type().to_string(),
        value: err.message().to_string(),
    };
    serde_json::to_string(&envelope).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize error envelope");
        r#"{"type":"error","errorType":"internal","value":"error serialization failed"}"#
            .to_string()
    })
}

/// Renders a value as a JSON envelope tagged with `type_tag`.
pub fn typed_value_to_json<T: Serialize>(value: &T, type_tag: &str) -> Result<String> {
    let envelope = TypedEnvelope {
        kind: type_tag.to_string(),
        value,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Renders a matrix as a JSON envelope tagged `"matrix"`.
pub fn matrix_to_json(matrix: &Matrix) -> Result<String> {
    let series: Vec<MatrixSeries> = matrix.iter().map(MatrixSeries::from).collect();
    typed_value_to_json(&series, "matrix")
}

/// Renders an instant query result in the requested format.
pub fn value_to_string(value: &QueryValue, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => value_to_json(value),
        OutputFormat::Text => Ok(value_to_text(value)),
    }
}

fn value_to_json(value: &QueryValue) -> Result<String> {
    let tag = value.type_tag();
    match value {
        QueryValue::Scalar {
            timestamp_ms,
            value,
        } => typed_value_to_json(&(secs(*timestamp_ms), value.to_string()), tag),
        QueryValue::Vector(samples) => {
            let series: Vec<VectorSeries> = samples.iter().map(VectorSeries::from).collect();
            typed_value_to_json(&series, tag)
        }
        QueryValue::Matrix(matrix) => matrix_to_json(matrix),
        QueryValue::String {
            timestamp_ms,
            value,
        } => typed_value_to_json(&(secs(*timestamp_ms), value), tag),
    }
}

fn value_to_text(value: &QueryValue) -> String {
    match value {
        QueryValue::Scalar {
            timestamp_ms,
            value,
        } => format!("scalar: {} @[{}]", value, secs(*timestamp_ms)),
        QueryValue::String {
            timestamp_ms,
            value,
        } => format!("string: {} @[{}]", value, secs(*timestamp_ms)),
        QueryValue::Vector(samples) => samples
            .iter()
            .map(|s| format!("{} => {} @[{}]", s.labels, s.value, secs(s.timestamp_ms)))
            .collect::<Vec<_>>()
            .join("\n"),
        QueryValue::Matrix(matrix) => {
            let mut lines = Vec::new();
            for series in matrix.iter() {
                lines.push(format!("{} =>", series.labels));
                for (ts, v) in &series.samples {
                    lines.push(format!("{} @[{}]", v, secs(*ts)));
                }
            }
            lines.join("\n")
        }
    }
}
