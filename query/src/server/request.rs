//! HTTP request types for the query server.

use serde::Deserialize;

use crate::render::OutputFormat;
use crate::window::RangeParams;

/// Parameters for /api/query
#[derive(Debug, Deserialize)]
pub struct QueryParams {
    /// A missing expression is treated as empty and fails to parse.
    #[serde(default)]
    pub expr: String,
    /// Any non-empty value selects JSON output.
    pub json: Option<String>,
}

impl QueryParams {
    pub fn format(&self) -> OutputFormat {
        match self.json.as_deref() {
            Some(flag) if !flag.is_empty() => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Parameters for /api/query_range
///
/// `end`, `range` and `step` are in seconds. Missing values default to
/// zero, which normalization turns into "now", an empty range and a
/// one-second step respectively.
#[derive(Debug, Deserialize)]
pub struct QueryRangeParams {
    #[serde(default)]
    pub expr: String,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub range: i64,
    #[serde(default)]
    pub step: i64,
}

impl QueryRangeParams {
    pub fn range_params(&self) -> RangeParams {
        RangeParams::new(self.end, self.range, self.step)
    }
}
