//! Configuration for the query server.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::evaluator::DEFAULT_LOOKBACK_DELTA;
use crate::model::{Label, Sample, Series};
use crate::storage::InMemoryStorage;

/// CLI arguments for the query server.
#[derive(Parser, Debug, Default)]
#[command(name = "query-server", about = "Metrics query server")]
pub struct CliArgs {
    /// Path to config file (TOML).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// JSON file of series to load at startup.
    #[arg(long)]
    pub data_file: Option<PathBuf>,

    /// How far back an instant selector looks for a sample, in seconds.
    #[arg(long)]
    pub lookback_delta_secs: Option<u64>,
}

impl CliArgs {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Loads the config file, if any, and applies CLI overrides.
    pub fn load_config(&self) -> anyhow::Result<QueryServerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            None => QueryServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(data_file) = &self.data_file {
            config.data_file = Some(data_file.clone());
        }
        if let Some(secs) = self.lookback_delta_secs {
            config.lookback_delta_secs = secs;
        }
        Ok(config)
    }
}

/// Query server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryServerConfig {
    pub port: u16,
    pub lookback_delta_secs: u64,
    pub data_file: Option<PathBuf>,
}

impl Default for QueryServerConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            lookback_delta_secs: DEFAULT_LOOKBACK_DELTA.as_secs(),
            data_file: None,
        }
    }
}

impl QueryServerConfig {
    pub fn lookback_delta(&self) -> Duration {
        Duration::from_secs(self.lookback_delta_secs)
    }

    /// Builds the in-memory storage, loading the data file if one is set.
    pub fn open_storage(&self) -> anyhow::Result<InMemoryStorage> {
        let storage = InMemoryStorage::new();
        if let Some(path) = &self.data_file {
            let series = load_data_file(path)?;
            tracing::info!(path = %path.display(), series = series.len(), "loading data file");
            storage.write(series)?;
        }
        Ok(storage)
    }
}

/// One series in a data file.
#[derive(Debug, Deserialize)]
struct SeriesRecord {
    labels: HashMap<String, String>,
    /// `[timestamp_ms, value]` pairs.
    #[serde(default)]
    samples: Vec<(i64, f64)>,
}

impl From<SeriesRecord> for Series {
    fn from(record: SeriesRecord) -> Self {
        Series::new(
            record
                .labels
                .into_iter()
                .map(|(name, value)| Label::new(name, value))
                .collect(),
            record
                .samples
                .into_iter()
                .map(|(ts, value)| Sample::new(ts, value))
                .collect(),
        )
    }
}

fn parse_data(contents: &str) -> anyhow::Result<Vec<Series>> {
    let records: Vec<SeriesRecord> = serde_json::from_str(contents)?;
    Ok(records.into_iter().map(Series::from).collect())
}

fn load_data_file(path: &Path) -> anyhow::Result<Vec<Series>> {
    let contents = std::fs::read_to_string(path)?;
    parse_data(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_defaults_without_config_file() {
        // given
        let args = CliArgs::default();

        // when
        let config = args.load_config().unwrap();

        // then
        assert_eq!(config, QueryServerConfig::default());
        assert_eq!(config.port, 9090);
        assert_eq!(config.lookback_delta(), Duration::from_secs(300));
    }

    #[test]
    fn should_apply_cli_overrides() {
        let args = CliArgs {
            port: Some(8080),
            lookback_delta_secs: Some(60),
            data_file: Some(PathBuf::from("series.json")),
            ..Default::default()
        };

        let config = args.load_config().unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.lookback_delta_secs, 60);
        assert_eq!(config.data_file, Some(PathBuf::from("series.json")));
    }

    #[test]
    fn should_fill_missing_toml_fields_with_defaults() {
        let config: QueryServerConfig = toml::from_str("port = 7070").unwrap();

        assert_eq!(config.port, 7070);
        assert_eq!(config.lookback_delta_secs, 300);
        assert_eq!(config.data_file, None);
    }

    #[test]
    fn should_parse_data_file_contents() {
        // given
        let contents = r#"[
            {"labels": {"__name__": "up", "job": "api"}, "samples": [[1000, 1.0], [2000, 0.0]]},
            {"labels": {"__name__": "cpu"}}
        ]"#;

        // when
        let series = parse_data(contents).unwrap();

        // then
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].labels.metric_name(), "up");
        assert_eq!(series[0].labels.get("job"), Some("api"));
        assert_eq!(series[0].samples, vec![Sample::new(1000, 1.0), Sample::new(2000, 0.0)]);
        assert!(series[1].samples.is_empty());
    }

    #[test]
    fn should_reject_malformed_data_file() {
        assert!(parse_data("{\"labels\": {}}").is_err());
    }
}
