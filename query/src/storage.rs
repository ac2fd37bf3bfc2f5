//! Metric storage seams and the in-memory implementation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use async_trait::async_trait;
use promql_parser::label::Matcher;
use promql_parser::parser::VectorSelector;

use crate::error::{QueryError, Result};
use crate::model::{Labels, METRIC_NAME, RangeSample, Sample, Series};

/// Source of known metric names.
#[async_trait]
pub trait MetricNameStore: Send + Sync {
    /// Returns every known metric name, in no particular order.
    async fn metric_names(&self) -> Result<Vec<String>>;
}

/// Read access to stored samples.
#[async_trait]
pub trait SeriesReader: Send + Sync {
    /// Returns the samples of every series matching `selector` whose
    /// timestamps fall in `(start_ms, end_ms]`. Series with no samples in
    /// the range are omitted.
    async fn select(
        &self,
        selector: &VectorSelector,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<RangeSample>>;
}

/// Returns true if `labels` satisfies the selector's name and matchers.
pub(crate) fn selector_matches(selector: &VectorSelector, labels: &Labels) -> bool {
    if let Some(name) = &selector.name {
        if labels.metric_name() != name {
            return false;
        }
    }
    let all_match =
        |matchers: &[Matcher]| matchers.iter().all(|m| m.is_match(labels.get(&m.name).unwrap_or("")));
    if selector.matchers.or_matchers.is_empty() {
        all_match(&selector.matchers.matchers)
    } else {
        selector
            .matchers
            .or_matchers
            .iter()
            .any(|group| all_match(group))
    }
}

/// In-memory series storage keyed by label set.
///
/// Samples of each series are kept sorted by timestamp; writing a sample
/// at an existing timestamp overwrites it.
#[derive(Default)]
pub struct InMemoryStorage {
    series: RwLock<BTreeMap<Labels, BTreeMap<i64, f64>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a batch of series.
    pub fn write(&self, batch: Vec<Series>) -> Result<()> {
        let mut data = self
            .series
            .write()
            .map_err(|e| QueryError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        let mut written = 0usize;
        for series in batch {
            let entry = data.entry(series.labels).or_default();
            for Sample {
                timestamp_ms,
                value,
            } in series.samples
            {
                entry.insert(timestamp_ms, value);
                written += 1;
            }
        }
        tracing::debug!(samples = written, "wrote samples to in-memory storage");
        Ok(())
    }

    pub fn series_count(&self) -> Result<usize> {
        let data = self
            .series
            .read()
            .map_err(|e| QueryError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.len())
    }
}

#[async_trait]
impl MetricNameStore for InMemoryStorage {
    async fn metric_names(&self) -> Result<Vec<String>> {
        let data = self
            .series
            .read()
            .map_err(|e| QueryError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        let names: BTreeSet<&str> = data
            .keys()
            .filter_map(|labels| labels.get(METRIC_NAME))
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }
}

#[async_trait]
impl SeriesReader for InMemoryStorage {
    async fn select(
        &self,
        selector: &VectorSelector,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<RangeSample>> {
        if start_ms >= end_ms {
            return Ok(vec![]);
        }
        let data = self
            .series
            .read()
            .map_err(|e| QueryError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        let mut result = Vec::new();
        for (labels, samples) in data.iter() {
            if !selector_matches(selector, labels) {
                continue;
            }
            let in_range: Vec<(i64, f64)> = samples
                .range(start_ms.saturating_add(1)..=end_ms)
                .map(|(ts, v)| (*ts, *v))
                .collect();
            if !in_range.is_empty() {
                result.push(RangeSample {
                    labels: labels.clone(),
                    samples: in_range,
                });
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Label;
    use promql_parser::parser::Expr;

    fn selector(query: &str) -> VectorSelector {
        match promql_parser::parser::parse(query).unwrap() {
            Expr::VectorSelector(vs) => vs,
            other => panic!("expected vector selector, got {:?}", other),
        }
    }

    fn create_storage() -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        storage
            .write(vec![
                Series::new(
                    vec![Label::metric_name("up"), Label::new("job", "api")],
                    vec![Sample::new(1000, 1.0), Sample::new(2000, 0.0)],
                ),
                Series::new(
                    vec![Label::metric_name("up"), Label::new("job", "db")],
                    vec![Sample::new(1500, 1.0)],
                ),
                Series::new(
                    vec![Label::metric_name("cpu_seconds"), Label::new("job", "api")],
                    vec![Sample::new(1000, 12.5)],
                ),
            ])
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn should_list_distinct_metric_names() {
        // given
        let storage = create_storage();

        // when
        let names = storage.metric_names().await.unwrap();

        // then
        assert_eq!(names, vec!["cpu_seconds", "up"]);
    }

    #[tokio::test]
    async fn should_select_by_name_and_matchers() {
        let storage = create_storage();

        let result = storage
            .select(&selector("up{job=\"api\"}"), 0, 5000)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].labels.get("job"), Some("api"));
        assert_eq!(result[0].samples, vec![(1000, 1.0), (2000, 0.0)]);
    }

    #[tokio::test]
    async fn should_select_with_regex_matcher() {
        let storage = create_storage();

        let result = storage
            .select(&selector("{job=~\"a.*\"}"), 0, 5000)
            .await
            .unwrap();

        let names: Vec<&str> = result.iter().map(|r| r.labels.metric_name()).collect();
        assert_eq!(names, vec!["cpu_seconds", "up"]);
    }

    #[tokio::test]
    async fn should_exclude_start_and_include_end() {
        let storage = create_storage();

        let result = storage.select(&selector("up"), 1000, 1500).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].labels.get("job"), Some("db"));
        assert_eq!(result[0].samples, vec![(1500, 1.0)]);
    }

    #[tokio::test]
    async fn should_report_poisoned_lock_as_storage_error() {
        // given: a writer panicked while holding the lock
        let storage = std::sync::Arc::new(create_storage());
        let poisoner = storage.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.series.write().unwrap();
            panic!("writer failed");
        })
        .join();

        // when/then
        assert!(matches!(storage.series_count(), Err(QueryError::Storage(_))));
        assert!(matches!(
            storage.metric_names().await,
            Err(QueryError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn should_overwrite_duplicate_timestamps() {
        let storage = InMemoryStorage::new();
        let labels = vec![Label::metric_name("up")];
        storage
            .write(vec![Series::new(labels.clone(), vec![Sample::new(1000, 1.0)])])
            .unwrap();
        storage
            .write(vec![Series::new(labels, vec![Sample::new(1000, 7.0)])])
            .unwrap();

        let result = storage.select(&selector("up"), 0, 1000).await.unwrap();

        assert_eq!(storage.series_count().unwrap(), 1);
        assert_eq!(result[0].samples, vec![(1000, 7.0)]);
    }
}
