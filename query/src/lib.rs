//! Query - A small query façade over a metrics store.
//!
//! Answers three kinds of request against an expression evaluator and a
//! metric name store:
//!
//! - **Instant queries**: parse an expression, evaluate it at the current
//!   time and render the result as JSON or plain text.
//! - **Range queries**: normalize an `end`/`range`/`step` window, evaluate a
//!   vector expression over it and render the sorted matrix as JSON.
//! - **Metric names**: list every known metric name as a sorted JSON array.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use query::{InMemoryStorage, MemoryEvaluator, OutputFormat, QueryService, SystemClock};
//!
//! let storage = Arc::new(InMemoryStorage::new());
//! let service = QueryService::new(
//!     Arc::new(MemoryEvaluator::new(storage.clone())),
//!     storage,
//!     Arc::new(SystemClock),
//! );
//! let response = service.query("sum(up) by (job)", OutputFormat::Json).await;
//! ```

mod clock;
mod error;
mod evaluator;
mod expr;
mod model;
mod render;
pub mod server;
mod service;
mod storage;
mod window;

#[cfg(feature = "testing")]
pub mod testing;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{QueryError, Result};
pub use evaluator::{DEFAULT_LOOKBACK_DELTA, Evaluator, MemoryEvaluator};
pub use expr::{ExprType, Expression, VectorExpr};
pub use model::{
    InstantSample, Label, Labels, METRIC_NAME, Matrix, QueryValue, RangeSample, Sample, Series,
};
pub use render::{ContentType, OutputFormat};
pub use service::{QueryService, RenderedResponse};
pub use storage::{InMemoryStorage, MetricNameStore, SeriesReader};
pub use window::{RangeParams, TimeWindow};
