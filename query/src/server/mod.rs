//! HTTP server for the query service.
//!
//! Exposes instant queries, range queries and metric name listing as HTTP
//! endpoints, plus health checks and the server's own Prometheus metrics.

mod config;
mod handlers;
mod metrics;
mod middleware;
mod request;
mod response;
mod server;

pub use config::{CliArgs, QueryServerConfig};
pub use metrics::Metrics;
pub use server::{QueryServer, build_router};
