//! Query server binary.

use std::sync::Arc;

use query::server::{CliArgs, QueryServer};
use query::{MemoryEvaluator, QueryService, SystemClock};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse_args();
    let config = args.load_config()?;
    tracing::info!(?config, "starting query server");

    let storage = Arc::new(config.open_storage()?);
    let evaluator =
        MemoryEvaluator::new(storage.clone()).with_lookback_delta(config.lookback_delta());
    let service = QueryService::new(Arc::new(evaluator), storage, Arc::new(SystemClock));

    QueryServer::new(service, config).run().await
}
