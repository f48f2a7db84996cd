use anyhow::Result;
use parley::config::ServerConfig;
use parley::context::ContextStore;
use parley::services::ServiceRegistry;
use parley::session::{TurnServer, TurnWorker};
use parley::workflow::{canonical_graph, WorkflowEngine};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_PATH: &str = "parley.json";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Parley turn server");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = ServerConfig::load(&config_path)?;
    config.validate()?;

    let registry = Arc::new(ServiceRegistry::from_config(&config));
    let engine = WorkflowEngine::new(canonical_graph()?, registry);
    let store = ContextStore::new(config.state_path.clone());

    let worker = TurnWorker::new(engine, store);
    let handle = worker.handle();
    let worker_join = worker.start_worker();

    let server = TurnServer::bind(&config.listen_addr(), handle.clone()).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    handle.shutdown()?;
    tokio::task::spawn_blocking(move || {
        let _ = worker_join.join();
    })
    .await?;

    info!("Parley stopped");
    Ok(())
}
