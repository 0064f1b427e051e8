//! Ax tool server - benchmark and study tools over stdio JSON-RPC
//!
//! stdout carries protocol messages only; logs go to stderr.

use ax_bridge::benchmarks::BenchmarkRegistry;
use ax_bridge::optimizer::StudyStore;
use ax_bridge::server::ToolServer;
use ax_bridge::tools::ToolRegistry;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ax_bridge::init_logging("ax_bridge=info");

    let store = StudyStore::from_env()?;
    tracing::info!(dir = %store.dir().display(), "Study store ready");

    let registry = ToolRegistry::standard(Arc::new(BenchmarkRegistry::standard()), Arc::new(store));
    let server = ToolServer::new(registry);

    let serve = server.serve(tokio::io::stdin(), tokio::io::stdout());
    tokio::select! {
        result = serve => result?,
        _ = terminated() => tracing::info!("Termination requested"),
    }
    Ok(())
}

#[cfg(unix)]
async fn terminated() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminated() {
    let _ = tokio::signal::ctrl_c().await;
}
