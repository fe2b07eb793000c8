use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use vrl_index::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};
use vrl_ledger::{FileLedger, FileLedgerConfig, InMemoryLedger, Ledger};
use vrl_store::RecordStore;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// VRL HTTP server.
pub struct VrlServer {
    state: AppState,
}

impl VrlServer {
    /// Open the configured ledger and index snapshot and build the store.
    pub async fn open(config: ServerConfig) -> ServerResult<Self> {
        let store = open_store(&config).await?;
        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Serve an existing store.
    pub fn with_store(store: Arc<RecordStore>, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(store, config),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.state.store
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Serve until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        let addr = self.state.config.bind_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(
            %addr,
            identity = %self.state.store.identity(),
            default_key_field = %self.state.config.default_key_field,
            "VRL server listening"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

/// Build a [`RecordStore`] from the ledger and snapshot paths in `config`.
/// Without paths, both live in memory.
pub async fn open_store(config: &ServerConfig) -> ServerResult<RecordStore> {
    let ledger: Arc<dyn Ledger> = match &config.ledger_path {
        Some(path) => Arc::new(
            FileLedger::open(path, FileLedgerConfig::default())
                .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?,
        ),
        None => Arc::new(InMemoryLedger::new()),
    };
    let snapshots: Arc<dyn SnapshotStore> = match &config.snapshot_path {
        Some(path) => Arc::new(FileSnapshotStore::new(path)),
        None => Arc::new(InMemorySnapshotStore::new()),
    };
    Ok(RecordStore::open(ledger, config.store.clone(), snapshots).await?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_in_memory_by_default() {
        let server = VrlServer::open(ServerConfig::default()).await.unwrap();
        assert_eq!(server.config().default_key_field, "vin");
        assert!(server.store().head().await.unwrap().is_genesis());
        let _router = server.router();
    }

    #[tokio::test]
    async fn opens_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            ledger_path: Some(dir.path().join("ledger.vrl")),
            snapshot_path: Some(dir.path().join("index.json")),
            ..ServerConfig::default()
        };
        let server = VrlServer::open(config).await.unwrap();
        let record = vrl_store::Record::new().with("vin", "V1");
        server.store().append(&record).await.unwrap();
        assert!(dir.path().join("ledger.vrl").exists());
    }
}
