use std::sync::Arc;

use canopy_store::RecordStore;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Canopy HTTP server.
pub struct CanopyServer {
    config: ServerConfig,
    state: AppState,
}

impl CanopyServer {
    /// Open the configured store and prepare the server.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = config.open_store()?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: ServerConfig, store: Arc<dyn RecordStore>) -> ServerResult<Self> {
        let state = AppState::new(store, config.forest.clone())?;
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            durable = self.config.data_dir.is_some(),
            "canopy server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = CanopyServer::new(ServerConfig::default()).unwrap();
        assert_eq!(server.config().bind_addr, "127.0.0.1:8470".parse().unwrap());
    }

    #[test]
    fn invalid_forest_bounds_fail_construction() {
        let mut config = ServerConfig::default();
        config.forest.max_depth = 0;
        assert!(matches!(
            CanopyServer::new(config),
            Err(ServerError::Forest(canopy_forest::ForestError::Config(_)))
        ));
    }

    #[test]
    fn router_builds() {
        let server = CanopyServer::new(ServerConfig::default()).unwrap();
        let _router = server.router();
    }
}
