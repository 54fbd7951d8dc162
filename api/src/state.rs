//! Application state

use anyhow::Result;
use dq_monitor_core::adapter::{PostgresStore, SharedStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::ApiResult;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Data-quality warehouse
    store: SharedStore,
    /// Configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create new application state
    pub async fn new(config: &AppConfig) -> Result<Self> {
        info!("Connecting to {}", config.database.describe());
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.database.connect_options()?)
            .await?;

        Ok(Self::with_store(Arc::new(PostgresStore::new(pool)), config))
    }

    /// Create application state around an existing store
    pub fn with_store(store: SharedStore, config: &AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config.clone()),
        }
    }

    /// Shared store handle, after a `SELECT 1` round-trip proves the pool can serve
    ///
    /// The check runs on one pooled connection; each later query checks out
    /// its own, so this fails fast on an unreachable database but does not
    /// pin a connection to the request.
    pub async fn store(&self) -> ApiResult<SharedStore> {
        if let Err(e) = self.store.ping().await {
            error!("Database connection check failed: {}", e);
            return Err(e.into());
        }
        Ok(Arc::clone(&self.store))
    }
}
