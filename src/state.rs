use crate::config::AppConfig;
use crate::session::SessionStore;
use crate::valuation::api::PortfolioApiClient;
use crate::valuation::source::{BaseValueSource, ValueFetcher};
use crate::valuation::synchronizer::Synchronizer;
use crate::valuation::types::SyncConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct SessionBindingHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: JoinHandle<()>,
}

pub struct AppState {
    pub started_at: Instant,
    pub db_pool: SqlitePool,
    pub config: AppConfig,
    pub sessions: Arc<SessionStore>,
    pub synchronizer: Arc<Synchronizer>,
    pub base_source: Arc<dyn BaseValueSource>,
    pub session_binding: Mutex<Option<SessionBindingHandle>>,
}

impl AppState {
    /// Wires the synchronizer to the portfolio backend named in `config`.
    pub fn new(db_pool: SqlitePool, config: AppConfig) -> Self {
        let api_client = Arc::new(PortfolioApiClient::new(config.api_base_url.clone()));
        Self::with_sources(db_pool, config, api_client.clone(), api_client)
    }

    pub fn with_sources(
        db_pool: SqlitePool,
        config: AppConfig,
        fetcher: Arc<dyn ValueFetcher>,
        base_source: Arc<dyn BaseValueSource>,
    ) -> Self {
        let sync_config = SyncConfig {
            fetch_timeout_ms: config.fetch_timeout_ms,
            ..SyncConfig::default()
        };

        Self {
            started_at: Instant::now(),
            db_pool,
            config,
            sessions: Arc::new(SessionStore::new()),
            synchronizer: Arc::new(Synchronizer::new(fetcher, sync_config)),
            base_source,
            session_binding: Mutex::new(None),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.config.fetch_timeout_ms)
    }
}
