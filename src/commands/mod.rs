pub mod app_info;
pub mod health;
pub mod preferences;
pub mod session;
pub mod valuation;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::AppConfig;
    use crate::db::run_migrations;
    use crate::error::AppError;
    use crate::session::SessionId;
    use crate::state::AppState;
    use crate::valuation::source::{BaseValueSource, ValueFetcher};
    use futures_util::future::{self, BoxFuture, FutureExt};
    use sqlx::SqlitePool;
    use std::sync::Arc;
    use std::time::Duration;

    pub struct FixedValues {
        pub base: f64,
        pub realtime: f64,
    }

    impl ValueFetcher for FixedValues {
        fn fetch_realtime_value(
            &self,
            _session_id: &SessionId,
        ) -> BoxFuture<'static, Result<f64, AppError>> {
            future::ready(Ok(self.realtime)).boxed()
        }
    }

    impl BaseValueSource for FixedValues {
        fn fetch_base_value(
            &self,
            _session_id: &SessionId,
        ) -> BoxFuture<'static, Result<f64, AppError>> {
            future::ready(Ok(self.base)).boxed()
        }
    }

    pub async fn test_state(base: f64, realtime: f64) -> AppState {
        let values = Arc::new(FixedValues { base, realtime });
        test_state_with(values.clone(), values).await
    }

    pub async fn test_state_with(
        fetcher: Arc<dyn ValueFetcher>,
        base_source: Arc<dyn BaseValueSource>,
    ) -> AppState {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should initialize");
        run_migrations(&pool)
            .await
            .expect("migrations should apply to a fresh database");
        let config = AppConfig::from_lookup(|_| None).expect("default config is valid");

        AppState::with_sources(pool, config, fetcher, base_source)
    }

    pub async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
