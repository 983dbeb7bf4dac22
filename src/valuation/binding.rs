use crate::session::{SessionId, SessionProvider};
use crate::valuation::source::BaseValueSource;
use crate::valuation::synchronizer::Synchronizer;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Drives the synchronizer from session transitions until cancelled.
///
/// A present session loads its base value and starts polling, an absent one
/// stops it. The synchronizer is stopped on every exit path.
pub async fn run_session_binding(
    synchronizer: Arc<Synchronizer>,
    sessions: Arc<dyn SessionProvider>,
    base_source: Arc<dyn BaseValueSource>,
    base_timeout: Duration,
    cancel_token: CancellationToken,
) {
    let mut receiver = sessions.subscribe();

    loop {
        let current = receiver.borrow_and_update().clone();
        match current {
            Some(session_id) if synchronizer.session_id().as_ref() != Some(&session_id) => {
                let base_value = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    base_value = load_base_value(base_source.as_ref(), &session_id, base_timeout) => base_value,
                };

                // The session may have moved on while the base value loaded.
                if receiver.has_changed().unwrap_or(false) {
                    continue;
                }
                synchronizer.start(session_id, base_value);
            }
            Some(_) => {}
            None => {
                synchronizer.stop();
            }
        }

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            changed = receiver.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    synchronizer.stop();
    tracing::debug!("session binding finished");
}

async fn load_base_value(
    base_source: &dyn BaseValueSource,
    session_id: &SessionId,
    base_timeout: Duration,
) -> f64 {
    match tokio::time::timeout(base_timeout, base_source.fetch_base_value(session_id)).await {
        Ok(Ok(base_value)) => base_value,
        Ok(Err(error)) => {
            tracing::warn!(session = %session_id, "base valuation unavailable, using 0: {error}");
            0.0
        }
        Err(_) => {
            tracing::warn!(
                session = %session_id,
                timeout_ms = base_timeout.as_millis() as u64,
                "base valuation timed out, using 0"
            );
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::session::SessionStore;
    use crate::valuation::source::ValueFetcher;
    use crate::valuation::types::{SyncConfig, SyncState};
    use futures_util::future::{self, BoxFuture, FutureExt};

    struct FixedValues {
        base: Option<f64>,
        realtime: f64,
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
            let result = self
                .base
                .ok_or_else(|| AppError::ValuationUnavailable("no holdings".to_string()));
            future::ready(result).boxed()
        }
    }

    struct Harness {
        synchronizer: Arc<Synchronizer>,
        sessions: Arc<SessionStore>,
        cancel_token: CancellationToken,
        join_handle: tokio::task::JoinHandle<()>,
    }

    fn spawn_binding(base: Option<f64>) -> Harness {
        let values = Arc::new(FixedValues {
            base,
            realtime: 1_050.0,
        });
        let synchronizer = Arc::new(Synchronizer::new(values.clone(), SyncConfig::default()));
        let sessions = Arc::new(SessionStore::new());
        let cancel_token = CancellationToken::new();
        let join_handle = tokio::spawn(run_session_binding(
            Arc::clone(&synchronizer),
            sessions.clone(),
            values,
            Duration::from_secs(5),
            cancel_token.clone(),
        ));

        Harness {
            synchronizer,
            sessions,
            cancel_token,
            join_handle,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn session(raw: &str) -> SessionId {
        SessionId::new(raw).expect("valid session id")
    }

    #[tokio::test(start_paused = true)]
    async fn follows_login_and_logout() {
        let harness = spawn_binding(Some(1_000.0));
        settle().await;
        assert_eq!(harness.synchronizer.state(), SyncState::Inactive);

        harness.sessions.login(session("42"));
        settle().await;
        assert_eq!(harness.synchronizer.state(), SyncState::Active);
        let snapshot = harness.synchronizer.snapshot();
        assert_eq!(snapshot.base, 1_000.0);
        assert_eq!(snapshot.realtime, 1_050.0);
        assert_eq!(snapshot.percent, 5.0);

        harness.sessions.logout();
        settle().await;
        assert_eq!(harness.synchronizer.state(), SyncState::Inactive);
        assert_eq!(harness.synchronizer.snapshot().realtime, 1_050.0);

        harness.cancel_token.cancel();
        harness.join_handle.await.expect("binding task should not panic");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_base_value_falls_back_to_zero() {
        let harness = spawn_binding(None);
        harness.sessions.login(session("7"));
        settle().await;

        let snapshot = harness.synchronizer.snapshot();
        assert_eq!(snapshot.base, 0.0);
        assert_eq!(snapshot.percent, 0.0);
        assert_eq!(snapshot.delta, 1_050.0);

        harness.cancel_token.cancel();
        harness.join_handle.await.expect("binding task should not panic");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_synchronizer() {
        let harness = spawn_binding(Some(10.0));
        harness.sessions.login(session("42"));
        settle().await;
        assert_eq!(harness.synchronizer.state(), SyncState::Active);

        harness.cancel_token.cancel();
        harness.join_handle.await.expect("binding task should not panic");
        assert_eq!(harness.synchronizer.state(), SyncState::Inactive);
    }
}
