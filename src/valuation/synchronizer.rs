use crate::error::AppError;
use crate::session::SessionId;
use crate::valuation::coordinator::{CompletionVerdict, FetchCoordinator};
use crate::valuation::history::{HistorySeries, ValuePoint};
use crate::valuation::now_unix_ms;
use crate::valuation::scheduler::PollingScheduler;
use crate::valuation::source::ValueFetcher;
use crate::valuation::types::{
    FetchAttempt, FetchOrigin, SyncConfig, SyncState, SyncStatusSnapshot, ValuationSnapshot,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug)]
struct SyncInner {
    state: SyncState,
    session_id: Option<SessionId>,
    config: SyncConfig,
    snapshot: ValuationSnapshot,
    applied_count: u64,
    failed_count: u64,
    stale_count: u64,
    last_error: Option<String>,
    reason: Option<String>,
}

impl SyncInner {
    fn publish(&self, sender: &watch::Sender<ValuationSnapshot>) {
        sender.send_replace(self.snapshot.clone());
    }
}

struct SyncShared {
    coordinator: FetchCoordinator,
    inner: Mutex<SyncInner>,
    snapshot_sender: watch::Sender<ValuationSnapshot>,
}

impl SyncShared {
    fn dispatch(self: &Arc<Self>, origin: FetchOrigin) {
        let session_id = {
            let readable = self.inner.lock();
            match readable.state {
                SyncState::Active => readable.session_id.clone(),
                SyncState::Inactive => None,
            }
        };
        let Some(session_id) = session_id else {
            tracing::debug!(?origin, "fetch skipped: {}", AppError::SessionAbsent);
            return;
        };

        let applied = Arc::clone(self);
        let discarded = Arc::clone(self);
        let attempt = self.coordinator.request_fetch(
            &session_id,
            origin,
            move |attempt, result| applied.apply_completion(attempt, result),
            move |verdict| discarded.record_discard(verdict),
        );
        tracing::debug!(sequence = attempt.sequence, ?origin, session = %session_id, "fetch requested");
    }

    fn apply_completion(&self, attempt: FetchAttempt, result: Result<f64, AppError>) {
        let mut writable = self.inner.lock();
        match result {
            Ok(realtime) => {
                let now_ms = now_unix_ms();
                let mut history = writable.snapshot.history.clone();
                history.append(ValuePoint::new(now_ms, realtime));
                writable.snapshot =
                    writable
                        .snapshot
                        .with_realtime(realtime, history, attempt.sequence, now_ms);
                writable.applied_count = writable.applied_count.saturating_add(1);
                writable.publish(&self.snapshot_sender);
                tracing::debug!(
                    sequence = attempt.sequence,
                    origin = ?attempt.origin,
                    realtime,
                    delta = writable.snapshot.delta,
                    percent = writable.snapshot.percent,
                    "realtime valuation applied"
                );
            }
            Err(error) => {
                writable.failed_count = writable.failed_count.saturating_add(1);
                writable.last_error = Some(format!("{}: {error}", error.kind()));
                if error.is_recoverable_fetch_failure() {
                    tracing::warn!(
                        sequence = attempt.sequence,
                        origin = ?attempt.origin,
                        kind = error.kind(),
                        "realtime valuation fetch failed, keeping last value: {error}"
                    );
                } else {
                    tracing::error!(
                        sequence = attempt.sequence,
                        origin = ?attempt.origin,
                        kind = error.kind(),
                        "unexpected valuation fetch error, keeping last value: {error}"
                    );
                }
            }
        }
    }

    fn record_discard(&self, verdict: CompletionVerdict) {
        let mut writable = self.inner.lock();
        writable.stale_count = writable.stale_count.saturating_add(1);
        tracing::debug!(?verdict, "stale valuation result discarded");
    }

    /// Caller holds the scheduler lock.
    fn deactivate(&self, scheduler: &mut PollingScheduler, reason: &str) -> bool {
        scheduler.stop();
        self.coordinator.deactivate();

        let mut writable = self.inner.lock();
        if writable.state == SyncState::Inactive {
            return false;
        }
        let session_id = writable.session_id.take();
        writable.state = SyncState::Inactive;
        writable.reason = Some(reason.to_string());
        if let Some(session_id) = session_id {
            tracing::info!(session = %session_id, reason, "valuation sync stopped");
        }
        true
    }
}

/// Keeps a session's realtime valuation snapshot up to date.
///
/// Lifecycle calls (`start`, `stop`, `refresh_now`) are serialized through the
/// scheduler lock. Fetch completions mutate the snapshot only when the
/// coordinator accepts them, so a result started before `stop` or before a
/// newer completion never lands.
pub struct Synchronizer {
    shared: Arc<SyncShared>,
    scheduler: Mutex<PollingScheduler>,
}

impl Synchronizer {
    pub fn new(fetcher: Arc<dyn ValueFetcher>, config: SyncConfig) -> Self {
        let snapshot = ValuationSnapshot::seeded(
            0.0,
            HistorySeries::new(config.history_capacity, config.poll_interval_ms),
            now_unix_ms(),
        );
        let (snapshot_sender, _) = watch::channel(snapshot.clone());
        let coordinator =
            FetchCoordinator::new(fetcher, Duration::from_millis(config.fetch_timeout_ms));

        Self {
            shared: Arc::new(SyncShared {
                coordinator,
                inner: Mutex::new(SyncInner {
                    state: SyncState::Inactive,
                    session_id: None,
                    config,
                    snapshot,
                    applied_count: 0,
                    failed_count: 0,
                    stale_count: 0,
                    last_error: None,
                    reason: Some("sync idle".to_string()),
                }),
                snapshot_sender,
            }),
            scheduler: Mutex::new(PollingScheduler::new()),
        }
    }

    /// Applies to the next `start`; a running session keeps its settings.
    pub fn set_config(&self, config: SyncConfig) {
        self.shared.inner.lock().config = config;
    }

    pub fn config(&self) -> SyncConfig {
        self.shared.inner.lock().config.clone()
    }

    /// Seeds the snapshot from `base_value` and starts polling.
    ///
    /// Returns `false` when this session is already active. Another active
    /// session is stopped first. Must be called from inside a tokio runtime.
    pub fn start(&self, session_id: SessionId, base_value: f64) -> bool {
        let mut scheduler = self.scheduler.lock();
        if scheduler.session_id() == Some(&session_id) {
            return false;
        }
        if scheduler.is_running() {
            self.shared.deactivate(&mut scheduler, "session changed");
        }

        let config = {
            let mut writable = self.shared.inner.lock();
            let history =
                HistorySeries::new(writable.config.history_capacity, writable.config.poll_interval_ms);
            writable.snapshot = ValuationSnapshot::seeded(base_value, history, now_unix_ms());
            writable.state = SyncState::Active;
            writable.session_id = Some(session_id.clone());
            writable.applied_count = 0;
            writable.failed_count = 0;
            writable.stale_count = 0;
            writable.last_error = None;
            writable.reason = Some("polling".to_string());
            writable.publish(&self.shared.snapshot_sender);
            writable.config.clone()
        };

        self.shared
            .coordinator
            .set_fetch_timeout(Duration::from_millis(config.fetch_timeout_ms));
        self.shared.coordinator.activate();

        let shared = Arc::clone(&self.shared);
        scheduler.start(
            &session_id,
            Duration::from_millis(config.poll_interval_ms),
            move |origin| shared.dispatch(origin),
        );

        tracing::info!(
            session = %session_id,
            base_value,
            poll_interval_ms = config.poll_interval_ms,
            history_capacity = config.history_capacity,
            "valuation sync started"
        );
        true
    }

    /// Returns `false` when already inactive. The last snapshot stays readable.
    pub fn stop(&self) -> bool {
        let mut scheduler = self.scheduler.lock();
        self.shared.deactivate(&mut scheduler, "session ended")
    }

    pub fn refresh_now(&self) -> Result<(), AppError> {
        let scheduler = self.scheduler.lock();
        if scheduler.trigger_now() {
            Ok(())
        } else {
            Err(AppError::SessionAbsent)
        }
    }

    /// Re-bases the metrics when holdings change; history is left untouched.
    ///
    /// Only applies while `session_id` is the active session. A base value
    /// loaded for a session that has since ended or been replaced returns
    /// `SessionAbsent` and leaves the snapshot as it is.
    pub fn update_base_value(
        &self,
        session_id: &SessionId,
        base_value: f64,
    ) -> Result<ValuationSnapshot, AppError> {
        if !base_value.is_finite() {
            return Err(AppError::InvalidArgument(
                "base value must be finite".to_string(),
            ));
        }

        let mut writable = self.shared.inner.lock();
        if writable.state != SyncState::Active
            || writable.session_id.as_ref() != Some(session_id)
        {
            tracing::debug!(
                session = %session_id,
                base_value,
                "base value for inactive session discarded"
            );
            return Err(AppError::SessionAbsent);
        }
        writable.snapshot = writable.snapshot.with_base(base_value, now_unix_ms());
        writable.publish(&self.shared.snapshot_sender);
        Ok(writable.snapshot.clone())
    }

    pub fn snapshot(&self) -> ValuationSnapshot {
        self.shared.snapshot_sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ValuationSnapshot> {
        self.shared.snapshot_sender.subscribe()
    }

    pub fn state(&self) -> SyncState {
        self.shared.inner.lock().state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.shared.inner.lock().session_id.clone()
    }

    pub fn status(&self) -> SyncStatusSnapshot {
        let readable = self.shared.inner.lock();
        SyncStatusSnapshot {
            state: readable.state,
            session_id: readable.session_id.clone(),
            poll_interval_ms: readable.config.poll_interval_ms,
            applied_count: readable.applied_count,
            failed_count: readable.failed_count,
            stale_count: readable.stale_count,
            last_error: readable.last_error.clone(),
            reason: readable.reason.clone(),
        }
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.stop();
    }
}
