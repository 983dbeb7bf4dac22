use crate::session::SessionId;
use crate::valuation::types::FetchOrigin;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const MIN_PERIOD: Duration = Duration::from_millis(1);

pub type TickCallback = Arc<dyn Fn(FetchOrigin) + Send + Sync>;

struct ActiveTimer {
    session_id: SessionId,
    tick_slot: Arc<Mutex<Option<TickCallback>>>,
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

/// A single repeating timer bound to one session.
///
/// The callback lives in a slot shared with the timer task. `stop` empties the
/// slot under its lock, so once it returns no tick can reach the callback even
/// if the timer already fired.
#[derive(Default)]
pub struct PollingScheduler {
    active: Option<ActiveTimer>,
}

impl PollingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires `on_tick` immediately and then every `period`.
    ///
    /// Returns `false` when a timer for the same session is already running.
    /// A timer for another session is stopped first. Must be called from
    /// inside a tokio runtime.
    pub fn start<C>(&mut self, session_id: &SessionId, period: Duration, on_tick: C) -> bool
    where
        C: Fn(FetchOrigin) + Send + Sync + 'static,
    {
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.session_id == *session_id)
        {
            return false;
        }
        self.stop();

        let callback: TickCallback = Arc::new(on_tick);
        let tick_slot = Arc::new(Mutex::new(Some(callback)));
        let cancellation_token = CancellationToken::new();

        let task_slot = Arc::clone(&tick_slot);
        let task_token = cancellation_token.clone();
        let period = period.max(MIN_PERIOD);
        let join_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        fire(&task_slot, FetchOrigin::Timer);
                    }
                }
            }
        });

        tracing::debug!(session = %session_id, period_ms = period.as_millis() as u64, "polling timer started");
        self.active = Some(ActiveTimer {
            session_id: session_id.clone(),
            tick_slot,
            cancellation_token,
            join_handle,
        });
        true
    }

    /// Returns `true` when a running timer was cancelled.
    pub fn stop(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        active.tick_slot.lock().take();
        active.cancellation_token.cancel();
        active.join_handle.abort();
        tracing::debug!(session = %active.session_id, "polling timer stopped");
        true
    }

    /// Runs the callback right away without touching the timer cadence.
    pub fn trigger_now(&self) -> bool {
        match &self.active {
            Some(active) => fire(&active.tick_slot, FetchOrigin::Manual),
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.active.as_ref().map(|active| &active.session_id)
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn fire(tick_slot: &Mutex<Option<TickCallback>>, origin: FetchOrigin) -> bool {
    let slot = tick_slot.lock();
    match slot.as_ref() {
        Some(callback) => {
            callback(origin);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TickLog {
        timer: AtomicUsize,
        manual: AtomicUsize,
    }

    impl TickLog {
        fn record(&self, origin: FetchOrigin) {
            match origin {
                FetchOrigin::Timer => self.timer.fetch_add(1, Ordering::SeqCst),
                FetchOrigin::Manual => self.manual.fetch_add(1, Ordering::SeqCst),
            };
        }

        fn timer(&self) -> usize {
            self.timer.load(Ordering::SeqCst)
        }

        fn manual(&self) -> usize {
            self.manual.load(Ordering::SeqCst)
        }
    }

    fn session(raw: &str) -> SessionId {
        SessionId::new(raw).expect("valid session id")
    }

    fn start_logged(
        scheduler: &mut PollingScheduler,
        session_id: &SessionId,
        period: Duration,
        log: &Arc<TickLog>,
    ) -> bool {
        let log = Arc::clone(log);
        scheduler.start(session_id, period, move |origin| log.record(origin))
    }

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_then_every_period() {
        let log = Arc::new(TickLog::default());
        let mut scheduler = PollingScheduler::new();
        assert!(start_logged(&mut scheduler, &session("1"), Duration::from_secs(60), &log));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(log.timer(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(log.timer(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_now_does_not_shift_the_cadence() {
        let log = Arc::new(TickLog::default());
        let mut scheduler = PollingScheduler::new();
        start_logged(&mut scheduler, &session("1"), Duration::from_secs(60), &log);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(scheduler.trigger_now());
        assert_eq!(log.manual(), 1);
        assert_eq!(log.timer(), 1);

        // The next scheduled tick is still due at t = 60s, not t = 90s.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(log.timer(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_stop() {
        let log = Arc::new(TickLog::default());
        let mut scheduler = PollingScheduler::new();
        start_logged(&mut scheduler, &session("1"), Duration::from_secs(10), &log);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(scheduler.stop());
        assert!(!scheduler.trigger_now());
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(log.timer(), 1);
        assert_eq!(log.manual(), 0);
        assert!(!scheduler.is_running());
        assert!(!scheduler.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_same_session_is_a_no_op() {
        let log = Arc::new(TickLog::default());
        let mut scheduler = PollingScheduler::new();
        let session_id = session("1");
        assert!(start_logged(&mut scheduler, &session_id, Duration::from_secs(10), &log));
        assert!(!start_logged(&mut scheduler, &session_id, Duration::from_secs(10), &log));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(log.timer(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_session_replaces_the_timer() {
        let first = Arc::new(TickLog::default());
        let second = Arc::new(TickLog::default());
        let mut scheduler = PollingScheduler::new();
        start_logged(&mut scheduler, &session("1"), Duration::from_secs(10), &first);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(start_logged(&mut scheduler, &session("2"), Duration::from_secs(10), &second));
        assert_eq!(scheduler.session_id().map(SessionId::as_str), Some("2"));
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(first.timer(), 1);
        assert_eq!(second.timer(), 3);
    }
}
