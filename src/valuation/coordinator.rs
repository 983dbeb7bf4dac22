use crate::error::AppError;
use crate::session::SessionId;
use crate::valuation::source::ValueFetcher;
use crate::valuation::types::{FetchAttempt, FetchOrigin};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionVerdict {
    Accepted,
    Stale { sequence: u64, watermark: u64 },
    Inactive { sequence: u64 },
}

/// Sequence bookkeeping for fetch attempts.
///
/// `watermark` is the highest sequence whose completion was accepted. While
/// inactive every completion is rejected.
#[derive(Debug, Default)]
pub struct FetchLedger {
    next_sequence: u64,
    watermark: u64,
    active: bool,
}

impl FetchLedger {
    pub fn begin(&mut self, origin: FetchOrigin) -> FetchAttempt {
        self.next_sequence = self.next_sequence.saturating_add(1);
        FetchAttempt {
            sequence: self.next_sequence,
            origin,
        }
    }

    pub fn complete(&mut self, attempt: &FetchAttempt) -> CompletionVerdict {
        if !self.active {
            return CompletionVerdict::Inactive {
                sequence: attempt.sequence,
            };
        }
        if attempt.sequence <= self.watermark {
            return CompletionVerdict::Stale {
                sequence: attempt.sequence,
                watermark: self.watermark,
            };
        }

        self.watermark = attempt.sequence;
        CompletionVerdict::Accepted
    }

    /// Everything allocated so far becomes stale.
    pub fn activate(&mut self) {
        self.watermark = self.next_sequence;
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn watermark(&self) -> u64 {
        self.watermark
    }
}

/// Runs fetches concurrently and lets only the newest completion through.
pub struct FetchCoordinator {
    fetcher: Arc<dyn ValueFetcher>,
    ledger: Arc<Mutex<FetchLedger>>,
    fetch_timeout: Mutex<Duration>,
}

impl FetchCoordinator {
    pub fn new(fetcher: Arc<dyn ValueFetcher>, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            ledger: Arc::new(Mutex::new(FetchLedger::default())),
            fetch_timeout: Mutex::new(fetch_timeout),
        }
    }

    pub fn set_fetch_timeout(&self, fetch_timeout: Duration) {
        *self.fetch_timeout.lock() = fetch_timeout;
    }

    pub fn activate(&self) {
        self.ledger.lock().activate();
    }

    /// After this returns no in-flight completion reaches its handler.
    pub fn deactivate(&self) {
        self.ledger.lock().deactivate();
    }

    /// Starts one fetch and returns its attempt without waiting for it.
    ///
    /// `on_complete` receives the result only when the completion is
    /// accepted, and runs under the ledger lock so accepted completions are
    /// applied strictly in sequence order. `on_discard` receives the verdict
    /// of a rejected completion. Neither may call back into the coordinator.
    pub fn request_fetch<A, D>(
        &self,
        session_id: &SessionId,
        origin: FetchOrigin,
        on_complete: A,
        on_discard: D,
    ) -> FetchAttempt
    where
        A: FnOnce(FetchAttempt, Result<f64, AppError>) + Send + 'static,
        D: FnOnce(CompletionVerdict) + Send + 'static,
    {
        let attempt = self.ledger.lock().begin(origin);
        let request = self.fetcher.fetch_realtime_value(session_id);
        let fetch_timeout = *self.fetch_timeout.lock();
        let ledger = Arc::clone(&self.ledger);

        tokio::spawn(async move {
            let result = match tokio::time::timeout(fetch_timeout, request).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout {
                    timeout_ms: fetch_timeout.as_millis().min(u64::MAX as u128) as u64,
                }),
            };

            let mut writable = ledger.lock();
            let verdict = writable.complete(&attempt);
            if verdict == CompletionVerdict::Accepted {
                on_complete(attempt, result);
            } else {
                drop(writable);
                on_discard(verdict);
            }
        });

        attempt
    }
}
