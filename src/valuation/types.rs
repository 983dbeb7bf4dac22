use crate::error::AppError;
use crate::session::SessionId;
use crate::valuation::history::{DisplayPoint, HistorySeries, DEFAULT_HISTORY_CAPACITY};
use crate::valuation::metrics;
use serde::{Deserialize, Serialize};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;
pub const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;
pub const MIN_FETCH_TIMEOUT_MS: u64 = 100;
pub const MAX_FETCH_TIMEOUT_MS: u64 = 120_000;
pub const MIN_HISTORY_CAPACITY: usize = 1;
pub const MAX_HISTORY_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Inactive,
    Active,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FetchOrigin {
    Timer,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchAttempt {
    pub sequence: u64,
    pub origin: FetchOrigin,
}

/// Everything the display layer needs, replaced as a whole on every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationSnapshot {
    pub base: f64,
    pub realtime: f64,
    pub delta: f64,
    pub percent: f64,
    pub history: HistorySeries,
    pub last_sequence: Option<u64>,
    pub updated_at_ms: i64,
}

impl ValuationSnapshot {
    pub fn seeded(base: f64, history: HistorySeries, updated_at_ms: i64) -> Self {
        Self {
            base,
            realtime: base,
            delta: 0.0,
            percent: 0.0,
            history,
            last_sequence: None,
            updated_at_ms,
        }
    }

    pub fn with_realtime(
        &self,
        realtime: f64,
        history: HistorySeries,
        sequence: u64,
        now_ms: i64,
    ) -> Self {
        let computed = metrics::compute(self.base, realtime);
        Self {
            base: self.base,
            realtime,
            delta: computed.delta,
            percent: computed.percent,
            history,
            last_sequence: Some(sequence),
            updated_at_ms: now_ms,
        }
    }

    pub fn with_base(&self, base: f64, now_ms: i64) -> Self {
        let computed = metrics::compute(base, self.realtime);
        Self {
            base,
            realtime: self.realtime,
            delta: computed.delta,
            percent: computed.percent,
            history: self.history.clone(),
            last_sequence: self.last_sequence,
            updated_at_ms: now_ms,
        }
    }
}

impl Default for ValuationSnapshot {
    fn default() -> Self {
        Self::seeded(0.0, HistorySeries::default(), 0)
    }
}

/// Snapshot shaped for rendering: history points carry their relative labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationView {
    pub base: f64,
    pub realtime: f64,
    pub delta: f64,
    pub percent: f64,
    pub history: Vec<DisplayPoint>,
    pub updated_at_ms: i64,
}

impl From<&ValuationSnapshot> for ValuationView {
    fn from(snapshot: &ValuationSnapshot) -> Self {
        Self {
            base: snapshot.base,
            realtime: snapshot.realtime,
            delta: snapshot.delta,
            percent: snapshot.percent,
            history: snapshot.history.to_display_sequence().collect(),
            updated_at_ms: snapshot.updated_at_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusSnapshot {
    pub state: SyncState,
    pub session_id: Option<SessionId>,
    pub poll_interval_ms: u64,
    pub applied_count: u64,
    pub failed_count: u64,
    pub stale_count: u64,
    pub last_error: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartValuationSyncArgs {
    pub poll_interval_ms: Option<u64>,
    pub fetch_timeout_ms: Option<u64>,
    pub history_capacity: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub poll_interval_ms: u64,
    pub fetch_timeout_ms: u64,
    pub history_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl StartValuationSyncArgs {
    /// Fills missing fields from `fallback` and validates every range.
    pub fn normalize_over(self, fallback: &SyncConfig) -> Result<SyncConfig, AppError> {
        let poll_interval_ms = self.poll_interval_ms.unwrap_or(fallback.poll_interval_ms);
        validate_poll_interval_ms(poll_interval_ms)?;

        let fetch_timeout_ms = self.fetch_timeout_ms.unwrap_or(fallback.fetch_timeout_ms);
        validate_fetch_timeout_ms(fetch_timeout_ms)?;

        let history_capacity = self.history_capacity.unwrap_or(fallback.history_capacity);
        validate_history_capacity(history_capacity)?;

        Ok(SyncConfig {
            poll_interval_ms,
            fetch_timeout_ms,
            history_capacity,
        })
    }

    pub fn normalize(self) -> Result<SyncConfig, AppError> {
        self.normalize_over(&SyncConfig::default())
    }
}

pub fn validate_poll_interval_ms(value: u64) -> Result<(), AppError> {
    if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&value) {
        return Err(AppError::InvalidArgument(format!(
            "pollIntervalMs must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}"
        )));
    }
    Ok(())
}

pub fn validate_fetch_timeout_ms(value: u64) -> Result<(), AppError> {
    if !(MIN_FETCH_TIMEOUT_MS..=MAX_FETCH_TIMEOUT_MS).contains(&value) {
        return Err(AppError::InvalidArgument(format!(
            "fetchTimeoutMs must be between {MIN_FETCH_TIMEOUT_MS} and {MAX_FETCH_TIMEOUT_MS}"
        )));
    }
    Ok(())
}

pub fn validate_history_capacity(value: usize) -> Result<(), AppError> {
    if !(MIN_HISTORY_CAPACITY..=MAX_HISTORY_CAPACITY).contains(&value) {
        return Err(AppError::InvalidArgument(format!(
            "historyCapacity must be between {MIN_HISTORY_CAPACITY} and {MAX_HISTORY_CAPACITY}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationSyncSession {
    pub running: bool,
    pub poll_interval_ms: u64,
    pub fetch_timeout_ms: u64,
    pub history_capacity: usize,
}

impl ValuationSyncSession {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            running: true,
            poll_interval_ms: config.poll_interval_ms,
            fetch_timeout_ms: config.fetch_timeout_ms,
            history_capacity: config.history_capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationSyncStopResult {
    pub stopped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValuationPreferencesSnapshot {
    pub poll_interval_ms: u64,
    pub history_capacity: usize,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveValuationPreferencesArgs {
    pub poll_interval_ms: u64,
    pub history_capacity: usize,
}

impl SaveValuationPreferencesArgs {
    pub fn normalize(self) -> Result<Self, AppError> {
        validate_poll_interval_ms(self.poll_interval_ms)?;
        validate_history_capacity(self.history_capacity)?;
        Ok(self)
    }
}

/// The valuation endpoints answer with a bare JSON number, some deployments
/// quote it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ValuationWire {
    Number(f64),
    Text(String),
}

pub fn parse_valuation_payload(payload: &mut [u8]) -> Result<f64, AppError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::ValuationUnavailable(
            "empty valuation payload".to_string(),
        ));
    }

    let wire: ValuationWire = simd_json::serde::from_slice(payload).map_err(|error| {
        AppError::ValuationUnavailable(format!("unexpected valuation payload: {error}"))
    })?;

    let value = match wire {
        ValuationWire::Number(value) => value,
        ValuationWire::Text(raw) => raw.trim().parse::<f64>().map_err(|_| {
            AppError::ValuationUnavailable(format!("non-numeric valuation '{raw}'"))
        })?,
    };

    if !value.is_finite() {
        return Err(AppError::ValuationUnavailable(
            "valuation must be finite".to_string(),
        ));
    }

    Ok(value)
}
