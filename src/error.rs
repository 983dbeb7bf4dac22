use serde::ser::Serializer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no active session")]
    SessionAbsent,
    #[error("valuation unavailable: {0}")]
    ValuationUnavailable(String),
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Short machine-readable tag used in status snapshots and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::SessionAbsent => "session_absent",
            Self::ValuationUnavailable(_) => "valuation_unavailable",
            Self::Transport(_) | Self::Timeout { .. } => "transport_failure",
            Self::Sqlx(_) | Self::Migration(_) => "database",
            Self::Io(_) => "io",
        }
    }

    /// Fetch failures that leave the last known value in place.
    pub fn is_recoverable_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::ValuationUnavailable(_) | Self::Transport(_) | Self::Timeout { .. }
        )
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
