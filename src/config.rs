use crate::error::AppError;
use crate::session::SessionId;
use crate::valuation::api::DEFAULT_API_BASE_URL;
use crate::valuation::types::{validate_fetch_timeout_ms, DEFAULT_FETCH_TIMEOUT_MS};
use std::path::PathBuf;

pub const API_URL_ENV: &str = "PORTFOLIO_API_URL";
pub const FETCH_TIMEOUT_ENV: &str = "PORTFOLIO_FETCH_TIMEOUT_MS";
pub const USER_ID_ENV: &str = "PORTFOLIO_USER_ID";
pub const DATA_DIR_ENV: &str = "PORTFOLIO_DATA_DIR";
pub const DB_FILENAME_ENV: &str = "APP_DB_FILENAME";
const DEFAULT_DB_FILENAME: &str = "app.db";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub fetch_timeout_ms: u64,
    pub user_id: Option<SessionId>,
    pub db_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let resolve = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_base_url = resolve(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(AppError::InvalidArgument(format!(
                "{API_URL_ENV} must be an http(s) URL"
            )));
        }

        let fetch_timeout_ms = match resolve(FETCH_TIMEOUT_ENV) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                AppError::InvalidArgument(format!("{FETCH_TIMEOUT_ENV} must be an integer"))
            })?,
            None => DEFAULT_FETCH_TIMEOUT_MS,
        };
        validate_fetch_timeout_ms(fetch_timeout_ms)?;

        let user_id = resolve(USER_ID_ENV).map(SessionId::new).transpose()?;

        let mut db_path = resolve(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        db_path.push(resolve(DB_FILENAME_ENV).unwrap_or_else(|| DEFAULT_DB_FILENAME.to_string()));

        Ok(Self {
            api_base_url,
            fetch_timeout_ms,
            user_id,
            db_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| values.get(key).cloned())
    }

    #[test]
    fn falls_back_to_defaults() {
        let config = config_from(&[(API_URL_ENV, "   ")]).expect("defaults should be valid");

        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.fetch_timeout_ms, DEFAULT_FETCH_TIMEOUT_MS);
        assert!(config.user_id.is_none());
        assert_eq!(config.db_path, PathBuf::from("./app.db"));
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            (API_URL_ENV, "https://portfolio.example.test"),
            (FETCH_TIMEOUT_ENV, "2500"),
            (USER_ID_ENV, "42"),
            (DATA_DIR_ENV, "/var/lib/portfolio"),
            (DB_FILENAME_ENV, "sync.db"),
        ])
        .expect("overrides should be valid");

        assert_eq!(config.api_base_url, "https://portfolio.example.test");
        assert_eq!(config.fetch_timeout_ms, 2_500);
        assert_eq!(config.user_id.as_ref().map(SessionId::as_str), Some("42"));
        assert_eq!(config.db_path, PathBuf::from("/var/lib/portfolio/sync.db"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(config_from(&[(API_URL_ENV, "ftp://nope")]).is_err());
        assert!(config_from(&[(FETCH_TIMEOUT_ENV, "soon")]).is_err());
        assert!(config_from(&[(FETCH_TIMEOUT_ENV, "5")]).is_err());
        assert!(config_from(&[(USER_ID_ENV, "a b")]).is_err());
    }
}
