pub mod api;
pub mod binding;
pub mod coordinator;
pub mod history;
pub mod metrics;
pub mod persistence;
pub mod scheduler;
pub mod source;
pub mod synchronizer;
pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn now_unix_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis().min(i64::MAX as u128) as i64,
        Err(_) => 0,
    }
}
