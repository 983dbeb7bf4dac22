use crate::{error::AppError, state::AppState, valuation::types::SyncState};
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Instant;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_ms: u128,
    pub db: &'static str,
    pub sync: SyncState,
}

pub async fn build_health_response(
    started_at: Instant,
    pool: &SqlitePool,
    sync: SyncState,
) -> HealthResponse {
    let db_status = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
    {
        Ok(_) => "ok",
        Err(_) => "error",
    };

    HealthResponse {
        status: "ok",
        uptime_ms: started_at.elapsed().as_millis(),
        db: db_status,
        sync,
    }
}

pub async fn health(state: &AppState) -> Result<HealthResponse, AppError> {
    Ok(build_health_response(
        state.started_at,
        &state.db_pool,
        state.synchronizer.state(),
    )
    .await)
}
