use crate::error::AppError;
use crate::valuation::history::DEFAULT_HISTORY_CAPACITY;
use crate::valuation::now_unix_ms;
use crate::valuation::types::{
    SaveValuationPreferencesArgs, ValuationPreferencesSnapshot, DEFAULT_POLL_INTERVAL_MS,
};
use sqlx::{Row, SqlitePool};

fn map_preferences_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ValuationPreferencesSnapshot, AppError> {
    let poll_interval_ms: i64 = row.try_get("poll_interval_ms")?;
    let history_capacity: i64 = row.try_get("history_capacity")?;
    let updated_at_ms: i64 = row.try_get("updated_at_ms")?;

    Ok(ValuationPreferencesSnapshot {
        poll_interval_ms: u64::try_from(poll_interval_ms).map_err(|_| {
            AppError::InvalidArgument("stored poll_interval_ms is negative".to_string())
        })?,
        history_capacity: usize::try_from(history_capacity).map_err(|_| {
            AppError::InvalidArgument("stored history_capacity is negative".to_string())
        })?,
        updated_at_ms,
    })
}

async fn ensure_valuation_preferences_seed(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        "INSERT OR IGNORE INTO valuation_preferences (id, poll_interval_ms, history_capacity, updated_at_ms) VALUES (1, ?, ?, ?)",
    )
    .bind(DEFAULT_POLL_INTERVAL_MS as i64)
    .bind(DEFAULT_HISTORY_CAPACITY as i64)
    .bind(now_unix_ms())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_valuation_preferences(
    pool: &SqlitePool,
) -> Result<ValuationPreferencesSnapshot, AppError> {
    ensure_valuation_preferences_seed(pool).await?;

    let row = sqlx::query(
        "SELECT poll_interval_ms, history_capacity, updated_at_ms FROM valuation_preferences WHERE id = 1",
    )
    .fetch_one(pool)
    .await?;

    map_preferences_row(&row)
}

pub async fn save_valuation_preferences(
    pool: &SqlitePool,
    args: SaveValuationPreferencesArgs,
) -> Result<ValuationPreferencesSnapshot, AppError> {
    let normalized = args.normalize()?;

    sqlx::query(
        "INSERT INTO valuation_preferences (id, poll_interval_ms, history_capacity, updated_at_ms) VALUES (1, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET poll_interval_ms=excluded.poll_interval_ms, history_capacity=excluded.history_capacity, updated_at_ms=excluded.updated_at_ms",
    )
    .bind(normalized.poll_interval_ms as i64)
    .bind(normalized.history_capacity as i64)
    .bind(now_unix_ms())
    .execute(pool)
    .await?;

    get_valuation_preferences(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should initialize");
        run_migrations(&pool)
            .await
            .expect("migrations should apply to a fresh database");
        pool
    }

    #[tokio::test]
    async fn seeds_defaults_on_first_read() {
        let pool = memory_pool().await;
        let preferences = get_valuation_preferences(&pool)
            .await
            .expect("preferences should load");

        assert_eq!(preferences.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(preferences.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }

    #[tokio::test]
    async fn saves_and_reloads_preferences() {
        let pool = memory_pool().await;
        let saved = save_valuation_preferences(
            &pool,
            SaveValuationPreferencesArgs {
                poll_interval_ms: 15_000,
                history_capacity: 20,
            },
        )
        .await
        .expect("valid preferences should save");

        assert_eq!(saved.poll_interval_ms, 15_000);
        assert_eq!(saved.history_capacity, 20);
        assert_eq!(
            get_valuation_preferences(&pool)
                .await
                .expect("preferences should load"),
            saved
        );
    }

    #[tokio::test]
    async fn rejects_out_of_range_preferences() {
        let pool = memory_pool().await;
        let result = save_valuation_preferences(
            &pool,
            SaveValuationPreferencesArgs {
                poll_interval_ms: 1,
                history_capacity: 5,
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }
}
