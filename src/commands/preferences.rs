use crate::error::AppError;
use crate::state::AppState;
use crate::valuation::persistence::{get_valuation_preferences, save_valuation_preferences};
use crate::valuation::types::{SaveValuationPreferencesArgs, ValuationPreferencesSnapshot};

pub async fn valuation_preferences_get(
    state: &AppState,
) -> Result<ValuationPreferencesSnapshot, AppError> {
    get_valuation_preferences(&state.db_pool).await
}

pub async fn valuation_preferences_save(
    state: &AppState,
    args: SaveValuationPreferencesArgs,
) -> Result<ValuationPreferencesSnapshot, AppError> {
    save_valuation_preferences(&state.db_pool, args).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::test_state;
    use crate::commands::valuation::start_valuation_sync;

    #[tokio::test]
    async fn saved_preferences_drive_the_next_start() {
        let state = test_state(0.0, 0.0).await;
        valuation_preferences_save(
            &state,
            SaveValuationPreferencesArgs {
                poll_interval_ms: 5_000,
                history_capacity: 12,
            },
        )
        .await
        .expect("preferences should save");

        let session = start_valuation_sync(&state, None)
            .await
            .expect("start should succeed");
        assert_eq!(session.poll_interval_ms, 5_000);
        assert_eq!(session.history_capacity, 12);
        assert_eq!(state.synchronizer.config().history_capacity, 12);

        let loaded = valuation_preferences_get(&state)
            .await
            .expect("preferences should load");
        assert_eq!(loaded.poll_interval_ms, 5_000);
    }
}
