use crate::error::AppError;
use crate::state::{AppState, SessionBindingHandle};
use crate::valuation::binding::run_session_binding;
use crate::valuation::persistence::get_valuation_preferences;
use crate::valuation::types::{
    StartValuationSyncArgs, SyncConfig, SyncStatusSnapshot, ValuationSyncSession,
    ValuationSyncStopResult, ValuationView,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn take_binding(state: &AppState) -> bool {
    let existing_handle = {
        let mut binding_slot = state.session_binding.lock().await;
        binding_slot.take()
    };

    if let Some(handle) = existing_handle {
        handle.cancellation_token.cancel();
        let _ = handle.join_handle.await;
        true
    } else {
        false
    }
}

/// Starts following the session store. Omitted args fall back to the saved
/// preferences, then to the configured fetch timeout.
pub async fn start_valuation_sync(
    state: &AppState,
    args: Option<StartValuationSyncArgs>,
) -> Result<ValuationSyncSession, AppError> {
    let preferences = get_valuation_preferences(&state.db_pool).await?;
    let fallback = SyncConfig {
        poll_interval_ms: preferences.poll_interval_ms,
        fetch_timeout_ms: state.config.fetch_timeout_ms,
        history_capacity: preferences.history_capacity,
    };
    let config = args.unwrap_or_default().normalize_over(&fallback)?;

    take_binding(state).await;
    state.synchronizer.set_config(config.clone());

    let cancellation_token = CancellationToken::new();
    let join_handle = tokio::spawn(run_session_binding(
        Arc::clone(&state.synchronizer),
        state.sessions.clone(),
        Arc::clone(&state.base_source),
        state.fetch_timeout(),
        cancellation_token.clone(),
    ));

    {
        let mut binding_slot = state.session_binding.lock().await;
        *binding_slot = Some(SessionBindingHandle {
            cancellation_token,
            join_handle,
        });
    }

    Ok(ValuationSyncSession::from_config(&config))
}

pub async fn stop_valuation_sync(state: &AppState) -> Result<ValuationSyncStopResult, AppError> {
    let stopped = take_binding(state).await;
    state.synchronizer.stop();
    Ok(ValuationSyncStopResult { stopped })
}

pub async fn valuation_snapshot(state: &AppState) -> Result<ValuationView, AppError> {
    Ok(ValuationView::from(&state.synchronizer.snapshot()))
}

pub async fn valuation_status(state: &AppState) -> Result<SyncStatusSnapshot, AppError> {
    Ok(state.synchronizer.status())
}

pub async fn refresh_valuation(state: &AppState) -> Result<(), AppError> {
    state.synchronizer.refresh_now()
}

/// Reloads the holdings-derived base value after a trade or deposit.
pub async fn refresh_base_value(state: &AppState) -> Result<ValuationView, AppError> {
    let session_id = state
        .synchronizer
        .session_id()
        .ok_or(AppError::SessionAbsent)?;

    let fetch_timeout = state.fetch_timeout();
    let base_value = tokio::time::timeout(
        fetch_timeout,
        state.base_source.fetch_base_value(&session_id),
    )
    .await
    .map_err(|_| AppError::Timeout {
        timeout_ms: fetch_timeout.as_millis() as u64,
    })??;

    let snapshot = state
        .synchronizer
        .update_base_value(&session_id, base_value)?;
    Ok(ValuationView::from(&snapshot))
}
