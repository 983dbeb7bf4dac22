pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod session;
pub mod state;
pub mod valuation;

use commands::{
    app_info::app_info,
    health::health,
    session::{login_session, logout_session},
    valuation::{start_valuation_sync, stop_valuation_sync},
};
use config::AppConfig;
use db::initialize_pool_from_path;
use error::AppError;
use state::AppState;
use tracing_subscriber::EnvFilter;
use valuation::types::ValuationView;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed by an embedding process.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Runs the headless synchronizer until Ctrl-C, logging every published snapshot.
pub async fn run() -> Result<(), AppError> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let db_pool = initialize_pool_from_path(&config.db_path).await?;
    let state = AppState::new(db_pool, config);

    let info = app_info(&state);
    tracing::info!(
        version = %info.version,
        api = %info.api_base_url,
        db = %state.config.db_path.display(),
        "{} starting",
        info.product_name
    );

    let session = start_valuation_sync(&state, None).await?;
    tracing::info!(
        poll_interval_ms = session.poll_interval_ms,
        fetch_timeout_ms = session.fetch_timeout_ms,
        history_capacity = session.history_capacity,
        "valuation sync armed"
    );

    if let Some(user_id) = state.config.user_id.clone() {
        login_session(&state, user_id.to_string()).await?;
    } else {
        tracing::info!("no PORTFOLIO_USER_ID set, waiting for a session");
    }

    let mut snapshots = state.synchronizer.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal?;
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = ValuationView::from(&*snapshots.borrow_and_update());
                tracing::info!(
                    base = view.base,
                    realtime = view.realtime,
                    delta = view.delta,
                    percent = view.percent,
                    history_len = view.history.len(),
                    "portfolio valuation"
                );
            }
        }
    }

    tracing::info!("shutting down");
    logout_session(&state).await?;
    stop_valuation_sync(&state).await?;

    let report = health(&state).await?;
    tracing::info!(uptime_ms = report.uptime_ms as u64, db = report.db, "stopped");
    state.db_pool.close().await;

    Ok(())
}
