use crate::error::AppError;
use crate::session::SessionId;
use crate::state::AppState;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionChangeResult {
    pub session_id: Option<SessionId>,
    pub changed: bool,
}

pub async fn login_session(
    state: &AppState,
    session_id: String,
) -> Result<SessionChangeResult, AppError> {
    let session_id = SessionId::new(session_id)?;
    let changed = state.sessions.login(session_id.clone());
    if changed {
        tracing::info!(session = %session_id, "session logged in");
    }

    Ok(SessionChangeResult {
        session_id: Some(session_id),
        changed,
    })
}

pub async fn logout_session(state: &AppState) -> Result<SessionChangeResult, AppError> {
    let changed = state.sessions.logout();
    if changed {
        tracing::info!("session logged out");
    }

    Ok(SessionChangeResult {
        session_id: None,
        changed,
    })
}
