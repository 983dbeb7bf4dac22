use crate::error::AppError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Opaque identity of a logged-in user, as handed out by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Arc<str>);

impl SessionId {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, AppError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(AppError::SessionAbsent);
        }
        if !trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return Err(AppError::InvalidArgument(
                "session id must be ASCII alphanumeric, '-' or '_'".to_string(),
            ));
        }
        Ok(Self(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

/// Source of the current session and of its present/absent transitions.
pub trait SessionProvider: Send + Sync {
    fn current(&self) -> Option<SessionId>;
    fn subscribe(&self) -> watch::Receiver<Option<SessionId>>;
}

/// In-process session holder fed by the auth collaborator.
#[derive(Debug)]
pub struct SessionStore {
    sender: watch::Sender<Option<SessionId>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Returns `true` when the stored session actually changed.
    pub fn login(&self, session_id: SessionId) -> bool {
        self.sender.send_if_modified(|current| {
            if current.as_ref() == Some(&session_id) {
                return false;
            }
            *current = Some(session_id);
            true
        })
    }

    pub fn logout(&self) -> bool {
        self.sender.send_if_modified(|current| current.take().is_some())
    }
}

impl SessionProvider for SessionStore {
    fn current(&self) -> Option<SessionId> {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<SessionId>> {
        self.sender.subscribe()
    }
}
