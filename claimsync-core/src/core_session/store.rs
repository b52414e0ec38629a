use super::session::Session;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { username: String },
    SignedOut { username: String },
    Expired { username: String, expired_at: DateTime<Utc> },
}

/// Holds the current session and announces changes to it.
pub struct SessionStore {
    current: RwLock<Option<Arc<Session>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(16);
        Self {
            current: RwLock::new(None),
            events,
        }
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn sign_in(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        let username = session.user.username.clone();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&session));
        info!(%username, "signed in");
        let _ = self.events.send(SessionEvent::SignedIn { username });
        session
    }

    pub fn sign_out(&self) {
        if let Some(session) = self.take() {
            let username = session.user.username.clone();
            info!(%username, "signed out");
            let _ = self.events.send(SessionEvent::SignedOut { username });
        }
    }

    /// Clear the session if it is expired at `now`. Returns whether it was.
    pub fn expire_if_due(&self, now: DateTime<Utc>) -> bool {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let due = guard.as_ref().is_some_and(|s| s.is_expired_at(now));
        if !due {
            return false;
        }
        let Some(session) = guard.take() else {
            return false;
        };
        drop(guard);

        let username = session.user.username.clone();
        info!(%username, expired_at = %session.expires_at, "session expired");
        let _ = self.events.send(SessionEvent::Expired {
            username,
            expired_at: session.expires_at,
        });
        true
    }

    fn take(&self) -> Option<Arc<Session>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
