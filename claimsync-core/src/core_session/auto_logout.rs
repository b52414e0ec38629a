//! Background watcher that ends the session when its token expires.

use super::store::SessionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct AutoLogout {
    store: Arc<SessionStore>,
    poll_interval: Duration,
    clock: Clock,
}

impl AutoLogout {
    pub fn new(store: Arc<SessionStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. with a controllable one in tests.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Poll until the task is aborted. Sessions signed in later are
    /// watched too.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll_interval);
            loop {
                ticker.tick().await;
                self.store.expire_if_due((self.clock)());
            }
        })
    }
}
