//! In-process record of mirror writes that never landed.

use crate::core_chain::TxReceipt;
use crate::core_store::{Fields, Filter};
use crate::metrics::record_gauge;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use tracing::info;
use uuid::Uuid;

/// A mirror patch whose chain side already happened.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMirror {
    pub id: Uuid,
    pub class_name: String,
    pub key: Filter,
    pub patch: Fields,
    pub receipts: Vec<TxReceipt>,
    pub recorded_at: DateTime<Utc>,
    /// Write attempts so far, including the ones made before journaling.
    pub attempts: u32,
}

#[derive(Debug, Default)]
pub struct DivergenceJournal {
    entries: Mutex<Vec<PendingMirror>>,
}

impl DivergenceJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        class_name: &str,
        key: Filter,
        patch: Fields,
        receipts: Vec<TxReceipt>,
        attempts: u32,
    ) -> Uuid {
        let entry = PendingMirror {
            id: Uuid::new_v4(),
            class_name: class_name.to_string(),
            key,
            patch,
            receipts,
            recorded_at: Utc::now(),
            attempts,
        };
        let id = entry.id;
        info!(%id, class_name, key = %entry.key, "journaled diverged mirror write");

        let mut entries = self.lock();
        entries.push(entry);
        record_gauge("sync.journal.pending", entries.len() as f64);
        id
    }

    pub fn entries(&self) -> Vec<PendingMirror> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drain every entry. Pair with [`restore`](Self::restore) for the ones
    /// that still fail.
    pub fn take_all(&self) -> Vec<PendingMirror> {
        let drained = std::mem::take(&mut *self.lock());
        record_gauge("sync.journal.pending", 0.0);
        drained
    }

    pub fn restore(&self, pending: Vec<PendingMirror>) {
        let mut entries = self.lock();
        // Keep restored entries ahead of anything journaled meanwhile.
        let newer = std::mem::replace(&mut *entries, pending);
        entries.extend(newer);
        record_gauge("sync.journal.pending", entries.len() as f64);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PendingMirror>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
