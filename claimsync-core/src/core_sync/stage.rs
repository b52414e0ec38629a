use super::executor::ExecutedTx;
use super::notices::AdminAction;
use crate::core_chain::TxReceipt;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Progress of one admin action.
///
/// `Validated → ChainSubmitted → ChainConfirmed → MirrorPending →
/// MirrorConfirmed | MirrorFailed`. Multi-transaction actions may return to
/// `ChainSubmitted` from `ChainConfirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SyncStage {
    Validated,
    ChainSubmitted,
    ChainConfirmed,
    MirrorPending,
    MirrorConfirmed,
    MirrorFailed,
}

impl SyncStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncStage::MirrorConfirmed | SyncStage::MirrorFailed)
    }

    pub fn can_advance_to(self, next: SyncStage) -> bool {
        use SyncStage::*;
        matches!(
            (self, next),
            (Validated, ChainSubmitted)
                | (Validated, MirrorPending)
                | (ChainSubmitted, ChainConfirmed)
                | (ChainConfirmed, ChainSubmitted)
                | (ChainConfirmed, MirrorPending)
                | (MirrorPending, MirrorConfirmed)
                | (MirrorPending, MirrorFailed)
                | (MirrorConfirmed, ChainSubmitted)
                | (MirrorFailed, ChainSubmitted)
        )
    }
}

/// Outcome of a successful action.
#[derive(Debug, Clone)]
pub struct SyncReport<T> {
    pub value: T,
    pub transactions: Vec<ExecutedTx>,
    /// Last stage reached. `MirrorFailed` here means a best-effort mirror
    /// step gave up; the chain side is done.
    pub stage: SyncStage,
}

impl<T> SyncReport<T> {
    pub fn receipts(&self) -> Vec<&TxReceipt> {
        self.transactions
            .iter()
            .filter_map(|tx| tx.receipt.as_ref())
            .collect()
    }
}

/// Tracks stages and transactions while an action runs.
pub(crate) struct SyncProgress {
    action: AdminAction,
    stage: SyncStage,
    transactions: Vec<ExecutedTx>,
}

impl SyncProgress {
    pub(crate) fn new(action: AdminAction) -> Self {
        Self {
            action,
            stage: SyncStage::Validated,
            transactions: Vec::new(),
        }
    }

    pub(crate) fn stage(&self) -> SyncStage {
        self.stage
    }

    pub(crate) fn advance(&mut self, next: SyncStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal stage transition {:?} -> {:?}",
            self.stage,
            next
        );
        debug!(action = ?self.action, from = ?self.stage, to = ?next, "stage");
        self.stage = next;
    }

    pub(crate) fn submitted(&mut self) {
        self.advance(SyncStage::ChainSubmitted);
    }

    pub(crate) fn confirmed(&mut self, tx: ExecutedTx) {
        self.advance(SyncStage::ChainConfirmed);
        self.transactions.push(tx);
    }

    pub(crate) fn receipts(&self) -> Vec<TxReceipt> {
        self.transactions
            .iter()
            .filter_map(|tx| tx.receipt.clone())
            .collect()
    }

    pub(crate) fn finish<T>(self, value: T) -> SyncReport<T> {
        SyncReport {
            value,
            transactions: self.transactions,
            stage: self.stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        use SyncStage::*;
        let path = [Validated, ChainSubmitted, ChainConfirmed, MirrorPending, MirrorConfirmed];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(MirrorConfirmed.is_terminal());
        assert!(!ChainConfirmed.is_terminal());
    }

    #[test]
    fn test_no_skipping_confirmation() {
        assert!(!SyncStage::ChainSubmitted.can_advance_to(SyncStage::MirrorPending));
        assert!(!SyncStage::MirrorFailed.can_advance_to(SyncStage::MirrorConfirmed));
    }

    #[test]
    fn test_progress_collects_receipts() {
        let mut progress = SyncProgress::new(AdminAction::CreateClaimTopic);
        progress.submitted();
        progress.confirmed(ExecutedTx {
            method: "addClaimTopic",
            receipt: Some(TxReceipt {
                transaction_hash: "0x1".into(),
                block_hash: "0x2".into(),
                block_number: 1,
            }),
            custody_response: None,
        });
        assert_eq!(progress.stage(), SyncStage::ChainConfirmed);
        let report = progress.finish(());
        assert_eq!(report.receipts().len(), 1);
    }
}
