//! User-facing action notices
//!
//! Every admin action produces exactly one `Pending` notice followed by
//! exactly one terminal notice (`Succeeded` or `Failed`). Actions rejected
//! before anything was dispatched emit a single `Failed` notice.

use super::errors::WorkflowError;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdminAction {
    CreateClaimTopic,
    RenameClaimTopic,
    RemoveClaimTopic,
    CreateTrustedIssuer,
    UpdateTrustedIssuer,
    RemoveTrustedIssuer,
    CreateIdentity,
    EditClaims,
    AddClaim,
    RemoveClaim,
    RemoveIdentity,
    ApproveUser,
    DenyUser,
    Mint,
    Reconcile,
}

impl AdminAction {
    pub fn pending_message(self) -> &'static str {
        match self {
            AdminAction::CreateClaimTopic => "Adding claim topic...",
            AdminAction::RenameClaimTopic => "Renaming claim topic...",
            AdminAction::RemoveClaimTopic => "Removing claim topic...",
            AdminAction::CreateTrustedIssuer => "Adding trusted issuer...",
            AdminAction::UpdateTrustedIssuer => "Updating trusted issuer...",
            AdminAction::RemoveTrustedIssuer => "Removing trusted issuer...",
            AdminAction::CreateIdentity => "Creating digital identity...",
            AdminAction::EditClaims => "Updating claims...",
            AdminAction::AddClaim => "Adding claim...",
            AdminAction::RemoveClaim => "Removing claim...",
            AdminAction::RemoveIdentity => "Removing identity...",
            AdminAction::ApproveUser => "Approving user...",
            AdminAction::DenyUser => "Denying user...",
            AdminAction::Mint => "Minting...",
            AdminAction::Reconcile => "Replaying pending mirror updates...",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            AdminAction::CreateClaimTopic => "Claim topic added",
            AdminAction::RenameClaimTopic => "Claim topic renamed",
            AdminAction::RemoveClaimTopic => "Claim topic removed",
            AdminAction::CreateTrustedIssuer => "Trusted issuer added",
            AdminAction::UpdateTrustedIssuer => "Trusted issuer updated",
            AdminAction::RemoveTrustedIssuer => "Trusted issuer removed",
            AdminAction::CreateIdentity => "Digital identity created",
            AdminAction::EditClaims => "Claims updated",
            AdminAction::AddClaim => "Claim added",
            AdminAction::RemoveClaim => "Claim removed",
            AdminAction::RemoveIdentity => "Identity removed",
            AdminAction::ApproveUser => "User approved",
            AdminAction::DenyUser => "User denied",
            AdminAction::Mint => "Minted",
            AdminAction::Reconcile => "Mirror reconciled",
        }
    }

    /// Shown when the chain gave no revert reason.
    pub fn fallback_failure(self) -> &'static str {
        match self {
            AdminAction::CreateClaimTopic => "Failed to add claim topic",
            AdminAction::RenameClaimTopic => "Failed to rename claim topic",
            AdminAction::RemoveClaimTopic => "Failed to remove claim topic",
            AdminAction::CreateTrustedIssuer => "Failed to add trusted issuer",
            AdminAction::UpdateTrustedIssuer => "Failed to update trusted issuer",
            AdminAction::RemoveTrustedIssuer => "Failed to remove trusted issuer",
            AdminAction::CreateIdentity => "Failed to create digital identity",
            AdminAction::EditClaims => "Failed to update claims",
            AdminAction::AddClaim => "Failed to add claim",
            AdminAction::RemoveClaim => "Failed to remove claim",
            AdminAction::RemoveIdentity => "Failed to remove identity",
            AdminAction::ApproveUser => "Failed to approve user",
            AdminAction::DenyUser => "Failed to deny user",
            AdminAction::Mint => "Failed to mint",
            AdminAction::Reconcile => "Failed to reconcile mirror",
        }
    }

    /// Message for a failed action.
    pub fn failure_message(self, error: &WorkflowError) -> String {
        match error {
            WorkflowError::Validation(e) => e.to_string(),
            WorkflowError::Unauthorized(_) | WorkflowError::SessionExpired => error.to_string(),
            other => other
                .reason()
                .map(String::from)
                .unwrap_or_else(|| self.fallback_failure().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeStatus {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionNotice {
    /// Shared by the pending and terminal notice of one action.
    pub id: Uuid,
    pub action: AdminAction,
    pub status: NoticeStatus,
    /// Topic id, address or name the action is about.
    pub subject: String,
    pub message: String,
}

/// Broadcast channel for [`ActionNotice`]s.
#[derive(Clone)]
pub struct NoticeBoard {
    sender: broadcast::Sender<ActionNotice>,
}

impl NoticeBoard {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActionNotice> {
        self.sender.subscribe()
    }

    fn publish(&self, notice: ActionNotice) {
        // No subscribers is fine.
        let receivers = self.sender.send(notice.clone()).unwrap_or(0);
        debug!(
            id = %notice.id,
            action = ?notice.action,
            status = ?notice.status,
            receivers,
            "notice"
        );
    }

    /// Emit the `Pending` notice and return the handle for the terminal one.
    pub fn begin(&self, action: AdminAction, subject: impl Into<String>) -> NoticeHandle {
        let handle = NoticeHandle {
            board: self.clone(),
            id: Uuid::new_v4(),
            action,
            subject: subject.into(),
        };
        handle.emit(NoticeStatus::Pending, action.pending_message().to_string());
        handle
    }

    /// Single `Failed` notice for an action rejected before dispatch.
    pub fn reject(&self, action: AdminAction, subject: impl Into<String>, error: &WorkflowError) {
        self.publish(ActionNotice {
            id: Uuid::new_v4(),
            action,
            status: NoticeStatus::Failed,
            subject: subject.into(),
            message: action.failure_message(error),
        });
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Emits the terminal notice. Consumed on use so it fires at most once.
pub struct NoticeHandle {
    board: NoticeBoard,
    id: Uuid,
    action: AdminAction,
    subject: String,
}

impl NoticeHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn emit(&self, status: NoticeStatus, message: String) {
        self.board.publish(ActionNotice {
            id: self.id,
            action: self.action,
            status,
            subject: self.subject.clone(),
            message,
        });
    }

    pub fn succeed(self) {
        self.emit(NoticeStatus::Succeeded, self.action.success_message().to_string());
    }

    pub fn fail(self, error: &WorkflowError) {
        self.emit(NoticeStatus::Failed, self.action.failure_message(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_chain::ChainError;
    use crate::core_model::ValidationError;

    #[tokio::test]
    async fn test_pending_then_single_terminal() {
        let board = NoticeBoard::new(8);
        let mut rx = board.subscribe();

        let handle = board.begin(AdminAction::CreateClaimTopic, "KYC Tier 1");
        let id = handle.id();
        handle.succeed();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.status, NoticeStatus::Pending);
        assert_eq!(second.status, NoticeStatus::Succeeded);
        assert_eq!(first.id, id);
        assert_eq!(second.id, id);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failure_uses_revert_reason() {
        let board = NoticeBoard::new(8);
        let mut rx = board.subscribe();

        board
            .begin(AdminAction::CreateTrustedIssuer, "0xabc")
            .fail(&WorkflowError::Chain(ChainError::reverted(
                "trusted Issuer already exists",
            )));

        rx.recv().await.unwrap();
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.status, NoticeStatus::Failed);
        assert_eq!(failed.message, "trusted Issuer already exists");
    }

    #[test]
    fn test_failure_without_reason_uses_fallback() {
        let err = WorkflowError::Chain(ChainError::Rpc("timeout".into()));
        assert_eq!(
            AdminAction::RemoveIdentity.failure_message(&err),
            "Failed to remove identity"
        );
    }

    #[tokio::test]
    async fn test_reject_emits_only_failed() {
        let board = NoticeBoard::new(8);
        let mut rx = board.subscribe();

        board.reject(
            AdminAction::CreateClaimTopic,
            "",
            &WorkflowError::Validation(ValidationError::NoClaimTopics),
        );

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.status, NoticeStatus::Failed);
        assert_eq!(notice.message, "Assign at least 1 claim topic");
        assert!(rx.try_recv().is_err());
    }
}
