//! Identity / claims synchronization
//!
//! Admin actions that change registry state and mirror the result into the
//! record store.
//!
//! # Flow
//!
//! ```text
//! SyncWorkflow::<action>
//!   validate + authorize ----------------------> Failed notice (nothing sent)
//!   TransactionExecutor::execute
//!     DirectExecutor     -> ChainRegistryClient
//!     CustodialExecutor  -> CustodialSigningClient (init, sign, complete)
//!   RetryPolicy::run(update_existing_record)
//!     exhausted --------------------------------> DivergenceJournal
//!   NoticeBoard: Pending, then Succeeded | Failed
//! ```

mod claims;
mod errors;
mod executor;
mod journal;
mod notices;
mod queries;
mod retry;
mod settings;
mod stage;
mod workflow;

pub use claims::ClaimDiff;
pub use errors::{WorkflowError, WorkflowResult};
pub use executor::{
    executor_for, CustodialExecutor, DirectExecutor, ExecutedTx, TransactionExecutor,
};
pub use journal::{DivergenceJournal, PendingMirror};
pub use notices::{ActionNotice, AdminAction, NoticeBoard, NoticeHandle, NoticeStatus};
pub use queries::MirrorQueries;
pub use retry::{Backoff, RetryExhausted, RetryPolicy};
pub use settings::WorkflowSettings;
pub use stage::{SyncReport, SyncStage};
pub use workflow::{ClaimEditOutcome, CreatedIdentity, NewIdentity, ReconcileSummary, SyncWorkflow};
