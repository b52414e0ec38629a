//! Registry contracts client
//!
//! Writes go through [`ChainRegistryClient::execute`], which signs with the
//! bound wallet and waits for inclusion. Contract events are relayed onto a
//! [`RegistryEventBus`] so the mirror indexer and other listeners can react.

mod backend;
mod bus;
mod client;
mod errors;
mod events;
mod simulated;
mod types;

pub use backend::RegistryBackend;
pub use bus::{EventSubscription, RegistryEventBus};
pub use client::ChainRegistryClient;
pub use errors::{ChainError, ChainResult};
pub use events::{claim_id, ContractEvent, EventKind, RegistryEvent};
pub use simulated::{RecordedCall, SimulatedRegistry};
pub use types::{PendingTx, RegistryCall, RegistryContract, TxReceipt};
