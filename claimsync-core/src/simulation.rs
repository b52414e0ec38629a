//! Self-contained environment: simulated registry, in-memory mirror,
//! event indexer, and stub custody functions.
//!
//! Used by the `simulate` command and by tests. Custody stubs acknowledge
//! every phase with a synthetic transaction hash; they do not touch the
//! simulated chain.

use crate::core_chain::{ChainRegistryClient, RegistryEventBus, SimulatedRegistry};
use crate::core_custody::{CredentialSigner, CustodialOperation, CustodialSigningClient};
use crate::core_session::Session;
use crate::core_store::{EventIndexer, MemoryRecordStore};
use crate::core_sync::{SyncWorkflow, WorkflowResult, WorkflowSettings};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

pub struct SimulatedEnvironment {
    pub registry: Arc<SimulatedRegistry>,
    pub store: Arc<MemoryRecordStore>,
    pub chain: ChainRegistryClient,
    pub custody: Arc<CustodialSigningClient>,
    pub settings: WorkflowSettings,
    tasks: Vec<JoinHandle<()>>,
}

impl SimulatedEnvironment {
    /// Start the relay and indexer tasks. `indexer_lag` delays every mirror
    /// base row, like the hosted indexer does.
    pub fn start(settings: WorkflowSettings, indexer_lag: Duration, function_prefix: &str) -> Self {
        let registry = Arc::new(SimulatedRegistry::new());
        let store = Arc::new(MemoryRecordStore::new());
        let bus = RegistryEventBus::default();
        let chain = ChainRegistryClient::read_only(registry.clone(), bus.clone());

        let relay = chain.start_event_relay();
        let indexer = EventIndexer::new(store.clone(), indexer_lag).spawn(bus.subscribe());

        register_custody_stubs(&store, function_prefix);
        let custody = Arc::new(CustodialSigningClient::new(
            store.clone(),
            Arc::new(CredentialSigner::new("simulated-credential")),
            function_prefix,
        ));

        info!(?indexer_lag, function_prefix, "simulated environment started");
        Self {
            registry,
            store,
            chain,
            custody,
            settings,
            tasks: vec![relay, indexer],
        }
    }

    /// Workflow bound to `session`.
    pub fn workflow(&self, session: Session) -> WorkflowResult<SyncWorkflow> {
        SyncWorkflow::new(
            Arc::new(session),
            self.store.clone(),
            self.chain.clone(),
            Some(self.custody.clone()),
            self.settings.clone(),
        )
    }
}

impl Drop for SimulatedEnvironment {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn register_custody_stubs(store: &MemoryRecordStore, prefix: &str) {
    let counter = Arc::new(AtomicU64::new(0));
    for op in CustodialOperation::ALL {
        let name = op.name();
        store.register_function(op.init_function(prefix), move |params: &Value| {
            Ok(json!({
                "challenge": { "challengeIdentifier": format!("ch-{name}") },
                "requestBody": params.clone(),
            }))
        });

        let counter = counter.clone();
        store.register_function(op.complete_function(prefix), move |_params: &Value| {
            let n = 0xc0_0000 + counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "transactionHash": format!("0x{n:064x}"), "status": "Broadcasted" }))
        });
    }
}
