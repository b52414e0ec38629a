//! Admin actions: submit to the registry, confirm, mirror.
//!
//! Each action validates its input before anything leaves the process,
//! dispatches one or more registry calls through the session's
//! [`TransactionExecutor`], then writes display data into the mirror under a
//! [`RetryPolicy`]. The chain is authoritative: a mirror write that never
//! lands is journaled and surfaced, never rolled back.

use super::claims::ClaimDiff;
use super::errors::{WorkflowError, WorkflowResult};
use super::executor::{executor_for, TransactionExecutor};
use super::journal::DivergenceJournal;
use super::notices::{AdminAction, NoticeBoard};
use super::queries::MirrorQueries;
use super::retry::RetryPolicy;
use super::settings::WorkflowSettings;
use super::stage::{SyncProgress, SyncReport, SyncStage};
use crate::core_chain::{ChainError, ChainRegistryClient, RegistryCall};
use crate::core_custody::CustodialSigningClient;
use crate::core_model::validation;
use crate::core_model::{
    Address, ClaimData, ClaimTopic, MintAttribute, TopicGrant, TopicId, TrustedIssuer,
    ValidationError,
};
use crate::core_session::{Role, Session, WalletPreference};
use crate::core_store::classes::{self, fields};
use crate::core_store::{
    claim_topic_fields, fields_of, topics_to_value, trusted_issuer_fields, Fields, Filter, Record,
    RecordStore, StoreError,
};
use crate::metrics::record_counter;
use chrono::Utc;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

const ADMIN: &[Role] = &[Role::CentralAuthority];
const ISSUER: &[Role] = &[Role::TrustedIssuer, Role::CentralAuthority];

/// Input for [`SyncWorkflow::create_digital_identity`].
#[derive(Debug, Clone, Default)]
pub struct NewIdentity {
    pub display_name: String,
    pub wallet_address: String,
    pub account_number: String,
    /// Set when the identity is created by approving a pending sign-up.
    pub from_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIdentity {
    pub owner: Address,
    pub identity: Address,
    /// Whether a pending `_User` row was marked approved.
    pub approved_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimEditOutcome {
    pub removed: Vec<TopicId>,
    pub added: Vec<TopicId>,
    /// The selection added nothing new.
    pub nothing_added: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub applied: usize,
    pub remaining: usize,
}

pub struct SyncWorkflow {
    store: Arc<dyn RecordStore>,
    chain: ChainRegistryClient,
    executor: Arc<dyn TransactionExecutor>,
    session: Arc<Session>,
    settings: WorkflowSettings,
    notices: NoticeBoard,
    journal: Arc<DivergenceJournal>,
    queries: MirrorQueries,
}

impl SyncWorkflow {
    /// Bind a workflow to a session. Managed-wallet sessions need `custody`.
    pub fn new(
        session: Arc<Session>,
        store: Arc<dyn RecordStore>,
        chain: ChainRegistryClient,
        custody: Option<Arc<CustodialSigningClient>>,
        settings: WorkflowSettings,
    ) -> WorkflowResult<Self> {
        let executor = executor_for(&session, &chain, custody)?;
        info!(
            user = %session.user.username,
            mode = ?executor.mode(),
            "workflow bound to session"
        );
        Ok(Self {
            queries: MirrorQueries::new(store.clone()),
            notices: NoticeBoard::new(settings.notice_capacity),
            journal: Arc::new(DivergenceJournal::new()),
            store,
            chain,
            executor,
            session,
            settings,
        })
    }

    pub fn with_notices(mut self, notices: NoticeBoard) -> Self {
        self.notices = notices;
        self
    }

    /// Share a journal across workflows, e.g. across re-logins.
    pub fn with_journal(mut self, journal: Arc<DivergenceJournal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn TransactionExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn journal(&self) -> &Arc<DivergenceJournal> {
        &self.journal
    }

    pub fn queries(&self) -> &MirrorQueries {
        &self.queries
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    // --- claim topics ---

    /// Register the next free topic id and mirror its display name.
    pub async fn create_claim_topic(
        &self,
        display_name: &str,
    ) -> WorkflowResult<SyncReport<ClaimTopic>> {
        let action = AdminAction::CreateClaimTopic;
        let name = self.admit(action, display_name, ADMIN, || {
            validation::display_name("Display Name", display_name)
        })?;

        self.track(action, &name, async {
            let mut progress = SyncProgress::new(action);
            // Read right before use; concurrent admins can still collide and
            // the registry rejects the loser.
            let topic = self.queries.next_claim_topic_id().await?;
            debug!(%topic, "assigned claim topic id");

            self.dispatch(&mut progress, RegistryCall::AddClaimTopic { topic })
                .await?;

            let claim_topic = ClaimTopic {
                topic,
                display_name: name.clone(),
                active: true,
            };
            self.mirror(
                &mut progress,
                &self.settings.claim_topic_mirror,
                classes::CLAIM_TOPIC,
                topic_key(topic),
                claim_topic_fields(&claim_topic),
            )
            .await?;
            Ok(progress.finish(claim_topic))
        })
        .await
    }

    /// Change a topic's display name. Mirror only.
    pub async fn rename_claim_topic(
        &self,
        topic: TopicId,
        display_name: &str,
    ) -> WorkflowResult<SyncReport<ClaimTopic>> {
        let action = AdminAction::RenameClaimTopic;
        let name = self.admit(action, &topic.to_string(), ADMIN, || {
            non_zero(topic)?;
            validation::display_name("Display Name", display_name)
        })?;

        self.track(action, &topic.to_string(), async {
            let mut progress = SyncProgress::new(action);
            progress.advance(SyncStage::MirrorPending);
            let patch = fields_of(json!({ (fields::DISPLAY_NAME): name }));
            let record = self
                .store
                .update_existing_record(classes::CLAIM_TOPIC, &topic_key(topic), patch)
                .await
                .map_err(|e| not_found_as(e, format!("claim topic {topic}")))?;
            progress.advance(SyncStage::MirrorConfirmed);

            Ok(progress.finish(ClaimTopic {
                topic,
                display_name: name.clone(),
                active: record.get_bool(fields::ACTIVE).unwrap_or(true),
            }))
        })
        .await
    }

    pub async fn remove_claim_topic(&self, topic: TopicId) -> WorkflowResult<SyncReport<TopicId>> {
        let action = AdminAction::RemoveClaimTopic;
        self.admit(action, &topic.to_string(), ADMIN, || non_zero(topic))?;

        self.track(action, &topic.to_string(), async {
            let mut progress = SyncProgress::new(action);
            self.dispatch(&mut progress, RegistryCall::RemoveClaimTopic { topic })
                .await?;

            let patch = fields_of(json!({ (fields::ACTIVE): false }));
            if let Err(e) = self
                .mirror(
                    &mut progress,
                    &self.settings.claim_topic_mirror,
                    classes::CLAIM_TOPIC,
                    topic_key(topic),
                    patch,
                )
                .await
            {
                warn!(%topic, error = %e, "claim topic removed on chain; mirror flag not set");
            }
            Ok(progress.finish(topic))
        })
        .await
    }

    // --- trusted issuers ---

    pub async fn create_trusted_issuer(
        &self,
        verifier_name: &str,
        issuer: &str,
        topics: &[TopicId],
    ) -> WorkflowResult<SyncReport<TrustedIssuer>> {
        let action = AdminAction::CreateTrustedIssuer;
        let (name, issuer, topics) = self.admit(action, issuer, ADMIN, || {
            issuer_input(verifier_name, issuer, topics)
        })?;

        self.track(action, &issuer.to_string(), async {
            let mut progress = SyncProgress::new(action);
            self.dispatch(
                &mut progress,
                RegistryCall::AddTrustedIssuer {
                    issuer,
                    topics: topics.clone(),
                },
            )
            .await?;
            let mirrored = self.mirror_issuer(&mut progress, name, issuer, &topics).await?;
            Ok(progress.finish(mirrored))
        })
        .await
    }

    /// Replace the issuer's topic set and display name.
    pub async fn update_trusted_issuer(
        &self,
        verifier_name: &str,
        issuer: &str,
        topics: &[TopicId],
    ) -> WorkflowResult<SyncReport<TrustedIssuer>> {
        let action = AdminAction::UpdateTrustedIssuer;
        let (name, issuer, topics) = self.admit(action, issuer, ADMIN, || {
            issuer_input(verifier_name, issuer, topics)
        })?;

        self.track(action, &issuer.to_string(), async {
            let mut progress = SyncProgress::new(action);
            self.dispatch(
                &mut progress,
                RegistryCall::UpdateIssuerClaimTopics {
                    issuer,
                    topics: topics.clone(),
                },
            )
            .await?;
            let mirrored = self.mirror_issuer(&mut progress, name, issuer, &topics).await?;
            Ok(progress.finish(mirrored))
        })
        .await
    }

    pub async fn remove_trusted_issuer(&self, issuer: &str) -> WorkflowResult<SyncReport<Address>> {
        let action = AdminAction::RemoveTrustedIssuer;
        let issuer = self.admit(action, issuer, ADMIN, || {
            validation::address("Issuer Address", issuer)
        })?;

        self.track(action, &issuer.to_string(), async {
            let mut progress = SyncProgress::new(action);
            self.dispatch(&mut progress, RegistryCall::RemoveTrustedIssuer { issuer })
                .await?;
            self.mirror(
                &mut progress,
                &self.settings.trusted_issuer_mirror,
                classes::TRUSTED_ISSUER,
                issuer_key(issuer),
                fields_of(json!({ (fields::ACTIVE): false })),
            )
            .await?;
            Ok(progress.finish(issuer))
        })
        .await
    }

    async fn mirror_issuer(
        &self,
        progress: &mut SyncProgress,
        verifier_name: String,
        issuer: Address,
        topics: &[TopicId],
    ) -> WorkflowResult<TrustedIssuer> {
        let granted_at = Utc::now();
        let mirrored = TrustedIssuer {
            issuer,
            verifier_name,
            claim_topics: topics
                .iter()
                .map(|&topic| TopicGrant {
                    topic,
                    timestamp: granted_at,
                })
                .collect(),
            active: true,
        };
        self.mirror(
            progress,
            &self.settings.trusted_issuer_mirror,
            classes::TRUSTED_ISSUER,
            issuer_key(issuer),
            trusted_issuer_fields(&mirrored),
        )
        .await?;
        Ok(mirrored)
    }

    // --- identities ---

    /// Deploy an identity contract for the wallet, register it, mirror the
    /// display data, and approve the pending sign-up when there is one.
    pub async fn create_digital_identity(
        &self,
        input: NewIdentity,
    ) -> WorkflowResult<SyncReport<CreatedIdentity>> {
        let action = AdminAction::CreateIdentity;
        let (display_name, owner, account_number) =
            self.admit(action, &input.wallet_address, ADMIN, || {
                Ok((
                    // Personal names keep punctuation; only presence is checked.
                    validation::required("Display Name", &input.display_name)?,
                    validation::address("Wallet Address", &input.wallet_address)?,
                    validation::required("Account Number", &input.account_number)?,
                ))
            })?;

        self.track(action, &owner.to_string(), async {
            let mut progress = SyncProgress::new(action);
            self.dispatch(&mut progress, RegistryCall::CreateIdentity { owner })
                .await?;

            let identity = self.await_identity(owner).await?;
            info!(%owner, %identity, "identity contract deployed");

            self.dispatch(&mut progress, RegistryCall::AddIdentity { owner, identity })
                .await?;

            let patch = fields_of(json!({
                (fields::ADDRESS): owner.to_string(),
                (fields::IDENTITY): identity.to_string(),
                (fields::WALLET_ADDRESS): owner.to_string(),
                (fields::DISPLAY_NAME): display_name,
                (fields::ACCOUNT_NUMBER): account_number,
            }));
            if let Err(e) = self
                .mirror(
                    &mut progress,
                    &self.settings.identity_mirror,
                    classes::IDENTITY,
                    owner_key(owner),
                    patch,
                )
                .await
            {
                warn!(%owner, error = %e, "identity registered; display data not mirrored");
            }

            let approved_user = input.from_pending && self.approve_user_row(owner).await;
            Ok(progress.finish(CreatedIdentity {
                owner,
                identity,
                approved_user,
            }))
        })
        .await
    }

    async fn await_identity(&self, owner: Address) -> WorkflowResult<Address> {
        let policy = &self.settings.identity_lookup;
        let chain = &self.chain;
        let found = policy
            .poll("identity_lookup", move |_| async move {
                let identity = chain.get_identity(owner).await?;
                Ok::<_, ChainError>((!identity.is_zero()).then_some(identity))
            })
            .await?;

        found.ok_or(WorkflowError::IdentityNotFound {
            owner,
            attempts: policy.max_attempts.max(1),
        })
    }

    async fn approve_user_row(&self, wallet: Address) -> bool {
        let key = wallet_key(wallet);
        match self.store.get_record(classes::USER, &key).await {
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(e) => {
                warn!(%wallet, error = %e, "could not look up pending user");
                return false;
            }
        }
        let patch = fields_of(json!({ (fields::PENDING_APPROVAL): false }));
        match self.store.update_existing_record(classes::USER, &key, patch).await {
            Ok(_) => true,
            Err(e) => {
                warn!(%wallet, error = %e, "pending user not marked approved");
                false
            }
        }
    }

    /// Bring the identity's claims to exactly `selected`.
    ///
    /// Claims outside the selection are removed one call at a time; new ones
    /// are set in a single batch.
    pub async fn edit_claims(
        &self,
        owner: &str,
        selected: &[TopicId],
    ) -> WorkflowResult<SyncReport<ClaimEditOutcome>> {
        let action = AdminAction::EditClaims;
        let owner = self.admit(action, owner, ADMIN, || {
            if selected.iter().any(|t| t.0 == 0) {
                return Err(ValidationError::ZeroTopic);
            }
            validation::address("Wallet Address", owner)
        })?;

        self.track(action, &owner.to_string(), async {
            let mut progress = SyncProgress::new(action);
            if !self.chain.contains(owner).await? {
                return Err(WorkflowError::NotFound(format!("identity for {owner}")));
            }

            let current = self.chain.get_claims(owner).await?;
            let diff = ClaimDiff::between(&current, selected);
            debug!(%owner, remove = ?diff.to_remove, add = ?diff.to_add, "claim diff");

            for &topic in &diff.to_remove {
                self.dispatch(&mut progress, RegistryCall::RemoveClaim { owner, topic })
                    .await?;
            }
            if !diff.to_add.is_empty() {
                self.dispatch(
                    &mut progress,
                    RegistryCall::SetClaims {
                        owner,
                        topics: diff.to_add.clone(),
                    },
                )
                .await?;
            }

            self.refresh_claims(&mut progress, owner).await?;
            Ok(progress.finish(ClaimEditOutcome {
                nothing_added: diff.to_add.is_empty(),
                removed: diff.to_remove,
                added: diff.to_add,
            }))
        })
        .await
    }

    /// Attest one claim as the signed-in issuer.
    pub async fn add_claim(
        &self,
        owner: &str,
        topic: TopicId,
    ) -> WorkflowResult<SyncReport<TopicId>> {
        let action = AdminAction::AddClaim;
        let owner = self.admit(action, owner, ISSUER, || {
            non_zero(topic)?;
            validation::address("Wallet Address", owner)
        })?;

        self.track(action, &owner.to_string(), async {
            let issuer = self.session.user.wallet_address.ok_or_else(|| {
                WorkflowError::Unauthorized("session has no wallet address".to_string())
            })?;
            let mut progress = SyncProgress::new(action);
            self.dispatch(
                &mut progress,
                RegistryCall::AddClaim {
                    owner,
                    topic,
                    claim: ClaimData::attested_by(issuer),
                },
            )
            .await?;
            self.refresh_claims(&mut progress, owner).await?;
            Ok(progress.finish(topic))
        })
        .await
    }

    pub async fn remove_claim(
        &self,
        owner: &str,
        topic: TopicId,
    ) -> WorkflowResult<SyncReport<TopicId>> {
        let action = AdminAction::RemoveClaim;
        let owner = self.admit(action, owner, ISSUER, || {
            non_zero(topic)?;
            validation::address("Wallet Address", owner)
        })?;

        self.track(action, &owner.to_string(), async {
            let mut progress = SyncProgress::new(action);
            self.dispatch(&mut progress, RegistryCall::RemoveClaim { owner, topic })
                .await?;
            self.refresh_claims(&mut progress, owner).await?;
            Ok(progress.finish(topic))
        })
        .await
    }

    /// Mirror the identity's claim list as the chain now reports it.
    async fn refresh_claims(
        &self,
        progress: &mut SyncProgress,
        owner: Address,
    ) -> WorkflowResult<()> {
        let claims = self.chain.get_claims(owner).await?;
        self.mirror(
            progress,
            &self.settings.claims_mirror,
            classes::IDENTITY,
            owner_key(owner),
            fields_of(json!({ (fields::CLAIMS): topics_to_value(&claims) })),
        )
        .await?;
        Ok(())
    }

    /// Drop the factory identity, then the registry entry.
    pub async fn remove_identity(&self, owner: &str) -> WorkflowResult<SyncReport<Address>> {
        let action = AdminAction::RemoveIdentity;
        let owner = self.admit(action, owner, ADMIN, || {
            validation::address("Wallet Address", owner)
        })?;
        let custodial = self.executor.mode() == WalletPreference::Managed;

        self.track(action, &owner.to_string(), async {
            let mut progress = SyncProgress::new(action);
            self.dispatch(&mut progress, RegistryCall::RemoveIdentity { owner })
                .await?;
            if custodial {
                tokio::time::sleep(self.settings.custodial_phase_delay).await;
            }
            self.dispatch(&mut progress, RegistryCall::UnregisterIdentity { owner })
                .await?;
            if custodial {
                // Let the indexer catch up before callers re-read the mirror.
                tokio::time::sleep(self.settings.custodial_refresh_delay).await;
            }
            Ok(progress.finish(owner))
        })
        .await
    }

    // --- pending sign-ups ---

    pub async fn approve_pending_identity(
        &self,
        wallet: &str,
    ) -> WorkflowResult<SyncReport<Address>> {
        self.update_user(
            AdminAction::ApproveUser,
            wallet,
            fields_of(json!({ (fields::PENDING_APPROVAL): false })),
        )
        .await
    }

    /// Soft-remove a pending sign-up.
    pub async fn deny_pending_identity(&self, wallet: &str) -> WorkflowResult<SyncReport<Address>> {
        self.update_user(
            AdminAction::DenyUser,
            wallet,
            fields_of(json!({ (fields::DENIED): true })),
        )
        .await
    }

    async fn update_user(
        &self,
        action: AdminAction,
        wallet: &str,
        patch: Fields,
    ) -> WorkflowResult<SyncReport<Address>> {
        let wallet = self.admit(action, wallet, ADMIN, || {
            validation::address("Wallet Address", wallet)
        })?;

        self.track(action, &wallet.to_string(), async {
            let mut progress = SyncProgress::new(action);
            progress.advance(SyncStage::MirrorPending);
            self.store
                .update_existing_record(classes::USER, &wallet_key(wallet), patch)
                .await
                .map_err(|e| not_found_as(e, format!("user with wallet {wallet}")))?;
            progress.advance(SyncStage::MirrorConfirmed);
            Ok(progress.finish(wallet))
        })
        .await
    }

    pub async fn mint(&self, metadata: Vec<MintAttribute>) -> WorkflowResult<SyncReport<()>> {
        let action = AdminAction::Mint;
        self.admit(action, "collection", ADMIN, || {
            metadata
                .iter()
                .try_for_each(|attr| validation::required("Attribute Key", &attr.key).map(drop))
        })?;

        self.track(action, "collection", async {
            let mut progress = SyncProgress::new(action);
            self.dispatch(&mut progress, RegistryCall::Mint { metadata })
                .await?;
            Ok(progress.finish(()))
        })
        .await
    }

    // --- divergence ---

    /// Replay journaled mirror writes once each. Entries that fail again
    /// stay journaled.
    pub async fn reconcile(&self) -> WorkflowResult<SyncReport<ReconcileSummary>> {
        let action = AdminAction::Reconcile;
        self.admit(action, "journal", ADMIN, || Ok(()))?;

        self.track(action, "journal", async {
            let mut progress = SyncProgress::new(action);
            progress.advance(SyncStage::MirrorPending);

            let mut applied = 0;
            let mut remaining = Vec::new();
            for mut entry in self.journal.take_all() {
                match self
                    .store
                    .update_existing_record(&entry.class_name, &entry.key, entry.patch.clone())
                    .await
                {
                    Ok(_) => {
                        info!(
                            id = %entry.id,
                            class_name = %entry.class_name,
                            key = %entry.key,
                            "journaled write applied"
                        );
                        applied += 1;
                    }
                    Err(e) => {
                        debug!(id = %entry.id, error = %e, "journaled write still failing");
                        entry.attempts += 1;
                        remaining.push(entry);
                    }
                }
            }

            let summary = ReconcileSummary {
                applied,
                remaining: remaining.len(),
            };
            progress.advance(if remaining.is_empty() {
                SyncStage::MirrorConfirmed
            } else {
                SyncStage::MirrorFailed
            });
            self.journal.restore(remaining);
            Ok(progress.finish(summary))
        })
        .await
    }

    // --- plumbing ---

    fn authorize(&self, roles: &[Role]) -> WorkflowResult<()> {
        self.session.authorize(roles, Utc::now())?;
        Ok(())
    }

    /// Authorization and input checks. Nothing is dispatched on failure and
    /// only a single `Failed` notice is emitted.
    fn admit<T>(
        &self,
        action: AdminAction,
        subject: &str,
        roles: &[Role],
        validate: impl FnOnce() -> Result<T, ValidationError>,
    ) -> WorkflowResult<T> {
        let result = self
            .authorize(roles)
            .and_then(|()| validate().map_err(WorkflowError::from));
        if let Err(e) = &result {
            debug!(?action, subject, error = %e, "action rejected");
            record_counter("sync.actions.failed", 1);
            self.notices.reject(action, subject, e);
        }
        result
    }

    async fn track<T, Fut>(
        &self,
        action: AdminAction,
        subject: &str,
        work: Fut,
    ) -> WorkflowResult<SyncReport<T>>
    where
        Fut: Future<Output = WorkflowResult<SyncReport<T>>>,
    {
        let notice = self.notices.begin(action, subject);
        let span = info_span!("admin_action", ?action, subject, notice = %notice.id());

        let result = work.instrument(span).await;
        match &result {
            Ok(report) => {
                info!(
                    ?action,
                    subject,
                    stage = ?report.stage,
                    txs = report.transactions.len(),
                    "action completed"
                );
                record_counter("sync.actions.succeeded", 1);
                notice.succeed();
            }
            Err(e) => {
                warn!(?action, subject, error = %e, "action failed");
                record_counter("sync.actions.failed", 1);
                notice.fail(e);
            }
        }
        result
    }

    async fn dispatch(
        &self,
        progress: &mut SyncProgress,
        call: RegistryCall,
    ) -> WorkflowResult<()> {
        progress.submitted();
        let tx = self.executor.execute(call).await?;
        progress.confirmed(tx);
        Ok(())
    }

    /// Retried `update_existing_record`. On exhaustion the patch is
    /// journaled and the receipts collected so far travel with the error.
    async fn mirror(
        &self,
        progress: &mut SyncProgress,
        policy: &RetryPolicy,
        class_name: &'static str,
        key: Filter,
        patch: Fields,
    ) -> WorkflowResult<Record> {
        progress.advance(SyncStage::MirrorPending);

        let store: &dyn RecordStore = self.store.as_ref();
        let (key_ref, patch_ref) = (&key, &patch);
        let outcome = policy
            .run(class_name, move |_| {
                store.update_existing_record(class_name, key_ref, patch_ref.clone())
            })
            .await;

        match outcome {
            Ok(record) => {
                progress.advance(SyncStage::MirrorConfirmed);
                Ok(record)
            }
            Err(exhausted) => {
                progress.advance(SyncStage::MirrorFailed);
                record_counter("sync.mirror.failed", 1);
                let receipts = progress.receipts();
                let key_text = key.to_string();
                self.journal
                    .record(class_name, key, patch, receipts.clone(), exhausted.attempts);
                Err(WorkflowError::MirrorConsistency {
                    class: class_name.to_string(),
                    key: key_text,
                    attempts: exhausted.attempts,
                    last_error: exhausted.last_error.to_string(),
                    receipts,
                })
            }
        }
    }
}

fn topic_key(topic: TopicId) -> Filter {
    Filter::new().eq(fields::TOPIC, topic.to_string())
}

fn issuer_key(issuer: Address) -> Filter {
    Filter::new().eq(fields::ISSUER, issuer.to_string())
}

fn owner_key(owner: Address) -> Filter {
    Filter::new().eq(fields::ADDRESS, owner.to_string())
}

fn wallet_key(wallet: Address) -> Filter {
    Filter::new().eq(fields::WALLET_ADDRESS, wallet.to_string())
}

fn non_zero(topic: TopicId) -> Result<(), ValidationError> {
    if topic.0 == 0 {
        return Err(ValidationError::ZeroTopic);
    }
    Ok(())
}

fn issuer_input(
    verifier_name: &str,
    issuer: &str,
    topics: &[TopicId],
) -> Result<(String, Address, Vec<TopicId>), ValidationError> {
    Ok((
        validation::display_name("Verifier Name", verifier_name)?,
        validation::address("Issuer Address", issuer)?,
        validation::topic_selection(topics)?,
    ))
}

fn not_found_as(err: StoreError, what: String) -> WorkflowError {
    if err.is_not_found() {
        WorkflowError::NotFound(what)
    } else {
        WorkflowError::Store(err)
    }
}
