//! End-to-end admin actions against the simulated registry and mirror.

use claimsync_core::core_chain::{RecordedCall, RegistryCall};
use claimsync_core::core_model::{Address, IdentityProfile, TopicId, ValidationError};
use claimsync_core::core_store::{classes, Filter, FromRecord, RecordStore};
use claimsync_core::core_sync::{NewIdentity, NoticeStatus, SyncStage, WorkflowError};
use claimsync_core::simulation::SimulatedEnvironment;
use claimsync_core::test_utils::*;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::time::Duration;

fn calls_of(calls: &[RecordedCall]) -> Vec<RegistryCall> {
    calls.iter().map(|c| c.call.clone()).collect()
}

fn new_identity(name: &str, wallet: Address, from_pending: bool) -> NewIdentity {
    NewIdentity {
        display_name: name.to_string(),
        wallet_address: wallet.to_string(),
        account_number: "ACC-001".to_string(),
        from_pending,
    }
}

async fn mirrored_claims(env: &SimulatedEnvironment, owner: Address) -> Vec<TopicId> {
    let key = Filter::new().eq(classes::fields::ADDRESS, owner.to_string());
    let record = env
        .store
        .get_record(classes::IDENTITY, &key)
        .await
        .unwrap()
        .expect("identity row");
    let mut claims = IdentityProfile::from_record(&record).unwrap().claims;
    claims.sort();
    claims
}

#[tokio::test(start_paused = true)]
async fn test_first_claim_topic_gets_id_one() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();
    let mut notices = workflow.notices().subscribe();

    let report = workflow.create_claim_topic("KYC Tier 1").await.unwrap();
    assert_eq!(report.value.topic, TopicId(1));
    assert_eq!(report.stage, SyncStage::MirrorConfirmed);
    assert_eq!(report.transactions.len(), 1);

    let calls = calls_of(&env.registry.calls());
    assert_eq!(
        calls.last(),
        Some(&RegistryCall::AddClaimTopic { topic: TopicId(1) })
    );

    let row = env
        .store
        .get_record(
            classes::CLAIM_TOPIC,
            &Filter::new().eq(classes::fields::TOPIC, "1"),
        )
        .await
        .unwrap()
        .expect("claim topic row");
    assert_eq!(row.get_str(classes::fields::DISPLAY_NAME), Some("KYC Tier 1"));

    let seen = drain(&mut notices);
    let statuses: Vec<_> = seen.iter().map(|n| n.status).collect();
    assert_eq!(statuses, vec![NoticeStatus::Pending, NoticeStatus::Succeeded]);
    assert_eq!(seen[0].id, seen[1].id);
}

#[tokio::test(start_paused = true)]
async fn test_next_topic_id_follows_mirror_max() {
    let env = test_environment();
    for topic in ["1", "2", "3"] {
        env.store
            .insert(
                classes::CLAIM_TOPIC,
                fields(json!({
                    "topic": topic,
                    "displayName": format!("T{topic}"),
                    "active": true,
                })),
            )
            .await;
    }
    let workflow = env.workflow(admin_session()).unwrap();

    let report = workflow.create_claim_topic("Accredited").await.unwrap();
    assert_eq!(report.value.topic, TopicId(4));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_issuer_address_makes_no_calls() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();
    let mut notices = workflow.notices().subscribe();

    let err = workflow
        .create_trusted_issuer("Acme", "0x123", &[TopicId(1)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::InvalidAddress { .. })
    ));

    assert!(env.registry.calls().is_empty());
    assert!(env.store.function_calls().is_empty());
    assert_eq!(env.store.write_count(), 0);

    let seen = drain(&mut notices);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status, NoticeStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_issuer_without_topics_rejected() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();

    let err = workflow
        .create_trusted_issuer("Acme", &issuer_wallet().to_string(), &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::NoClaimTopics)
    ));
    assert_eq!(err.to_string(), "Assign at least 1 claim topic");
    assert!(env.registry.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wrong_role_is_unauthorized() {
    let env = test_environment();
    let workflow = env.workflow(issuer_session()).unwrap();

    let err = workflow.create_claim_topic("KYC").await.unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthorized(_)));
    assert!(env.registry.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_expired_session_is_rejected() {
    let env = test_environment();
    let session = TestSessionBuilder::new("late-admin")
        .with_role(claimsync_core::core_session::Role::CentralAuthority)
        .with_wallet(admin_wallet())
        .expires_in(ChronoDuration::minutes(-1))
        .build();
    let workflow = env.workflow(session).unwrap();

    let err = workflow.create_claim_topic("KYC").await.unwrap_err();
    assert!(matches!(err, WorkflowError::SessionExpired));
    assert!(env.registry.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_issuer_topics_replaced_on_update() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();
    workflow.create_claim_topic("KYC").await.unwrap();
    workflow.create_claim_topic("AML").await.unwrap();
    let issuer = issuer_wallet().to_string();

    workflow
        .create_trusted_issuer("Acme Verify", &issuer, &[TopicId(1)])
        .await
        .unwrap();
    let report = workflow
        .update_trusted_issuer("Acme Verify", &issuer, &[TopicId(1), TopicId(2)])
        .await
        .unwrap();
    assert_eq!(report.value.topics(), vec![TopicId(1), TopicId(2)]);

    let issuers = workflow.queries().trusted_issuers().await.unwrap();
    assert_eq!(issuers.len(), 1);
    let mirrored = &issuers[0].value;
    assert_eq!(mirrored.verifier_name, "Acme Verify");
    let mut topics = mirrored.topics();
    topics.sort();
    assert_eq!(topics, vec![TopicId(1), TopicId(2)]);
    let now = Utc::now();
    assert!(mirrored.claim_topics.iter().all(|g| g.timestamp <= now));

    let for_topic = workflow
        .queries()
        .trusted_issuers_for_topic(TopicId(2))
        .await
        .unwrap();
    assert_eq!(for_topic.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_remove_trusted_issuer_deactivates_row() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();
    workflow.create_claim_topic("KYC").await.unwrap();
    let issuer = issuer_wallet().to_string();
    workflow
        .create_trusted_issuer("Acme", &issuer, &[TopicId(1)])
        .await
        .unwrap();

    workflow.remove_trusted_issuer(&issuer).await.unwrap();
    assert!(workflow.queries().trusted_issuers().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_identity_lookup_gives_up() {
    let env = test_environment();
    env.registry.set_identity_read_delay(100);
    let workflow = env.workflow(admin_session()).unwrap();
    let owner = Address::from_low_u64(0xa11ce);

    let err = workflow
        .create_digital_identity(new_identity("Alice Smith", owner, false))
        .await
        .unwrap_err();
    match err {
        WorkflowError::IdentityNotFound { owner: o, attempts } => {
            assert_eq!(o, owner);
            assert_eq!(attempts, 5);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Deployed but never registered.
    assert_eq!(
        calls_of(&env.registry.calls()),
        vec![RegistryCall::CreateIdentity { owner }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_identity_created_from_pending_signup() {
    let env = test_environment();
    env.registry.set_identity_read_delay(2);
    let owner = Address::from_low_u64(0xa11ce);
    seed_pending_user(&env.store, owner, "alice").await;
    let workflow = env.workflow(admin_session()).unwrap();

    assert_eq!(workflow.queries().pending_identities().await.unwrap().len(), 1);

    let report = workflow
        .create_digital_identity(new_identity("Alice Smith", owner, true))
        .await
        .unwrap();
    assert!(report.value.approved_user);
    assert!(!report.value.identity.is_zero());
    assert_eq!(report.transactions.len(), 2);

    let calls = calls_of(&env.registry.calls());
    assert_eq!(
        calls,
        vec![
            RegistryCall::CreateIdentity { owner },
            RegistryCall::AddIdentity {
                owner,
                identity: report.value.identity
            },
        ]
    );

    let active = workflow.queries().active_identities().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].profile.value.display_name, "Alice Smith");
    assert!(active[0].watchlist_matched);
    assert!(workflow.queries().pending_identities().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_edit_claims_applies_minimal_diff() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();
    for name in ["KYC", "AML", "Accredited"] {
        workflow.create_claim_topic(name).await.unwrap();
    }
    let owner = Address::from_low_u64(0xb0b);
    workflow
        .create_digital_identity(new_identity("Bob Jones", owner, false))
        .await
        .unwrap();

    let first = workflow
        .edit_claims(&owner.to_string(), &[TopicId(1), TopicId(2)])
        .await
        .unwrap();
    assert!(first.value.removed.is_empty());
    assert_eq!(first.value.added, vec![TopicId(1), TopicId(2)]);

    let before = env.registry.calls().len();
    let second = workflow
        .edit_claims(&owner.to_string(), &[TopicId(2), TopicId(3)])
        .await
        .unwrap();
    assert_eq!(second.value.removed, vec![TopicId(1)]);
    assert_eq!(second.value.added, vec![TopicId(3)]);
    assert!(!second.value.nothing_added);

    let edit_calls = calls_of(&env.registry.calls()[before..]);
    assert_eq!(
        edit_calls,
        vec![
            RegistryCall::RemoveClaim {
                owner,
                topic: TopicId(1)
            },
            RegistryCall::SetClaims {
                owner,
                topics: vec![TopicId(3)]
            },
        ]
    );

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(mirrored_claims(&env, owner).await, vec![TopicId(2), TopicId(3)]);
}

#[tokio::test(start_paused = true)]
async fn test_edit_claims_with_same_selection_is_a_no_op() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();
    workflow.create_claim_topic("KYC").await.unwrap();
    let owner = Address::from_low_u64(0xc0de);
    workflow
        .create_digital_identity(new_identity("Carol", owner, false))
        .await
        .unwrap();
    workflow
        .edit_claims(&owner.to_string(), &[TopicId(1)])
        .await
        .unwrap();

    let before = env.registry.calls().len();
    let report = workflow
        .edit_claims(&owner.to_string(), &[TopicId(1)])
        .await
        .unwrap();
    assert!(report.value.nothing_added);
    assert!(report.value.removed.is_empty());
    assert_eq!(env.registry.calls().len(), before);
}

#[tokio::test(start_paused = true)]
async fn test_edit_claims_for_unknown_identity() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();
    let owner = Address::from_low_u64(0xdead);

    let err = workflow
        .edit_claims(&owner.to_string(), &[TopicId(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
    assert!(env.registry.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_issuer_adds_single_claim() {
    let env = test_environment();
    let admin = env.workflow(admin_session()).unwrap();
    admin.create_claim_topic("KYC").await.unwrap();
    let owner = Address::from_low_u64(0xd00d);
    admin
        .create_digital_identity(new_identity("Dana", owner, false))
        .await
        .unwrap();

    let issuer = env.workflow(issuer_session()).unwrap();
    issuer.add_claim(&owner.to_string(), TopicId(1)).await.unwrap();
    assert!(env.chain.has_claim(owner, TopicId(1)).await.unwrap());

    issuer
        .remove_claim(&owner.to_string(), TopicId(1))
        .await
        .unwrap();
    assert!(!env.chain.has_claim(owner, TopicId(1)).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_custodial_remove_identity_phases() {
    let env = test_environment();
    let workflow = env.workflow(managed_admin_session()).unwrap();
    let owner = Address::from_low_u64(0xe1e);

    let started = tokio::time::Instant::now();
    let report = workflow.remove_identity(&owner.to_string()).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(450));
    assert_eq!(report.value, owner);
    assert_eq!(report.receipts().len(), 2);

    let names: Vec<String> = env
        .store
        .function_calls()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(
        names,
        vec![
            "dfnsRemoveIdentityInit",
            "dfnsRemoveIdentityComplete",
            "dfnsUnregisterIdentityInit",
            "dfnsUnregisterIdentityComplete",
        ]
    );
    // Signed through custody, never directly.
    assert!(env.registry.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_chain_revert_reason_reaches_notice() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();
    let mut notices = workflow.notices().subscribe();
    env.registry.revert_next("caller is not an agent");

    let err = workflow.create_claim_topic("KYC").await.unwrap_err();
    assert_eq!(err.reason(), Some("caller is not an agent"));

    let seen = drain(&mut notices);
    let last = seen.last().expect("notice");
    assert_eq!(last.status, NoticeStatus::Failed);
    assert_eq!(last.message, "caller is not an agent");
    assert!(env
        .store
        .get_record(
            classes::CLAIM_TOPIC,
            &Filter::new().eq(classes::fields::TOPIC, "1")
        )
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_lagging_mirror_is_journaled_then_reconciled() {
    let lag = Duration::from_secs(3600);
    let env = SimulatedEnvironment::start(fast_settings(), lag, "dfns");
    let workflow = env.workflow(admin_session()).unwrap();
    let mut notices = workflow.notices().subscribe();

    let err = workflow.create_claim_topic("KYC Tier 1").await.unwrap_err();
    match &err {
        WorkflowError::MirrorConsistency {
            class,
            attempts,
            receipts,
            ..
        } => {
            assert_eq!(class, classes::CLAIM_TOPIC);
            assert_eq!(*attempts, 3);
            assert_eq!(receipts.len(), 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    // The chain write stands.
    assert_eq!(env.chain.get_claim_topics().await.unwrap(), vec![TopicId(1)]);
    assert_eq!(workflow.journal().len(), 1);
    let seen = drain(&mut notices);
    assert_eq!(seen.last().map(|n| n.status), Some(NoticeStatus::Failed));

    tokio::time::sleep(lag + Duration::from_secs(1)).await;

    let summary = workflow.reconcile().await.unwrap().value;
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.remaining, 0);
    assert!(workflow.journal().is_empty());

    let topics = workflow.queries().claim_topics().await.unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].value.display_name, "KYC Tier 1");
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_keeps_entries_that_still_fail() {
    let lag = Duration::from_secs(3600);
    let env = SimulatedEnvironment::start(fast_settings(), lag, "dfns");
    let workflow = env.workflow(admin_session()).unwrap();

    workflow.create_claim_topic("KYC").await.unwrap_err();
    let summary = workflow.reconcile().await.unwrap();
    assert_eq!(summary.value.applied, 0);
    assert_eq!(summary.value.remaining, 1);
    assert_eq!(summary.stage, SyncStage::MirrorFailed);
    assert_eq!(workflow.journal().entries()[0].attempts, 4);
}

#[tokio::test(start_paused = true)]
async fn test_deny_pending_signup() {
    let env = test_environment();
    let wallet = Address::from_low_u64(0xf00);
    seed_pending_user(&env.store, wallet, "frank").await;
    let workflow = env.workflow(admin_session()).unwrap();

    workflow
        .deny_pending_identity(&wallet.to_string())
        .await
        .unwrap();
    assert!(workflow.queries().pending_identities().await.unwrap().is_empty());

    let missing = Address::from_low_u64(0xf01);
    let err = workflow
        .approve_pending_identity(&missing.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_mint_and_rename() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();
    workflow.create_claim_topic("KYC").await.unwrap();

    let renamed = workflow
        .rename_claim_topic(TopicId(1), "KYC Basic")
        .await
        .unwrap();
    assert_eq!(renamed.value.display_name, "KYC Basic");
    assert!(renamed.transactions.is_empty());

    let err = workflow
        .rename_claim_topic(TopicId(9), "Nope")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));

    workflow
        .mint(vec![claimsync_core::core_model::MintAttribute {
            key: "tier".to_string(),
            value: "gold".to_string(),
        }])
        .await
        .unwrap();
    assert_eq!(env.registry.minted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_identity_name_allows_punctuation() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();
    let owner = Address::from_low_u64(0x0b71);

    let report = workflow
        .create_digital_identity(new_identity("Alice O'Brien-Smith", owner, false))
        .await
        .unwrap();
    assert_eq!(report.value.owner, owner);

    let active = workflow.queries().active_identities().await.unwrap();
    assert_eq!(active[0].profile.value.display_name, "Alice O'Brien-Smith");
}

#[tokio::test(start_paused = true)]
async fn test_blank_identity_name_rejected() {
    let env = test_environment();
    let workflow = env.workflow(admin_session()).unwrap();

    let err = workflow
        .create_digital_identity(new_identity("   ", Address::from_low_u64(0x0b72), false))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Validation(ValidationError::Required {
            field: "Display Name"
        })
    ));
    assert!(env.registry.calls().is_empty());
}
