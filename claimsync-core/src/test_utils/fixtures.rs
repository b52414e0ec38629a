//! Test fixtures for sessions and simulated environments

use crate::core_model::Address;
use crate::core_session::{Role, Session, SessionUser, WalletPreference};
use crate::core_store::{Fields, MemoryRecordStore, Record};
use crate::core_sync::{RetryPolicy, WorkflowSettings};
use crate::simulation::SimulatedEnvironment;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::time::Duration;

/// Wallet used by the admin fixtures.
pub fn admin_wallet() -> Address {
    Address::from_low_u64(0xad)
}

/// Wallet used by the issuer fixtures.
pub fn issuer_wallet() -> Address {
    Address::from_low_u64(0x155)
}

/// Builder for test sessions
pub struct TestSessionBuilder {
    user: SessionUser,
    custody_token: Option<String>,
    ttl: ChronoDuration,
}

impl TestSessionBuilder {
    pub fn new(username: &str) -> Self {
        Self {
            user: SessionUser {
                id: format!("user-{username}"),
                username: username.to_string(),
                wallet_address: None,
                wallet_id: None,
                wallet_preference: WalletPreference::Private,
                roles: Vec::new(),
            },
            custody_token: None,
            ttl: ChronoDuration::hours(1),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.user.roles.push(role.as_str().to_string());
        self
    }

    pub fn with_wallet(mut self, wallet: Address) -> Self {
        self.user.wallet_address = Some(wallet);
        self
    }

    /// Managed wallet with custody credentials.
    pub fn managed(mut self, wallet_id: &str, token: &str) -> Self {
        self.user.wallet_preference = WalletPreference::Managed;
        self.user.wallet_id = Some(wallet_id.to_string());
        self.custody_token = Some(token.to_string());
        self
    }

    pub fn expires_in(mut self, ttl: ChronoDuration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn build(self) -> Session {
        let session = Session::new(self.user, "test-access-token", Utc::now() + self.ttl);
        match self.custody_token {
            Some(token) => session.with_custody_token(token),
            None => session,
        }
    }
}

/// Central authority signing with its own wallet.
pub fn admin_session() -> Session {
    TestSessionBuilder::new("admin")
        .with_role(Role::CentralAuthority)
        .with_wallet(admin_wallet())
        .build()
}

/// Central authority using the custody service.
pub fn managed_admin_session() -> Session {
    TestSessionBuilder::new("custodied-admin")
        .with_role(Role::CentralAuthority)
        .with_wallet(admin_wallet())
        .managed("wa-admin", "custody-token")
        .build()
}

/// Trusted issuer signing with its own wallet.
pub fn issuer_session() -> Session {
    TestSessionBuilder::new("issuer")
        .with_role(Role::TrustedIssuer)
        .with_wallet(issuer_wallet())
        .build()
}

/// Workflow settings with short fixed delays, for paused-clock tests.
pub fn fast_settings() -> WorkflowSettings {
    let quick = RetryPolicy::fixed(3, Duration::from_millis(100));
    WorkflowSettings {
        claim_topic_mirror: quick,
        trusted_issuer_mirror: quick,
        identity_lookup: RetryPolicy::fixed(5, Duration::from_millis(100)),
        identity_mirror: quick,
        claims_mirror: quick,
        custodial_phase_delay: Duration::from_millis(200),
        custodial_refresh_delay: Duration::from_millis(250),
        notice_capacity: 64,
    }
}

/// Simulated environment with an immediate indexer and fast retries.
pub fn test_environment() -> SimulatedEnvironment {
    SimulatedEnvironment::start(fast_settings(), Duration::ZERO, "dfns")
}

/// Turn a JSON object into record fields.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Seed a pending sign-up for `wallet`.
pub async fn seed_pending_user(store: &MemoryRecordStore, wallet: Address, name: &str) -> Record {
    store
        .insert(
            "_User",
            fields(json!({
                "username": name,
                "walletAddress": wallet.to_string(),
                "pendingApproval": true,
                "denied": false,
                "pepMatched": false,
                "watchlistMatched": true,
                "personaReferenceId": format!("inq_{name}"),
                "personaVerificationData": { "nameFirst": name },
            })),
        )
        .await
}
