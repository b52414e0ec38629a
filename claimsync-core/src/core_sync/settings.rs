use super::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policies and delays used by [`SyncWorkflow`](super::SyncWorkflow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Display-name mirror after a new claim topic.
    pub claim_topic_mirror: RetryPolicy,
    /// Issuer mirror after add / update / remove.
    pub trusted_issuer_mirror: RetryPolicy,
    /// Factory polling for a freshly deployed identity contract.
    pub identity_lookup: RetryPolicy,
    /// Identity display data mirror.
    pub identity_mirror: RetryPolicy,
    /// Claim list mirror after an edit.
    pub claims_mirror: RetryPolicy,
    /// Pause between the two custodial removal calls.
    #[serde(with = "humantime_serde")]
    pub custodial_phase_delay: Duration,
    /// Pause after a custodial removal before results are read back.
    #[serde(with = "humantime_serde")]
    pub custodial_refresh_delay: Duration,
    /// Notices buffered per subscriber.
    pub notice_capacity: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            claim_topic_mirror: RetryPolicy::fixed(3, Duration::from_secs(2)),
            trusted_issuer_mirror: RetryPolicy::linear(
                10,
                Duration::from_secs(2),
                Duration::from_secs(10),
            ),
            identity_lookup: RetryPolicy::fixed(5, Duration::from_secs(1)),
            identity_mirror: RetryPolicy::linear(
                3,
                Duration::from_secs(4),
                Duration::from_secs(12),
            ),
            claims_mirror: RetryPolicy::fixed(3, Duration::from_secs(2)),
            custodial_phase_delay: Duration::from_secs(2),
            custodial_refresh_delay: Duration::from_millis(2500),
            notice_capacity: 64,
        }
    }
}

impl WorkflowSettings {
    /// Every policy with its name, for validation and display.
    pub fn policies(&self) -> [(&'static str, &RetryPolicy); 5] {
        [
            ("claim_topic_mirror", &self.claim_topic_mirror),
            ("trusted_issuer_mirror", &self.trusted_issuer_mirror),
            ("identity_lookup", &self.identity_lookup),
            ("identity_mirror", &self.identity_mirror),
            ("claims_mirror", &self.claims_mirror),
        ]
    }
}
