//! Class and field names of the mirror schema.

pub const CLAIM_TOPIC: &str = "ClaimTopic";
pub const TRUSTED_ISSUER: &str = "TrustedIssuer";
pub const IDENTITY: &str = "Identity";
pub const USER: &str = "_User";
pub const CLAIM_ADDED_EVENT: &str = "ClaimAdded__e";
pub const CLAIM_REMOVED_EVENT: &str = "ClaimRemoved__e";

pub mod fields {
    pub const OBJECT_ID: &str = "objectId";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";

    pub const TOPIC: &str = "topic";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const ACTIVE: &str = "active";

    pub const ISSUER: &str = "issuer";
    pub const VERIFIER_NAME: &str = "verifierName";
    pub const CLAIM_TOPICS: &str = "claimTopics";

    pub const ADDRESS: &str = "address";
    pub const IDENTITY: &str = "identity";
    pub const WALLET_ADDRESS: &str = "walletAddress";
    pub const ACCOUNT_NUMBER: &str = "accountNumber";
    pub const CLAIMS: &str = "claims";

    pub const CLAIM_TOPIC: &str = "claimTopic";
    pub const BLOCK_HASH: &str = "blockHash";
    pub const TRANSACTION_HASH: &str = "transactionHash";

    pub const PENDING_APPROVAL: &str = "pendingApproval";
    pub const DENIED: &str = "denied";
    pub const PERSONA_REFERENCE_ID: &str = "personaReferenceId";
    pub const PERSONA_VERIFICATION_DATA: &str = "personaVerificationData";
    pub const PEP_MATCHED: &str = "pepMatched";
    pub const WATCHLIST_MATCHED: &str = "watchlistMatched";
    pub const USERNAME: &str = "username";
}
