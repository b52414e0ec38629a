//! Domain model shared by the registry client, the custody client and the
//! off-chain mirror.
//!
//! Everything here is plain data. Addresses are parsed once at the edge and
//! carried around as [`Address`]; claim topics are [`TopicId`] integers that
//! render as decimal strings when they hit the mirror.

mod address;
mod entities;
pub mod validation;

pub use address::{Address, AddressError};
pub use entities::{
    ActiveIdentity, ClaimData, ClaimEventRecord, ClaimTopic, DigitalIdentity, IdentityClaimView,
    IdentityProfile, Mirrored, MintAttribute, PendingIdentity, TopicGrant, TopicId, TrustedIssuer,
};
pub use validation::ValidationError;
