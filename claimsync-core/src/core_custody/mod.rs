//! Custody service client
//!
//! Used when the signed-in wallet is custodial: the service holds the key
//! and signs registry transactions after a challenge / response exchange.

mod client;
mod errors;
mod operation;
mod signer;

pub use client::{
    CustodialResponse, CustodialSigningClient, CustodyCredentials, Initiation,
    DEFAULT_FUNCTION_PREFIX,
};
pub use errors::CustodialError;
pub use operation::{payload_for, CustodialOperation};
pub use signer::{ChallengeSigner, CredentialSigner};
