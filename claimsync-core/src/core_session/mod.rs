//! Authenticated session
//!
//! A [`Session`] is created by [`LoginClient`], held by [`SessionStore`] and
//! cleared by [`AutoLogout`] once its token expires. Workflows take an
//! `Arc<Session>` snapshot and check it before each action.

mod auto_logout;
mod errors;
mod login;
mod session;
mod store;

pub use auto_logout::AutoLogout;
pub use errors::{SessionError, SessionResult};
pub use login::{challenge_message, random_nonce, LoginClient};
pub use session::{LoginResponse, Role, Session, SessionUser, WalletPreference};
pub use store::{SessionEvent, SessionStore};
