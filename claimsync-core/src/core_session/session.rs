use super::errors::{SessionError, SessionResult};
use crate::core_custody::CustodyCredentials;
use crate::core_model::Address;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    CentralAuthority,
    TrustedIssuer,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::CentralAuthority => "CentralAuthority",
            Role::TrustedIssuer => "TrustedIssuer",
            Role::Other(name) => name,
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "CentralAuthority" => Role::CentralAuthority,
            "TrustedIssuer" => Role::TrustedIssuer,
            other => Role::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who holds the signing key for the user's wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WalletPreference {
    /// Custody service signs on the user's behalf.
    Managed,
    /// The user's own wallet signs.
    #[default]
    Private,
}

impl<'de> Deserialize<'de> for WalletPreference {
    // Backends send either the numeric code (0 managed, 1 private) or the name.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u8),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(0) => Ok(WalletPreference::Managed),
            Raw::Code(1) => Ok(WalletPreference::Private),
            Raw::Name(name) if name.eq_ignore_ascii_case("managed") => {
                Ok(WalletPreference::Managed)
            }
            Raw::Name(name) if name.eq_ignore_ascii_case("private") => {
                Ok(WalletPreference::Private)
            }
            _ => Err(serde::de::Error::custom("unknown wallet preference")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(default, alias = "objectId")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub wallet_address: Option<Address>,
    #[serde(default)]
    pub wallet_id: Option<String>,
    #[serde(default)]
    pub wallet_preference: WalletPreference,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Body of a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    /// Expiry as epoch milliseconds.
    #[serde(default, alias = "tokenExpiration")]
    pub token_expiration: Option<i64>,
    #[serde(default)]
    pub dfns_token: Option<String>,
    pub user: SessionUser,
}

/// Authenticated session snapshot.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: SessionUser,
    pub roles: Vec<Role>,
    pub wallet_preference: WalletPreference,
    pub expires_at: DateTime<Utc>,
    access_token: SecretString,
    custody_token: Option<SecretString>,
}

impl Session {
    pub fn new(
        user: SessionUser,
        access_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let roles = user.roles.iter().map(|r| Role::from(r.as_str())).collect();
        let wallet_preference = user.wallet_preference;
        Self {
            user,
            roles,
            wallet_preference,
            expires_at,
            access_token: SecretString::new(access_token.into()),
            custody_token: None,
        }
    }

    pub fn with_custody_token(mut self, token: impl Into<String>) -> Self {
        self.custody_token = Some(SecretString::new(token.into()));
        self
    }

    /// Build from a login response. A user without any role is refused.
    pub fn from_login(
        response: LoginResponse,
        now: DateTime<Utc>,
        default_ttl: Duration,
    ) -> SessionResult<Self> {
        if response.user.roles.is_empty() {
            return Err(SessionError::Unauthorized(format!(
                "user {} has no roles",
                response.user.username
            )));
        }

        let expires_at = match response.token_expiration {
            Some(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| SessionError::Decode(format!("invalid token expiration {ms}")))?,
            None => {
                let ttl = chrono::Duration::from_std(default_ttl)
                    .map_err(|e| SessionError::Decode(e.to_string()))?;
                now + ttl
            }
        };

        let mut session = Session::new(response.user, response.access_token, expires_at);
        if let Some(token) = response.dfns_token {
            session = session.with_custody_token(token);
        }
        Ok(session)
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Fails unless the session is live at `now` and holds one of `roles`.
    pub fn authorize(&self, roles: &[Role], now: DateTime<Utc>) -> SessionResult<()> {
        if self.is_expired_at(now) {
            return Err(SessionError::Expired);
        }
        if roles.iter().any(|r| self.has_role(r)) {
            return Ok(());
        }
        let wanted: Vec<&str> = roles.iter().map(Role::as_str).collect();
        Err(SessionError::Unauthorized(format!(
            "requires one of [{}]",
            wanted.join(", ")
        )))
    }

    pub fn custody_credentials(&self) -> SessionResult<CustodyCredentials> {
        let wallet_id = self
            .user
            .wallet_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingCustody("walletId"))?;
        let token = self
            .custody_token
            .as_ref()
            .ok_or(SessionError::MissingCustody("dfns_token"))?;
        Ok(CustodyCredentials::new(wallet_id, token.expose_secret().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(roles: serde_json::Value) -> LoginResponse {
        serde_json::from_value(json!({
            "access_token": "jwt",
            "tokenExpiration": 1_900_000_000_000_i64,
            "dfns_token": "dt",
            "user": {
                "objectId": "u1",
                "username": "ca@example.com",
                "walletAddress": "0x00000000000000000000000000000000000000ca",
                "walletId": "wa-1",
                "walletPreference": 0,
                "roles": roles,
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_from_login() {
        let session = Session::from_login(
            response(json!(["CentralAuthority"])),
            Utc::now(),
            Duration::from_secs(3600),
        )
        .unwrap();
        assert_eq!(session.user.id, "u1");
        assert_eq!(session.wallet_preference, WalletPreference::Managed);
        assert!(session.has_role(&Role::CentralAuthority));
        assert_eq!(session.expires_at.timestamp_millis(), 1_900_000_000_000);
        assert_eq!(session.custody_credentials().unwrap().wallet_id, "wa-1");
    }

    #[test]
    fn test_login_without_roles_is_unauthorized() {
        let err = Session::from_login(response(json!([])), Utc::now(), Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized(_)));
    }

    #[test]
    fn test_wallet_preference_names() {
        let pref: WalletPreference = serde_json::from_value(json!("PRIVATE")).unwrap();
        assert_eq!(pref, WalletPreference::Private);
        assert!(serde_json::from_value::<WalletPreference>(json!(7)).is_err());
    }

    #[test]
    fn test_authorize() {
        let now = Utc::now();
        let session = Session::from_login(
            response(json!(["TrustedIssuer"])),
            now,
            Duration::from_secs(60),
        )
        .unwrap();

        assert!(session.authorize(&[Role::TrustedIssuer], now).is_ok());
        assert!(matches!(
            session.authorize(&[Role::CentralAuthority], now),
            Err(SessionError::Unauthorized(_))
        ));
        assert_eq!(
            session.authorize(&[Role::TrustedIssuer], session.expires_at),
            Err(SessionError::Expired)
        );
    }

    #[test]
    fn test_missing_custody_token() {
        let user: SessionUser = serde_json::from_value(json!({"walletId": "wa"})).unwrap();
        let session = Session::new(user, "jwt", Utc::now());
        assert_eq!(
            session.custody_credentials().unwrap_err(),
            SessionError::MissingCustody("dfns_token")
        );
    }
}
