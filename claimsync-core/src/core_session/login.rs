//! Credential exchange against the backend's login endpoint.

use super::errors::{SessionError, SessionResult};
use super::session::{LoginResponse, Session};
use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Text the user's wallet signs to prove ownership.
pub fn challenge_message(nonce: &str) -> String {
    format!(
        "Sign this message to validate that you are the owner of the account. \
         Random string: {nonce}"
    )
}

pub fn random_nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect()
}

pub struct LoginClient {
    client: Client,
    login_url: String,
    default_ttl: Duration,
}

impl LoginClient {
    pub fn new(
        server_url: &str,
        request_timeout: Duration,
        default_ttl: Duration,
    ) -> SessionResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            login_url: format!("{}/auth/login", server_url.trim_end_matches('/')),
            default_ttl,
        })
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    pub async fn login_with_password(
        &self,
        username: &str,
        password: &str,
    ) -> SessionResult<Session> {
        self.login(json!({ "username": username, "password": password }))
            .await
    }

    /// Log in with a signature over [`challenge_message`].
    pub async fn login_with_signature(
        &self,
        message: &str,
        signature: &str,
    ) -> SessionResult<Session> {
        self.login(json!({ "message": message, "signature": signature }))
            .await
    }

    async fn login(&self, body: Value) -> SessionResult<Session> {
        let response = self.client.post(&self.login_url).json(&body).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(%status, "login refused");
            return Err(SessionError::Unauthorized(status.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SessionError::Transport(format!("{status}: {text}")));
        }

        let parsed: LoginResponse = response
            .json()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))?;
        let session = Session::from_login(parsed, Utc::now(), self.default_ttl)?;
        info!(username = %session.user.username, roles = session.roles.len(), "login succeeded");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_shape() {
        let nonce = random_nonce();
        assert_eq!(nonce.len(), 10);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(challenge_message(&nonce).ends_with(&nonce));
    }

    #[test]
    fn test_login_url() {
        let client = LoginClient::new(
            "https://api.example/",
            Duration::from_secs(5),
            Duration::from_secs(3600),
        )
        .unwrap();
        assert_eq!(client.login_url(), "https://api.example/auth/login");
    }

    mod backend {
        use super::*;
        use crate::core_session::Role;
        use axum::http::StatusCode as Status;
        use axum::routing::post;
        use axum::{Json, Router};
        use secrecy::ExposeSecret;
        use tokio::net::TcpListener;

        const EXPIRES_MS: i64 = 4_102_444_800_000;

        fn granted(username: &str, roles: &[&str]) -> (Status, Json<Value>) {
            let body = json!({
                "access_token": "jwt",
                "tokenExpiration": EXPIRES_MS,
                "user": { "objectId": "u1", "username": username, "roles": roles },
            });
            (Status::OK, Json(body))
        }

        async fn auth_login(Json(body): Json<Value>) -> (Status, Json<Value>) {
            if body["signature"] == "0xsig" {
                return granted("signer", &["TrustedIssuer"]);
            }
            match (body["username"].as_str(), body["password"].as_str()) {
                (Some("ca"), Some("hunter2")) => granted("ca", &["CentralAuthority"]),
                (Some("nobody"), Some("hunter2")) => granted("nobody", &[]),
                (Some("locked"), _) => (Status::FORBIDDEN, Json(json!({}))),
                (Some("broken"), _) => (Status::INTERNAL_SERVER_ERROR, Json(json!("db down"))),
                _ => (Status::UNAUTHORIZED, Json(json!({ "error": "bad credentials" }))),
            }
        }

        async fn spawn_backend() -> LoginClient {
            let router = Router::new().route("/auth/login", post(auth_login));
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });
            LoginClient::new(
                &format!("http://{addr}"),
                Duration::from_secs(5),
                Duration::from_secs(3600),
            )
            .unwrap()
        }

        #[tokio::test]
        async fn test_password_login_builds_session() {
            let client = spawn_backend().await;
            let session = client.login_with_password("ca", "hunter2").await.unwrap();
            assert_eq!(session.user.username, "ca");
            assert_eq!(session.roles, vec![Role::CentralAuthority]);
            assert_eq!(session.access_token().expose_secret(), "jwt");
            assert_eq!(session.expires_at.timestamp_millis(), EXPIRES_MS);
        }

        #[tokio::test]
        async fn test_signature_login() {
            let client = spawn_backend().await;
            let message = challenge_message(&random_nonce());
            let session = client.login_with_signature(&message, "0xsig").await.unwrap();
            assert_eq!(session.roles, vec![Role::TrustedIssuer]);
        }

        #[tokio::test]
        async fn test_refusals_are_unauthorized() {
            let client = spawn_backend().await;
            for (username, password) in [("ca", "wrong"), ("locked", "hunter2")] {
                let err = client.login_with_password(username, password).await.unwrap_err();
                assert!(matches!(err, SessionError::Unauthorized(_)), "{username}: {err}");
            }
            // Accepted credentials without any role still yield no session.
            let err = client.login_with_password("nobody", "hunter2").await.unwrap_err();
            assert!(matches!(err, SessionError::Unauthorized(_)));
        }

        #[tokio::test]
        async fn test_server_error_is_transport() {
            let client = spawn_backend().await;
            let err = client.login_with_password("broken", "x").await.unwrap_err();
            match err {
                SessionError::Transport(message) => {
                    assert!(message.starts_with("500"));
                    assert!(message.contains("db down"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
