//! Account service over the hosted auth API.

use super::{AccessToken, RestBackend, transport_error};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use nutri_core::error::{NutriError, Result};
use nutri_core::session::{
    Account, AccountService, Session, SessionBroadcaster, SessionChange, SessionSubscription,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::sync::{Mutex, MutexGuard};

const AUTH_PATH: &str = "/auth/v1";

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Map<String, Value>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUser,
}

/// Sign-up answers with a session when no confirmation is required, and
/// with the bare user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(AuthUser),
}

/// The auth API uses several error shapes.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl AuthErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

/// [`AccountService`] backed by the hosted auth API.
///
/// The current session is kept in memory; its token is published to the
/// shared [`AccessToken`] for the other adapters.
pub struct RestAccountService {
    backend: RestBackend,
    token: AccessToken,
    current: Mutex<Option<Session>>,
    broadcaster: SessionBroadcaster,
}

impl RestAccountService {
    pub fn new(backend: RestBackend, token: AccessToken) -> Self {
        Self {
            backend,
            token,
            current: Mutex::new(None),
            broadcaster: SessionBroadcaster::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Installs a previously persisted session without notifying.
    pub fn restore(&self, session: Session) {
        self.token.set(session.access_token.clone());
        *self.lock() = Some(session);
    }

    fn install(&self, session: Session) {
        self.restore(session.clone());
        self.broadcaster.publish(SessionChange::SignedIn(session));
    }

    fn auth_url(&self, path: &str) -> String {
        self.backend.url(&format!("{}{}", AUTH_PATH, path))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<T> {
        let request = self
            .backend
            .authorize(self.backend.client.post(self.auth_url(path)), bearer)
            .json(body);
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(auth_failure(status, &text));
        }
        serde_json::from_str(&text).map_err(NutriError::from)
    }
}

fn auth_failure(status: StatusCode, body: &str) -> NutriError {
    let message = serde_json::from_str::<AuthErrorBody>(body)
        .ok()
        .and_then(AuthErrorBody::into_message)
        .unwrap_or_else(|| status.to_string());
    if status.is_client_error() {
        NutriError::auth(message)
    } else {
        NutriError::transport(format!("{}: {}", status, message))
    }
}

fn account_from(user: &AuthUser, fallback_email: &str) -> Account {
    Account {
        user_id: user.id.clone(),
        email: user.email.clone().unwrap_or_else(|| fallback_email.to_string()),
        created_at: user.created_at,
    }
}

fn session_from(response: TokenResponse, fallback_email: &str) -> Session {
    let account = account_from(&response.user, fallback_email);
    let mut session =
        Session::new(account.user_id, account.email).with_access_token(response.access_token);
    session.metadata = response.user.user_metadata;
    session.expires_at = response
        .expires_in
        .map(|secs| Utc::now() + Duration::seconds(secs));
    session
}

#[async_trait]
impl AccountService for RestAccountService {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<Account> {
        let body = json!({ "email": email, "password": password, "data": metadata });
        let response: SignUpResponse = self.post("/signup", &body, None).await?;

        match response {
            SignUpResponse::Session(tokens) => {
                let account = account_from(&tokens.user, email);
                self.install(session_from(tokens, email));
                Ok(account)
            }
            SignUpResponse::User(user) => {
                tracing::debug!(user_id = %user.id, "Account awaits confirmation");
                Ok(account_from(&user, email))
            }
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        let body = json!({ "email": email, "password": password });
        let tokens: TokenResponse = self
            .post("/token?grant_type=password", &body, None)
            .await?;
        let session = session_from(tokens, email);
        self.install(session.clone());
        Ok(session)
    }

    async fn end_session(&self) -> Result<()> {
        let Some(token) = self.token.get() else {
            *self.lock() = None;
            self.broadcaster.publish(SessionChange::SignedOut);
            return Ok(());
        };

        let response = self
            .backend
            .authorize(self.backend.client.post(self.auth_url("/logout")), Some(&token))
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        // an already invalid token still ends the local session
        let already_ended = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND);
        if !status.is_success() && !already_ended {
            let text = response.text().await.map_err(transport_error)?;
            return Err(auth_failure(status, &text));
        }

        self.token.set(None);
        *self.lock() = None;
        self.broadcaster.publish(SessionChange::SignedOut);
        Ok(())
    }

    async fn current_session(&self) -> Option<Session> {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|s| s.is_expired(Utc::now())) {
            tracing::debug!("Stored session expired");
            *current = None;
            self.token.set(None);
        }
        current.clone()
    }

    fn subscribe(&self) -> SessionSubscription {
        self.broadcaster.subscribe()
    }
}
