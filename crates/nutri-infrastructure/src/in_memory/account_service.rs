//! Local account service.
//!
//! Keeps accounts in memory and emits the same notifications a hosted auth
//! service would, for development and tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use nutri_core::error::{NutriError, Result};
use nutri_core::session::{
    Account, AccountService, Session, SessionBroadcaster, SessionChange, SessionSubscription,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;
const SESSION_LIFETIME_HOURS: i64 = 1;

struct StoredAccount {
    account: Account,
    password: String,
    metadata: Map<String, Value>,
}

#[derive(Default)]
struct Inner {
    // keyed by lowercase email
    accounts: HashMap<String, StoredAccount>,
    current: Option<Session>,
}

/// In-memory [`AccountService`].
pub struct InMemoryAccountService {
    inner: Mutex<Inner>,
    broadcaster: SessionBroadcaster,
    sign_in_on_create: bool,
}

impl Default for InMemoryAccountService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccountService {
    /// Creates an empty service that signs new accounts in immediately.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            broadcaster: SessionBroadcaster::new(),
            sign_in_on_create: true,
        }
    }

    /// Whether `create_account` also starts a session, as a service without
    /// email confirmation does.
    pub fn with_sign_in_on_create(mut self, enabled: bool) -> Self {
        self.sign_in_on_create = enabled;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn issue_session(stored: &StoredAccount) -> Session {
        let mut session = Session::new(&stored.account.user_id, &stored.account.email)
            .with_access_token(Uuid::new_v4().simple().to_string());
        session.metadata = stored.metadata.clone();
        session.expires_at = Some(Utc::now() + Duration::hours(SESSION_LIFETIME_HOURS));
        session
    }

    /// Installs `session` as the stored session without notifying, the way a
    /// persisted token is found on startup.
    pub fn restore(&self, session: Session) {
        self.lock().current = Some(session);
    }

    /// Issues a new access token for the current session.
    pub fn refresh(&self) -> Option<Session> {
        let refreshed = {
            let mut inner = self.lock();
            let session = inner.current.as_mut()?;
            session.access_token = Some(Uuid::new_v4().simple().to_string());
            session.expires_at = Some(Utc::now() + Duration::hours(SESSION_LIFETIME_HOURS));
            session.clone()
        };
        self.broadcaster
            .publish(SessionChange::TokenRefreshed(refreshed.clone()));
        Some(refreshed)
    }

    /// Invalidates the current session as the service would on expiry.
    pub fn expire(&self) {
        if self.lock().current.take().is_some() {
            self.broadcaster.publish(SessionChange::Expired);
        }
    }

    pub fn account_count(&self) -> usize {
        self.lock().accounts.len()
    }

    pub fn listener_count(&self) -> usize {
        self.broadcaster.listener_count()
    }
}

#[async_trait]
impl AccountService for InMemoryAccountService {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<Account> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(NutriError::auth(format!("Invalid email address: {}", email)));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(NutriError::auth(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let (account, session) = {
            let mut inner = self.lock();
            let key = email.to_lowercase();
            if inner.accounts.contains_key(&key) {
                return Err(NutriError::auth("User already registered"));
            }

            let stored = StoredAccount {
                account: Account {
                    user_id: Uuid::new_v4().to_string(),
                    email: email.to_string(),
                    created_at: Some(Utc::now()),
                },
                password: password.to_string(),
                metadata,
            };
            let account = stored.account.clone();
            let session = self.sign_in_on_create.then(|| Self::issue_session(&stored));
            inner.accounts.insert(key, stored);
            if let Some(session) = &session {
                inner.current = Some(session.clone());
            }
            (account, session)
        };

        tracing::debug!(user_id = %account.user_id, "Created in-memory account");
        if let Some(session) = session {
            self.broadcaster.publish(SessionChange::SignedIn(session));
        }
        Ok(account)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        let session = {
            let mut inner = self.lock();
            let stored = inner
                .accounts
                .get(&email.trim().to_lowercase())
                .filter(|stored| stored.password == password)
                .ok_or_else(|| NutriError::auth("Invalid login credentials"))?;
            let session = Self::issue_session(stored);
            inner.current = Some(session.clone());
            session
        };

        self.broadcaster
            .publish(SessionChange::SignedIn(session.clone()));
        Ok(session)
    }

    async fn end_session(&self) -> Result<()> {
        self.lock().current = None;
        self.broadcaster.publish(SessionChange::SignedOut);
        Ok(())
    }

    async fn current_session(&self) -> Option<Session> {
        let mut inner = self.lock();
        if inner
            .current
            .as_ref()
            .is_some_and(|s| s.is_expired(Utc::now()))
        {
            inner.current = None;
        }
        inner.current.clone()
    }

    fn subscribe(&self) -> SessionSubscription {
        self.broadcaster.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(name: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("full_name".to_string(), json!(name));
        map
    }

    #[tokio::test]
    async fn test_create_then_authenticate() {
        let service = InMemoryAccountService::new().with_sign_in_on_create(false);
        let account = service
            .create_account("Jane@Example.com", "secret1", metadata("Jane"))
            .await
            .unwrap();
        assert!(service.current_session().await.is_none());

        let session = service
            .authenticate("jane@example.com", "secret1")
            .await
            .unwrap();
        assert_eq!(session.user_id, account.user_id);
        assert_eq!(session.metadata_display_name(), Some("Jane"));
        assert!(session.access_token.is_some());
        assert_eq!(service.current_session().await, Some(session));
    }

    #[tokio::test]
    async fn test_rejects_bad_credentials_and_duplicates() {
        let service = InMemoryAccountService::new();
        service
            .create_account("a@x.com", "secret1", Map::new())
            .await
            .unwrap();

        let err = service.authenticate("a@x.com", "wrong").await.unwrap_err();
        assert!(err.is_auth());
        let err = service
            .create_account("A@x.com", "secret1", Map::new())
            .await
            .unwrap_err();
        assert!(err.is_auth());
        let err = service
            .create_account("b@x.com", "123", Map::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least"));
        assert_eq!(service.account_count(), 1);
    }

    #[tokio::test]
    async fn test_notifications_follow_lifecycle() {
        let service = InMemoryAccountService::new();
        let mut subscription = service.subscribe();

        service
            .create_account("a@x.com", "secret1", Map::new())
            .await
            .unwrap();
        assert_eq!(subscription.try_next().unwrap().kind(), "signed_in");

        service.refresh().unwrap();
        assert_eq!(subscription.try_next().unwrap().kind(), "token_refreshed");

        service.end_session().await.unwrap();
        assert_eq!(subscription.try_next(), Some(SessionChange::SignedOut));
        assert!(service.current_session().await.is_none());

        service.expire();
        assert!(subscription.try_next().is_none());

        drop(subscription);
        assert_eq!(service.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_session_is_not_restored() {
        let service = InMemoryAccountService::new();
        let mut session = Session::new("u1", "a@x.com");
        session.expires_at = Some(Utc::now() - Duration::minutes(1));
        service.restore(session);
        assert!(service.current_session().await.is_none());
    }
}
