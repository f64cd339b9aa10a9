//! Account service trait.
//!
//! Defines the interface to the remote authentication service.

use super::model::{Account, Session, SessionChange};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// An abstract remote account/authentication service.
///
/// This trait decouples the session controller from the concrete identity
/// provider (hosted auth API, in-memory emulation, ...).
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Creates an account.
    ///
    /// # Arguments
    ///
    /// * `email` - Sign-in email
    /// * `password` - Sign-in password
    /// * `metadata` - Out-of-band user metadata (e.g. `full_name`)
    ///
    /// # Returns
    ///
    /// - `Ok(Account)`: Account created
    /// - `Err(_)`: The service refused the request or could not be reached
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<Account>;

    /// Signs in with email and password.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session>;

    /// Ends the current session.
    async fn end_session(&self) -> Result<()>;

    /// Returns the currently valid session, if one exists.
    async fn current_session(&self) -> Option<Session>;

    /// Registers a listener for session changes.
    ///
    /// Notifications are delivered in the order the service emits them. The
    /// registration lasts until the returned subscription is dropped.
    fn subscribe(&self) -> SessionSubscription;
}

/// A registered session-change listener.
///
/// Dropping the subscription unregisters it from the service.
pub struct SessionSubscription {
    receiver: mpsc::UnboundedReceiver<SessionChange>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SessionSubscription {
    /// Wraps a receiver together with the action that unregisters it.
    pub fn new(
        receiver: mpsc::UnboundedReceiver<SessionChange>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            release: Some(Box::new(release)),
        }
    }

    /// Waits for the next notification. `None` once the service has gone away.
    pub async fn next(&mut self) -> Option<SessionChange> {
        self.receiver.recv().await
    }

    /// Returns a notification that is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<SessionChange> {
        self.receiver.try_recv().ok()
    }

    /// Unregisters the listener now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for SessionSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSubscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}
