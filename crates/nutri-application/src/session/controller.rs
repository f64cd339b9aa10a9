use super::state::SessionSnapshot;
use crate::profile::ProfileSynchronizer;
use nutri_core::error::Result;
use nutri_core::profile::Profile;
use nutri_core::session::{Account, AccountService, Session, SessionChange};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Owns the current session and drives profile loading.
///
/// `SessionController` is responsible for:
/// - Restoring a previously issued session on startup
/// - Applying session-change notifications in order
/// - Loading the profile whenever a session is established
/// - Delegating register/login/logout to the account service
///
/// All state lives in one `watch` channel; this type is its only writer.
#[derive(Clone)]
pub struct SessionController {
    accounts: Arc<dyn AccountService>,
    synchronizer: Arc<ProfileSynchronizer>,
    state: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionController {
    /// Creates a controller in the initial loading state.
    pub fn new(accounts: Arc<dyn AccountService>, synchronizer: Arc<ProfileSynchronizer>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::initial());
        Self {
            accounts,
            synchronizer,
            state: Arc::new(state),
        }
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Returns a receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Restores any currently valid session and settles its profile load.
    ///
    /// Returns once loading is finished. A failed profile load is logged and
    /// swallowed; the loading flag is cleared either way.
    pub async fn bootstrap(&self) {
        match self.accounts.current_session().await {
            Some(session) => {
                let user_id = session.user_id.clone();
                tracing::info!(user_id = %user_id, "Restored session on startup");
                let generation = self.install(session);
                self.load_profile(user_id, generation).await;
            }
            None => {
                tracing::debug!("No session to restore");
                // A notification may have installed a session meanwhile; it wins.
                self.state.send_if_modified(|s| {
                    if s.session.is_some() {
                        return false;
                    }
                    s.clear();
                    true
                });
            }
        }
    }

    /// Starts processing session-change notifications.
    ///
    /// Notifications are handled one at a time, in delivery order, on a
    /// dedicated task. The subscription is released when the returned
    /// listener is dropped or shut down.
    pub fn listen(&self) -> SessionListener {
        let mut subscription = self.accounts.subscribe();
        let controller = self.clone();
        let task = tokio::spawn(async move {
            while let Some(change) = subscription.next().await {
                controller.handle_session_change(change);
            }
            tracing::debug!("Session change stream closed");
        });
        SessionListener { task }
    }

    /// Applies one notification.
    ///
    /// A notification carrying a session installs it and spawns a profile
    /// load, whose handle is returned. One without a session clears state.
    pub fn handle_session_change(&self, change: SessionChange) -> Option<JoinHandle<()>> {
        let kind = change.kind();
        match change.into_session() {
            Some(session) => {
                let user_id = session.user_id.clone();
                tracing::info!(user_id = %user_id, kind, "Session established");
                let generation = self.install(session);

                let controller = self.clone();
                Some(tokio::spawn(async move {
                    controller.load_profile(user_id, generation).await;
                }))
            }
            None => {
                tracing::info!(kind, "Session ended");
                self.state.send_modify(SessionSnapshot::clear);
                None
            }
        }
    }

    // Installs `session` and returns the generation its profile load runs under.
    fn install(&self, session: Session) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.install(session);
            generation = s.generation;
        });
        generation
    }

    /// Loads the profile for `user_id` and applies it if nothing replaced
    /// the session or the profile since the load started.
    ///
    /// A newer session for the same user runs its own load, and a saved
    /// profile already settled the loading flag, so a superseded load
    /// changes nothing.
    async fn load_profile(&self, user_id: String, generation: u64) {
        let result = self.synchronizer.load(&user_id).await;

        let applied = self.state.send_if_modified(|s| {
            if s.generation != generation || s.user_id() != Some(user_id.as_str()) {
                return false;
            }
            if let Ok(profile) = &result {
                s.profile = profile.clone();
            }
            s.is_loading = false;
            true
        });

        match (&result, applied) {
            (_, false) => {
                tracing::debug!(user_id = %user_id, generation, "Discarding stale profile load");
            }
            (Ok(profile), true) => {
                tracing::debug!(user_id = %user_id, found = profile.is_some(), "Profile loaded");
            }
            (Err(e), true) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to load profile");
            }
        }
    }

    /// Replaces the current profile with one that was just written, provided
    /// `user_id` is still signed in. Returns whether it was applied.
    ///
    /// Any profile load already in flight is superseded and will be discarded.
    pub fn apply_saved_profile(&self, user_id: &str, profile: Profile) -> bool {
        self.state.send_if_modified(|s| {
            if s.user_id() != Some(user_id) {
                return false;
            }
            s.set_saved_profile(profile);
            true
        })
    }

    fn begin_auth(&self) -> AuthInFlight {
        self.state.send_modify(|s| s.pending_auth += 1);
        AuthInFlight {
            state: Arc::clone(&self.state),
        }
    }

    // Without a session there is nothing left to load.
    fn settle_failed_auth(&self) {
        self.state.send_if_modified(|s| {
            if s.session.is_some() || !s.is_loading {
                return false;
            }
            s.is_loading = false;
            true
        });
    }

    /// Creates an account. `display_name` travels as account metadata, not
    /// as a profile field. The session, if any, arrives as a notification.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Account> {
        let _in_flight = self.begin_auth();

        let mut metadata = Map::new();
        let display_name = display_name.trim();
        if !display_name.is_empty() {
            metadata.insert("full_name".to_string(), Value::from(display_name));
        }

        match self.accounts.create_account(email, password, metadata).await {
            Ok(account) => {
                tracing::info!(user_id = %account.user_id, "Account created");
                Ok(account)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Account creation failed");
                self.settle_failed_auth();
                Err(e)
            }
        }
    }

    /// Signs in. The session is installed by the resulting notification.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let _in_flight = self.begin_auth();

        match self.accounts.authenticate(email, password).await {
            Ok(session) => {
                tracing::info!(user_id = %session.user_id, "Signed in");
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sign-in failed");
                self.settle_failed_auth();
                Err(e)
            }
        }
    }

    /// Signs out. State is cleared only once the service confirms; a failed
    /// sign-out leaves the user signed in.
    pub async fn logout(&self) -> Result<()> {
        if let Err(e) = self.accounts.end_session().await {
            tracing::warn!(error = %e, "Sign-out failed; keeping session");
            return Err(e);
        }
        tracing::info!("Signed out");
        self.state.send_modify(SessionSnapshot::clear);
        Ok(())
    }
}

// Marks a login/register call as in flight until dropped.
struct AuthInFlight {
    state: Arc<watch::Sender<SessionSnapshot>>,
}

impl Drop for AuthInFlight {
    fn drop(&mut self) {
        self.state
            .send_modify(|s| s.pending_auth = s.pending_auth.saturating_sub(1));
    }
}

/// Handle to the task processing session-change notifications.
///
/// Dropping it stops the task, which releases the subscription.
pub struct SessionListener {
    task: JoinHandle<()>,
}

impl SessionListener {
    /// Whether the listener task is still running.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the listener and waits until its subscription is released.
    pub async fn shutdown(mut self) {
        self.task.abort();
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "Session listener ended abnormally");
            }
        }
    }
}

impl Drop for SessionListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
