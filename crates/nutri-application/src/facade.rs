//! Session/profile facade.
//!
//! The single entry point screens use: current user, current profile, the
//! loading flag, and the register/login/logout/save operations.

use crate::profile::{ProfileSynchronizer, SaveOutcome};
use crate::session::{AuthPhase, SessionController, SessionListener, SessionSnapshot};
use nutri_core::config::ProfileConfig;
use nutri_core::error::{NutriError, Result};
use nutri_core::profile::{FieldUpdateSet, Profile, ProfileForm};
use nutri_core::session::{Account, AccountService, Session};
use nutri_core::store::{Record, RecordStore};
use std::sync::Arc;
use tokio::sync::watch;

/// Read and write access to the signed-in user and their profile.
#[derive(Clone)]
pub struct SessionFacade {
    controller: SessionController,
    synchronizer: Arc<ProfileSynchronizer>,
}

impl SessionFacade {
    pub fn new(
        accounts: Arc<dyn AccountService>,
        store: Arc<dyn RecordStore>,
        profile_config: &ProfileConfig,
    ) -> Self {
        let synchronizer = Arc::new(ProfileSynchronizer::new(store, profile_config));
        let controller = SessionController::new(accounts, Arc::clone(&synchronizer));
        Self {
            controller,
            synchronizer,
        }
    }

    /// Subscribes to session changes, then restores any existing session.
    ///
    /// Keep the returned listener alive for as long as the facade is in use.
    pub async fn start(&self) -> SessionListener {
        let listener = self.controller.listen();
        self.controller.bootstrap().await;
        listener
    }

    pub async fn bootstrap(&self) {
        self.controller.bootstrap().await;
    }

    pub fn current_user(&self) -> Option<Session> {
        self.controller.snapshot().session
    }

    pub fn current_profile(&self) -> Option<Profile> {
        self.controller.snapshot().profile
    }

    pub fn is_loading(&self) -> bool {
        self.controller.snapshot().is_loading
    }

    pub fn phase(&self) -> AuthPhase {
        self.controller.snapshot().phase()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.controller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.controller.subscribe()
    }

    pub fn synchronizer(&self) -> &ProfileSynchronizer {
        &self.synchronizer
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Account> {
        self.controller.register(email, password, display_name).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        self.controller.login(email, password).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.controller.logout().await
    }

    /// Saves `updates` for the signed-in user and publishes the stored record.
    ///
    /// Extension fields the store is known not to accept are left out before
    /// the first write.
    pub async fn save_profile(&self, updates: FieldUpdateSet) -> Result<SaveOutcome> {
        let session = self.current_user().ok_or(NutriError::NoActiveSession)?;

        let filtered = self.synchronizer.schema_support().filter(&updates);
        let outcome = self.synchronizer.save(&session, filtered).await?;

        if !self
            .controller
            .apply_saved_profile(&session.user_id, outcome.profile.clone())
        {
            tracing::debug!(user_id = %session.user_id, "User changed during save; not publishing profile");
        }
        Ok(outcome)
    }

    pub async fn save_profile_form(&self, form: &ProfileForm) -> Result<SaveOutcome> {
        self.save_profile(form.to_update_set()).await
    }

    /// Saves a loosely typed record; names outside the allowed set are dropped.
    pub async fn save_profile_fields(&self, fields: &Record) -> Result<SaveOutcome> {
        self.save_profile(FieldUpdateSet::from_record(fields)).await
    }
}
