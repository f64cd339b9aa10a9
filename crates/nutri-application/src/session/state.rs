use nutri_core::profile::Profile;
use nutri_core::session::Session;

/// Coarse authentication phase, derived from a [`SessionSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    /// A login or registration call is in flight
    Authenticating,
    /// Signed in; the first profile load has not settled yet
    ProfileLoading,
    Ready,
}

/// One consistent view of the session/profile pair.
///
/// Every state change replaces the whole snapshot in a single update, so
/// `is_loading` never turns false before `profile` is final for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub is_loading: bool,
    pub(crate) pending_auth: usize,
    /// Bumped whenever the session or the profile is replaced. A profile
    /// load only applies while the generation it started under is current.
    pub(crate) generation: u64,
}

impl SessionSnapshot {
    /// State before the first bootstrap: nothing known yet, loading.
    pub(crate) fn initial() -> Self {
        Self {
            session: None,
            profile: None,
            is_loading: true,
            pending_auth: 0,
            generation: 0,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn phase(&self) -> AuthPhase {
        match (&self.session, self.is_loading) {
            (Some(_), true) => AuthPhase::ProfileLoading,
            (Some(_), false) => AuthPhase::Ready,
            (None, _) if self.pending_auth > 0 => AuthPhase::Authenticating,
            (None, _) => AuthPhase::Unauthenticated,
        }
    }

    /// Installs `session`. A different user starts over with no profile
    /// and a pending load; the same user only gets the refreshed session.
    pub(crate) fn install(&mut self, session: Session) {
        if self.user_id() != Some(session.user_id.as_str()) {
            self.profile = None;
            self.is_loading = true;
        }
        self.session = Some(session);
        self.generation += 1;
    }

    /// Publishes a profile that was just written; it supersedes any load
    /// still in flight.
    pub(crate) fn set_saved_profile(&mut self, profile: Profile) {
        self.profile = Some(profile);
        self.is_loading = false;
        self.generation += 1;
    }

    pub(crate) fn clear(&mut self) {
        self.session = None;
        self.profile = None;
        self.is_loading = false;
        self.generation += 1;
    }
}
