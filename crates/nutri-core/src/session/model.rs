use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Metadata keys checked, in order, for a provider-supplied display name.
pub const DISPLAY_NAME_KEYS: &[&str] = &["full_name", "name", "display_name"];

/// An authenticated principal as issued by the account service.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque, stable user identifier
    pub user_id: String,
    /// Email address or handle used to sign in
    pub email: String,
    /// Opaque provider metadata (e.g. display name given at sign-up)
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            metadata: Map::new(),
            access_token: None,
            expires_at: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Display name from metadata, if the provider supplied a non-empty one.
    pub fn metadata_display_name(&self) -> Option<&str> {
        DISPLAY_NAME_KEYS
            .iter()
            .filter_map(|key| self.metadata.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|name| !name.is_empty())
    }

    /// The part of the email before `@`, if non-empty.
    pub fn email_local_part(&self) -> Option<&str> {
        let local = self.email.split('@').next()?.trim();
        (!local.is_empty()).then_some(local)
    }

    /// Whether the session's expiry is known and already passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

// Tokens never reach logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("metadata", &self.metadata)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Handle returned when an account is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A session-change notification emitted by the account service.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionChange {
    /// A user signed in
    SignedIn(Session),
    /// The current session's credentials were refreshed
    TokenRefreshed(Session),
    /// A previously issued session was restored
    Restored(Session),
    /// The user signed out
    SignedOut,
    /// The service invalidated the session
    Expired,
}

impl SessionChange {
    /// The session this notification carries, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(s) | Self::TokenRefreshed(s) | Self::Restored(s) => Some(s),
            Self::SignedOut | Self::Expired => None,
        }
    }

    pub fn into_session(self) -> Option<Session> {
        match self {
            Self::SignedIn(s) | Self::TokenRefreshed(s) | Self::Restored(s) => Some(s),
            Self::SignedOut | Self::Expired => None,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "signed_in",
            Self::TokenRefreshed(_) => "token_refreshed",
            Self::Restored(_) => "restored",
            Self::SignedOut => "signed_out",
            Self::Expired => "expired",
        }
    }
}
