//! Error types for the Nutri client core.

use crate::store::StoreFailure;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for session and profile operations.
///
/// Every operation exposed to UI code returns this type inside a `Result`;
/// nothing is thrown across the facade boundary.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum NutriError {
    /// Credentials rejected or account operation refused by the account service
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Network or protocol failure talking to a remote service
    #[error("Transport error: {0}")]
    Transport(String),

    /// An operation that requires a signed-in user was called without one
    #[error("No active session")]
    NoActiveSession,

    /// The record store rejected a read or write
    #[error("Store error: {0}")]
    Store(StoreFailure),

    /// The store reported schema drift that could not be recovered by
    /// stripping a field
    #[error("Unrecoverable schema drift on field {}: {failure}", .field.as_deref().unwrap_or("<unknown>"))]
    SchemaDrift {
        field: Option<String>,
        failure: StoreFailure,
    },

    /// Every requested field was stripped; nothing the caller asked for was persisted
    #[error("No fields could be persisted (stripped: {})", .removed.join(", "))]
    NothingPersisted { removed: Vec<String> },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NutriError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an Auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is an authentication failure
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Check if this is a transport failure
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if this is the "no active session" invariant violation
    pub fn is_no_active_session(&self) -> bool {
        matches!(self, Self::NoActiveSession)
    }

    /// Check if this error came out of the schema-drift recovery path
    pub fn is_schema_drift(&self) -> bool {
        matches!(self, Self::SchemaDrift { .. } | Self::NothingPersisted { .. })
    }

    /// Returns the underlying store failure, if any.
    pub fn store_failure(&self) -> Option<&StoreFailure> {
        match self {
            Self::Store(failure) | Self::SchemaDrift { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<StoreFailure> for NutriError {
    fn from(failure: StoreFailure) -> Self {
        Self::Store(failure)
    }
}

impl From<std::io::Error> for NutriError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for NutriError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for NutriError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for NutriError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, NutriError>`.
pub type Result<T> = std::result::Result<T, NutriError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_drift_display_names_field() {
        let failure = StoreFailure::new("42703", r#"column "allergies" does not exist"#);
        let err = NutriError::SchemaDrift {
            field: Some("allergies".to_string()),
            failure,
        };
        assert!(err.to_string().contains("allergies"));
        assert!(err.is_schema_drift());
        assert!(err.store_failure().is_some());
    }

    #[test]
    fn test_nothing_persisted_lists_removed_fields() {
        let err = NutriError::NothingPersisted {
            removed: vec!["age".to_string(), "bio".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "No fields could be persisted (stripped: age, bio)"
        );
    }

    #[test]
    fn test_no_active_session_predicate() {
        assert!(NutriError::NoActiveSession.is_no_active_session());
        assert!(!NutriError::auth("bad").is_no_active_session());
    }
}
