//! Typed record-store failures and schema-drift classification.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Codes a store uses to report a reference to a column missing from its schema.
///
/// `PGRST204` is the REST gateway's schema-cache miss, `42703` is the
/// database's `undefined_column`.
pub const UNKNOWN_COLUMN_CODES: &[&str] = &["PGRST204", "42703"];

/// Code used for failures that never reached the store.
pub const TRANSPORT_CODE: &str = "transport";

// `column "allergies" of relation "profiles" does not exist`
static COLUMN_THEN_IDENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bcolumn\s+["'`]([A-Za-z_][A-Za-z0-9_]*)["'`]"#)
        .expect("column pattern is valid")
});

// `Could not find the 'allergies' column of 'profiles' in the schema cache`
static IDENT_THEN_COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["'`]([A-Za-z_][A-Za-z0-9_]*)["'`]\s+column\b"#)
        .expect("column pattern is valid")
});

/// A failure reported by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFailure {
    /// Machine-checkable failure code
    pub code: String,
    /// Human-readable message
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl StoreFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    /// A failure raised before the request reached the store.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_CODE, message)
    }

    /// An unknown-column failure in the database's wording.
    pub fn unknown_column_named(column: &str, table: &str) -> Self {
        Self::new(
            "42703",
            format!(r#"column "{column}" of relation "{table}" does not exist"#),
        )
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Whether the store rejected the request because it referenced a column
    /// missing from the remote schema.
    pub fn is_unknown_column(&self) -> bool {
        UNKNOWN_COLUMN_CODES.contains(&self.code.as_str())
    }

    /// Extracts the offending column name from the message.
    ///
    /// Looks for a quoted identifier following the word "column" first, then
    /// for one directly preceding it.
    pub fn unknown_column(&self) -> Option<String> {
        COLUMN_THEN_IDENT
            .captures(&self.message)
            .or_else(|| IDENT_THEN_COLUMN.captures(&self.message))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Classifies this failure for the drift-recovery protocol.
    pub fn classify(&self) -> FailureClass {
        if self.is_unknown_column() {
            FailureClass::SchemaDrift {
                field: self.unknown_column(),
            }
        } else {
            FailureClass::Other
        }
    }
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for StoreFailure {}

/// Classification of a [`StoreFailure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// The store does not know a referenced column; `field` is the extracted
    /// column name, if the message yielded one.
    SchemaDrift { field: Option<String> },
    /// Anything else; never retried.
    Other,
}
