//! Profile application services.
//!
//! This module contains the profile synchronizer and the schema knowledge it
//! accumulates while writing.

mod schema_support;
mod synchronizer;

pub use schema_support::{FieldSupport, SchemaSupport};
pub use synchronizer::{ProfileSynchronizer, SaveOutcome, WriteOperation};
