//! Domain layer for the Nutri client's session and profile synchronization.
//!
//! This crate holds the data model, the capability traits for the two remote
//! collaborators (account service and record store) and the shared error
//! type. It performs no I/O itself.

pub mod config;
pub mod error;
pub mod nutrition;
pub mod profile;
pub mod session;
pub mod store;

// Re-export common error type
pub use error::{NutriError, Result};
