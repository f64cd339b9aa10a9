//! Application layer for Nutri.
//!
//! This crate coordinates the account service and the profile store to keep
//! the signed-in user and their profile consistent.

pub mod facade;
pub mod profile;
pub mod session;

pub use facade::SessionFacade;
pub use profile::{FieldSupport, ProfileSynchronizer, SaveOutcome, SchemaSupport, WriteOperation};
pub use session::{AuthPhase, SessionController, SessionListener, SessionSnapshot};
