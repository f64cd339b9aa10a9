//! Session domain module.
//!
//! This module contains the session domain model and the interface to the
//! remote account service.
//!
//! # Module Structure
//!
//! - `model`: Core session types (`Session`, `Account`, `SessionChange`)
//! - `account_service`: `AccountService` trait and `SessionSubscription`
//! - `broadcaster`: Listener fan-out shared by service implementations
//!
//! # Usage
//!
//! ```ignore
//! use nutri_core::session::{AccountService, Session, SessionChange};
//! ```

mod account_service;
mod broadcaster;
mod model;

// Re-export public API
pub use account_service::{AccountService, SessionSubscription};
pub use broadcaster::SessionBroadcaster;
pub use model::{Account, DISPLAY_NAME_KEYS, Session, SessionChange};
