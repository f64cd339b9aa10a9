//! Session application services.
//!
//! This module contains the session controller, which owns the current
//! session/profile pair, and the snapshot type it publishes.

mod controller;
mod state;

pub use controller::{SessionController, SessionListener};
pub use state::{AuthPhase, SessionSnapshot};
