//! Profile domain module.
//!
//! # Module Structure
//!
//! - `model`: Persisted profile record (`Profile`)
//! - `field`: Field names and update sets (`ProfileField`, `FieldKind`, `FieldUpdateSet`)
//! - `form`: Onboarding input (`ProfileForm`)

mod field;
mod form;
mod model;

// Re-export public API
pub use field::{FieldKind, FieldUpdateSet, ProfileField};
pub use form::ProfileForm;
pub use model::Profile;
