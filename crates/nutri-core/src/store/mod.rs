//! Remote record store module.
//!
//! # Module Structure
//!
//! - `record_store`: `RecordStore` trait, `Record` and `RecordKey`
//! - `failure`: `StoreFailure` and schema-drift classification

mod failure;
mod record_store;

pub use failure::{FailureClass, StoreFailure, TRANSPORT_CODE, UNKNOWN_COLUMN_CODES};
pub use record_store::{Record, RecordKey, RecordStore};
