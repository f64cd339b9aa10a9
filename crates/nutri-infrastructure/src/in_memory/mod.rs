//! In-memory backends.

mod account_service;
mod record_store;

pub use account_service::InMemoryAccountService;
pub use record_store::{InMemoryRecordStore, StoreCalls};
