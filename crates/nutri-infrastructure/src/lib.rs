//! Infrastructure layer for Nutri.
//!
//! Concrete account services and record stores (hosted REST backend and
//! in-memory), configuration loading, and tracing setup.

pub mod backend;
pub mod config_service;
pub mod in_memory;
pub mod logging;
pub mod paths;
pub mod rest;

pub use crate::backend::Backend;
pub use crate::config_service::ConfigService;
pub use crate::in_memory::{InMemoryAccountService, InMemoryRecordStore};
pub use crate::rest::{AccessToken, RestAccountService, RestBackend, RestRecordStore};
