//! Backend selection from configuration.

use crate::in_memory::{InMemoryAccountService, InMemoryRecordStore};
use crate::rest::{AccessToken, RestAccountService, RestBackend, RestRecordStore};
use nutri_core::config::NutriConfig;
use nutri_core::error::Result;
use nutri_core::session::AccountService;
use nutri_core::store::RecordStore;
use std::sync::Arc;

/// The pair of remote collaborators the session facade is built from.
#[derive(Clone)]
pub struct Backend {
    pub accounts: Arc<dyn AccountService>,
    pub store: Arc<dyn RecordStore>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

impl Backend {
    /// Hosted backend when `backend.url` is set, in-memory otherwise.
    pub fn from_config(config: &NutriConfig) -> Result<Self> {
        config.validate()?;

        if config.backend.url.is_none() {
            tracing::info!("No backend URL configured; using in-memory backend");
            return Ok(Self::in_memory());
        }

        let rest = RestBackend::from_config(&config.backend)?;
        tracing::info!(url = %rest.base_url(), "Using hosted backend");
        let token = AccessToken::default();
        Ok(Self {
            accounts: Arc::new(RestAccountService::new(rest.clone(), token.clone())),
            store: Arc::new(RestRecordStore::new(rest, token)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            accounts: Arc::new(InMemoryAccountService::new()),
            store: Arc::new(InMemoryRecordStore::new()),
        }
    }
}
