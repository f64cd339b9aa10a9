//! HTTP adapters for a hosted backend (REST gateway + auth API).

mod account_service;
mod record_store;

pub use account_service::RestAccountService;
pub use record_store::RestRecordStore;

use nutri_core::config::BackendConfig;
use nutri_core::error::{NutriError, Result};
use reqwest::Client;
use std::sync::{Arc, RwLock};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Connection settings shared by the REST adapters.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Builds a backend from configuration; both URL and key are required.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| NutriError::config("backend.url is not set"))?;
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| NutriError::config("backend.api_key is not set"))?;
        Ok(Self::new(url, api_key))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the API key, and `bearer` as the user's token when given.
    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        bearer: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let token = bearer.unwrap_or(&self.api_key);
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", token))
    }
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// The signed-in user's access token, shared between the auth adapter that
/// obtains it and the adapters that send it.
#[derive(Clone, Default)]
pub struct AccessToken(Arc<RwLock<Option<String>>>);

impl AccessToken {
    pub fn get(&self) -> Option<String> {
        self.0.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn set(&self, token: Option<String>) {
        *self.0.write().unwrap_or_else(|p| p.into_inner()) = token;
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(_) => f.write_str("AccessToken(<redacted>)"),
            None => f.write_str("AccessToken(None)"),
        }
    }
}

/// Maps a request that never produced a response.
pub(crate) fn transport_error(e: reqwest::Error) -> NutriError {
    NutriError::transport(e.to_string())
}
