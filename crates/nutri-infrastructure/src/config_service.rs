//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the client configuration
//! from the configuration file (~/.config/nutri/config.toml) and applies
//! environment overrides on top.

use crate::paths::NutriPaths;
use anyhow::{Context, Result};
use nutri_core::config::NutriConfig;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Overrides `backend.url`.
pub const ENV_BACKEND_URL: &str = "NUTRI_BACKEND_URL";
/// Overrides `backend.api_key`.
pub const ENV_API_KEY: &str = "NUTRI_API_KEY";
/// Overrides `profile.table`.
pub const ENV_PROFILE_TABLE: &str = "NUTRI_PROFILE_TABLE";

/// Configuration service that loads and caches the client configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config_path: PathBuf,
    /// Cached configuration, filled on first access.
    config: Arc<RwLock<Option<NutriConfig>>>,
}

impl ConfigService {
    /// Creates a service reading `<config_dir>/nutri/config.toml`, or
    /// `<base_path>/config.toml` when a base path is given.
    pub fn new(base_path: Option<&Path>) -> Result<Self> {
        let config_path = NutriPaths::new(base_path)
            .config_file()
            .map_err(|e| anyhow::anyhow!("Failed to get config path: {}", e))?;
        Ok(Self::with_path(config_path))
    }

    /// Creates a service reading an explicit file.
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Gets the configuration, loading it from file if not cached.
    ///
    /// The loaded configuration is validated; an invalid file is an error
    /// rather than silently replaced by defaults.
    pub fn get_config(&self) -> Result<NutriConfig> {
        {
            let cached = self.config.read().unwrap_or_else(|p| p.into_inner());
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let mut config = self.load_file()?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", self.config_path.display()))?;

        *self.config.write().unwrap_or_else(|p| p.into_inner()) = Some(config.clone());
        Ok(config)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// Writes `config` to the config file, creating its directory.
    pub fn save(&self, config: &NutriConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = config.to_toml_string()?;
        std::fs::write(&self.config_path, content)
            .with_context(|| format!("Failed to write {}", self.config_path.display()))?;
        self.invalidate_cache();
        Ok(())
    }

    fn load_file(&self) -> Result<NutriConfig> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "No config file; using defaults");
            return Ok(NutriConfig::default());
        }

        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read {}", self.config_path.display()))?;
        let config = NutriConfig::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", self.config_path.display()))?;
        tracing::debug!(path = %self.config_path.display(), "Loaded config file");
        Ok(config)
    }
}

/// Applies `NUTRI_*` overrides read through `lookup`. Empty values are ignored.
pub fn apply_env_overrides(config: &mut NutriConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_BACKEND_URL) {
        config.backend.url = Some(url);
    }
    if let Some(api_key) = get(ENV_API_KEY) {
        config.backend.api_key = Some(api_key);
    }
    if let Some(table) = get(ENV_PROFILE_TABLE) {
        config.profile.table = table;
    }
}
