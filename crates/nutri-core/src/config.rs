//! Client configuration model.
//!
//! Loaded from `config.toml` by the infrastructure layer; every section is
//! optional and falls back to defaults.

use crate::error::{NutriError, Result};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

pub const DEFAULT_PROFILE_TABLE: &str = "profiles";
pub const DEFAULT_KEY_COLUMN: &str = "id";
pub const DEFAULT_DISPLAY_NAME: &str = "User";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct NutriConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for NutriConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            profile: ProfileConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// Remote service location.
#[derive(Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct BackendConfig {
    /// Base URL of the hosted backend; `None` selects the in-memory backend
    #[serde(default)]
    pub url: Option<String>,
    /// Public API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where and how profile records are written.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ProfileConfig {
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_key_column")]
    pub key_column: String,
    /// Last-resort name for newly inserted profiles
    #[serde(default = "default_display_name")]
    pub default_display_name: String,
    #[serde(default)]
    pub extension_fields: ExtensionPolicy,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            key_column: default_key_column(),
            default_display_name: default_display_name(),
            extension_fields: ExtensionPolicy::default(),
        }
    }
}

/// Whether optional-extension profile fields are sent to the store.
#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtensionPolicy {
    /// Send them until the store reports it lacks the column
    #[default]
    Auto,
    /// Always send them
    Enabled,
    /// Never send them
    Disabled,
}

fn default_table() -> String {
    DEFAULT_PROFILE_TABLE.to_string()
}

fn default_key_column() -> String {
    DEFAULT_KEY_COLUMN.to_string()
}

fn default_display_name() -> String {
    DEFAULT_DISPLAY_NAME.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl NutriConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects configurations the synchronizer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.profile.table.trim().is_empty() {
            return Err(NutriError::config("profile.table must not be empty"));
        }
        if self.profile.key_column.trim().is_empty() {
            return Err(NutriError::config("profile.key_column must not be empty"));
        }
        if self.profile.default_display_name.trim().is_empty() {
            return Err(NutriError::config(
                "profile.default_display_name must not be empty",
            ));
        }
        if let Some(url) = &self.backend.url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(NutriError::config(format!(
                    "backend.url must be an http(s) URL, got '{}'",
                    url
                )));
            }
            if self.backend.api_key.as_deref().is_none_or(str::is_empty) {
                return Err(NutriError::config(
                    "backend.api_key is required when backend.url is set",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = NutriConfig::from_toml_str("").unwrap();
        assert_eq!(config.profile.table, "profiles");
        assert_eq!(config.profile.key_column, "id");
        assert_eq!(config.profile.default_display_name, "User");
        assert_eq!(config.profile.extension_fields, ExtensionPolicy::Auto);
        assert_eq!(config.log_level, "info");
        assert!(config.backend.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parses_all_sections() {
        let config = NutriConfig::from_toml_str(
            r#"
            log_level = "debug"

            [backend]
            url = "https://example.test"
            api_key = "anon"

            [profile]
            table = "user_profiles"
            extension_fields = "disabled"
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.backend.url.as_deref(), Some("https://example.test"));
        assert_eq!(config.profile.table, "user_profiles");
        assert_eq!(config.profile.key_column, "id");
        assert_eq!(config.profile.extension_fields, ExtensionPolicy::Disabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = NutriConfig::default();
        config.profile.table = " ".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("profile.table"));

        let mut config = NutriConfig::default();
        config.backend.url = Some("ftp://example.test".to_string());
        assert!(config.validate().is_err());

        let mut config = NutriConfig::default();
        config.backend.url = Some("https://example.test".to_string());
        assert!(config.validate().unwrap_err().to_string().contains("api_key"));
    }

    #[test]
    fn test_invalid_toml_is_serialization_error() {
        let err = NutriConfig::from_toml_str("profile = 3").unwrap_err();
        assert!(matches!(err, NutriError::Serialization { .. }));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let backend = BackendConfig {
            url: None,
            api_key: Some("anon-secret".to_string()),
        };
        assert!(!format!("{:?}", backend).contains("anon-secret"));
    }
}
