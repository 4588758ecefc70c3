//! Configuration for the sync engine.
//!
//! Loaded with precedence: programmatic overrides > Env vars > Config file
//! > Defaults.
//!
//! # Example config file (attrsync.toml)
//! ```toml
//! identity_field = "email"
//! data_file = "data/user_attributes.json"
//!
//! [remote]
//! field_visibility = "hidden"
//! field_managed = "admin"
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration. Passed explicitly into the schema synchronizer
/// and value builder instead of living in global tables, so tests can
/// supply alternate settings without shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// The record key used to resolve users remotely. Never synchronized
    /// as a regular attribute field.
    pub identity_field: String,
    /// Path the bundled file provider reads attribute records from.
    pub data_file: PathBuf,
    /// Remote field attributes applied at creation time.
    pub remote: RemoteFieldConfig,
}

/// Attributes stamped onto every remotely created field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteFieldConfig {
    /// Synced fields are hidden because their data is managed externally.
    pub field_visibility: String,
    /// Admin-managed prevents user edits from fighting the sync.
    pub field_managed: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            identity_field: "email".to_string(),
            data_file: PathBuf::from("data/user_attributes.json"),
            remote: RemoteFieldConfig::default(),
        }
    }
}

impl Default for RemoteFieldConfig {
    fn default() -> Self {
        Self {
            field_visibility: "hidden".to_string(),
            field_managed: "admin".to_string(),
        }
    }
}

/// Programmatic overrides applied on top of file and environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,
}

impl SyncConfig {
    /// Load configuration with precedence: overrides > Env > File > Defaults
    ///
    /// Environment variables use the `ATTRSYNC_` prefix, e.g.
    /// `ATTRSYNC_IDENTITY_FIELD=login`.
    pub fn load(
        config_path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(SyncConfig::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("ATTRSYNC_"));
        figment = figment.merge(Serialized::defaults(overrides));

        figment.extract().map_err(ConfigError::from)
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}
