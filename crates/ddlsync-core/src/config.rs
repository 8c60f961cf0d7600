//! Configuration schema (ddlsync.toml)
//!
//! The configuration is read once and passed by value into the components
//! that need it. Nothing below reads the process environment on its own;
//! callers hand environment pairs to [`Config::with_env_overrides`].

use serde::{Deserialize, Serialize};

/// What an UPDATE does to an existing table that holds no rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyUpdatePolicy {
    /// Drop and recreate (full resync, no data at risk)
    Recreate,

    /// Alter in place, like a populated table
    Alter,
}

impl Default for EmptyUpdatePolicy {
    fn default() -> Self {
        Self::Recreate
    }
}

impl std::str::FromStr for EmptyUpdatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recreate" => Ok(Self::Recreate),
            "alter" => Ok(Self::Alter),
            other => Err(ConfigError::Invalid(format!(
                "empty_update must be 'recreate' or 'alter', got '{}'",
                other
            ))),
        }
    }
}

/// Reconciliation run settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Upper bound of depletion passes; 0 means `items + 1`
    #[serde(default)]
    pub max_passes: usize,

    /// Policy for UPDATE on an existing, empty table
    #[serde(default)]
    pub empty_update: EmptyUpdatePolicy,

    /// Schema name used when a schema definition has none
    #[serde(default = "default_schema")]
    pub default_schema: String,

    /// Drop artifacts that disappeared from the definition set
    #[serde(default = "default_true")]
    pub cleanup_orphans: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_passes: 0,
            empty_update: EmptyUpdatePolicy::default(),
            default_schema: default_schema(),
            cleanup_orphans: true,
        }
    }
}

impl ReconcileConfig {
    /// Pass bound for a working set of `items`
    pub fn pass_bound(&self, items: usize) -> usize {
        if self.max_passes == 0 {
            items + 1
        } else {
            self.max_passes
        }
    }
}

/// Guards that turn an in-place alteration into a refusal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Refuse changing the type of a column in a populated table
    #[serde(default = "default_true")]
    pub refuse_type_change: bool,

    /// Refuse adding a NOT NULL column without default to a populated table
    #[serde(default = "default_true")]
    pub refuse_required_column_on_populated: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            refuse_type_change: true,
            refuse_required_column_on_populated: true,
        }
    }
}

fn default_schema() -> String {
    "PUBLIC".to_string()
}

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub safety: SafetyConfig,
}

impl Config {
    /// Environment variable overriding `reconcile.max_passes`
    pub const ENV_MAX_PASSES: &'static str = "DDLSYNC_MAX_PASSES";

    /// Environment variable overriding `reconcile.empty_update`
    pub const ENV_EMPTY_UPDATE: &'static str = "DDLSYNC_EMPTY_UPDATE";

    /// Environment variable overriding `reconcile.default_schema`
    pub const ENV_DEFAULT_SCHEMA: &'static str = "DDLSYNC_DEFAULT_SCHEMA";

    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Apply overrides from captured environment pairs
    pub fn with_env_overrides<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                Self::ENV_MAX_PASSES => {
                    self.reconcile.max_passes = value.trim().parse().map_err(|_| {
                        ConfigError::Invalid(format!(
                            "{} must be a non-negative integer, got '{}'",
                            Self::ENV_MAX_PASSES,
                            value
                        ))
                    })?;
                }
                Self::ENV_EMPTY_UPDATE => {
                    self.reconcile.empty_update = value.parse()?;
                }
                Self::ENV_DEFAULT_SCHEMA => {
                    self.reconcile.default_schema = value.trim().to_string();
                }
                _ => {}
            }
        }

        Ok(self)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.reconcile.empty_update, EmptyUpdatePolicy::Recreate);
        assert_eq!(config.reconcile.default_schema, "PUBLIC");
        assert!(config.reconcile.cleanup_orphans);
        assert!(config.safety.refuse_type_change);
    }

    #[test]
    fn empty_toml_is_valid() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_toml() {
        let config = Config::from_toml(
            r#"
            [reconcile]
            empty_update = "alter"
            max_passes = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.reconcile.empty_update, EmptyUpdatePolicy::Alter);
        assert_eq!(config.reconcile.pass_bound(100), 5);
        assert_eq!(config.reconcile.default_schema, "PUBLIC");
    }

    #[test]
    fn automatic_pass_bound() {
        assert_eq!(ReconcileConfig::default().pass_bound(3), 4);
    }

    #[test]
    fn env_overrides() {
        let config = Config::default()
            .with_env_overrides(vec![
                ("DDLSYNC_EMPTY_UPDATE", "ALTER"),
                ("DDLSYNC_DEFAULT_SCHEMA", "APP"),
                ("UNRELATED", "x"),
            ])
            .unwrap();

        assert_eq!(config.reconcile.empty_update, EmptyUpdatePolicy::Alter);
        assert_eq!(config.reconcile.default_schema, "APP");

        let err = Config::default().with_env_overrides(vec![("DDLSYNC_MAX_PASSES", "many")]);
        assert!(err.is_err());
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }
}
