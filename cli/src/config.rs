//! Client configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use securepool_types::{Catalog, InsurancePolicy, InsurancePool};
use securepool_utils::LogFormat;
use securepool_wallet_core::{BackendKind, ConfirmationTimings, DiscoveryConfig, StoreConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Client configuration, loadable from TOML. Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Wallet backend, fixed for the lifetime of the process.
    #[serde(default)]
    pub backend: BackendKind,

    /// Budget for one connect attempt, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub verification: VerificationSettings,

    #[serde(default)]
    pub confirmation: ConfirmationSettings,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default = "default_pools")]
    pub pools: Vec<InsurancePool>,

    #[serde(default = "default_policies")]
    pub policies: Vec<InsurancePolicy>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSettings {
    /// How long the identity check takes before approving.
    #[serde(default = "default_verification_delay_ms")]
    pub delay_ms: u64,

    /// How long the success stage stays up before the gate closes.
    #[serde(default = "default_success_hold_ms")]
    pub success_hold_ms: u64,

    /// Deny verification when no wallet is connected.
    #[serde(default = "default_true")]
    pub require_session: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationSettings {
    #[serde(default = "default_notice_ms")]
    pub confirm_ms: u64,

    #[serde(default = "default_notice_ms")]
    pub dismiss_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_verification_delay_ms() -> u64 {
    2_000
}

fn default_success_hold_ms() -> u64 {
    1_500
}

fn default_true() -> bool {
    true
}

fn default_notice_ms() -> u64 {
    2_000
}

fn default_pools() -> Vec<InsurancePool> {
    Catalog::default().pools
}

fn default_policies() -> Vec<InsurancePolicy> {
    Catalog::default().policies
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the session core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid("connect_timeout_ms must be positive".into()));
        }
        if self.discovery.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "discovery.poll_interval_ms must be positive".into(),
            ));
        }
        for pool in &self.pools {
            if pool.min_stake > pool.max_stake {
                return Err(ConfigError::Invalid(format!(
                    "pool {}: min_stake exceeds max_stake",
                    pool.id
                )));
            }
        }
        for policy in &self.policies {
            if policy.min_amount > policy.max_amount {
                return Err(ConfigError::Invalid(format!(
                    "policy {}: min_amount exceeds max_amount",
                    policy.id
                )));
            }
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            connect_timeout: self.connect_timeout(),
            confirmation: ConfirmationTimings {
                confirm: Duration::from_millis(self.confirmation.confirm_ms),
                dismiss: Duration::from_millis(self.confirmation.dismiss_ms),
            },
        }
    }

    pub fn catalog(&self) -> Catalog {
        Catalog {
            pools: self.pools.clone(),
            policies: self.policies.clone(),
        }
    }
}

impl VerificationSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn success_hold(&self) -> Duration {
        Duration::from_millis(self.success_hold_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            verification: VerificationSettings::default(),
            confirmation: ConfirmationSettings::default(),
            discovery: DiscoveryConfig::default(),
            pools: default_pools(),
            policies: default_policies(),
        }
    }
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            delay_ms: default_verification_delay_ms(),
            success_hold_ms: default_success_hold_ms(),
            require_session: default_true(),
        }
    }
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            confirm_ms: default_notice_ms(),
            dismiss_ms: default_notice_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use securepool_types::TokenAmount;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = ClientConfig::default();
        let toml_str = config.to_toml_string().expect("serializable");
        let parsed = ClientConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = ClientConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.backend, BackendKind::Discovery);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.verification.delay(), Duration::from_secs(2));
        assert_eq!(config.verification.success_hold(), Duration::from_millis(1_500));
        assert!(config.verification.require_session);
        assert_eq!(config.store_config(), StoreConfig::default());
        assert_eq!(config.catalog(), Catalog::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            backend = "extension"
            connect_timeout_ms = 3000
            log_format = "json"

            [verification]
            require_session = false

            [discovery]
            network = "mainnet"
        "#;
        let config = ClientConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.backend, BackendKind::Extension);
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.verification.require_session);
        assert_eq!(config.verification.delay_ms, 2_000); // default
        assert_eq!(config.discovery.network, "mainnet");
        assert_eq!(config.discovery.app_title, "SecurePool Insurance"); // default
    }

    #[test]
    fn custom_catalog_replaces_defaults() {
        let toml = r#"
            [[pools]]
            id = "cex"
            name = "Exchange Pool"
            min_stake = "0.5"
            max_stake = 250
            lockup_days = 90
            apy = 9.0
        "#;
        let config = ClientConfig::from_toml_str(toml).expect("should parse");
        let pool = config.catalog().pool("cex").cloned().expect("pool");
        assert_eq!(pool.min_stake, "0.5".parse::<TokenAmount>().unwrap());
        assert_eq!(pool.max_stake, TokenAmount::from_whole(250));
        assert_eq!(pool.lockup_days, 90);
        // Policies were not overridden.
        assert_eq!(config.policies.len(), 2);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ClientConfig::from_toml_str("connect_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let toml = r#"
            [[policies]]
            id = "bad"
            name = "Bad"
            min_amount = 10
            max_amount = 1
            premium_rate = 0.1
        "#;
        assert!(matches!(
            ClientConfig::from_toml_str(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "backend = \"extension\"\nlog_level = \"debug\"").expect("write");
        let config = ClientConfig::from_toml_file(file.path()).expect("should load");
        assert_eq!(config.backend, BackendKind::Extension);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn missing_file_returns_io_error() {
        let result = ClientConfig::from_toml_file("/nonexistent/securepool.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
