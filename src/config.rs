use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::input::firewall_state::{DEFAULT_CHAIN_HEADER, DEFAULT_DROP_TOKEN};

/// Configuration for a warden run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input source configuration
    pub input: InputConfig,
    /// Detection configuration
    pub detection: DetectionConfig,
    /// Firewall configuration
    pub firewall: FirewallConfig,
    /// Blacklist persistence configuration
    pub persistence: PersistenceConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Input source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Path to the sshd authentication log
    pub auth_log_file: PathBuf,
    /// Command printing the current firewall ruleset
    pub firewall_state_command: String,
}

/// Detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Length of the lookbehind window in minutes
    pub lookbehind_minutes: i64,
    /// An address is banned once its attempts exceed this number
    pub max_attempts_per_ip: usize,
}

/// Firewall configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallConfig {
    /// Prefix of the line introducing the chain whose rules are read
    #[serde(default = "default_chain_header")]
    pub chain_header: String,
    /// Token marking a drop rule
    #[serde(default = "default_drop_token")]
    pub drop_token: String,
    /// Command banning one address
    pub ban_command: String,
    /// Placeholder in `ban_command` replaced by the address
    pub ip_placeholder: String,
    /// Log ban commands instead of running them
    #[serde(default)]
    pub dry_run: bool,
}

/// Blacklist persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Storage backend: "json" or "sqlite"
    pub backend: String,
    /// Path of the blacklist file or database
    pub path: PathBuf,
    /// Save the merged blacklist even when a ban fails mid-run
    #[serde(default)]
    pub persist_on_partial_failure: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "console", "json" or "jsonl"
    pub format: String,
    /// Output file path (stdout if absent)
    pub file_path: Option<PathBuf>,
}

fn default_chain_header() -> String {
    DEFAULT_CHAIN_HEADER.to_string()
}

fn default_drop_token() -> String {
    DEFAULT_DROP_TOKEN.to_string()
}

/// Longest accepted lookbehind. Log timestamps carry no year, so a window
/// longer than one year cannot be resolved.
pub const MAX_LOOKBEHIND_MINUTES: i64 = 366 * 24 * 60;

/// Configuration values that cannot drive a run
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("lookbehind_minutes must be between 1 and {MAX_LOOKBEHIND_MINUTES}, got {0}")]
    InvalidLookbehind(i64),

    #[error("ip_placeholder must not be empty")]
    EmptyPlaceholder,

    #[error("ban_command `{command}` does not contain placeholder `{placeholder}`")]
    MissingPlaceholder { command: String, placeholder: String },

    #[error("unknown persistence backend `{0}`")]
    UnknownBackend(String),
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            format: "console".to_string(),
            file_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: InputConfig {
                auth_log_file: PathBuf::from("/var/log/auth.log"),
                firewall_state_command: "iptables-save".to_string(),
            },
            detection: DetectionConfig {
                lookbehind_minutes: 60,
                max_attempts_per_ip: 5,
            },
            firewall: FirewallConfig {
                chain_header: default_chain_header(),
                drop_token: default_drop_token(),
                ban_command: "iptables -I INPUT -s {ip} -j DROP".to_string(),
                ip_placeholder: "{ip}".to_string(),
                dry_run: false,
            },
            persistence: PersistenceConfig {
                backend: "json".to_string(),
                path: PathBuf::from("blacklist.json"),
                persist_on_partial_failure: false,
            },
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values no run could succeed with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_LOOKBEHIND_MINUTES).contains(&self.detection.lookbehind_minutes) {
            return Err(ConfigError::InvalidLookbehind(self.detection.lookbehind_minutes));
        }
        if self.firewall.ip_placeholder.is_empty() {
            return Err(ConfigError::EmptyPlaceholder);
        }
        if !self.firewall.ban_command.contains(&self.firewall.ip_placeholder) {
            return Err(ConfigError::MissingPlaceholder {
                command: self.firewall.ban_command.clone(),
                placeholder: self.firewall.ip_placeholder.clone(),
            });
        }
        match self.persistence.backend.to_lowercase().as_str() {
            "json" | "sqlite" => Ok(()),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.detection.max_attempts_per_ip = 12;
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.detection.max_attempts_per_ip, 12);
        assert_eq!(loaded.firewall.chain_header, ":OUTPUT ACCEPT");
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let toml = r#"
            [input]
            auth_log_file = "/tmp/auth.log"
            firewall_state_command = "iptables-save"

            [detection]
            lookbehind_minutes = 30
            max_attempts_per_ip = 3

            [firewall]
            ban_command = "iptables -A INPUT -s IP -j DROP"
            ip_placeholder = "IP"

            [persistence]
            backend = "sqlite"
            path = "/tmp/blacklist.db"
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.firewall.drop_token, " DROP");
        assert!(!config.firewall.dry_run);
        assert!(!config.persistence.persist_on_partial_failure);
        assert_eq!(config.output.format, "console");
    }

    #[test]
    fn test_ban_command_without_placeholder() {
        let mut config = Config::default();
        config.firewall.ban_command = "iptables -F".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPlaceholder { .. })
        ));
    }

    #[test]
    fn test_non_positive_lookbehind() {
        let mut config = Config::default();
        config.detection.lookbehind_minutes = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidLookbehind(0)));
    }

    #[test]
    fn test_lookbehind_upper_limit() {
        let mut config = Config::default();
        config.detection.lookbehind_minutes = MAX_LOOKBEHIND_MINUTES;
        assert_eq!(config.validate(), Ok(()));

        config.detection.lookbehind_minutes = MAX_LOOKBEHIND_MINUTES + 1;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLookbehind(MAX_LOOKBEHIND_MINUTES + 1))
        );

        config.detection.lookbehind_minutes = 200_000_000_000;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLookbehind(200_000_000_000))
        );
    }

    #[test]
    fn test_unknown_backend() {
        let mut config = Config::default();
        config.persistence.backend = "redis".to_string();
        assert_eq!(config.validate(), Err(ConfigError::UnknownBackend("redis".to_string())));
    }
}
