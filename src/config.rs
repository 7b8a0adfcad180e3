//! Configuration module for the kasbah harness
//!
//! Configuration is loaded from a TOML file, with `.env` support and
//! `KASBAH_*` environment overrides for the values that usually differ per
//! machine (endpoints, keypair path, program id).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::RetryPolicy;
use crate::types::{Commitment, SubmitOptions};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ledger endpoints
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Preflight behaviour for submissions
    #[serde(default)]
    pub submit: SubmitOptions,

    /// Confirmation tracking
    #[serde(default)]
    pub confirmation: ConfirmationConfig,

    /// Rebuild/rebroadcast policy
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Faucet funding of the ephemeral key
    #[serde(default)]
    pub funding: FundingConfig,

    /// Target program
    #[serde(default)]
    pub program: ProgramConfig,

    /// Key holder configuration
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC HTTP endpoint
    #[serde(default = "default_http_url")]
    pub http_url: String,

    /// PubSub websocket endpoint
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    /// Commitment `send_and_confirm` waits for
    #[serde(default)]
    pub commitment: Commitment,

    /// Status poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Overall deadline across all attempts, in seconds
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Per-attempt wait before rebroadcasting, in seconds
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Disable the push subscription and rely on polling only
    #[serde(default)]
    pub poll_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Airdrop amount in lamports
    #[serde(default = "default_airdrop_lamports")]
    pub lamports: u64,

    /// Commitment the airdrop must reach before use
    #[serde(default)]
    pub commitment: Commitment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// Base58 program id
    #[serde(default = "default_program_id")]
    pub program_id: String,

    /// Argument passed to the `hello` instruction
    #[serde(default = "default_hello_id")]
    pub hello_id: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to a keypair file; a fresh ephemeral key is generated when unset
    #[serde(default)]
    pub keypair_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Record prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// Default value functions
fn default_http_url() -> String { "http://127.0.0.1:8899".to_string() }
fn default_ws_url() -> String { "ws://127.0.0.1:8900".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_poll_interval_ms() -> u64 { 400 }
fn default_deadline_secs() -> u64 { 30 }
fn default_attempt_timeout_secs() -> u64 { 15 }
fn default_airdrop_lamports() -> u64 { crate::types::LAMPORTS_PER_SOL }
fn default_program_id() -> String { crate::tx_builder::KASBAH_PROGRAM_ID.to_string() }
fn default_hello_id() -> u8 { 1 }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            http_url: default_http_url(),
            ws_url: default_ws_url(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            commitment: Commitment::Confirmed,
            poll_interval_ms: default_poll_interval_ms(),
            deadline_secs: default_deadline_secs(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            poll_only: false,
        }
    }
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            lamports: default_airdrop_lamports(),
            commitment: Commitment::Confirmed,
        }
    }
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            program_id: default_program_id(),
            hello_id: default_hello_id(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            submit: SubmitOptions::default(),
            confirmation: ConfirmationConfig::default(),
            retry: RetryPolicy::default(),
            funding: FundingConfig::default(),
            program: ProgramConfig::default(),
            wallet: WalletConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl ConfirmationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read config file {}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `KASBAH_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("KASBAH_RPC_URL") {
            self.rpc.http_url = url;
        }
        if let Ok(url) = std::env::var("KASBAH_WS_URL") {
            self.rpc.ws_url = url;
        }
        if let Ok(path) = std::env::var("KASBAH_KEYPAIR") {
            self.wallet.keypair_path = Some(path);
        }
        if let Ok(program_id) = std::env::var("KASBAH_PROGRAM_ID") {
            self.program.program_id = program_id;
        }
        if let Some(commitment) = std::env::var("KASBAH_COMMITMENT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.confirmation.commitment = commitment;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc.http_url.starts_with("http://") && !self.rpc.http_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "Invalid RPC URL: {}",
                self.rpc.http_url
            )));
        }
        if !self.rpc.ws_url.starts_with("ws://") && !self.rpc.ws_url.starts_with("wss://") {
            return Err(ConfigError::Validation(format!(
                "Invalid websocket URL: {}",
                self.rpc.ws_url
            )));
        }
        if self.confirmation.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.confirmation.deadline_secs == 0 {
            return Err(ConfigError::Validation(
                "deadline_secs must be > 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry.max_attempts must be > 0".to_string(),
            ));
        }
        if self.funding.lamports == 0 {
            return Err(ConfigError::Validation(
                "funding.lamports must be > 0".to_string(),
            ));
        }
        self.program
            .program_id
            .parse::<solana_sdk::pubkey::Pubkey>()
            .map_err(|e| {
                ConfigError::Validation(format!(
                    "Invalid program id {}: {}",
                    self.program.program_id, e
                ))
            })?;
        Ok(())
    }
}

/// Configuration-related errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.rpc.http_url, "http://127.0.0.1:8899");
        assert_eq!(config.rpc.ws_url, "ws://127.0.0.1:8900");
        assert_eq!(config.confirmation.commitment, Commitment::Confirmed);
        assert_eq!(config.confirmation.deadline_secs, 30);
        assert_eq!(config.funding.lamports, 1_000_000_000);
        assert!(!config.submit.skip_preflight);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [rpc]
            http_url = "https://api.devnet.solana.com"
            ws_url = "wss://api.devnet.solana.com"

            [confirmation]
            commitment = "finalized"
            deadline_secs = 60

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc.http_url, "https://api.devnet.solana.com");
        assert_eq!(config.rpc.timeout_secs, 30);
        assert_eq!(config.confirmation.commitment, Commitment::Finalized);
        assert_eq!(config.confirmation.deadline(), Duration::from_secs(60));
        assert_eq!(config.confirmation.poll_interval_ms, 400);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.program.hello_id, 1);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.rpc.http_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.confirmation.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.program.program_id = "nope".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.funding.lamports = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[submit]\nskip_preflight = true\n").unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert!(config.submit.skip_preflight);
        assert_eq!(config.submit.preflight_commitment, Commitment::Confirmed);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
