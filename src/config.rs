use std::fs;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::Amount;
use crate::fee::DEFAULT_WITHDRAWAL_FEE_RATE;
use crate::money::MAX_DECIMALS;
use crate::mobile_money::RetryPolicy;
use crate::session::CurrencyContext;
use crate::transaction::{TransactionKind, TransactionLimits};
use crate::watcher::WatcherConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub currency: CurrencyContext,
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Withdrawal fee rate in 10^6 precision
    #[serde(default = "default_fee_rate")]
    pub withdrawal_fee_rate: u64,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub kyc: KycConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

fn default_fee_rate() -> u64 {
    DEFAULT_WITHDRAWAL_FEE_RATE
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000/api".to_string(),
            request_timeout_ms: 15_000,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct AmountBounds {
    pub min: Amount,
    pub max: Amount,
}

/// Per-kind amount bounds in minor units
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LimitsConfig {
    pub deposit: AmountBounds,
    pub withdrawal: AmountBounds,
    pub transfer: AmountBounds,
    #[serde(default = "default_note_len")]
    pub max_note_len: usize,
}

fn default_note_len() -> usize {
    100
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            deposit: AmountBounds {
                min: 10,
                max: 150_000,
            },
            withdrawal: AmountBounds {
                min: 10,
                max: 150_000,
            },
            transfer: AmountBounds {
                min: 1,
                max: 150_000,
            },
            max_note_len: default_note_len(),
        }
    }
}

impl LimitsConfig {
    pub fn to_limits(&self, withdrawal_fee_rate: u64) -> TransactionLimits {
        let bounds = |b: AmountBounds| (b.min, b.max);
        TransactionLimits {
            deposit: bounds(self.deposit),
            withdrawal: bounds(self.withdrawal),
            transfer: bounds(self.transfer),
            max_note_len: self.max_note_len,
            withdrawal_fee_rate,
        }
    }

    pub fn bounds(&self, kind: TransactionKind) -> AmountBounds {
        match kind {
            TransactionKind::Deposit => self.deposit,
            TransactionKind::Withdrawal => self.withdrawal,
            TransactionKind::Transfer => self.transfer,
        }
    }
}

/// Confirmation timing. The observation window is the hard deadline after
/// which an acknowledged transaction becomes `Expired`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfirmationConfig {
    pub observation_window_secs: u64,
    pub poll_interval_secs: u64,
    pub duplicate_window_secs: u64,
    #[serde(default = "default_max_held_webhooks")]
    pub max_held_webhooks: usize,
}

fn default_max_held_webhooks() -> usize {
    256
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            observation_window_secs: 300,
            poll_interval_secs: 10,
            duplicate_window_secs: 30,
            max_held_webhooks: default_max_held_webhooks(),
        }
    }
}

impl ConfirmationConfig {
    pub fn watcher(&self) -> WatcherConfig {
        WatcherConfig {
            observation_window: Duration::from_secs(self.observation_window_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            max_held_webhooks: self.max_held_webhooks,
        }
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::from_secs(self.duplicate_window_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KycConfig {
    pub max_upload_bytes: usize,
}

impl Default for KycConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebhookConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8085,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "pesa_wallet.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            gateway: GatewayConfig::default(),
            currency: CurrencyContext::default(),
            limits: LimitsConfig::default(),
            withdrawal_fee_rate: DEFAULT_WITHDRAWAL_FEE_RATE,
            confirmation: ConfirmationConfig::default(),
            kyc: KycConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.currency.decimals > MAX_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "currency.decimals {} exceeds {}",
                self.currency.decimals, MAX_DECIMALS
            )));
        }
        Ok(())
    }
}
