//! Configuration types for perp-sentinel
//!
//! Loaded from TOML and validated eagerly: a nonsensical value fails at load
//! time, before any position is opened.

use crate::execution::RetryPolicy;
use crate::policy::PolicyConfig;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Registry capacity; entry attempts beyond it are refused
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,

    /// ATR window in samples
    #[serde(default = "default_atr_window")]
    pub atr_window: usize,

    /// Close re-attempts before escalating to an operator alert
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
}

fn default_max_open_positions() -> usize {
    5
}
fn default_atr_window() -> usize {
    14
}
fn default_retry_budget() -> u32 {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_open_positions: default_max_open_positions(),
            atr_window: default_atr_window(),
            retry_budget: default_retry_budget(),
        }
    }
}

/// Execution configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExecutionConfig {
    /// Paper or live venue binding
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Transient-failure retry policy
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Execution mode: paper simulation or live venue
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Price feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Instrument symbol the engine trades
    #[serde(default = "default_instrument")]
    pub instrument: String,

    /// Candle CSV for replay mode
    #[serde(default)]
    pub data_path: Option<PathBuf>,

    /// Pacing between replayed ticks; 0 replays at full speed
    #[serde(default)]
    pub tick_interval_ms: u64,
}

fn default_instrument() -> String {
    "BTC-USDT-SWAP".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            instrument: default_instrument(),
            data_path: None,
            tick_interval_ms: 0,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the engine misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
            ConfigError::Invalid { field, reason }
        }

        if self.policy.atr_multiplier <= Decimal::ZERO {
            return Err(invalid("policy.atr_multiplier", "must be positive"));
        }
        if self.policy.take_profit_ratio <= Decimal::ZERO {
            return Err(invalid("policy.take_profit_ratio", "must be positive"));
        }
        if self.policy.stop_min_distance <= Decimal::ZERO {
            return Err(invalid("policy.stop_min_distance", "must be positive"));
        }
        if self.policy.breakeven_activation < Decimal::ZERO
            || self.policy.breakeven_buffer < Decimal::ZERO
        {
            return Err(invalid("policy.breakeven", "must be non-negative"));
        }
        if self.engine.atr_window == 0 {
            return Err(invalid("engine.atr_window", "must be at least 1"));
        }
        if self.engine.max_open_positions == 0 {
            return Err(invalid("engine.max_open_positions", "must be at least 1"));
        }
        if self.engine.retry_budget == 0 {
            return Err(invalid("engine.retry_budget", "must be at least 1"));
        }
        if self.execution.retry.max_attempts == 0 {
            return Err(invalid("execution.retry.max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}
