//! Application configuration.
//!
//! Loaded from a TOML file with `BALLAST_`-prefixed environment
//! overrides (double underscore as section separator, e.g.
//! `BALLAST_REBALANCE__MAX_RETRIES=5`). Validation runs at load time so
//! a bad config aborts before any broker call.

use crate::error::{AppError, AppResult};
use ballast_broker::BrokerConfig;
use ballast_core::TargetAllocation;
use ballast_engine::RebalanceConfig;
use ballast_notify::NotifyConfig;
use ballast_risk::RiskConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Filesystem layout and lock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all durable state. Default: "data".
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Lock acquisition timeout in seconds. Default: 30.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    /// Days to keep state backups. Default: 30.
    #[serde(default = "default_backup_retention_days")]
    pub backup_retention_days: i64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_lock_timeout_secs() -> u64 {
    30
}

fn default_backup_retention_days() -> i64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lock_timeout_secs: default_lock_timeout_secs(),
            backup_retention_days: default_backup_retention_days(),
        }
    }
}

impl StorageConfig {
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("ballast.lock")
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("last_rebalance.json")
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("transactions")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.data_dir.join("metrics.json")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Target allocation: symbol -> weight. Must sum to 1.0.
    pub allocation: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load from `path` with `BALLAST_` environment overrides, then
    /// validate.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("BALLAST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let app_config: AppConfig = settings.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Validated target allocation.
    pub fn target_allocation(&self) -> AppResult<TargetAllocation> {
        Ok(TargetAllocation::new(self.allocation.clone())?)
    }

    fn validate(&self) -> AppResult<()> {
        // Allocation validity (weights in range, sum to 1).
        self.target_allocation()?;

        if self.rebalance.drift_threshold <= Decimal::ZERO
            || self.rebalance.drift_threshold >= Decimal::ONE
        {
            return Err(AppError::Config(format!(
                "drift_threshold must be in (0, 1), got {}",
                self.rebalance.drift_threshold
            )));
        }
        if self.rebalance.min_days_between < 0 {
            return Err(AppError::Config(
                "min_days_between must not be negative".to_string(),
            ));
        }
        if self.rebalance.min_trade_usd < Decimal::ZERO {
            return Err(AppError::Config(
                "min_trade_usd must not be negative".to_string(),
            ));
        }
        if self.risk.max_daily_loss <= Decimal::ZERO {
            return Err(AppError::Config(
                "max_daily_loss must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
