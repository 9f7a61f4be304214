//! Configuration file support for the coach tools.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/coach/config.toml`.
//! Every engine tunable defaults to the standard constant, so an empty or
//! missing file reproduces the stock behaviour.

use crate::schedule::TrainingSchedule;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub adaptive: AdaptiveConfig,

    #[serde(default)]
    pub recomp: RecompConfig,

    #[serde(default)]
    pub schedule: TrainingSchedule,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Identity used to key snapshot records
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
        }
    }
}

/// Adaptive targets engine parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AdaptiveConfig {
    /// EMA window N; alpha = 2 / (N + 1)
    #[serde(default = "default_ema_window")]
    pub ema_window: usize,

    /// Max day-to-day change (kg) against the last kept sample
    #[serde(default = "default_outlier_threshold_kg")]
    pub outlier_threshold_kg: f64,

    /// How far back the comparison EMA is taken
    #[serde(default = "default_comparison_days")]
    pub comparison_days: i64,

    /// Symmetric clamp on the feedback adjustment (kcal)
    #[serde(default = "default_max_adjustment_kcal")]
    pub max_adjustment_kcal: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            ema_window: default_ema_window(),
            outlier_threshold_kg: default_outlier_threshold_kg(),
            comparison_days: default_comparison_days(),
            max_adjustment_kcal: default_max_adjustment_kcal(),
        }
    }
}

/// Recomposition engine parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecompConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Percent above TDEE on training days
    #[serde(default = "default_cycle_pct")]
    pub training_day_pct: f64,

    /// Percent below TDEE on rest days
    #[serde(default = "default_cycle_pct")]
    pub rest_day_pct: f64,
}

impl Default for RecompConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            training_day_pct: default_cycle_pct(),
            rest_day_pct: default_cycle_pct(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|_| PathBuf::from("."))
    });
    base.join("coach")
}

fn default_user_id() -> String {
    "default".into()
}

fn default_ema_window() -> usize {
    7
}

fn default_outlier_threshold_kg() -> f64 {
    2.0
}

fn default_comparison_days() -> i64 {
    7
}

fn default_max_adjustment_kcal() -> f64 {
    300.0
}

fn default_lookback_days() -> i64 {
    28
}

fn default_cycle_pct() -> f64 {
    10.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject tunables the engines cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.adaptive.ema_window == 0 {
            return Err(Error::Config("adaptive.ema_window must be at least 1".into()));
        }
        let threshold = self.adaptive.outlier_threshold_kg;
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(Error::Config(
                "adaptive.outlier_threshold_kg must be positive".into(),
            ));
        }
        if self.adaptive.comparison_days <= 0 {
            return Err(Error::Config(
                "adaptive.comparison_days must be positive".into(),
            ));
        }
        let max_adjustment = self.adaptive.max_adjustment_kcal;
        if !(max_adjustment.is_finite() && max_adjustment >= 0.0) {
            return Err(Error::Config(
                "adaptive.max_adjustment_kcal must be a finite, non-negative number".into(),
            ));
        }
        if self.recomp.lookback_days <= 0 {
            return Err(Error::Config("recomp.lookback_days must be positive".into()));
        }
        if !(0.0..100.0).contains(&self.recomp.training_day_pct)
            || !(0.0..100.0).contains(&self.recomp.rest_day_pct)
        {
            return Err(Error::Config(
                "recomp cycle percentages must be within 0-100".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        base.join("coach").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
