//! Scan configuration (TOML) and the per-run scan request.

use chanscan_core::data::{ExclusionRule, UniverseFilter};
use chanscan_core::domain::KlType;
use chanscan_core::engine::{AdjustMode, DataSource, EngineConfig, EngineRequest};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest analysis window accepted in a config file.
pub const MAX_HISTORY_DAYS: u32 = 1000;
/// Widest recency window accepted in a config file.
pub const MAX_RECENCY_DAYS: u32 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level configuration file. Every section and field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    pub scan: ScanSection,
    pub data: DataSection,
    pub engine: EngineConfig,
    pub universe: UniverseSection,
    pub paths: PathsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    /// Analysis window: `begin = today - history_days`.
    pub history_days: u32,
    /// Entry signals older than this many days are not hits.
    pub recency_days: u32,
    /// Symbols whose last bar is older than this are skipped.
    pub staleness_days: u32,
    pub level: KlType,
    pub workers: usize,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            history_days: 365,
            recency_days: 3,
            staleness_days: 15,
            level: KlType::Day,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DataSection {
    pub source: DataSource,
    pub adjust: AdjustMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseSection {
    /// Enabled exclusion rules by name. Order in the file does not matter.
    pub exclude: Vec<String>,
}

impl Default for UniverseSection {
    fn default() -> Self {
        Self {
            exclude: ExclusionRule::ORDER
                .iter()
                .map(|r| r.key().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub cache_dir: PathBuf,
    pub result_dir: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data"),
            result_dir: PathBuf::from("Result"),
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScanConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            field: "config",
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |field: &'static str, value: u64| {
            if value == 0 {
                Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".into(),
                })
            } else {
                Ok(())
            }
        };
        let at_most = |field: &'static str, value: u32, max: u32| {
            if value > max {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} exceeds the maximum of {max}"),
                })
            } else {
                Ok(())
            }
        };
        positive("scan.history_days", self.scan.history_days.into())?;
        positive("scan.recency_days", self.scan.recency_days.into())?;
        positive("scan.workers", self.scan.workers as u64)?;
        at_most("scan.history_days", self.scan.history_days, MAX_HISTORY_DAYS)?;
        at_most("scan.recency_days", self.scan.recency_days, MAX_RECENCY_DAYS)?;
        self.exclusion_rules()?;
        Ok(())
    }

    pub fn exclusion_rules(&self) -> Result<Vec<ExclusionRule>, ConfigError> {
        self.universe
            .exclude
            .iter()
            .map(|name| {
                name.parse::<ExclusionRule>()
                    .map_err(|reason| ConfigError::Invalid {
                        field: "universe.exclude",
                        reason,
                    })
            })
            .collect()
    }

    pub fn universe_filter(&self) -> Result<UniverseFilter, ConfigError> {
        Ok(UniverseFilter::with_rules(&self.exclusion_rules()?))
    }
}

/// Immutable per-run parameters, built once from the config and today's date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRequest {
    pub today: NaiveDate,
    pub begin: NaiveDate,
    pub end: NaiveDate,
    pub level: KlType,
    pub recency_days: u32,
    pub staleness_days: u32,
    pub engine: EngineConfig,
    pub data_source: DataSource,
    pub adjust: AdjustMode,
}

/// Engine-affecting subset of a request, hashed for cache validation.
#[derive(Serialize)]
struct FingerprintInput<'a> {
    begin: NaiveDate,
    end: NaiveDate,
    level: KlType,
    engine: &'a EngineConfig,
    data_source: &'a DataSource,
    adjust: AdjustMode,
}

impl ScanRequest {
    pub fn from_config(config: &ScanConfig, today: NaiveDate) -> Self {
        Self {
            today,
            begin: days_before(today, config.scan.history_days),
            end: today,
            level: config.scan.level,
            recency_days: config.scan.recency_days,
            staleness_days: config.scan.staleness_days,
            engine: config.engine.clone(),
            data_source: config.data.source.clone(),
            adjust: config.data.adjust,
        }
    }

    /// First day of the recency window (inclusive).
    pub fn recency_start(&self) -> NaiveDate {
        days_before(self.today, self.recency_days)
    }

    /// True if `date` lies in `[today - recency_days, today]`.
    pub fn is_recent(&self, date: NaiveDate) -> bool {
        date >= self.recency_start() && date <= self.today
    }

    /// Engine invocation for one exchange-qualified code.
    pub fn engine_request(&self, full_code: &str) -> EngineRequest {
        EngineRequest {
            code: full_code.to_string(),
            begin: self.begin,
            end: self.end,
            data_source: self.data_source.clone(),
            levels: vec![self.level],
            config: self.engine.clone(),
            adjust: self.adjust,
        }
    }

    /// BLAKE3 hash of the parameters that change what the engine returns.
    ///
    /// Symbol records cached under a different fingerprint are ignored.
    pub fn fingerprint(&self) -> String {
        let input = FingerprintInput {
            begin: self.begin,
            end: self.end,
            level: self.level,
            engine: &self.engine,
            data_source: &self.data_source,
            adjust: self.adjust,
        };
        let json = serde_json::to_vec(&input).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

/// `date - days`, clamped to the earliest representable date.
fn days_before(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}
