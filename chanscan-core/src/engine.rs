//! Analysis engine contract.
//!
//! The pattern-analysis engine is an external collaborator: given a symbol, a
//! date range, a data source, a list of levels and a configuration it returns
//! an analysis handle with per-level bar series and a ranked signal list. The
//! engine may be slow and may fail; callers isolate both.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::{Bar, KlType, SignalEvent};

/// Built-in market data backends the engine knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedProvider {
    BaoStock,
    Csv,
}

impl NamedProvider {
    pub fn key(self) -> &'static str {
        match self {
            NamedProvider::BaoStock => "BAO_STOCK",
            NamedProvider::Csv => "CSV",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            NamedProvider::BaoStock => "BaoStock",
            NamedProvider::Csv => "CSV",
        }
    }
}

/// Data source selector, resolved once when configuration is loaded.
///
/// Serialized as `"BAO_STOCK"` / `"CSV"` for named providers and
/// `"custom:<identifier>"` for externally supplied adapters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataSource {
    Named(NamedProvider),
    Custom(String),
}

impl DataSource {
    pub fn display_name(&self) -> String {
        match self {
            DataSource::Named(p) => p.display_name().to_string(),
            DataSource::Custom(id) => id.clone(),
        }
    }
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::Named(NamedProvider::BaoStock)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Named(p) => f.write_str(p.key()),
            DataSource::Custom(id) => write!(f, "custom:{id}"),
        }
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(id) = s.strip_prefix("custom:") {
            if id.is_empty() {
                return Err("custom data source needs an identifier".into());
            }
            return Ok(DataSource::Custom(id.to_string()));
        }
        match s.to_ascii_uppercase().as_str() {
            "BAO_STOCK" | "BAOSTOCK" => Ok(DataSource::Named(NamedProvider::BaoStock)),
            "CSV" => Ok(DataSource::Named(NamedProvider::Csv)),
            other => Err(format!("unknown data source '{other}'")),
        }
    }
}

impl TryFrom<String> for DataSource {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataSource> for String {
    fn from(value: DataSource) -> Self {
        value.to_string()
    }
}

/// Price adjustment applied to history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdjustMode {
    /// Forward-adjusted (前复权).
    #[default]
    Forward,
    Backward,
    None,
}

/// Engine configuration, forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bi_strict: bool,
    pub trigger_step: bool,
    pub skip_step: u32,
    pub divergence_rate: f64,
    pub bsp2_follow_1: bool,
    pub bsp3_follow_1: bool,
    pub min_zs_cnt: u32,
    pub bs1_peak: bool,
    pub macd_algo: String,
    pub bs_type: String,
    pub print_warning: bool,
    pub zs_algo: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bi_strict: true,
            trigger_step: false,
            skip_step: 0,
            divergence_rate: f64::INFINITY,
            bsp2_follow_1: false,
            bsp3_follow_1: false,
            min_zs_cnt: 0,
            bs1_peak: false,
            macd_algo: "peak".into(),
            bs_type: "1,1p,2,2s,3a,3b".into(),
            print_warning: false,
            zs_algo: "normal".into(),
        }
    }
}

/// Everything the engine needs to analyze one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    /// Exchange-qualified code, e.g. `sz.000001`.
    pub code: String,
    pub begin: NaiveDate,
    pub end: NaiveDate,
    pub data_source: DataSource,
    pub levels: Vec<KlType>,
    pub config: EngineConfig,
    pub adjust: AdjustMode,
}

/// Errors raised by an engine invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine invocation failed for {code}: {reason}")]
    InvocationFailed { code: String, reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("level {level} not analyzed for {code}")]
    LevelUnavailable { code: String, level: KlType },

    #[error("engine panicked while analyzing {code}: {message}")]
    Panicked { code: String, message: String },
}

/// The result of one engine run. Never shared across symbols.
pub trait AnalysisHandle: Send + Sync {
    /// Exchange-qualified code the handle was built for.
    fn code(&self) -> &str;

    /// Levels that were analyzed, in request order.
    fn levels(&self) -> &[KlType];

    /// Bar series for a level (empty when the level was not analyzed).
    fn bars(&self, level: KlType) -> &[Bar];

    /// Ranked signal list for a level, most recent first. `count == 0`
    /// returns all signals.
    fn latest_signals(&self, level: KlType, count: usize) -> Vec<SignalEvent>;

    /// Most recent bar of a level, if any.
    fn last_bar(&self, level: KlType) -> Option<&Bar> {
        self.bars(level).last()
    }
}

/// Pattern-analysis engine.
pub trait AnalysisEngine: Send + Sync {
    fn name(&self) -> &str;

    fn analyze(&self, request: &EngineRequest) -> Result<Box<dyn AnalysisHandle>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_parses_named_and_custom() {
        assert_eq!(
            "BAO_STOCK".parse::<DataSource>().unwrap(),
            DataSource::Named(NamedProvider::BaoStock)
        );
        assert_eq!(
            "custom:QMTAPI.CQMTAPI".parse::<DataSource>().unwrap(),
            DataSource::Custom("QMTAPI.CQMTAPI".into())
        );
        assert!("custom:".parse::<DataSource>().is_err());
        assert!("YAHOO".parse::<DataSource>().is_err());
    }

    #[test]
    fn data_source_string_form_is_stable() {
        let src = DataSource::Custom("QMTAPI.CQMTAPI".into());
        let json = serde_json::to_string(&src).unwrap();
        assert_eq!(json, "\"custom:QMTAPI.CQMTAPI\"");
        let back: DataSource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn default_config_matches_scanner_defaults() {
        let cfg = EngineConfig::default();
        assert!(cfg.bi_strict);
        assert!(cfg.divergence_rate.is_infinite());
        assert_eq!(cfg.bs_type, "1,1p,2,2s,3a,3b");
    }
}
