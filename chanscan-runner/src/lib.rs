//! ChanScan Runner — configuration, scan orchestration, archiving.
//!
//! Provides:
//! - `ScanConfig` (TOML) and the per-run `ScanRequest`
//! - `Analyzer`: one symbol through the engine, cache in front
//! - `Scanner`: sequential or pooled scan over a universe snapshot
//! - `analyze_symbol`: single-symbol analysis
//! - `ResultArchiver`: dated scan and single-symbol archives

pub mod config;
pub mod outcome;
pub mod reporting;
pub mod scan;
pub mod single;
pub mod task;

pub use config::{ConfigError, ScanConfig, ScanRequest};
pub use outcome::{AnalysisOutcome, FailureKind, ScanFailure, ScanReport, ScanSummary, SymbolHit};
pub use reporting::{
    ArchiveError, ChartError, ChartRenderer, HtmlChartRenderer, ResultArchiver, ScanArchivePaths,
    SymbolArchivePaths,
};
pub use scan::{select_hit, NoProgress, ScanProgress, Scanner, TracingProgress};
pub use single::{analyze_symbol, SingleError, SymbolAnalysis};
pub use task::Analyzer;
