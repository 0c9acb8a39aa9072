//! Result archiving: dated scan archives and single-symbol archives.
//!
//! Scan archive, `{result_dir}/{date}/`:
//! - `scan_results.csv` — one row per hit (overwritten per run)
//! - `scan_stats.json` — run counts (overwritten per run)
//! - `charts/{code}_{level}.html` — one chart per hit (never deleted)
//! - `charts/chart_errors.log` — present only when some charts failed
//!
//! Single-symbol archive, `{result_dir}/{date}/{code}/`: the chart plus
//! `analysis_info.json`.

pub mod charts;
pub mod info;
pub mod stats;
pub mod table;

use chanscan_core::domain::Symbol;
use chanscan_core::engine::AnalysisHandle;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ScanRequest;
use crate::outcome::{AnalysisOutcome, ScanReport};
use crate::single::SymbolAnalysis;
use crate::task::Analyzer;

pub use charts::{chart_file_name, ChartError, ChartRenderer, HtmlChartRenderer, CHART_ERROR_LOG};
pub use info::{AnalysisInfo, InfoPoint, ANALYSIS_INFO};
pub use stats::{ScanStats, SCAN_STATS};
pub use table::SCAN_TABLE;

pub const CHARTS_DIR: &str = "charts";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("nothing to archive for {code}: analysis {outcome}")]
    NothingToArchive { code: String, outcome: &'static str },
}

impl ArchiveError {
    fn write(path: &Path, source: impl Into<std::io::Error>) -> Self {
        ArchiveError::Write {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }
}

/// Files produced by a scan archive.
#[derive(Debug, Clone)]
pub struct ScanArchivePaths {
    pub dir: PathBuf,
    pub table: PathBuf,
    pub stats: PathBuf,
    pub charts: Vec<PathBuf>,
    /// `(code, reason)` for every chart that could not be produced.
    pub chart_errors: Vec<(String, String)>,
    pub chart_error_log: Option<PathBuf>,
}

/// Files produced by a single-symbol archive.
#[derive(Debug, Clone)]
pub struct SymbolArchivePaths {
    pub dir: PathBuf,
    pub chart: Option<PathBuf>,
    pub info: PathBuf,
    pub chart_error_log: Option<PathBuf>,
}

/// Writes archives under a result root.
pub struct ResultArchiver {
    root: PathBuf,
    renderer: Arc<dyn ChartRenderer>,
    rehydrate: Option<(Analyzer, ScanRequest)>,
}

impl ResultArchiver {
    pub fn new(root: impl Into<PathBuf>, renderer: Arc<dyn ChartRenderer>) -> Self {
        Self {
            root: root.into(),
            renderer,
            rehydrate: None,
        }
    }

    /// Archiver with the built-in HTML chart renderer.
    pub fn with_html_charts(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(HtmlChartRenderer::default()))
    }

    /// Hits served from the cache carry no handle; re-run the analysis for
    /// them so their charts can be drawn.
    pub fn with_rehydration(mut self, analyzer: Analyzer, request: ScanRequest) -> Self {
        self.rehydrate = Some((analyzer, request));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scan_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string())
    }

    pub fn symbol_dir(&self, date: NaiveDate, code: &str) -> PathBuf {
        self.scan_dir(date).join(code)
    }

    pub fn archive_scan(
        &self,
        report: &ScanReport,
        date: NaiveDate,
    ) -> Result<ScanArchivePaths, ArchiveError> {
        let dir = self.scan_dir(date);
        let charts_dir = dir.join(CHARTS_DIR);
        fs::create_dir_all(&charts_dir).map_err(|e| ArchiveError::write(&charts_dir, e))?;

        let table_path = dir.join(SCAN_TABLE);
        table::write_scan_table(&table_path, &report.hits)
            .map_err(|e| ArchiveError::write(&table_path, e))?;

        let stats_path = dir.join(SCAN_STATS);
        stats::write_scan_stats(&stats_path, &ScanStats::from_summary(date, &report.summary))
            .map_err(|e| ArchiveError::write(&stats_path, e))?;

        let mut saved = Vec::new();
        let mut chart_errors = Vec::new();
        for hit in &report.hits {
            let path = charts_dir.join(chart_file_name(&hit.symbol.code, hit.level));
            let rendered = match self.handle_for(hit.handle.as_ref(), &hit.symbol) {
                Ok(handle) => self
                    .renderer
                    .render(&*handle, hit.level, &path)
                    .map_err(|e| e.to_string()),
                Err(reason) => Err(reason),
            };
            match rendered {
                Ok(()) => saved.push(path),
                Err(reason) => {
                    warn!(code = %hit.symbol.code, %reason, "chart failed");
                    chart_errors.push((hit.symbol.code.clone(), reason));
                }
            }
        }

        let log_path = charts_dir.join(CHART_ERROR_LOG);
        let logged =
            charts::write_chart_error_log(&log_path, date, report.hits.len(), saved.len(), &chart_errors)
                .map_err(|e| ArchiveError::write(&log_path, e))?;

        info!(
            dir = %dir.display(),
            hits = report.hits.len(),
            charts = saved.len(),
            chart_errors = chart_errors.len(),
            "scan archived"
        );

        Ok(ScanArchivePaths {
            dir,
            table: table_path,
            stats: stats_path,
            charts: saved,
            chart_errors,
            chart_error_log: logged.then_some(log_path),
        })
    }

    pub fn archive_symbol(
        &self,
        analysis: &SymbolAnalysis,
        date: NaiveDate,
    ) -> Result<SymbolArchivePaths, ArchiveError> {
        if !analysis.outcome.is_succeeded() {
            return Err(ArchiveError::NothingToArchive {
                code: analysis.symbol.code.clone(),
                outcome: analysis.outcome.label(),
            });
        }

        let dir = self.symbol_dir(date, &analysis.symbol.code);
        fs::create_dir_all(&dir).map_err(|e| ArchiveError::write(&dir, e))?;

        let chart_path = dir.join(chart_file_name(&analysis.symbol.code, analysis.level));
        let rendered = match self.handle_for(analysis.outcome.handle(), &analysis.symbol) {
            Ok(handle) => self
                .renderer
                .render(&*handle, analysis.level, &chart_path)
                .map_err(|e| e.to_string()),
            Err(reason) => Err(reason),
        };
        let (chart, errors) = match rendered {
            Ok(()) => (Some(chart_path), Vec::new()),
            Err(reason) => {
                warn!(code = %analysis.symbol.code, %reason, "chart failed");
                (None, vec![(analysis.symbol.code.clone(), reason)])
            }
        };
        let log_path = dir.join(CHART_ERROR_LOG);
        let logged = charts::write_chart_error_log(&log_path, date, 1, usize::from(chart.is_some()), &errors)
            .map_err(|e| ArchiveError::write(&log_path, e))?;

        let info_path = dir.join(ANALYSIS_INFO);
        info::write_analysis_info(&info_path, &AnalysisInfo::from_analysis(analysis))
            .map_err(|e| ArchiveError::write(&info_path, e))?;

        info!(dir = %dir.display(), chart = chart.is_some(), "symbol archived");
        Ok(SymbolArchivePaths {
            dir,
            chart,
            info: info_path,
            chart_error_log: logged.then_some(log_path),
        })
    }

    /// The in-memory handle, or a fresh one from the analysis task.
    fn handle_for(
        &self,
        handle: Option<&Arc<dyn AnalysisHandle>>,
        symbol: &Symbol,
    ) -> Result<Arc<dyn AnalysisHandle>, String> {
        if let Some(handle) = handle {
            return Ok(Arc::clone(handle));
        }
        let Some((analyzer, request)) = &self.rehydrate else {
            return Err("no analysis handle available".to_string());
        };
        match analyzer.analyze_fresh(symbol, request) {
            AnalysisOutcome::Succeeded {
                handle: Some(handle),
                ..
            } => Ok(handle),
            AnalysisOutcome::Succeeded { handle: None, .. } => {
                Err("no analysis handle available".to_string())
            }
            AnalysisOutcome::SkippedStale { .. } => Err("rehydration skipped: stale data".to_string()),
            AnalysisOutcome::Failed { error } => Err(format!("rehydration failed: {error}")),
        }
    }
}
