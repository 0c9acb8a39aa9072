//! Single-symbol analysis: one code, full signal history, chart-ready handle.

use chanscan_core::domain::{is_valid_code, qualify_code, Direction, KlType, SignalEvent, Symbol};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ScanRequest;
use crate::outcome::AnalysisOutcome;
use crate::task::Analyzer;

#[derive(Debug, Error)]
pub enum SingleError {
    #[error("invalid stock code '{0}': expected 6 digits")]
    InvalidCode(String),
}

/// Everything known about one analyzed symbol.
#[derive(Debug)]
pub struct SymbolAnalysis {
    pub symbol: Symbol,
    pub full_code: String,
    pub level: KlType,
    pub analysis_date: NaiveDate,
    /// Entry signals, latest first.
    pub buy_points: Vec<SignalEvent>,
    /// Exit signals, latest first.
    pub sell_points: Vec<SignalEvent>,
    pub outcome: AnalysisOutcome,
}

/// Validate `code`, run the engine fresh, and split the signals by direction.
///
/// The display name comes from today's cached universe when available.
pub fn analyze_symbol(
    analyzer: &Analyzer,
    code: &str,
    request: &ScanRequest,
) -> Result<SymbolAnalysis, SingleError> {
    let code = code.trim();
    if !is_valid_code(code) {
        return Err(SingleError::InvalidCode(code.to_string()));
    }

    let ctx = analyzer.context();
    let name = ctx
        .cache()
        .and_then(|cache| cache.get_universe(ctx.today).ok().flatten())
        .and_then(|snapshot| snapshot.get(code).map(|s| s.name.clone()))
        .unwrap_or_default();
    debug!(code, name = %name, "single-symbol analysis");

    let symbol = Symbol::new(code, name);
    let outcome = analyzer.analyze_fresh(&symbol, request);

    let (buy_points, sell_points): (Vec<SignalEvent>, Vec<SignalEvent>) = outcome
        .signals()
        .iter()
        .cloned()
        .partition(|s| s.direction == Direction::Entry);

    info!(
        code,
        outcome = outcome.label(),
        buy = buy_points.len(),
        sell = sell_points.len(),
        "analysis finished"
    );

    Ok(SymbolAnalysis {
        full_code: qualify_code(code),
        symbol,
        level: request.level,
        analysis_date: request.today,
        buy_points,
        sell_points,
        outcome,
    })
}
