//! Per-symbol outcomes and the aggregated scan report.

use chanscan_core::domain::{KlType, SignalEvent, Symbol};
use chanscan_core::engine::{AnalysisHandle, EngineError};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Result of analyzing one symbol. Exactly one per symbol per run.
pub enum AnalysisOutcome {
    /// Signals latest first. `handle` is absent when served from the cache.
    Succeeded {
        signals: Vec<SignalEvent>,
        handle: Option<Arc<dyn AnalysisHandle>>,
        from_cache: bool,
    },
    /// No bars, or the last bar is older than the staleness threshold.
    SkippedStale { last_bar: Option<NaiveDate> },
    Failed { error: EngineError },
}

impl AnalysisOutcome {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, AnalysisOutcome::Succeeded { .. })
    }

    pub fn signals(&self) -> &[SignalEvent] {
        match self {
            AnalysisOutcome::Succeeded { signals, .. } => signals,
            _ => &[],
        }
    }

    pub fn handle(&self) -> Option<&Arc<dyn AnalysisHandle>> {
        match self {
            AnalysisOutcome::Succeeded { handle, .. } => handle.as_ref(),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisOutcome::Succeeded { from_cache: true, .. } => "cached",
            AnalysisOutcome::Succeeded { .. } => "succeeded",
            AnalysisOutcome::SkippedStale { .. } => "stale",
            AnalysisOutcome::Failed { .. } => "failed",
        }
    }
}

impl fmt::Debug for AnalysisOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisOutcome::Succeeded {
                signals,
                handle,
                from_cache,
            } => f
                .debug_struct("Succeeded")
                .field("signals", &signals.len())
                .field("handle", &handle.as_ref().map(|h| h.code().to_string()))
                .field("from_cache", from_cache)
                .finish(),
            AnalysisOutcome::SkippedStale { last_bar } => f
                .debug_struct("SkippedStale")
                .field("last_bar", last_bar)
                .finish(),
            AnalysisOutcome::Failed { error } => {
                f.debug_struct("Failed").field("error", error).finish()
            }
        }
    }
}

/// A symbol with at least one recent entry signal.
#[derive(Clone)]
pub struct SymbolHit {
    pub symbol: Symbol,
    pub level: KlType,
    /// Most recent qualifying entry signal.
    pub signal: SignalEvent,
    pub handle: Option<Arc<dyn AnalysisHandle>>,
}

impl fmt::Debug for SymbolHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolHit")
            .field("symbol", &self.symbol.code)
            .field("level", &self.level)
            .field("signal", &self.signal)
            .field("handle", &self.handle.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Stale,
    Error,
}

/// A symbol that was skipped or failed, with a readable reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanFailure {
    pub code: String,
    pub name: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Counts for one run.
///
/// `attempted == succeeded + skipped_or_failed()` and `signal_hits` equals the
/// number of hits in the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub signal_hits: usize,
}

impl ScanSummary {
    pub fn skipped_or_failed(&self) -> usize {
        self.skipped + self.failed
    }

    pub fn record(&mut self, outcome: &AnalysisOutcome) {
        self.attempted += 1;
        match outcome {
            AnalysisOutcome::Succeeded { .. } => self.succeeded += 1,
            AnalysisOutcome::SkippedStale { .. } => self.skipped += 1,
            AnalysisOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Everything one scan produced, in universe order.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub date: NaiveDate,
    pub level: KlType,
    pub hits: Vec<SymbolHit>,
    pub summary: ScanSummary,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    pub fn empty(date: NaiveDate, level: KlType) -> Self {
        Self {
            date,
            level,
            hits: Vec::new(),
            summary: ScanSummary::default(),
            failures: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_records_each_variant() {
        let mut summary = ScanSummary::default();
        summary.record(&AnalysisOutcome::Succeeded {
            signals: Vec::new(),
            handle: None,
            from_cache: false,
        });
        summary.record(&AnalysisOutcome::SkippedStale { last_bar: None });
        summary.record(&AnalysisOutcome::Failed {
            error: EngineError::NoData {
                code: "sz.000001".into(),
            },
        });
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped_or_failed(), 2);
    }
}
