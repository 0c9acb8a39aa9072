//! Scan orchestrator: runs the analysis task over a universe and collects
//! hits, counts, and failures.
//!
//! Per-symbol failures never abort a scan. With more than one worker the
//! symbols are analyzed on a dedicated rayon pool of that size; results are
//! still collected in universe order.

use chanscan_core::domain::{SignalEvent, Symbol, UniverseSnapshot};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::config::ScanRequest;
use crate::outcome::{
    AnalysisOutcome, FailureKind, ScanFailure, ScanReport, ScanSummary, SymbolHit,
};
use crate::task::Analyzer;

/// Progress callbacks for a scan. Called from worker threads when pooled.
pub trait ScanProgress: Send + Sync {
    /// Called after each symbol. `position` is the symbol's 1-based place in
    /// the universe, so the last symbol reports `position == total`.
    fn on_symbol(&self, position: usize, total: usize, symbol: &Symbol, outcome: &AnalysisOutcome);

    /// Called once when the scan is done.
    fn on_complete(&self, _summary: &ScanSummary) {}
}

/// Discards progress.
pub struct NoProgress;

impl ScanProgress for NoProgress {
    fn on_symbol(&self, _: usize, _: usize, _: &Symbol, _: &AnalysisOutcome) {}
}

/// Logs progress through `tracing`: every symbol at debug, a heartbeat at
/// info every `every` completed symbols.
pub struct TracingProgress {
    every: usize,
    done: AtomicUsize,
}

impl TracingProgress {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
            done: AtomicUsize::new(0),
        }
    }
}

impl Default for TracingProgress {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ScanProgress for TracingProgress {
    fn on_symbol(&self, position: usize, total: usize, symbol: &Symbol, outcome: &AnalysisOutcome) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(position, total, code = %symbol.code, outcome = outcome.label(), "symbol analyzed");
        if done % self.every == 0 || done == total {
            info!("[{done}/{total}] analyzed");
        }
    }

    fn on_complete(&self, summary: &ScanSummary) {
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            hits = summary.signal_hits,
            "scan complete"
        );
    }
}

/// Most recent entry signal inside the recency window.
///
/// `signals` are in engine order. Among events with the same timestamp the
/// one with the later engine index wins.
pub fn select_hit<'a>(signals: &'a [SignalEvent], request: &ScanRequest) -> Option<&'a SignalEvent> {
    signals
        .iter()
        .filter(|s| s.direction.is_entry() && request.is_recent(s.date()))
        .max_by_key(|s| s.time)
}

pub struct Scanner {
    analyzer: Analyzer,
    workers: usize,
}

impl Scanner {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer,
            workers: 1,
        }
    }

    /// Number of concurrent analyses. `1` (the default) is sequential.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn run(
        &self,
        universe: &UniverseSnapshot,
        request: &ScanRequest,
        progress: &dyn ScanProgress,
    ) -> ScanReport {
        let symbols = universe.symbols();
        let total = symbols.len();
        info!(
            symbols = total,
            level = request.level.label(),
            workers = self.workers,
            engine = self.analyzer.engine_name(),
            "scan started"
        );

        let analyze_one = |index: usize, symbol: &Symbol| {
            let outcome = self.analyzer.analyze(symbol, request);
            progress.on_symbol(index + 1, total, symbol, &outcome);
            outcome
        };

        let outcomes: Vec<AnalysisOutcome> = if self.workers > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
            {
                Ok(pool) => pool.install(|| {
                    symbols
                        .par_iter()
                        .enumerate()
                        .map(|(i, s)| analyze_one(i, s))
                        .collect()
                }),
                Err(e) => {
                    warn!(error = %e, "failed to build worker pool, scanning sequentially");
                    symbols
                        .iter()
                        .enumerate()
                        .map(|(i, s)| analyze_one(i, s))
                        .collect()
                }
            }
        } else {
            symbols
                .iter()
                .enumerate()
                .map(|(i, s)| analyze_one(i, s))
                .collect()
        };

        let report = assemble(request, symbols, outcomes);
        progress.on_complete(&report.summary);
        report
    }
}

fn assemble(
    request: &ScanRequest,
    symbols: &[Symbol],
    outcomes: Vec<AnalysisOutcome>,
) -> ScanReport {
    let level = request.level;
    let mut report = ScanReport::empty(request.today, level);

    for (symbol, outcome) in symbols.iter().zip(outcomes) {
        report.summary.record(&outcome);
        match outcome {
            AnalysisOutcome::Succeeded {
                signals, handle, ..
            } => {
                if let Some(signal) = select_hit(&signals, request) {
                    report.hits.push(SymbolHit {
                        symbol: symbol.clone(),
                        level,
                        signal: signal.clone(),
                        handle,
                    });
                }
            }
            AnalysisOutcome::SkippedStale { last_bar } => report.failures.push(ScanFailure {
                code: symbol.code.clone(),
                name: symbol.name.clone(),
                kind: FailureKind::Stale,
                reason: match last_bar {
                    Some(d) => format!("last bar {d} is stale"),
                    None => "no bars".to_string(),
                },
            }),
            AnalysisOutcome::Failed { error } => report.failures.push(ScanFailure {
                code: symbol.code.clone(),
                name: symbol.name.clone(),
                kind: FailureKind::Error,
                reason: error.to_string(),
            }),
        }
    }
    report.summary.signal_hits = report.hits.len();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use chrono::{NaiveDate, NaiveDateTime};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn at(m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn request() -> ScanRequest {
        ScanRequest::from_config(&ScanConfig::default(), today())
    }

    #[test]
    fn exit_signals_never_hit() {
        let signals = vec![SignalEvent::exit("1", at(6, 3), None)];
        assert!(select_hit(&signals, &request()).is_none());
    }

    #[test]
    fn window_is_closed_on_both_ends() {
        let lower = vec![SignalEvent::entry("1", at(5, 31), None)];
        let upper = vec![SignalEvent::entry("1", at(6, 3), None)];
        let outside = vec![SignalEvent::entry("1", at(5, 30), None)];
        assert!(select_hit(&lower, &request()).is_some());
        assert!(select_hit(&upper, &request()).is_some());
        assert!(select_hit(&outside, &request()).is_none());
    }

    #[test]
    fn most_recent_entry_wins() {
        let signals = vec![
            SignalEvent::entry("2", at(6, 3), None),
            SignalEvent::entry("1", at(6, 1), None),
        ];
        assert_eq!(select_hit(&signals, &request()).unwrap().kind, "2");
    }

    #[derive(Default)]
    struct Positions(std::sync::Mutex<Vec<(usize, usize)>>);

    impl ScanProgress for Positions {
        fn on_symbol(&self, position: usize, total: usize, _: &Symbol, _: &AnalysisOutcome) {
            self.0.lock().unwrap().push((position, total));
        }
    }

    #[test]
    fn sequential_progress_counts_from_one() {
        use chanscan_core::data::SyntheticEngine;
        use chanscan_core::ScanContext;
        use std::sync::Arc;

        let universe = UniverseSnapshot::new(
            today(),
            vec![
                Symbol::new("600000", "A"),
                Symbol::new("000001", "B"),
                Symbol::new("000002", "C"),
            ],
        );
        let analyzer = Analyzer::new(Arc::new(SyntheticEngine::new()), ScanContext::new(today()));
        let positions = Positions::default();
        Scanner::new(analyzer).run(&universe, &request(), &positions);

        assert_eq!(*positions.0.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn tie_goes_to_later_index() {
        let signals = vec![
            SignalEvent::entry("1", at(6, 3), None),
            SignalEvent::entry("2s", at(6, 3), None),
        ];
        assert_eq!(select_hit(&signals, &request()).unwrap().kind, "2s");
    }
}
