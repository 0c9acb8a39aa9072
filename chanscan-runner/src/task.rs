//! Analysis task: one symbol in, one outcome out.
//!
//! The task never returns an error and never lets an engine panic escape;
//! everything that can go wrong is folded into [`AnalysisOutcome`].

use chanscan_core::data::AnalysisRecord;
use chanscan_core::domain::{qualify_code, SignalEvent, Symbol};
use chanscan_core::engine::{AnalysisEngine, AnalysisHandle, EngineError};
use chanscan_core::ScanContext;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ScanRequest;
use crate::outcome::AnalysisOutcome;

/// Runs the engine for single symbols, with the symbol-level cache in front.
#[derive(Clone)]
pub struct Analyzer {
    engine: Arc<dyn AnalysisEngine>,
    ctx: ScanContext,
}

impl Analyzer {
    pub fn new(engine: Arc<dyn AnalysisEngine>, ctx: ScanContext) -> Self {
        Self { engine, ctx }
    }

    pub fn context(&self) -> &ScanContext {
        &self.ctx
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Analyze a symbol, answering from today's cache record when one exists
    /// for the same request fingerprint.
    pub fn analyze(&self, symbol: &Symbol, request: &ScanRequest) -> AnalysisOutcome {
        if let Some(outcome) = self.from_cache(symbol, request) {
            return outcome;
        }
        self.analyze_fresh(symbol, request)
    }

    /// Analyze a symbol through the engine, skipping the cache read.
    ///
    /// The resulting metadata is still written to the cache.
    pub fn analyze_fresh(&self, symbol: &Symbol, request: &ScanRequest) -> AnalysisOutcome {
        let full_code = qualify_code(&symbol.code);
        let engine_request = request.engine_request(&full_code);

        let invoked = catch_unwind(AssertUnwindSafe(|| {
            self.engine.analyze(&engine_request).map(|handle| {
                let signals = handle.latest_signals(request.level, 0);
                let last_bar = handle.last_bar(request.level).map(|b| b.date());
                (handle, signals, last_bar)
            })
        }));

        let (handle, signals, last_bar) = match invoked {
            Ok(Ok(parts)) => parts,
            Ok(Err(error)) => {
                debug!(code = %full_code, %error, "engine error");
                return AnalysisOutcome::Failed { error };
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(code = %full_code, %message, "engine panicked");
                return AnalysisOutcome::Failed {
                    error: EngineError::Panicked {
                        code: full_code,
                        message,
                    },
                };
            }
        };

        let Some(last) = last_bar else {
            debug!(code = %full_code, "no bars");
            return AnalysisOutcome::SkippedStale { last_bar: None };
        };
        let age = (request.today - last).num_days();
        if age > i64::from(request.staleness_days) {
            debug!(code = %full_code, %last, age, "stale, skipped");
            return AnalysisOutcome::SkippedStale {
                last_bar: Some(last),
            };
        }

        self.store(symbol, request, &signals);
        let handle: Arc<dyn AnalysisHandle> = Arc::from(handle);
        AnalysisOutcome::Succeeded {
            signals,
            handle: Some(handle),
            from_cache: false,
        }
    }

    fn from_cache(&self, symbol: &Symbol, request: &ScanRequest) -> Option<AnalysisOutcome> {
        let cache = self.ctx.cache()?;
        let record = match cache.get_analysis(self.ctx.today, &symbol.code) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!(code = %symbol.code, error = %e, "analysis cache read failed");
                return None;
            }
        };
        if record.request_fingerprint.as_deref() != Some(request.fingerprint().as_str()) {
            debug!(code = %symbol.code, "cached record from a different request, ignored");
            return None;
        }
        debug!(code = %symbol.code, "analysis cache hit");
        Some(AnalysisOutcome::Succeeded {
            signals: record.signals(),
            handle: None,
            from_cache: true,
        })
    }

    fn store(&self, symbol: &Symbol, request: &ScanRequest, signals: &[SignalEvent]) {
        let Some(cache) = self.ctx.cache() else {
            return;
        };
        let record = AnalysisRecord::from_signals(
            symbol,
            request.level,
            self.ctx.today,
            signals,
            Some(request.fingerprint()),
        );
        if let Err(e) = cache.put_analysis(&record) {
            warn!(code = %symbol.code, error = %e, "failed to cache analysis record");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use chanscan_core::data::{CacheManager, SyntheticEngine};
    use chanscan_core::domain::KlType;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn request() -> ScanRequest {
        ScanRequest::from_config(&ScanConfig::default(), today())
    }

    #[test]
    fn fresh_analysis_returns_handle() {
        let analyzer = Analyzer::new(Arc::new(SyntheticEngine::new()), ScanContext::new(today()));
        let outcome = analyzer.analyze(&Symbol::new("600000", "浦发银行"), &request());
        let handle = outcome.handle().expect("handle");
        assert_eq!(handle.code(), "sh.600000");
        assert!(!handle.bars(KlType::Day).is_empty());
    }

    #[test]
    fn engine_error_becomes_failed() {
        let engine = SyntheticEngine::new().fail_on("000001");
        let analyzer = Analyzer::new(Arc::new(engine), ScanContext::new(today()));
        let outcome = analyzer.analyze(&Symbol::new("000001", "平安银行"), &request());
        assert!(matches!(
            outcome,
            AnalysisOutcome::Failed {
                error: EngineError::InvocationFailed { .. }
            }
        ));
    }

    #[test]
    fn engine_panic_is_contained() {
        let engine = SyntheticEngine::new().panic_on("000002");
        let analyzer = Analyzer::new(Arc::new(engine), ScanContext::new(today()));
        let outcome = analyzer.analyze(&Symbol::new("000002", "万科A"), &request());
        match outcome {
            AnalysisOutcome::Failed {
                error: EngineError::Panicked { code, message },
            } => {
                assert_eq!(code, "sz.000002");
                assert!(message.contains("synthetic engine panic"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn old_last_bar_is_stale() {
        let halted = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        let engine = SyntheticEngine::new().halt("600036", halted);
        let analyzer = Analyzer::new(Arc::new(engine), ScanContext::new(today()));
        let outcome = analyzer.analyze(&Symbol::new("600036", "招商银行"), &request());
        assert!(matches!(
            outcome,
            AnalysisOutcome::SkippedStale { last_bar: Some(d) } if d == halted
        ));
    }

    #[test]
    fn last_bar_at_threshold_is_not_stale() {
        // 2024-05-20 is a Monday, exactly 14 days before today.
        let halted = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let engine = SyntheticEngine::new().halt("600036", halted);
        let analyzer = Analyzer::new(Arc::new(engine), ScanContext::new(today()));
        let outcome = analyzer.analyze(&Symbol::new("600036", "招商银行"), &request());
        assert!(outcome.is_succeeded());
    }

    #[test]
    fn second_call_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ScanContext::new(today()).with_cache(CacheManager::new(dir.path()));
        let analyzer = Analyzer::new(Arc::new(SyntheticEngine::new()), ctx);
        let symbol = Symbol::new("000001", "平安银行");

        let first = analyzer.analyze(&symbol, &request());
        let second = analyzer.analyze(&symbol, &request());

        assert!(matches!(first, AnalysisOutcome::Succeeded { from_cache: false, .. }));
        assert!(matches!(second, AnalysisOutcome::Succeeded { from_cache: true, .. }));
        assert!(second.handle().is_none());
        let entry_dates = |o: &AnalysisOutcome| -> Vec<_> {
            o.signals()
                .iter()
                .filter(|s| s.direction.is_entry())
                .take(5)
                .map(|s| s.date())
                .collect()
        };
        assert_eq!(entry_dates(&first), entry_dates(&second));
    }

    #[test]
    fn changed_request_bypasses_cached_record() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ScanContext::new(today()).with_cache(CacheManager::new(dir.path()));
        let analyzer = Analyzer::new(Arc::new(SyntheticEngine::new()), ctx);
        let symbol = Symbol::new("000001", "平安银行");

        analyzer.analyze(&symbol, &request());
        let mut other = request();
        other.engine.bs_type = "1".into();
        let outcome = analyzer.analyze(&symbol, &other);
        assert!(matches!(outcome, AnalysisOutcome::Succeeded { from_cache: false, .. }));
    }
}
