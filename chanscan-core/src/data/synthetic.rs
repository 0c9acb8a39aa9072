//! Deterministic synthetic provider and engine for offline development,
//! tests, and benchmarks.
//!
//! Bars are a seeded random walk (seed = BLAKE3 of the qualified code and
//! level), so the same request always yields the same series. Signals are
//! swing pivots: a bar whose low is the lowest within `PIVOT_SPAN` bars on
//! each side is an entry, a bar whose high is the highest is an exit.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

use super::provider::{MarketDataProvider, ProviderError, RawListing};
use crate::domain::{Bar, KlType, SignalEvent};
use crate::engine::{AnalysisEngine, AnalysisHandle, EngineError, EngineRequest};

const PIVOT_SPAN: usize = 3;
const SIGNAL_KINDS: [&str; 6] = ["1", "1p", "2", "2s", "3a", "3b"];

/// Listing used by [`SyntheticProvider::new`]. Covers every exclusion rule.
const BASE_LISTING: [(&str, &str, &str); 14] = [
    ("sh.600000", "1", "浦发银行"),
    ("sh.600036", "1", "招商银行"),
    ("sh.601398", "1", "工商银行"),
    ("sh.603288", "1", "海天味业"),
    ("sz.000001", "1", "平安银行"),
    ("sz.000002", "1", "万科A"),
    ("sz.002415", "1", "海康威视"),
    ("sz.300750", "1", "宁德时代"),
    ("sz.000004", "1", "*ST国华"),
    ("sh.688001", "1", "华兴源创"),
    ("bj.830799", "1", "艾融软件"),
    ("sz.200002", "1", "万科B"),
    ("sh.900901", "1", "云赛B股"),
    ("sz.000005", "0", "世纪星源"),
];

/// Provider that answers with a fixed listing.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    listing: RawListing,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticProvider {
    pub fn new() -> Self {
        let rows = BASE_LISTING
            .iter()
            .map(|(c, s, n)| vec![c.to_string(), s.to_string(), n.to_string()])
            .collect();
        Self {
            listing: RawListing::new(Self::fields(), rows),
        }
    }

    /// Base listing plus `extra` generated main-board symbols, alternating
    /// Shanghai `601xxx` and Shenzhen `002xxx` codes.
    pub fn with_extra_symbols(extra: usize) -> Self {
        let mut provider = Self::new();
        for i in 0..extra {
            let code = if i % 2 == 0 {
                format!("sh.601{:03}", 100 + i / 2)
            } else {
                format!("sz.002{:03}", 100 + i / 2)
            };
            provider
                .listing
                .rows
                .push(vec![code, "1".into(), format!("合成{i:04}")]);
        }
        provider
    }

    pub fn from_listing(listing: RawListing) -> Self {
        Self { listing }
    }

    fn fields() -> Vec<String> {
        vec!["code".into(), "tradeStatus".into(), "code_name".into()]
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn login(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn query_listing(&self, day: NaiveDate) -> Result<RawListing, ProviderError> {
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            return Ok(RawListing::new(Self::fields(), Vec::new()));
        }
        Ok(self.listing.clone())
    }

    fn logout(&self) {}
}

/// Engine that fabricates bars and pivot signals.
///
/// Individual codes can be made to fail, panic, or stop trading on a given
/// day, to exercise the failure paths of callers.
#[derive(Debug, Clone, Default)]
pub struct SyntheticEngine {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    halted: HashMap<String, NaiveDate>,
}

impl SyntheticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invocations for `code` (pure or qualified) return an engine error.
    pub fn fail_on(mut self, code: &str) -> Self {
        self.failing.insert(crate::domain::pure_code(code).to_string());
        self
    }

    /// Invocations for `code` panic inside the engine.
    pub fn panic_on(mut self, code: &str) -> Self {
        self.panicking.insert(crate::domain::pure_code(code).to_string());
        self
    }

    /// Bars for `code` end on `last_day`.
    pub fn halt(mut self, code: &str, last_day: NaiveDate) -> Self {
        self.halted
            .insert(crate::domain::pure_code(code).to_string(), last_day);
        self
    }
}

impl AnalysisEngine for SyntheticEngine {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn analyze(&self, request: &EngineRequest) -> Result<Box<dyn AnalysisHandle>, EngineError> {
        let code = crate::domain::pure_code(&request.code);
        if self.failing.contains(code) {
            return Err(EngineError::InvocationFailed {
                code: request.code.clone(),
                reason: "synthetic failure".into(),
            });
        }
        if self.panicking.contains(code) {
            panic!("synthetic engine panic for {}", request.code);
        }

        let end = match self.halted.get(code) {
            Some(last) => (*last).min(request.end),
            None => request.end,
        };

        let mut bars = HashMap::new();
        let mut signals = HashMap::new();
        for &level in &request.levels {
            let series = generate_bars(&request.code, level, request.begin, end);
            signals.insert(level, detect_pivots(&request.code, level, &series));
            bars.insert(level, series);
        }

        Ok(Box::new(SyntheticHandle {
            code: request.code.clone(),
            levels: request.levels.clone(),
            bars,
            signals,
        }))
    }
}

/// Handle produced by [`SyntheticEngine`].
#[derive(Debug, Clone)]
pub struct SyntheticHandle {
    code: String,
    levels: Vec<KlType>,
    bars: HashMap<KlType, Vec<Bar>>,
    /// Oldest first.
    signals: HashMap<KlType, Vec<SignalEvent>>,
}

impl SyntheticHandle {
    /// Build a handle from explicit series. `signals` may be in any order.
    pub fn from_parts(
        code: impl Into<String>,
        level: KlType,
        bars: Vec<Bar>,
        mut signals: Vec<SignalEvent>,
    ) -> Self {
        signals.sort_by_key(|s| s.time);
        Self {
            code: code.into(),
            levels: vec![level],
            bars: HashMap::from([(level, bars)]),
            signals: HashMap::from([(level, signals)]),
        }
    }
}

impl AnalysisHandle for SyntheticHandle {
    fn code(&self) -> &str {
        &self.code
    }

    fn levels(&self) -> &[KlType] {
        &self.levels
    }

    fn bars(&self, level: KlType) -> &[Bar] {
        self.bars.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    fn latest_signals(&self, level: KlType, count: usize) -> Vec<SignalEvent> {
        let Some(all) = self.signals.get(&level) else {
            return Vec::new();
        };
        let take = if count == 0 { all.len() } else { count };
        all.iter().rev().take(take).cloned().collect()
    }
}

fn seeded_rng(code: &str, level: KlType) -> StdRng {
    let seed = blake3::hash(format!("{code}|{}", level.key()).as_bytes());
    StdRng::from_seed(*seed.as_bytes())
}

fn bar_times(level: KlType, begin: NaiveDate, end: NaiveDate) -> Vec<NaiveDateTime> {
    let is_trading_day = |d: NaiveDate| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun);
    let step_minutes = match level {
        KlType::Min1 => Some(1),
        KlType::Min3 => Some(3),
        KlType::Min5 => Some(5),
        KlType::Min15 => Some(15),
        KlType::Min30 => Some(30),
        KlType::Min60 => Some(60),
        _ => None,
    };

    let mut times = Vec::new();
    let mut day = begin;
    match step_minutes {
        Some(step) => {
            let open = NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default();
            while day <= end {
                if is_trading_day(day) {
                    let mut minutes = step;
                    while minutes <= 240 {
                        times.push(day.and_time(open) + Duration::minutes(minutes));
                        minutes += step;
                    }
                }
                day += Duration::days(1);
            }
        }
        None => {
            let step_days = match level {
                KlType::Week => 7,
                KlType::Month => 30,
                KlType::Quarter => 91,
                KlType::Year => 365,
                _ => 1,
            };
            while day <= end {
                if is_trading_day(day) || step_days > 1 {
                    times.push(day.and_time(NaiveTime::default()));
                }
                day += Duration::days(step_days);
            }
        }
    }
    times
}

/// Seeded random walk over the level's bar times.
pub fn generate_bars(code: &str, level: KlType, begin: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    let mut rng = seeded_rng(code, level);
    let mut price = rng.gen_range(5.0..50.0_f64);

    bar_times(level, begin, end)
        .into_iter()
        .map(|time| {
            let ret: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = (price * (1.0 + ret)).max(0.01);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(100_000.0..5_000_000.0);
            price = close;
            Bar {
                time,
                open,
                high,
                low,
                close,
                volume,
            }
        })
        .collect()
}

/// Swing pivots over a bar series, oldest first.
pub fn detect_pivots(code: &str, level: KlType, bars: &[Bar]) -> Vec<SignalEvent> {
    if bars.len() < 2 * PIVOT_SPAN + 1 {
        return Vec::new();
    }
    let mut rng = seeded_rng(code, level);
    let mut out = Vec::new();

    for i in PIVOT_SPAN..bars.len() - PIVOT_SPAN {
        let window = &bars[i - PIVOT_SPAN..=i + PIVOT_SPAN];
        let bar = &bars[i];
        let kind = SIGNAL_KINDS[rng.gen_range(0..SIGNAL_KINDS.len())];
        if window.iter().all(|b| b.low >= bar.low) {
            out.push(SignalEvent::entry(kind, bar.time, Some(bar.close)));
        } else if window.iter().all(|b| b.high <= bar.high) {
            out.push(SignalEvent::exit(kind, bar.time, Some(bar.close)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AdjustMode, DataSource, EngineConfig};

    fn request(code: &str, begin: NaiveDate, end: NaiveDate) -> EngineRequest {
        EngineRequest {
            code: code.into(),
            begin,
            end,
            data_source: DataSource::default(),
            levels: vec![KlType::Day],
            config: EngineConfig::default(),
            adjust: AdjustMode::Forward,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn bars_are_deterministic_and_skip_weekends() {
        let a = generate_bars("sh.600000", KlType::Day, d(2024, 1, 1), d(2024, 3, 31));
        let b = generate_bars("sh.600000", KlType::Day, d(2024, 1, 1), d(2024, 3, 31));
        assert_eq!(a, b);
        assert!(a
            .iter()
            .all(|bar| !matches!(bar.time.weekday(), Weekday::Sat | Weekday::Sun)));
        assert!(a.iter().all(|bar| bar.low <= bar.high));
    }

    #[test]
    fn intraday_bars_carry_clock_times() {
        let bars = generate_bars("sz.000001", KlType::Min30, d(2024, 6, 3), d(2024, 6, 3));
        assert_eq!(bars.len(), 8);
        assert_eq!(bars[0].time.format("%H:%M").to_string(), "10:00");
    }

    #[test]
    fn signals_are_latest_first_and_respect_count() {
        let engine = SyntheticEngine::new();
        let handle = engine
            .analyze(&request("sz.000001", d(2023, 6, 1), d(2024, 6, 1)))
            .unwrap();
        let all = handle.latest_signals(KlType::Day, 0);
        assert!(!all.is_empty());
        assert!(all.windows(2).all(|w| w[0].time >= w[1].time));
        assert_eq!(handle.latest_signals(KlType::Day, 1).len(), 1);
        assert!(handle.latest_signals(KlType::Week, 0).is_empty());
    }

    #[test]
    fn halted_code_ends_early() {
        let engine = SyntheticEngine::new().halt("600000", d(2024, 1, 31));
        let handle = engine
            .analyze(&request("sh.600000", d(2023, 6, 1), d(2024, 6, 1)))
            .unwrap();
        let last = handle.last_bar(KlType::Day).unwrap();
        assert!(last.date() <= d(2024, 1, 31));
    }

    #[test]
    fn failing_code_errors() {
        let engine = SyntheticEngine::new().fail_on("sz.000002");
        assert!(engine
            .analyze(&request("sz.000002", d(2024, 1, 1), d(2024, 6, 1)))
            .is_err());
    }

    #[test]
    fn weekend_listing_is_empty() {
        let provider = SyntheticProvider::new();
        assert!(provider.query_listing(d(2024, 6, 1)).unwrap().is_empty());
        assert_eq!(provider.query_listing(d(2024, 6, 3)).unwrap().rows.len(), 14);
    }

    #[test]
    fn extra_symbols_have_unique_codes() {
        let provider = SyntheticProvider::with_extra_symbols(100);
        let listing = provider.query_listing(d(2024, 6, 3)).unwrap();
        let codes: HashSet<_> = listing.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(codes.len(), listing.rows.len());
    }
}
