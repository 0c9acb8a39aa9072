//! Two-tier, date-keyed file cache.
//!
//! Layout:
//! - `{cache_dir}/stock_list/{YYYY-MM-DD}.csv` — one universe snapshot per day
//! - `{cache_dir}/analysis/{YYYY-MM-DD}/{code}.json` — per-symbol metadata
//!
//! Entries are only ever valid for the day they were written. Nothing expires
//! eagerly; a lookup for today simply never sees yesterday's files, and
//! [`CacheManager::prune_before`] removes old days when asked to.
//!
//! Writes go to a unique temp file in the target directory and are renamed
//! into place, so concurrent writers never leave a torn file behind.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{
    format_signal_time, parse_signal_time, split_qualified, Direction, Exchange, KlType,
    SignalEvent, Symbol, UniverseSnapshot,
};

/// Subdirectory for universe snapshots.
pub const UNIVERSE_DIR: &str = "stock_list";
/// Subdirectory for per-symbol analysis records.
pub const ANALYSIS_DIR: &str = "analysis";
/// Most recent entry/exit points kept per direction in a symbol record.
pub const MAX_CACHED_POINTS: usize = 20;

const DATE_FORMAT: &str = "%Y-%m-%d";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache CSV error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cache JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("payload does not match cache key {key}")]
    KeyMismatch { key: CacheKey },
}

/// Which tier an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    Universe,
    Symbol,
}

/// Structured cache key. The date is always the day the entry is valid for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Universe { date: NaiveDate },
    Analysis { date: NaiveDate, code: String },
}

impl CacheKey {
    pub fn scope(&self) -> CacheScope {
        match self {
            CacheKey::Universe { .. } => CacheScope::Universe,
            CacheKey::Analysis { .. } => CacheScope::Symbol,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            CacheKey::Universe { date } | CacheKey::Analysis { date, .. } => *date,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Universe { date } => write!(f, "universe/{date}"),
            CacheKey::Analysis { date, code } => write!(f, "analysis/{date}/{code}"),
        }
    }
}

/// Cached value for either tier.
#[derive(Debug, Clone, PartialEq)]
pub enum CachePayload {
    Universe(UniverseSnapshot),
    Analysis(AnalysisRecord),
}

/// One buy/sell point as stored in a symbol record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub time: String,
}

/// Lightweight per-symbol analysis metadata. Never holds an analysis handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub code: String,
    pub full_code: String,
    #[serde(with = "cache_date_format")]
    pub cache_date: NaiveDate,
    #[serde(default)]
    pub kl_type: KlType,
    pub buy_points: Vec<CachedPoint>,
    pub sell_points: Vec<CachedPoint>,
    pub total_buy_points: usize,
    pub total_sell_points: usize,
    #[serde(default)]
    pub request_fingerprint: Option<String>,
}

impl AnalysisRecord {
    /// Build a record from a signal list ordered latest first. Only the
    /// [`MAX_CACHED_POINTS`] most recent points of each direction are kept;
    /// the totals count all of them.
    pub fn from_signals(
        symbol: &Symbol,
        level: KlType,
        date: NaiveDate,
        signals: &[SignalEvent],
        fingerprint: Option<String>,
    ) -> Self {
        let points = |dir: Direction| -> (Vec<CachedPoint>, usize) {
            let all: Vec<&SignalEvent> = signals.iter().filter(|s| s.direction == dir).collect();
            let kept = all
                .iter()
                .take(MAX_CACHED_POINTS)
                .map(|s| CachedPoint {
                    kind: s.kind.clone(),
                    time: format_signal_time(s.time, level),
                })
                .collect();
            (kept, all.len())
        };
        let (buy_points, total_buy_points) = points(Direction::Entry);
        let (sell_points, total_sell_points) = points(Direction::Exit);

        Self {
            code: symbol.code.clone(),
            full_code: symbol.full_code(),
            cache_date: date,
            kl_type: level,
            buy_points,
            sell_points,
            total_buy_points,
            total_sell_points,
            request_fingerprint: fingerprint,
        }
    }

    /// Restore the cached points as signal events, latest first.
    ///
    /// Prices are not cached, so every restored event has `price: None`.
    /// Points with an unparseable time are dropped.
    pub fn signals(&self) -> Vec<SignalEvent> {
        let restore = |points: &[CachedPoint], dir: Direction| -> Vec<SignalEvent> {
            points
                .iter()
                .filter_map(|p| {
                    parse_signal_time(&p.time).map(|time| SignalEvent {
                        direction: dir,
                        kind: p.kind.clone(),
                        time,
                        price: None,
                    })
                })
                .collect()
        };
        let mut out = restore(&self.buy_points, Direction::Entry);
        out.extend(restore(&self.sell_points, Direction::Exit));
        out.sort_by(|a, b| b.time.cmp(&a.time));
        out
    }

    /// Symbol identity reconstructed from the record.
    pub fn symbol(&self, name: impl Into<String>) -> Symbol {
        let (exchange, _) = split_qualified(&self.full_code);
        Symbol {
            code: self.code.clone(),
            name: name.into(),
            exchange: exchange.or_else(|| Some(Exchange::from_code(&self.code))),
            extra: BTreeMap::new(),
        }
    }
}

mod cache_date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format(super::DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDate::parse_from_str(&raw, super::DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Overview of what the cache holds, relative to a given day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStatus {
    pub date: Option<NaiveDate>,
    pub universe_cached: bool,
    pub universe_symbols: Option<usize>,
    pub analysis_records: usize,
    /// Days other than `date` that still have files on disk, oldest first.
    pub other_days: Vec<NaiveDate>,
}

/// What a prune removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PruneReport {
    pub universe_files: usize,
    pub analysis_days: usize,
}

/// File-backed cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct CacheManager {
    root: PathBuf,
}

impl CacheManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn universe_path(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(UNIVERSE_DIR)
            .join(format!("{}.csv", date.format(DATE_FORMAT)))
    }

    fn analysis_day_dir(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(ANALYSIS_DIR)
            .join(date.format(DATE_FORMAT).to_string())
    }

    fn analysis_path(&self, date: NaiveDate, code: &str) -> PathBuf {
        self.analysis_day_dir(date).join(format!("{code}.json"))
    }

    /// Path an entry lives at.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        match key {
            CacheKey::Universe { date } => self.universe_path(*date),
            CacheKey::Analysis { date, code } => self.analysis_path(*date, code),
        }
    }

    // ── Generic access ──────────────────────────────────────────────

    pub fn get(&self, key: &CacheKey) -> Result<Option<CachePayload>, CacheError> {
        Ok(match key {
            CacheKey::Universe { date } => self.get_universe(*date)?.map(CachePayload::Universe),
            CacheKey::Analysis { date, code } => {
                self.get_analysis(*date, code)?.map(CachePayload::Analysis)
            }
        })
    }

    pub fn put(&self, key: &CacheKey, payload: &CachePayload) -> Result<PathBuf, CacheError> {
        match (key, payload) {
            (CacheKey::Universe { date }, CachePayload::Universe(snapshot))
                if snapshot.date() == *date =>
            {
                self.put_universe(snapshot)
            }
            (CacheKey::Analysis { date, code }, CachePayload::Analysis(record))
                if record.cache_date == *date && record.code == *code =>
            {
                self.put_analysis(record)
            }
            _ => Err(CacheError::KeyMismatch { key: key.clone() }),
        }
    }

    // ── Universe tier ───────────────────────────────────────────────

    /// Today's universe snapshot, if one was cached today.
    pub fn get_universe(&self, date: NaiveDate) -> Result<Option<UniverseSnapshot>, CacheError> {
        let path = self.universe_path(date);
        if !path.exists() {
            return Ok(None);
        }
        match read_universe_csv(&path, date) {
            Ok(snapshot) => {
                debug!(path = %path.display(), symbols = snapshot.len(), "universe cache hit");
                Ok(Some(snapshot))
            }
            Err(CacheError::Io { path, source }) => Err(CacheError::Io { path, source }),
            Err(e) => {
                warn!(error = %e, "corrupt universe cache entry ignored");
                Ok(None)
            }
        }
    }

    pub fn put_universe(&self, snapshot: &UniverseSnapshot) -> Result<PathBuf, CacheError> {
        let path = self.universe_path(snapshot.date());
        let extras = snapshot.extra_columns();

        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = vec!["code".to_string(), "name".to_string()];
        header.extend(extras.iter().cloned());
        let csv_err = |source| CacheError::Csv {
            path: path.clone(),
            source,
        };
        writer.write_record(&header).map_err(csv_err)?;
        for sym in snapshot.symbols() {
            let mut row = vec![sym.full_code(), sym.name.clone()];
            row.extend(
                extras
                    .iter()
                    .map(|col| sym.attribute(col).unwrap_or_default().to_string()),
            );
            writer.write_record(&row).map_err(csv_err)?;
        }
        let bytes = writer.into_inner().map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e.into_error(),
        })?;

        write_atomic(&path, &bytes)?;
        debug!(path = %path.display(), symbols = snapshot.len(), "universe cached");
        Ok(path)
    }

    // ── Symbol tier ─────────────────────────────────────────────────

    /// A symbol record cached on `date`. Records whose own `cache_date`
    /// disagrees with the day they are filed under are treated as absent.
    pub fn get_analysis(
        &self,
        date: NaiveDate,
        code: &str,
    ) -> Result<Option<AnalysisRecord>, CacheError> {
        let path = self.analysis_path(date, code);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let record: AnalysisRecord = match serde_json::from_str(&content) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt analysis cache entry ignored");
                return Ok(None);
            }
        };
        if record.cache_date != date {
            debug!(code, cached = %record.cache_date, %date, "analysis cache entry from another day");
            return Ok(None);
        }
        Ok(Some(record))
    }

    pub fn put_analysis(&self, record: &AnalysisRecord) -> Result<PathBuf, CacheError> {
        let path = self.analysis_path(record.cache_date, &record.code);
        let json = serde_json::to_vec_pretty(record).map_err(|source| CacheError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &json)?;
        Ok(path)
    }

    // ── Maintenance ─────────────────────────────────────────────────

    pub fn status(&self, date: NaiveDate) -> Result<CacheStatus, CacheError> {
        let mut status = CacheStatus {
            date: Some(date),
            ..Default::default()
        };

        if let Some(snapshot) = self.get_universe(date)? {
            status.universe_cached = true;
            status.universe_symbols = Some(snapshot.len());
        }

        let day_dir = self.analysis_day_dir(date);
        if day_dir.is_dir() {
            status.analysis_records = list_dir(&day_dir)?
                .into_iter()
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
                .count();
        }

        let mut days: Vec<NaiveDate> = self
            .cached_days()?
            .into_iter()
            .filter(|d| *d != date)
            .collect();
        days.dedup();
        status.other_days = days;
        Ok(status)
    }

    /// Every day that has a universe file or an analysis directory, sorted.
    pub fn cached_days(&self) -> Result<Vec<NaiveDate>, CacheError> {
        let mut days = Vec::new();
        for path in list_dir(&self.root.join(UNIVERSE_DIR))? {
            if let Some(d) = file_stem_date(&path) {
                days.push(d);
            }
        }
        for path in list_dir(&self.root.join(ANALYSIS_DIR))? {
            if path.is_dir() {
                if let Some(d) = file_name_date(&path) {
                    days.push(d);
                }
            }
        }
        days.sort();
        days.dedup();
        Ok(days)
    }

    /// Delete every entry for days strictly before `cutoff`.
    pub fn prune_before(&self, cutoff: NaiveDate) -> Result<PruneReport, CacheError> {
        let mut report = PruneReport::default();

        for path in list_dir(&self.root.join(UNIVERSE_DIR))? {
            if file_stem_date(&path).is_some_and(|d| d < cutoff) {
                fs::remove_file(&path).map_err(|source| CacheError::Io {
                    path: path.clone(),
                    source,
                })?;
                report.universe_files += 1;
            }
        }

        for path in list_dir(&self.root.join(ANALYSIS_DIR))? {
            if path.is_dir() && file_name_date(&path).is_some_and(|d| d < cutoff) {
                fs::remove_dir_all(&path).map_err(|source| CacheError::Io {
                    path: path.clone(),
                    source,
                })?;
                report.analysis_days += 1;
            }
        }

        debug!(
            %cutoff,
            universe_files = report.universe_files,
            analysis_days = report.analysis_days,
            "cache pruned"
        );
        Ok(report)
    }
}

fn read_universe_csv(path: &Path, date: NaiveDate) -> Result<UniverseSnapshot, CacheError> {
    let bytes = fs::read(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_err = |source| CacheError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader.headers().map_err(csv_err)?.clone();
    let code_idx = headers.iter().position(|h| h == "code");
    let name_idx = headers.iter().position(|h| h == "name");
    let (Some(code_idx), Some(name_idx)) = (code_idx, name_idx) else {
        return Err(CacheError::Csv {
            path: path.to_path_buf(),
            source: csv::Error::from(io::Error::new(
                io::ErrorKind::InvalidData,
                "missing code/name columns",
            )),
        });
    };

    let mut symbols = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let raw_code = record.get(code_idx).unwrap_or_default();
        let (exchange, code) = split_qualified(raw_code);
        let extra = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != code_idx && *i != name_idx)
            .filter_map(|(i, h)| {
                record
                    .get(i)
                    .filter(|v| !v.is_empty())
                    .map(|v| (h.to_string(), v.to_string()))
            })
            .collect();
        symbols.push(Symbol {
            code: code.to_string(),
            name: record.get(name_idx).unwrap_or_default().to_string(),
            exchange: exchange.or_else(|| Some(Exchange::from_code(code))),
            extra,
        });
    }
    Ok(UniverseSnapshot::new(date, symbols))
}

/// Write `bytes` to `path` through a unique temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let io_err = |p: &Path| {
        let p = p.to_path_buf();
        move |source| CacheError::Io { path: p, source }
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("entry");
    let tmp = dir.join(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, CacheError> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(CacheError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| CacheError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn file_stem_date(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
}

fn file_name_date(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    NaiveDate::parse_from_str(name, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn at(d: u32) -> chrono::NaiveDateTime {
        day(d).and_hms_opt(0, 0, 0).unwrap()
    }

    fn snapshot(date: NaiveDate) -> UniverseSnapshot {
        let mut a = Symbol::new("600000", "浦发银行");
        a.extra.insert("tradeStatus".into(), "1".into());
        let b = Symbol::new("000001", "平安银行");
        UniverseSnapshot::new(date, vec![a, b])
    }

    #[test]
    fn universe_roundtrip_same_day() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path());
        let snap = snapshot(day(3));

        let path = cache.put_universe(&snap).unwrap();
        assert!(path.ends_with("stock_list/2024-06-03.csv"));

        let loaded = cache.get_universe(day(3)).unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.symbols()[0].full_code(), "sh.600000");
        assert_eq!(loaded.symbols()[0].attribute("tradeStatus"), Some("1"));
        assert_eq!(loaded.symbols()[1].attribute("tradeStatus"), None);
    }

    #[test]
    fn yesterdays_universe_is_invisible_today() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path());
        cache.put_universe(&snapshot(day(3))).unwrap();
        assert!(cache.get_universe(day(4)).unwrap().is_none());
    }

    #[test]
    fn analysis_record_with_wrong_cache_date_is_absent() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path());
        let sym = Symbol::new("000001", "平安银行");
        let record = AnalysisRecord::from_signals(&sym, KlType::Day, day(3), &[], None);
        cache.put_analysis(&record).unwrap();

        // Move the file under another day's directory.
        let src = cache.analysis_path(day(3), "000001");
        let dst = cache.analysis_path(day(4), "000001");
        fs::create_dir_all(dst.parent().unwrap()).unwrap();
        fs::rename(src, &dst).unwrap();

        assert!(cache.get_analysis(day(4), "000001").unwrap().is_none());
    }

    #[test]
    fn corrupt_analysis_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path());
        let path = cache.analysis_path(day(3), "000001");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(cache.get_analysis(day(3), "000001").unwrap().is_none());
    }

    #[test]
    fn record_caps_points_and_keeps_totals() {
        let sym = Symbol::new("600000", "浦发银行");
        let signals: Vec<SignalEvent> = (1..=25)
            .rev()
            .map(|d| SignalEvent::entry("1", at(d), Some(10.0)))
            .chain(std::iter::once(SignalEvent::exit("2", at(2), None)))
            .collect();
        let record = AnalysisRecord::from_signals(&sym, KlType::Day, day(28), &signals, None);

        assert_eq!(record.buy_points.len(), MAX_CACHED_POINTS);
        assert_eq!(record.total_buy_points, 25);
        assert_eq!(record.buy_points[0].time, "2024/06/25");
        assert_eq!(record.total_sell_points, 1);
        assert_eq!(record.full_code, "sh.600000");
    }

    #[test]
    fn restored_signals_are_latest_first_without_price() {
        let sym = Symbol::new("000001", "平安银行");
        let signals = vec![
            SignalEvent::exit("2s", at(10), Some(9.0)),
            SignalEvent::entry("1", at(7), Some(8.0)),
        ];
        let record = AnalysisRecord::from_signals(&sym, KlType::Day, day(11), &signals, None);
        let restored = record.signals();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].direction, Direction::Exit);
        assert_eq!(restored[1].time, at(7));
        assert!(restored.iter().all(|s| s.price.is_none()));
    }

    #[test]
    fn record_json_uses_stored_field_names() {
        let sym = Symbol::new("000001", "平安银行");
        let signals = vec![SignalEvent::entry("3a", at(7), None)];
        let record = AnalysisRecord::from_signals(&sym, KlType::Day, day(11), &signals, None);
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["cache_date"], "2024-06-11");
        assert_eq!(json["buy_points"][0]["type"], "3a");
        assert_eq!(json["buy_points"][0]["time"], "2024/06/07");
    }

    #[test]
    fn generic_put_rejects_mismatched_key() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path());
        let key = CacheKey::Universe { date: day(4) };
        let err = cache
            .put(&key, &CachePayload::Universe(snapshot(day(3))))
            .unwrap_err();
        assert!(matches!(err, CacheError::KeyMismatch { .. }));
    }

    #[test]
    fn generic_get_dispatches_by_key() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path());
        let key = CacheKey::Universe { date: day(3) };
        cache
            .put(&key, &CachePayload::Universe(snapshot(day(3))))
            .unwrap();
        assert_eq!(key.scope(), CacheScope::Universe);
        assert!(matches!(
            cache.get(&key).unwrap(),
            Some(CachePayload::Universe(_))
        ));
        let missing = CacheKey::Analysis {
            date: day(3),
            code: "600000".into(),
        };
        assert!(cache.get(&missing).unwrap().is_none());
    }

    #[test]
    fn prune_removes_only_older_days() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path());
        let sym = Symbol::new("000001", "平安银行");
        for d in [1, 2, 3] {
            cache.put_universe(&snapshot(day(d))).unwrap();
            cache
                .put_analysis(&AnalysisRecord::from_signals(&sym, KlType::Day, day(d), &[], None))
                .unwrap();
        }

        let report = cache.prune_before(day(3)).unwrap();
        assert_eq!(report.universe_files, 2);
        assert_eq!(report.analysis_days, 2);
        assert_eq!(cache.cached_days().unwrap(), vec![day(3)]);

        let status = cache.status(day(3)).unwrap();
        assert!(status.universe_cached);
        assert_eq!(status.analysis_records, 1);
        assert!(status.other_days.is_empty());
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path());
        cache.put_universe(&snapshot(day(3))).unwrap();
        cache.put_universe(&snapshot(day(3))).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path().join(UNIVERSE_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
