//! Signal events (buy/sell points) and bars produced by the analysis engine.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::level::KlType;

/// Whether a signal opens (buy) or closes (sell) a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn is_entry(self) -> bool {
        self == Direction::Entry
    }
}

/// A detected buy/sell point.
///
/// `kind` is the engine's type classification (`"1"`, `"1p"`, `"2s"`, `"3a"`,
/// combined types such as `"1,2"`). `price` is the close of the bar the signal
/// sits on; it is absent when the event was restored from cached metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub direction: Direction,
    pub kind: String,
    pub time: NaiveDateTime,
    pub price: Option<f64>,
}

impl SignalEvent {
    pub fn entry(kind: impl Into<String>, time: NaiveDateTime, price: Option<f64>) -> Self {
        Self {
            direction: Direction::Entry,
            kind: kind.into(),
            time,
            price,
        }
    }

    pub fn exit(kind: impl Into<String>, time: NaiveDateTime, price: Option<f64>) -> Self {
        Self {
            direction: Direction::Exit,
            kind: kind.into(),
            time,
            price,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.time.date()
    }

    /// Timestamp rendered the way archives and cache records store it.
    pub fn time_label(&self, level: KlType) -> String {
        format_signal_time(self.time, level)
    }
}

/// `YYYY/MM/DD` for daily and slower levels, `YYYY/MM/DD HH:MM` intraday.
pub fn format_signal_time(time: NaiveDateTime, level: KlType) -> String {
    if level.is_intraday() {
        time.format("%Y/%m/%d %H:%M").to_string()
    } else {
        time.format("%Y/%m/%d").to_string()
    }
}

/// Inverse of [`format_signal_time`]; also accepts ISO dashes.
pub fn parse_signal_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in ["%Y/%m/%d %H:%M", "%Y-%m-%d %H:%M", "%Y/%m/%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(t);
        }
    }
    for fmt in ["%Y/%m/%d", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// One bar of an analyzed series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.time.date()
    }
}
