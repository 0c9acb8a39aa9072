//! Scan statistics record (`scan_stats.json`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::outcome::ScanSummary;

pub const SCAN_STATS: &str = "scan_stats.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub scan_date: String,
    pub total_found: usize,
    pub success_count: usize,
    /// Skipped and failed symbols together.
    pub fail_count: usize,
    pub found_count: usize,
}

impl ScanStats {
    pub fn from_summary(date: NaiveDate, summary: &ScanSummary) -> Self {
        Self {
            scan_date: date.format("%Y-%m-%d").to_string(),
            total_found: summary.attempted,
            success_count: summary.succeeded,
            fail_count: summary.skipped_or_failed(),
            found_count: summary.signal_hits,
        }
    }
}

pub fn write_scan_stats(path: &Path, stats: &ScanStats) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(stats)?;
    std::fs::write(path, json)
}
