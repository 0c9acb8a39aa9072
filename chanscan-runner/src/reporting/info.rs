//! Single-symbol analysis record (`analysis_info.json`).

use chanscan_core::domain::{KlType, SignalEvent};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::single::SymbolAnalysis;

pub const ANALYSIS_INFO: &str = "analysis_info.json";

/// Points kept per direction in the info record.
pub const INFO_POINTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub time: String,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInfo {
    pub code: String,
    pub full_code: String,
    pub analysis_date: String,
    pub kl_type: String,
    pub buy_points: Vec<InfoPoint>,
    pub sell_points: Vec<InfoPoint>,
    pub total_buy_points: usize,
    pub total_sell_points: usize,
}

fn points(events: &[SignalEvent], level: KlType) -> Vec<InfoPoint> {
    events
        .iter()
        .take(INFO_POINTS)
        .map(|s| InfoPoint {
            kind: s.kind.clone(),
            time: s.time_label(level),
            price: s.price,
        })
        .collect()
}

impl AnalysisInfo {
    pub fn from_analysis(analysis: &SymbolAnalysis) -> Self {
        Self {
            code: analysis.symbol.code.clone(),
            full_code: analysis.full_code.clone(),
            analysis_date: analysis.analysis_date.format("%Y-%m-%d").to_string(),
            kl_type: analysis.level.label().to_string(),
            buy_points: points(&analysis.buy_points, analysis.level),
            sell_points: points(&analysis.sell_points, analysis.level),
            total_buy_points: analysis.buy_points.len(),
            total_sell_points: analysis.sell_points.len(),
        }
    }
}

pub fn write_analysis_info(path: &Path, info: &AnalysisInfo) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(info)?;
    std::fs::write(path, json)
}
