//! Chart rendering and the per-archive chart error log.

use chanscan_core::domain::{Direction, KlType};
use chanscan_core::engine::AnalysisHandle;
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CHART_ERROR_LOG: &str = "chart_errors.log";

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no bars for level {0}")]
    NoBars(KlType),

    #[error("chart write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Renders an analysis handle to an interactive chart file.
pub trait ChartRenderer: Send + Sync {
    fn render(
        &self,
        handle: &dyn AnalysisHandle,
        level: KlType,
        path: &Path,
    ) -> Result<(), ChartError>;
}

/// Escape text for HTML element content and attribute values.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// `{code}_{level_label}.html`
pub fn chart_file_name(code: &str, level: KlType) -> String {
    format!("{code}_{}.html", level.label())
}

/// Self-contained HTML chart: an inline SVG close-price line with the buy
/// and sell points marked. No scripts, no external assets.
#[derive(Debug, Clone, Copy)]
pub struct HtmlChartRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for HtmlChartRenderer {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

impl ChartRenderer for HtmlChartRenderer {
    fn render(
        &self,
        handle: &dyn AnalysisHandle,
        level: KlType,
        path: &Path,
    ) -> Result<(), ChartError> {
        let bars = handle.bars(level);
        if bars.is_empty() {
            return Err(ChartError::NoBars(level));
        }

        let (lo, hi) = bars.iter().fold((f64::MAX, f64::MIN), |(lo, hi), b| {
            (lo.min(b.low), hi.max(b.high))
        });
        let span = (hi - lo).max(f64::EPSILON);
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        let n = bars.len().max(2) - 1;
        let x = |i: usize| i as f64 / n as f64 * w;
        let y = |p: f64| h - (p - lo) / span * h;

        let mut points = String::new();
        for (i, bar) in bars.iter().enumerate() {
            let _ = write!(points, "{:.1},{:.1} ", x(i), y(bar.close));
        }

        let mut markers = String::new();
        for signal in handle.latest_signals(level, 0) {
            let Some(i) = bars.iter().position(|b| b.time == signal.time) else {
                continue;
            };
            let price = signal.price.unwrap_or(bars[i].close);
            let color = match signal.direction {
                Direction::Entry => "#d62728",
                Direction::Exit => "#2ca02c",
            };
            let _ = write!(
                markers,
                r#"<circle cx="{:.1}" cy="{:.1}" r="4" fill="{color}"><title>{} {}</title></circle>"#,
                x(i),
                y(price),
                escape_html(&signal.kind),
                signal.time_label(level)
            );
        }

        let title = escape_html(&format!("{} {}", handle.code(), level.label()));
        let html = format!(
            r##"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>{title}</title></head>
<body>
<h3>{title}</h3>
<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
<polyline fill="none" stroke="#1f77b4" stroke-width="1" points="{points}"/>
{markers}
</svg>
</body></html>
"##,
            w = self.width,
            h = self.height,
        );
        fs::write(path, html)?;
        Ok(())
    }
}

/// Write the chart error summary, or remove a stale one when there were no
/// errors.
pub fn write_chart_error_log(
    path: &Path,
    date: NaiveDate,
    total: usize,
    saved: usize,
    errors: &[(String, String)],
) -> std::io::Result<bool> {
    if errors.is_empty() {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        return Ok(false);
    }

    let mut log = String::new();
    let _ = writeln!(log, "Chart Generation Summary - {}", date.format("%Y-%m-%d"));
    let _ = writeln!(log, "Total stocks: {total}");
    let _ = writeln!(log, "Charts saved: {saved}");
    let _ = writeln!(log, "Errors: {}", errors.len());
    let _ = writeln!(log);
    let _ = writeln!(log, "Error Details:");
    for (code, err) in errors {
        let _ = writeln!(log, "{code}: {err}");
    }
    fs::write(path, log)?;
    Ok(true)
}
