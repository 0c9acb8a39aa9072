//! Universe filter — turns the provider's raw listing into scan candidates.
//!
//! Rows are normalized into [`Symbol`]s and then passed through a fixed,
//! ordered chain of exclusion rules. Rules only remove symbols. Each removed
//! symbol is charged to the first enabled rule that matches it, so the
//! per-rule counts in [`FilterReport`] are reproducible.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

use super::provider::{MarketDataProvider, ProviderError, ProviderSession, RawListing};
use crate::context::ScanContext;
use crate::domain::{split_qualified, Exchange, Symbol, UniverseSnapshot};

/// Column holding the exchange-qualified code.
pub const CODE_COLUMN: &str = "code";
/// Column holding the display name.
pub const NAME_COLUMN: &str = "code_name";
/// Optional column with the trading status (`"1"` = trading normally).
pub const TRADE_STATUS_COLUMN: &str = "tradeStatus";

/// Errors from the universe stage. Fatal to the stage, never retried.
#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("market data provider unavailable: {0}")]
    ProviderUnavailable(#[source] ProviderError),

    #[error("listing query failed: {0}")]
    ProviderQueryFailed(String),
}

/// Exclusion rules in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionRule {
    /// Exchange tag other than Shanghai/Shenzhen (Beijing, unknown, missing).
    UnsupportedExchange,
    /// Risk-warning names (`ST`, `*ST`).
    RiskMarker,
    /// STAR market, `688`.
    StarMarket,
    /// Beijing board codes, `8` and `43`.
    BeijingBoard,
    /// B shares, `200` (Shenzhen) and `900` (Shanghai).
    BShare,
    /// Depositary receipts, `920`.
    DepositaryReceipt,
    /// Suspended or otherwise not trading.
    NotTrading,
}

impl ExclusionRule {
    /// Every rule, in the order they are applied.
    pub const ORDER: [ExclusionRule; 7] = [
        ExclusionRule::UnsupportedExchange,
        ExclusionRule::RiskMarker,
        ExclusionRule::StarMarket,
        ExclusionRule::BeijingBoard,
        ExclusionRule::BShare,
        ExclusionRule::DepositaryReceipt,
        ExclusionRule::NotTrading,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ExclusionRule::UnsupportedExchange => "unsupported_exchange",
            ExclusionRule::RiskMarker => "risk_marker",
            ExclusionRule::StarMarket => "star_market",
            ExclusionRule::BeijingBoard => "beijing_board",
            ExclusionRule::BShare => "b_share",
            ExclusionRule::DepositaryReceipt => "depositary_receipt",
            ExclusionRule::NotTrading => "not_trading",
        }
    }

    /// True if the rule removes this symbol.
    pub fn excludes(self, symbol: &Symbol) -> bool {
        let code = symbol.code.as_str();
        match self {
            ExclusionRule::UnsupportedExchange => !matches!(
                symbol.exchange,
                Some(Exchange::Shanghai) | Some(Exchange::Shenzhen)
            ),
            ExclusionRule::RiskMarker => symbol.name.to_ascii_uppercase().contains("ST"),
            ExclusionRule::StarMarket => code.starts_with("688"),
            ExclusionRule::BeijingBoard => code.starts_with('8') || code.starts_with("43"),
            ExclusionRule::BShare => code.starts_with("200") || code.starts_with("900"),
            ExclusionRule::DepositaryReceipt => code.starts_with("920"),
            ExclusionRule::NotTrading => symbol
                .attribute(TRADE_STATUS_COLUMN)
                .is_some_and(|status| status.trim() != "1"),
        }
    }
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ExclusionRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExclusionRule::ORDER
            .iter()
            .copied()
            .find(|r| r.key() == s.trim())
            .ok_or_else(|| format!("unknown exclusion rule '{s}'"))
    }
}

/// Diagnostic counts for one filter pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    pub raw_rows: usize,
    pub duplicates: usize,
    pub excluded: BTreeMap<ExclusionRule, usize>,
    pub kept: usize,
}

impl FilterReport {
    pub fn excluded_by(&self, rule: ExclusionRule) -> usize {
        self.excluded.get(&rule).copied().unwrap_or(0)
    }

    pub fn total_excluded(&self) -> usize {
        self.excluded.values().sum()
    }
}

/// Ordered exclusion chain.
#[derive(Debug, Clone, PartialEq)]
pub struct UniverseFilter {
    enabled: Vec<ExclusionRule>,
}

impl Default for UniverseFilter {
    fn default() -> Self {
        Self {
            enabled: ExclusionRule::ORDER.to_vec(),
        }
    }
}

impl UniverseFilter {
    /// Build a filter from a set of rules. Order is always [`ExclusionRule::ORDER`],
    /// regardless of the order they are given in.
    pub fn with_rules(rules: &[ExclusionRule]) -> Self {
        let enabled = ExclusionRule::ORDER
            .iter()
            .copied()
            .filter(|r| rules.contains(r))
            .collect();
        Self { enabled }
    }

    /// A filter that keeps everything.
    pub fn permissive() -> Self {
        Self {
            enabled: Vec::new(),
        }
    }

    pub fn without(&self, rule: ExclusionRule) -> Self {
        Self {
            enabled: self.enabled.iter().copied().filter(|r| *r != rule).collect(),
        }
    }

    pub fn rules(&self) -> &[ExclusionRule] {
        &self.enabled
    }

    /// First enabled rule that removes the symbol.
    pub fn first_match(&self, symbol: &Symbol) -> Option<ExclusionRule> {
        self.enabled.iter().copied().find(|r| r.excludes(symbol))
    }

    /// Normalize a raw listing and apply the exclusion chain.
    pub fn apply(
        &self,
        listing: &RawListing,
        date: NaiveDate,
    ) -> Result<(UniverseSnapshot, FilterReport), UniverseError> {
        let symbols = normalize_listing(listing)?;
        let mut report = FilterReport {
            raw_rows: listing.rows.len(),
            ..Default::default()
        };

        let mut kept = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.first_match(&symbol) {
                Some(rule) => *report.excluded.entry(rule).or_insert(0) += 1,
                None => kept.push(symbol),
            }
        }

        let before_dedup = kept.len();
        let snapshot = UniverseSnapshot::new(date, kept);
        report.duplicates = before_dedup - snapshot.len();
        report.kept = snapshot.len();
        Ok((snapshot, report))
    }
}

/// Normalize raw rows: split the exchange prefix off the code, take the
/// display name from `code_name`, retain every other column verbatim.
pub fn normalize_listing(listing: &RawListing) -> Result<Vec<Symbol>, UniverseError> {
    let code_idx = listing.column_index(CODE_COLUMN).ok_or_else(|| {
        UniverseError::ProviderQueryFailed(format!(
            "missing column '{CODE_COLUMN}', available: {:?}",
            listing.fields
        ))
    })?;
    let name_idx = listing.column_index(NAME_COLUMN).ok_or_else(|| {
        UniverseError::ProviderQueryFailed(format!(
            "missing column '{NAME_COLUMN}', available: {:?}",
            listing.fields
        ))
    })?;

    let mut symbols = Vec::with_capacity(listing.rows.len());
    for (i, row) in listing.rows.iter().enumerate() {
        if row.len() != listing.fields.len() {
            return Err(UniverseError::ProviderQueryFailed(format!(
                "row {i} has {} values, expected {}",
                row.len(),
                listing.fields.len()
            )));
        }

        let (exchange, code) = split_qualified(row[code_idx].trim());
        let extra = listing
            .fields
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != code_idx && *j != name_idx)
            .map(|(j, field)| (field.clone(), row[j].clone()))
            .collect();

        symbols.push(Symbol {
            code: code.to_string(),
            name: row[name_idx].trim().to_string(),
            exchange,
            extra,
        });
    }
    Ok(symbols)
}

/// Fetch today's listing from the provider and filter it.
///
/// The provider session is closed on every path.
pub fn fetch_universe(
    provider: &dyn MarketDataProvider,
    filter: &UniverseFilter,
    today: NaiveDate,
) -> Result<(UniverseSnapshot, FilterReport), UniverseError> {
    let session = ProviderSession::open(provider).map_err(UniverseError::ProviderUnavailable)?;
    let listing = session
        .query_listing(today)
        .map_err(|e| UniverseError::ProviderQueryFailed(e.to_string()))?;
    drop(session);

    if listing.is_empty() {
        warn!(%today, provider = provider.name(), "empty listing, possibly a non-trading day");
        return Ok((UniverseSnapshot::empty(today), FilterReport::default()));
    }

    let (snapshot, report) = filter.apply(&listing, today)?;
    info!(
        raw = report.raw_rows,
        excluded = report.total_excluded(),
        kept = report.kept,
        "universe filtered"
    );
    for (rule, count) in &report.excluded {
        info!(%rule, count, "excluded by rule");
    }
    Ok((snapshot, report))
}

/// Today's universe: cached snapshot if present, otherwise fetched and cached.
///
/// Empty snapshots are not cached so a later call can retry. Cache failures
/// are logged and do not fail the stage.
pub fn load_universe(
    ctx: &ScanContext,
    provider: &dyn MarketDataProvider,
    filter: &UniverseFilter,
    refresh: bool,
) -> Result<UniverseSnapshot, UniverseError> {
    let today = ctx.today;
    if let Some(cache) = ctx.cache.as_ref().filter(|_| !refresh) {
        match cache.get_universe(today) {
            Ok(Some(snapshot)) => {
                info!(%today, symbols = snapshot.len(), "universe loaded from cache");
                return Ok(snapshot);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "unreadable universe cache entry, refetching"),
        }
    }

    let (snapshot, _report) = fetch_universe(provider, filter, today)?;
    if let Some(cache) = &ctx.cache {
        if !snapshot.is_empty() {
            if let Err(e) = cache.put_universe(&snapshot) {
                warn!(error = %e, "failed to cache universe snapshot");
            }
        }
    }
    Ok(snapshot)
}
