//! Universe snapshot — the dated, ordered list of scan candidates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::symbol::Symbol;

/// Ordered set of symbols stamped with the day it was fetched.
///
/// Snapshots are never mutated after construction; a same-day re-fetch
/// produces a new snapshot that supersedes the cached one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    date: NaiveDate,
    symbols: Vec<Symbol>,
}

impl UniverseSnapshot {
    /// Build a snapshot, dropping later duplicates of a code (first wins).
    pub fn new(date: NaiveDate, symbols: Vec<Symbol>) -> Self {
        let mut seen = HashSet::new();
        let symbols = symbols
            .into_iter()
            .filter(|s| seen.insert(s.code.clone()))
            .collect();
        Self { date, symbols }
    }

    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            symbols: Vec::new(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.code == code)
    }

    /// Names of provider-native columns present on any symbol, sorted.
    pub fn extra_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self
            .symbols
            .iter()
            .flat_map(|s| s.extra.keys().cloned())
            .collect();
        cols.sort();
        cols.dedup();
        cols
    }
}
