//! K-line levels (time granularity of an analysis).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bar granularity handed to the analysis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum KlType {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "3m")]
    Min3,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "60m")]
    Min60,
    #[serde(rename = "day")]
    #[default]
    Day,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "month")]
    Month,
    #[serde(rename = "quarter")]
    Quarter,
    #[serde(rename = "year")]
    Year,
}

impl KlType {
    pub const ALL: [KlType; 11] = [
        KlType::Min1,
        KlType::Min3,
        KlType::Min5,
        KlType::Min15,
        KlType::Min30,
        KlType::Min60,
        KlType::Day,
        KlType::Week,
        KlType::Month,
        KlType::Quarter,
        KlType::Year,
    ];

    /// Label used in archive rows and chart file names.
    pub fn label(self) -> &'static str {
        match self {
            KlType::Min1 => "1F",
            KlType::Min3 => "3F",
            KlType::Min5 => "5F",
            KlType::Min15 => "15F",
            KlType::Min30 => "30F",
            KlType::Min60 => "60F",
            KlType::Day => "日线",
            KlType::Week => "周线",
            KlType::Month => "月线",
            KlType::Quarter => "季线",
            KlType::Year => "年线",
        }
    }

    /// Config key (`"day"`, `"30m"`, …).
    pub fn key(self) -> &'static str {
        match self {
            KlType::Min1 => "1m",
            KlType::Min3 => "3m",
            KlType::Min5 => "5m",
            KlType::Min15 => "15m",
            KlType::Min30 => "30m",
            KlType::Min60 => "60m",
            KlType::Day => "day",
            KlType::Week => "week",
            KlType::Month => "month",
            KlType::Quarter => "quarter",
            KlType::Year => "year",
        }
    }

    pub fn is_intraday(self) -> bool {
        matches!(
            self,
            KlType::Min1
                | KlType::Min3
                | KlType::Min5
                | KlType::Min15
                | KlType::Min30
                | KlType::Min60
        )
    }
}

impl fmt::Display for KlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for KlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        KlType::ALL
            .iter()
            .copied()
            .find(|k| k.key() == wanted || k.label() == s.trim())
            .ok_or_else(|| format!("unknown k-line level '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_archive_names() {
        assert_eq!(KlType::Day.label(), "日线");
        assert_eq!(KlType::Min30.label(), "30F");
        assert_eq!(KlType::Year.label(), "年线");
    }

    #[test]
    fn parses_keys_and_labels() {
        assert_eq!("day".parse::<KlType>().unwrap(), KlType::Day);
        assert_eq!("WEEK".parse::<KlType>().unwrap(), KlType::Week);
        assert_eq!("60F".parse::<KlType>().unwrap(), KlType::Min60);
        assert!("2h".parse::<KlType>().is_err());
    }

    #[test]
    fn default_level_is_day() {
        assert_eq!(KlType::default(), KlType::Day);
    }

    #[test]
    fn intraday_levels() {
        assert!(KlType::Min5.is_intraday());
        assert!(!KlType::Day.is_intraday());
    }
}
