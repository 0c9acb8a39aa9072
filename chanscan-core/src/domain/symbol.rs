//! Symbol — an exchange-qualified A-share instrument.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Code prefixes that belong to the Shanghai exchange.
///
/// Everything else with a numeric code is routed to Shenzhen.
pub const SHANGHAI_PREFIXES: [&str; 5] = ["600", "601", "603", "605", "688"];

/// Exchange tag carried by provider codes (`sh.600000`, `sz.000001`, `bj.830799`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    Beijing,
}

impl Exchange {
    /// Provider prefix without the trailing dot.
    pub fn prefix(self) -> &'static str {
        match self {
            Exchange::Shanghai => "sh",
            Exchange::Shenzhen => "sz",
            Exchange::Beijing => "bj",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "sh" => Some(Exchange::Shanghai),
            "sz" => Some(Exchange::Shenzhen),
            "bj" => Some(Exchange::Beijing),
            _ => None,
        }
    }

    /// Fixed business rule: `600,601,603,605,688` are Shanghai, all other
    /// numeric codes are Shenzhen.
    pub fn from_code(code: &str) -> Self {
        if SHANGHAI_PREFIXES.iter().any(|p| code.starts_with(p)) {
            Exchange::Shanghai
        } else {
            Exchange::Shenzhen
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Split a provider code into its exchange tag and pure code.
///
/// `"sh.600000"` → `(Some(Shanghai), "600000")`. A code without a dot has no
/// tag. An unknown tag is reported as `None` with the remainder as the code.
pub fn split_qualified(raw: &str) -> (Option<Exchange>, &str) {
    match raw.split_once('.') {
        Some((prefix, code)) => (Exchange::from_prefix(prefix), code),
        None => (None, raw),
    }
}

/// Render the provider form of a code.
///
/// Already-qualified codes (`sh.` / `sz.` / `bj.`) are returned unchanged;
/// pure codes are routed through [`Exchange::from_code`].
pub fn qualify_code(code: &str) -> String {
    if let (Some(_), _) = split_qualified(code) {
        return code.to_ascii_lowercase();
    }
    format!("{}.{}", Exchange::from_code(code).prefix(), code)
}

/// Strip a provider prefix, if any, leaving the pure numeric code.
pub fn pure_code(code: &str) -> &str {
    split_qualified(code).1
}

/// True for a 6-digit numeric code.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

/// A tradable instrument in a universe snapshot.
///
/// Identity is `code`; `extra` holds provider-native columns retained verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub code: String,
    pub name: String,
    pub exchange: Option<Exchange>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Symbol {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        let code = code.into();
        let exchange = Some(Exchange::from_code(&code));
        Self {
            code,
            name: name.into(),
            exchange,
            extra: BTreeMap::new(),
        }
    }

    /// Exchange-qualified code, e.g. `sh.600000`.
    pub fn full_code(&self) -> String {
        let exchange = self
            .exchange
            .unwrap_or_else(|| Exchange::from_code(&self.code));
        format!("{}.{}", exchange.prefix(), self.code)
    }

    pub fn attribute(&self, column: &str) -> Option<&str> {
        self.extra.get(column).map(|s| s.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shanghai_prefixes_route_to_sh() {
        for code in ["600000", "601398", "603288", "605499", "688001"] {
            assert_eq!(Exchange::from_code(code), Exchange::Shanghai, "{code}");
        }
    }

    #[test]
    fn other_codes_route_to_sz() {
        for code in ["000001", "002415", "300750", "602000", "689009"] {
            assert_eq!(Exchange::from_code(code), Exchange::Shenzhen, "{code}");
        }
    }

    #[test]
    fn qualify_keeps_existing_prefix() {
        assert_eq!(qualify_code("sz.600000"), "sz.600000");
        assert_eq!(qualify_code("SH.600000"), "sh.600000");
        assert_eq!(qualify_code("600000"), "sh.600000");
        assert_eq!(qualify_code("000001"), "sz.000001");
    }

    #[test]
    fn split_and_strip() {
        assert_eq!(split_qualified("bj.830799"), (Some(Exchange::Beijing), "830799"));
        assert_eq!(split_qualified("xx.123456"), (None, "123456"));
        assert_eq!(pure_code("sh.600000"), "600000");
        assert_eq!(pure_code("000001"), "000001");
    }

    #[test]
    fn code_validation() {
        assert!(is_valid_code("000001"));
        assert!(!is_valid_code("00001"));
        assert!(!is_valid_code("00000a"));
        assert!(!is_valid_code("sh.600000"));
    }

    #[test]
    fn full_code_uses_tag() {
        let mut sym = Symbol::new("600000", "浦发银行");
        assert_eq!(sym.full_code(), "sh.600000");
        sym.exchange = None;
        assert_eq!(sym.full_code(), "sh.600000");
    }
}
