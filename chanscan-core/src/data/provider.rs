//! Market-data provider trait, raw listing rows, and the scoped session guard.
//!
//! The provider speaks a session protocol (login → query → logout). Real
//! adapters live outside this crate; the trait lets us swap them and mock for
//! tests.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

/// Structured error types reported by a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("login failed (code {code}): {message}")]
    LoginFailed { code: String, message: String },

    #[error("query failed (code {code}): {message}")]
    QueryFailed { code: String, message: String },

    #[error("no response from provider")]
    NoResponse,

    #[error("provider error: {0}")]
    Other(String),
}

/// Tabular listing exactly as the provider returned it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawListing {
    pub fn new(fields: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { fields, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Session-based market-data provider.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn login(&self) -> Result<(), ProviderError>;

    /// Base instrument listing for a trading day. An empty row set (e.g. a
    /// non-trading day) is a valid answer, not an error.
    fn query_listing(&self, day: NaiveDate) -> Result<RawListing, ProviderError>;

    fn logout(&self);
}

/// An open provider session. Logs out when dropped, on every exit path.
pub struct ProviderSession<'a> {
    provider: &'a dyn MarketDataProvider,
}

impl<'a> ProviderSession<'a> {
    pub fn open(provider: &'a dyn MarketDataProvider) -> Result<Self, ProviderError> {
        provider.login()?;
        debug!(provider = provider.name(), "provider session opened");
        Ok(Self { provider })
    }

    pub fn query_listing(&self, day: NaiveDate) -> Result<RawListing, ProviderError> {
        self.provider.query_listing(day)
    }
}

impl Drop for ProviderSession<'_> {
    fn drop(&mut self) {
        self.provider.logout();
        debug!(provider = self.provider.name(), "provider session closed");
    }
}

/// Wraps a provider and refuses to log in; used to surface a clear error when
/// no adapter is linked for the configured data source.
pub struct UnavailableProvider {
    reason: String,
}

impl UnavailableProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl MarketDataProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn login(&self) -> Result<(), ProviderError> {
        warn!(reason = %self.reason, "provider login refused");
        Err(ProviderError::LoginFailed {
            code: "-1".into(),
            message: self.reason.clone(),
        })
    }

    fn query_listing(&self, _day: NaiveDate) -> Result<RawListing, ProviderError> {
        Err(ProviderError::NoResponse)
    }

    fn logout(&self) {}
}
