//! Market data: provider sessions, universe filtering, the date-keyed cache,
//! and the synthetic provider/engine pair.

pub mod cache;
pub mod provider;
pub mod synthetic;
pub mod universe;

pub use cache::{
    AnalysisRecord, CacheError, CacheKey, CacheManager, CachePayload, CacheScope, CacheStatus,
    CachedPoint, PruneReport, MAX_CACHED_POINTS,
};
pub use provider::{
    MarketDataProvider, ProviderError, ProviderSession, RawListing, UnavailableProvider,
};
pub use synthetic::{SyntheticEngine, SyntheticHandle, SyntheticProvider};
pub use universe::{
    fetch_universe, load_universe, ExclusionRule, FilterReport, UniverseError, UniverseFilter,
};
