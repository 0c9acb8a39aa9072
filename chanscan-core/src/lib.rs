//! ChanScan Core — domain types, collaborator contracts, universe filter, cache.
//!
//! This crate holds everything a scan needs below the orchestration layer:
//! - Domain types (symbols, levels, signals, bars, universe snapshots)
//! - The market-data provider and analysis engine traits
//! - The ordered universe exclusion chain
//! - The two-tier date-keyed cache (universe and per-symbol records)
//! - A deterministic synthetic provider/engine for offline runs

pub mod context;
pub mod data;
pub mod domain;
pub mod engine;

pub use context::ScanContext;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with scan workers are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Symbol>();
        require_sync::<domain::Symbol>();
        require_send::<domain::UniverseSnapshot>();
        require_sync::<domain::UniverseSnapshot>();
        require_send::<domain::SignalEvent>();
        require_sync::<domain::SignalEvent>();
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();

        // Engine contract
        require_send::<engine::EngineRequest>();
        require_sync::<engine::EngineRequest>();
        require_send::<engine::EngineError>();
        require_sync::<engine::EngineError>();
        require_send::<Box<dyn engine::AnalysisHandle>>();
        require_sync::<Box<dyn engine::AnalysisHandle>>();

        // Data layer
        require_send::<data::CacheManager>();
        require_sync::<data::CacheManager>();
        require_send::<data::AnalysisRecord>();
        require_sync::<data::AnalysisRecord>();
        require_send::<data::UniverseFilter>();
        require_sync::<data::UniverseFilter>();
        require_send::<data::SyntheticEngine>();
        require_sync::<data::SyntheticEngine>();
        require_send::<ScanContext>();
        require_sync::<ScanContext>();
    }
}
