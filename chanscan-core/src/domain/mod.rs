//! Domain types for ChanScan

pub mod level;
pub mod signal;
pub mod symbol;
pub mod universe;

pub use level::KlType;
pub use signal::{format_signal_time, parse_signal_time, Bar, Direction, SignalEvent};
pub use symbol::{is_valid_code, pure_code, qualify_code, split_qualified, Exchange, Symbol};
pub use universe::UniverseSnapshot;
