//! Unit lifecycle state.
//!
//! # Data Flow
//! ```text
//! pass executor (single writer)
//!     → StateTracker (ordered ledger, timestamped writes)
//!     → ArcSwap snapshot, republished on every write
//!     → StatusReader (control plane status query)
//! ```

pub mod record;

pub use record::{StateTracker, StatusEntry, StatusReader, UnitRecord, UnitState};
