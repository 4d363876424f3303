//! Pass scheduling.
//!
//! # Data Flow
//! ```text
//! filesystem change ─┐
//! interval tick ─────┤
//! runtime event ─────┼→ PassQueue::trigger (never blocks, coalesces)
//! control plane ─────┘        │
//!                             ▼
//!                      PassExecutor (one pass at a time, apply first)
//! ```

pub mod executor;
pub mod queue;
pub mod watcher;

pub use executor::PassExecutor;
pub use queue::{PassKind, PassQueue};
pub use watcher::{WatchError, WatchScheduler};
