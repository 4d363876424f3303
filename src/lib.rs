//! nqkd: not quite kubernetes daemon.
//!
//! Keeps a host's compose deployments in line with a directory of unit
//! definitions, and publishes their ports through nginx.

// Unit discovery and state
pub mod state;
pub mod units;

// Engines
pub mod apply;
pub mod binding;
pub mod events;
pub mod materialize;
pub mod scheduler;

// Surfaces
pub mod control;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod process;

pub use config::DaemonConfig;
pub use lifecycle::Shutdown;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
