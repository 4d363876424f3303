//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → bind control socket → executor
//!     → schedulers → event subscriber
//!
//! Shutdown (shutdown.rs):
//!     Signal received → tasks leave their wait points
//!     → running pass completes → socket removed → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run_binding, run_launch, start_binding_watch, start_daemon, Daemon, Services, StartupError};
