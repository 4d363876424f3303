//! Unit discovery subsystem.
//!
//! # Data Flow
//! ```text
//! configured roots
//!     → loader.rs (walk, pick *.yaml)
//!     → definition.rs (schema check, name, auto_volumes expansion)
//!     → name.rs (canonical identifier)
//!     → Unit (immutable for the pass)
//! ```

pub mod definition;
pub mod loader;
pub mod name;

use std::path::PathBuf;

use serde::Serialize;

pub use loader::{load_units, LoadError, LoadOptions};
pub use name::normalize_name;

/// One deployment unit as loaded for a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    /// Normalized name, unique within a load.
    pub name: String,
    /// File the unit was loaded from.
    pub source: PathBuf,
    /// Rewritten definition handed to the orchestrator.
    #[serde(skip)]
    pub content: String,
}
