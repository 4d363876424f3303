//! Unit reconciliation: load, detect drift, apply.
//!
//! # Data Flow
//! ```text
//! roots → load_units → ApplyEngine::discover (Seen / Missing)
//!                    → per unit: ComposeRunner::dry_run → needs_apply
//!                                → ComposeRunner::apply → Ok | Failed
//! ```

pub mod compose;
pub mod drift;
pub mod engine;

use std::path::PathBuf;
use std::sync::Arc;

pub use compose::{ComposeError, ComposeRunner, DockerCompose};
pub use drift::needs_apply;
pub use engine::{ApplyEngine, Decision, PassSummary, UnitOutcome};

use crate::state::StateTracker;
use crate::units::{load_units, LoadError, LoadOptions};

/// One full apply pass over the configured roots.
pub struct ApplyPass {
    roots: Vec<PathBuf>,
    options: LoadOptions,
    engine: ApplyEngine,
}

impl ApplyPass {
    pub fn new(roots: Vec<PathBuf>, options: LoadOptions, runner: Arc<dyn ComposeRunner>, dry_run: bool) -> Self {
        Self {
            roots,
            options,
            engine: ApplyEngine::new(runner, dry_run),
        }
    }

    /// Load every unit and reconcile it. A traversal failure aborts the pass
    /// before the tracker is touched.
    pub async fn execute(&self, tracker: &mut StateTracker) -> Result<PassSummary, LoadError> {
        let units = load_units(&self.roots, &self.options)?;
        let summary = self.engine.run_pass(&units, tracker).await;

        tracing::info!(
            discovered = summary.discovered,
            missing = summary.missing,
            up_to_date = summary.up_to_date,
            applied = summary.applied,
            would_apply = summary.would_apply,
            failed = summary.failed,
            "Apply pass finished"
        );
        Ok(summary)
    }
}
