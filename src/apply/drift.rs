//! Drift detection from orchestrator dry-run output.
//!
//! A unit is up to date only if every line of the dry-run output (except the
//! trailing summary) reports the resource as already running. Anything else
//! means the orchestrator would do work, so the unit needs an apply.
//!
//! This is a best-effort approximation, not proof of convergence.

/// Marker every "nothing to do" line contains.
pub const RUNNING_MARKER: &str = "Running";

/// Trailer printed at the end of a dry run; ignored.
pub const DRY_RUN_TRAILER: &str = "end of 'compose up'";

/// Whether the dry-run `output` indicates the unit needs applying.
///
/// Empty output counts as a single empty line, which needs applying.
pub fn needs_apply(output: &str) -> bool {
    output
        .trim()
        .split('\n')
        .filter(|line| !line.starts_with(DRY_RUN_TRAILER))
        .any(|line| !line.contains(RUNNING_MARKER))
}
