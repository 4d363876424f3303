//! Apply decision engine.
//!
//! # State Machine (per unit, per pass)
//! ```text
//! Seen → DryRun ─┬─ UpToDate ───────────────────────→ Ok
//!                ├─ NeedsApply → Applying ─┬─ apply ok → Ok
//!                │                         ├─ apply err → Failed
//!                │                         └─ dry-run mode → Ok
//!                └─ dry-run error ──────────────────→ Failed
//! ```
//!
//! # Design Decisions
//! - One unit's failure never blocks the others
//! - Nothing is retried within a pass; the next pass re-evaluates

use std::collections::HashSet;
use std::sync::Arc;

use crate::apply::compose::{ComposeError, ComposeRunner};
use crate::apply::drift::needs_apply;
use crate::observability::metrics;
use crate::state::{StateTracker, UnitState};
use crate::units::Unit;

/// Outcome of the drift check for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NeedsApply,
    UpToDate,
}

/// Final outcome of evaluating one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    UpToDate,
    Applied,
    /// Needed an apply, skipped because the engine is in dry-run mode.
    WouldApply,
    ApplyFailed,
    DryRunFailed,
}

impl UnitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOutcome::UpToDate => "up_to_date",
            UnitOutcome::Applied => "applied",
            UnitOutcome::WouldApply => "would_apply",
            UnitOutcome::ApplyFailed => "apply_failed",
            UnitOutcome::DryRunFailed => "dry_run_failed",
        }
    }
}

/// Counts for one apply pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub discovered: usize,
    pub missing: usize,
    pub up_to_date: usize,
    pub applied: usize,
    pub would_apply: usize,
    pub failed: usize,
}

impl PassSummary {
    fn count(&mut self, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::UpToDate => self.up_to_date += 1,
            UnitOutcome::Applied => self.applied += 1,
            UnitOutcome::WouldApply => self.would_apply += 1,
            UnitOutcome::ApplyFailed | UnitOutcome::DryRunFailed => self.failed += 1,
        }
    }
}

/// Decides, per unit, whether an apply is needed and performs it.
pub struct ApplyEngine {
    runner: Arc<dyn ComposeRunner>,
    dry_run: bool,
}

impl ApplyEngine {
    /// `dry_run` disables real applies; units needing one are reported `Ok`.
    pub fn new(runner: Arc<dyn ComposeRunner>, dry_run: bool) -> Self {
        Self { runner, dry_run }
    }

    /// Record discovery: every loaded unit becomes `Seen`, every other
    /// tracked unit becomes `Missing`. Returns the number marked missing.
    pub fn discover(units: &[Unit], tracker: &mut StateTracker) -> usize {
        let present: HashSet<&str> = units.iter().map(|u| u.name.as_str()).collect();

        for unit in units {
            tracker.record_seen(unit.clone());
        }

        let mut missing = 0;
        for name in tracker.tracked_names() {
            if !present.contains(name.as_str()) {
                tracker.record_state(&name, UnitState::Missing);
                missing += 1;
            }
        }
        missing
    }

    /// Run the orchestrator dry-run and classify the unit.
    pub async fn decide(&self, unit: &Unit) -> Result<Decision, ComposeError> {
        let output = self.runner.dry_run(unit).await?;
        Ok(if needs_apply(&output) {
            Decision::NeedsApply
        } else {
            Decision::UpToDate
        })
    }

    /// Evaluate one unit and record its terminal state.
    pub async fn evaluate(&self, unit: &Unit, tracker: &mut StateTracker) -> UnitOutcome {
        let decision = match self.decide(unit).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(
                    unit = %unit.name,
                    file = %unit.source.display(),
                    error = %e,
                    "Could not tell if the unit needs applying, dry run failed"
                );
                tracker.record_state(&unit.name, UnitState::Failed);
                return UnitOutcome::DryRunFailed;
            }
        };

        if decision == Decision::UpToDate {
            tracing::debug!(unit = %unit.name, file = %unit.source.display(), "Unit does not need applying");
            tracker.record_state(&unit.name, UnitState::Ok);
            return UnitOutcome::UpToDate;
        }

        tracker.record_state(&unit.name, UnitState::Applying);
        tracing::info!(unit = %unit.name, file = %unit.source.display(), "Unit needs applying");

        if self.dry_run {
            tracing::info!(unit = %unit.name, "Not applying changes, dry-run mode");
            tracker.record_state(&unit.name, UnitState::Ok);
            return UnitOutcome::WouldApply;
        }

        match self.runner.apply(unit).await {
            Ok(()) => {
                tracing::info!(unit = %unit.name, "Unit applied");
                tracker.record_state(&unit.name, UnitState::Ok);
                UnitOutcome::Applied
            }
            Err(e) => {
                tracing::error!(
                    unit = %unit.name,
                    file = %unit.source.display(),
                    error = %e,
                    "Failed to apply unit"
                );
                tracker.record_state(&unit.name, UnitState::Failed);
                UnitOutcome::ApplyFailed
            }
        }
    }

    /// Discovery followed by evaluation of every loaded unit, in order.
    pub async fn run_pass(&self, units: &[Unit], tracker: &mut StateTracker) -> PassSummary {
        let mut summary = PassSummary {
            discovered: units.len(),
            missing: Self::discover(units, tracker),
            ..PassSummary::default()
        };

        for unit in units {
            let outcome = self.evaluate(unit, tracker).await;
            metrics::record_unit_outcome(outcome.as_str());
            summary.count(outcome);
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Scripted orchestrator: dry-run output and apply result per unit.
    #[derive(Default)]
    struct Scripted {
        dry_runs: HashMap<String, Result<String, ()>>,
        apply_fails: HashSet<String>,
        applied: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ComposeRunner for Scripted {
        async fn dry_run(&self, unit: &Unit) -> Result<String, ComposeError> {
            match self.dry_runs.get(&unit.name) {
                Some(Ok(out)) => Ok(out.clone()),
                _ => Err(ComposeError::Failed {
                    program: "docker".into(),
                    status: "exit status: 1".into(),
                    output: "boom".into(),
                }),
            }
        }

        async fn apply(&self, unit: &Unit) -> Result<(), ComposeError> {
            self.applied.lock().unwrap().push(unit.name.clone());
            if self.apply_fails.contains(&unit.name) {
                return Err(ComposeError::Failed {
                    program: "docker".into(),
                    status: "exit status: 1".into(),
                    output: "apply failed".into(),
                });
            }
            Ok(())
        }
    }

    fn unit(name: &str) -> Unit {
        Unit {
            name: name.into(),
            source: PathBuf::from(format!("/srv/{name}.yaml")),
            content: String::new(),
        }
    }

    const RUNNING: &str = " Container x-1  Running\n";
    const DRIFTED: &str = " Container x-1  Recreate\n";

    #[tokio::test]
    async fn test_up_to_date_and_applied_both_ok() {
        let mut runner = Scripted::default();
        runner.dry_runs.insert("a".into(), Ok(RUNNING.into()));
        runner.dry_runs.insert("b".into(), Ok(DRIFTED.into()));
        let runner = Arc::new(runner);

        let engine = ApplyEngine::new(runner.clone(), false);
        let mut tracker = StateTracker::new();
        let summary = engine.run_pass(&[unit("a"), unit("b")], &mut tracker).await;

        assert_eq!(tracker.state_of("a"), Some(UnitState::Ok));
        assert_eq!(tracker.state_of("b"), Some(UnitState::Ok));
        assert_eq!(*runner.applied.lock().unwrap(), vec!["b".to_string()]);
        assert_eq!(summary.up_to_date, 1);
        assert_eq!(summary.applied, 1);
    }

    #[tokio::test]
    async fn test_apply_failure_does_not_block_others() {
        let mut runner = Scripted::default();
        runner.dry_runs.insert("a".into(), Ok(DRIFTED.into()));
        runner.dry_runs.insert("b".into(), Ok(DRIFTED.into()));
        runner.apply_fails.insert("a".into());
        let runner = Arc::new(runner);

        let engine = ApplyEngine::new(runner.clone(), false);
        let mut tracker = StateTracker::new();
        let summary = engine.run_pass(&[unit("a"), unit("b")], &mut tracker).await;

        assert_eq!(tracker.state_of("a"), Some(UnitState::Failed));
        assert_eq!(tracker.state_of("b"), Some(UnitState::Ok));
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.applied, 1);
    }

    #[tokio::test]
    async fn test_dry_run_failure_marks_failed_without_apply() {
        let runner = Arc::new(Scripted::default());
        let engine = ApplyEngine::new(runner.clone(), false);
        let mut tracker = StateTracker::new();

        tracker.record_seen(unit("a"));

        let outcome = engine.evaluate(&unit("a"), &mut tracker).await;
        assert_eq!(outcome, UnitOutcome::DryRunFailed);
        assert_eq!(tracker.state_of("a"), Some(UnitState::Failed));
        assert!(runner.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_mode_never_applies() {
        let mut runner = Scripted::default();
        runner.dry_runs.insert("a".into(), Ok(DRIFTED.into()));
        let runner = Arc::new(runner);

        let engine = ApplyEngine::new(runner.clone(), true);
        let mut tracker = StateTracker::new();
        let summary = engine.run_pass(&[unit("a")], &mut tracker).await;

        assert_eq!(tracker.state_of("a"), Some(UnitState::Ok));
        assert_eq!(summary.would_apply, 1);
        assert!(runner.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_absent_units_forced_missing() {
        let mut runner = Scripted::default();
        for name in ["a", "b", "c"] {
            runner.dry_runs.insert(name.into(), Ok(RUNNING.into()));
        }
        let engine = ApplyEngine::new(Arc::new(runner), false);
        let mut tracker = StateTracker::new();

        engine.run_pass(&[unit("a"), unit("b"), unit("c")], &mut tracker).await;
        tracker.record_state("c", UnitState::Failed);

        let summary = engine.run_pass(&[unit("a")], &mut tracker).await;
        assert_eq!(summary.missing, 2);
        assert_eq!(tracker.state_of("a"), Some(UnitState::Ok));
        assert_eq!(tracker.state_of("b"), Some(UnitState::Missing));
        assert_eq!(tracker.state_of("c"), Some(UnitState::Missing));
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_discover_sets_seen_before_evaluation() {
        let mut tracker = StateTracker::new();
        tracker.record_seen(unit("a"));
        tracker.record_state("a", UnitState::Failed);

        let missing = ApplyEngine::discover(&[unit("a")], &mut tracker);
        assert_eq!(missing, 0);
        assert_eq!(tracker.state_of("a"), Some(UnitState::Seen));
    }
}
