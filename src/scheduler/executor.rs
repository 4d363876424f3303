//! The single pass runner.
//!
//! # Responsibilities
//! - Own the state tracker (sole writer)
//! - Take passes off the queue one at a time and run each to completion
//! - Stop waiting for work on shutdown; a running pass is never cut short

use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

use crate::apply::ApplyPass;
use crate::materialize::{BindingMode, BindingPass};
use crate::observability::metrics;
use crate::scheduler::queue::{PassKind, PassQueue};
use crate::state::{StateTracker, StatusReader};

pub struct PassExecutor {
    queue: PassQueue,
    tracker: StateTracker,
    apply: Option<ApplyPass>,
    binding: Option<(BindingPass, BindingMode)>,
}

impl PassExecutor {
    pub fn new(queue: PassQueue) -> Self {
        Self {
            queue,
            tracker: StateTracker::new(),
            apply: None,
            binding: None,
        }
    }

    pub fn with_apply(mut self, pass: ApplyPass) -> Self {
        self.apply = Some(pass);
        self
    }

    pub fn with_binding(mut self, pass: BindingPass, mode: BindingMode) -> Self {
        self.binding = Some((pass, mode));
        self
    }

    /// Read side of the tracker this executor writes.
    pub fn status(&self) -> StatusReader {
        self.tracker.reader()
    }

    /// Run one pass of `kind`. Returns false if the pass failed.
    pub async fn run_pass(&mut self, kind: PassKind) -> bool {
        let pass_id = Uuid::new_v4();
        let span = tracing::info_span!("pass", kind = %kind, pass_id = %pass_id);

        metrics::record_pass(kind.as_str());
        let ok = self.dispatch(kind).instrument(span).await;
        if !ok {
            metrics::record_pass_failure(kind.as_str());
        }
        ok
    }

    async fn dispatch(&mut self, kind: PassKind) -> bool {
        match kind {
            PassKind::Apply => {
                let Some(pass) = &self.apply else {
                    tracing::debug!("No apply engine configured, ignoring trigger");
                    return true;
                };
                tracing::info!("Checking all units");
                match pass.execute(&mut self.tracker).await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::error!(error = %e, "Apply pass failed, could not load units");
                        false
                    }
                }
            }
            PassKind::Binding => {
                let Some((pass, mode)) = &self.binding else {
                    tracing::debug!("No binding engine configured, ignoring trigger");
                    return true;
                };
                match pass.run(*mode).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::error!(error = %e, "Binding pass failed");
                        false
                    }
                }
            }
        }
    }

    /// Serve the queue until it closes or shutdown is signalled.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Pass executor started");
        loop {
            let kind = tokio::select! {
                _ = shutdown.recv() => break,
                next = self.queue.next() => match next {
                    Some(kind) => kind,
                    None => break,
                },
            };
            self.run_pass(kind).await;
        }
        tracing::info!("Pass executor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::{ComposeError, ComposeRunner};
    use crate::state::UnitState;
    use crate::units::{LoadOptions, Unit};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counting {
        dry_runs: AtomicUsize,
    }

    #[async_trait]
    impl ComposeRunner for Counting {
        async fn dry_run(&self, _unit: &Unit) -> Result<String, ComposeError> {
            self.dry_runs.fetch_add(1, Ordering::SeqCst);
            Ok(" Container x  Running\n".into())
        }

        async fn apply(&self, _unit: &Unit) -> Result<(), ComposeError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_executor_runs_queued_apply() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("web.yaml"), "services: {}\n").unwrap();
        let runner = Arc::new(Counting::default());

        let queue = PassQueue::new();
        let executor = PassExecutor::new(queue.clone()).with_apply(ApplyPass::new(
            vec![dir.path().to_path_buf()],
            LoadOptions::default(),
            runner.clone(),
            false,
        ));
        let status = executor.status();

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(executor.run(rx));

        queue.trigger(PassKind::Apply);
        for _ in 0..200 {
            if status.snapshot().first().map(|e| e.state) == Some(UnitState::Ok) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(status.snapshot()[0].state, UnitState::Ok);

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(runner.dry_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = PassExecutor::new(PassQueue::new()).with_apply(ApplyPass::new(
            vec![dir.path().join("absent")],
            LoadOptions::default(),
            Arc::new(Counting::default()),
            false,
        ));
        assert!(!executor.run_pass(PassKind::Apply).await);
    }

    #[tokio::test]
    async fn test_unconfigured_kind_is_noop() {
        let mut executor = PassExecutor::new(PassQueue::new());
        assert!(executor.run_pass(PassKind::Binding).await);
    }
}
