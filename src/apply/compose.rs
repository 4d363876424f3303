//! Orchestrator call-out.
//!
//! # Responsibilities
//! - Materialize a unit's rewritten definition into a temporary file
//! - Run the orchestrator's dry-run and real apply against it
//! - Surface non-zero exits as errors carrying the output
//!
//! # Design Decisions
//! - The orchestrator is a black box behind [`ComposeRunner`]
//! - The temporary file lives only for the duration of one invocation

use std::io::Write;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::process::{escape_output, run_captured};
use crate::units::Unit;

/// Errors from invoking the orchestrator.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to stage definition for {unit}: {source}")]
    Stage {
        unit: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },
}

/// Runs the external orchestrator for a unit.
#[async_trait]
pub trait ComposeRunner: Send + Sync {
    /// Dry-run an apply and return its combined output.
    async fn dry_run(&self, unit: &Unit) -> Result<String, ComposeError>;

    /// Apply the unit for real.
    async fn apply(&self, unit: &Unit) -> Result<(), ComposeError>;
}

/// `docker compose` backed runner.
#[derive(Debug, Clone)]
pub struct DockerCompose {
    program: String,
}

impl DockerCompose {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn stage(&self, unit: &Unit) -> Result<NamedTempFile, ComposeError> {
        let stage_err = |source| ComposeError::Stage {
            unit: unit.name.clone(),
            source,
        };

        let mut file = tempfile::Builder::new()
            .prefix("active.")
            .suffix(".nqkd.yaml")
            .tempfile()
            .map_err(stage_err)?;
        file.write_all(unit.content.as_bytes()).map_err(stage_err)?;
        file.flush().map_err(stage_err)?;
        Ok(file)
    }

    async fn compose(&self, unit: &Unit, flags: &[&str], command: &[&str]) -> Result<String, ComposeError> {
        let staged = self.stage(unit)?;
        let file = staged.path().to_string_lossy().into_owned();

        let mut args = vec!["compose"];
        args.extend_from_slice(flags);
        args.extend_from_slice(&["-p", unit.name.as_str(), "-f", file.as_str()]);
        args.extend_from_slice(command);

        let output = run_captured(&self.program, &args)
            .await
            .map_err(|source| ComposeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.success() {
            return Err(ComposeError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                output: escape_output(&output.combined()),
            });
        }

        Ok(output.combined())
    }
}

impl Default for DockerCompose {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ComposeRunner for DockerCompose {
    async fn dry_run(&self, unit: &Unit) -> Result<String, ComposeError> {
        // docker compose --dry-run -p <name> -f <file> up
        self.compose(unit, &["--dry-run"], &["up"]).await
    }

    async fn apply(&self, unit: &Unit) -> Result<(), ComposeError> {
        // docker compose -p <name> -f <file> up -d
        self.compose(unit, &[], &["up", "-d"]).await.map(|_| ())
    }
}
