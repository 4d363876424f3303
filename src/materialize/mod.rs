//! Binding materialization: render, write, reload.
//!
//! # Data Flow
//! ```text
//! roots → load_units
//!     → collect_bindings (runtime)
//!     → render_bindings  (runtime labels)
//!     → write_file_set   → changed?
//!     → NginxControl::reload (validate, then restart)
//! ```

pub mod proxy;
pub mod writer;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

pub use proxy::{NginxControl, ProxyError, ReloadOutcome};
pub use writer::{write_file_set, PartialWriteError};

use crate::binding::{collect_bindings, render_bindings, BindingResult, ContainerRuntime, LabelScheme, RouteDefaults, RuntimeError};
use crate::units::{load_units, LoadError, LoadOptions};

#[derive(Debug, Error)]
pub enum BindingPassError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Write(#[from] PartialWriteError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("failed to encode bindings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What a binding pass produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    /// Write nginx config files and reload the proxy.
    Nginx,
    /// Print the binding tree as JSON on stdout.
    Json,
}

/// What a binding pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSummary {
    pub units: usize,
    pub files: usize,
    pub changed: bool,
    pub reload: Option<ReloadOutcome>,
}

/// One full binding pass.
pub struct BindingPass {
    roots: Vec<PathBuf>,
    options: LoadOptions,
    runtime: Arc<dyn ContainerRuntime>,
    scheme: LabelScheme,
    defaults: RouteDefaults,
    output_dir: PathBuf,
    proxy: NginxControl,
}

impl BindingPass {
    pub fn new(
        roots: Vec<PathBuf>,
        options: LoadOptions,
        runtime: Arc<dyn ContainerRuntime>,
        scheme: LabelScheme,
        defaults: RouteDefaults,
        output_dir: PathBuf,
        proxy: NginxControl,
    ) -> Self {
        Self {
            roots,
            options,
            runtime,
            scheme,
            defaults,
            output_dir,
            proxy,
        }
    }

    /// The current binding tree, without rendering anything.
    pub async fn resolve(&self) -> Result<BindingResult, BindingPassError> {
        let units = load_units(&self.roots, &self.options)?;
        Ok(collect_bindings(self.runtime.as_ref(), &units).await?)
    }

    /// Print the binding tree as one line of JSON.
    pub async fn emit_json(&self) -> Result<(), BindingPassError> {
        let result = self.resolve().await?;
        println!("{}", serde_json::to_string(&result)?);
        Ok(())
    }

    pub async fn run(&self, mode: BindingMode) -> Result<(), BindingPassError> {
        match mode {
            BindingMode::Nginx => self.execute().await.map(|_| ()),
            BindingMode::Json => self.emit_json().await,
        }
    }

    pub async fn execute(&self) -> Result<BindingSummary, BindingPassError> {
        let result = self.resolve().await?;
        let files = render_bindings(self.runtime.as_ref(), &result, &self.scheme, &self.defaults).await?;

        let changed = write_file_set(&files, &self.output_dir).inspect_err(|e| {
            if e.changed {
                tracing::error!(error = %e, "Failed to write all binding files, some files were changed");
            } else {
                tracing::error!(error = %e, "Failed to write all binding files, no files were changed");
            }
        })?;

        let reload = if changed {
            Some(self.proxy.reload().await?)
        } else {
            tracing::debug!("Binding files unchanged, not reloading the proxy");
            None
        };

        let summary = BindingSummary {
            units: result.projects.len(),
            files: files.len(),
            changed,
            reload,
        };
        tracing::info!(units = summary.units, files = summary.files, changed, "Binding pass finished");
        Ok(summary)
    }
}
