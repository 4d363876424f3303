//! Unit discovery from disk.
//!
//! # Responsibilities
//! - Walk every configured root recursively
//! - Pick up files with a recognised definition extension
//! - Parse and rewrite each candidate into a [`Unit`]
//!
//! # Design Decisions
//! - A traversal error aborts the whole load and is returned
//! - A broken individual file is logged and skipped
//! - Names stay unique: a later file normalizing to a loaded name is skipped

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::units::definition::{parse_definition, DefinitionError};
use crate::units::Unit;

/// Error type for loading a set of units.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Walking a root failed (missing root, permission denied, loop...).
    #[error("failed to traverse {root}: {source}")]
    Traversal {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Error for a single candidate file. Never aborts a load.
#[derive(Debug, Error)]
pub enum UnitFileError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

/// Options shared by every load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// File extensions (without the dot) treated as definitions.
    pub extensions: Vec<String>,
    /// Directory under `/mnt` used for expanded auto volumes.
    pub mount_namespace: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["yaml".to_string()],
            mount_namespace: "nqkd".to_string(),
        }
    }
}

impl LoadOptions {
    fn is_candidate(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|want| want == ext))
    }
}

/// Load a single definition file.
pub fn load_unit(path: &Path, options: &LoadOptions) -> Result<Unit, UnitFileError> {
    let text = fs::read_to_string(path)?;
    let parsed = parse_definition(path, &text, &options.mount_namespace)?;

    Ok(Unit {
        name: parsed.name,
        source: path.to_path_buf(),
        content: parsed.content,
    })
}

/// Walk every root and load all definitions found, in traversal order.
pub fn load_units(roots: &[PathBuf], options: &LoadOptions) -> Result<Vec<Unit>, LoadError> {
    let mut candidates = Vec::new();
    for root in roots {
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|source| LoadError::Traversal {
                root: root.clone(),
                source,
            })?;

            if entry.file_type().is_file() && options.is_candidate(entry.path()) {
                candidates.push(entry.into_path());
            }
        }
    }

    let mut seen = HashSet::new();
    let mut units = Vec::with_capacity(candidates.len());
    for path in candidates {
        match load_unit(&path, options) {
            Ok(unit) => {
                if !seen.insert(unit.name.clone()) {
                    tracing::warn!(
                        unit = %unit.name,
                        file = %path.display(),
                        "Skipping definition, another file already provides this unit"
                    );
                    continue;
                }
                units.push(unit);
            }
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "Failed to load unit definition, skipping");
            }
        }
    }

    tracing::debug!(count = units.len(), "Loaded unit definitions");
    Ok(units)
}
