//! Idempotent file set writer.
//!
//! A file is written only when it cannot be read or its bytes differ from
//! the desired content. The returned flag is the sole gate for reloading
//! the proxy.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::observability::metrics;

/// A write failed part way through a file set.
#[derive(Debug, Error)]
#[error("failed to write {path}: {source}")]
pub struct PartialWriteError {
    pub path: PathBuf,
    /// Whether any file was changed before the failure.
    pub changed: bool,
    #[source]
    pub source: io::Error,
}

/// Write `files` (name → content) under `dir`. Returns whether any file
/// changed. The first write error stops the call.
pub fn write_file_set(files: &BTreeMap<String, String>, dir: &Path) -> Result<bool, PartialWriteError> {
    let mut changed = false;
    let mut written = 0usize;
    let mut bytes = 0usize;

    for (name, content) in files {
        let path = dir.join(name);

        match fs::read(&path) {
            Ok(existing) if existing == content.as_bytes() => {
                tracing::debug!(file = %path.display(), "Skipping file, contents unchanged");
                continue;
            }
            Ok(existing) => {
                tracing::debug!(
                    file = %path.display(),
                    old_bytes = existing.len(),
                    new_bytes = content.len(),
                    "Writing file, contents differ"
                );
            }
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "Writing file, could not read the current one");
            }
        }

        if let Err(source) = fs::write(&path, content) {
            tracing::error!(file = %path.display(), error = %source, "Failed to write binding file");
            return Err(PartialWriteError { path, changed, source });
        }

        changed = true;
        written += 1;
        bytes += content.len();
        metrics::record_binding_file_written();
    }

    if changed {
        tracing::info!(dir = %dir.display(), files = written, bytes, "Binding files updated");
    }
    Ok(changed)
}
