//! Per-unit lifecycle ledger.
//!
//! # States
//! ```text
//! Seen → Applying → Ok | Failed
//! Seen → Ok | Failed
//! any  → Missing   (tracked before, absent from the latest discovery)
//! ```
//!
//! # Design Decisions
//! - Entries are never removed, only marked `Missing`
//! - The tracker is passive; the reconciliation driver enforces transitions
//! - Every write republishes an immutable snapshot for readers

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::units::Unit;

/// Lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitState {
    /// Discovered this pass, not yet evaluated.
    Seen,
    /// Apply in flight.
    Applying,
    Ok,
    Failed,
    /// Tracked previously, absent from the latest discovery.
    Missing,
}

impl UnitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Seen => "Seen",
            UnitState::Applying => "Applying",
            UnitState::Ok => "Ok",
            UnitState::Failed => "Failed",
            UnitState::Missing => "Missing",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked unit with its current state.
#[derive(Debug, Clone)]
pub struct UnitRecord {
    pub unit: Unit,
    pub state: UnitState,
    pub last_updated: DateTime<Utc>,
}

/// Wire view of a record, as returned by the status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub name: String,
    pub source: PathBuf,
    pub last_updated: DateTime<Utc>,
    pub state: UnitState,
}

impl From<&UnitRecord> for StatusEntry {
    fn from(record: &UnitRecord) -> Self {
        Self {
            name: record.unit.name.clone(),
            source: record.unit.source.clone(),
            last_updated: record.last_updated,
            state: record.state,
        }
    }
}

type Snapshot = Arc<Vec<StatusEntry>>;

/// Cloneable read side of the ledger.
#[derive(Clone)]
pub struct StatusReader {
    published: Arc<ArcSwap<Vec<StatusEntry>>>,
}

impl StatusReader {
    /// Latest published snapshot, ordered by unit name.
    pub fn snapshot(&self) -> Snapshot {
        self.published.load_full()
    }
}

/// Authoritative per-unit state. Owned by the pass executor.
pub struct StateTracker {
    entries: BTreeMap<String, UnitRecord>,
    published: Arc<ArcSwap<Vec<StatusEntry>>>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            published: Arc::new(ArcSwap::from_pointee(Vec::new())),
        }
    }

    /// A reader that observes every snapshot this tracker publishes.
    pub fn reader(&self) -> StatusReader {
        StatusReader {
            published: Arc::clone(&self.published),
        }
    }

    /// Record `unit` as discovered, replacing any previous definition.
    pub fn record_seen(&mut self, unit: Unit) {
        let name = unit.name.clone();
        self.entries.insert(
            name,
            UnitRecord {
                unit,
                state: UnitState::Seen,
                last_updated: Utc::now(),
            },
        );
        self.publish();
    }

    /// Move a tracked unit to `state`. Returns false if the name is unknown.
    pub fn record_state(&mut self, name: &str, state: UnitState) -> bool {
        let Some(record) = self.entries.get_mut(name) else {
            tracing::warn!(unit = %name, state = %state, "State update for an untracked unit ignored");
            return false;
        };

        record.state = state;
        record.last_updated = Utc::now();
        self.publish();
        true
    }

    pub fn state_of(&self, name: &str) -> Option<UnitState> {
        self.entries.get(name).map(|r| r.state)
    }

    /// Names of every tracked unit, in order.
    pub fn tracked_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Ordered copy of every record.
    pub fn snapshot(&self) -> Vec<UnitRecord> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn publish(&self) {
        let view: Vec<StatusEntry> = self.entries.values().map(StatusEntry::from).collect();
        self.published.store(Arc::new(view));
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
