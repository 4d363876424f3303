//! Runtime event subsystem.
//!
//! # Data Flow
//! ```text
//! EventSubscriber (spawned runtime process)
//!     → pump_events → bounded queue
//!     → forward_rebinds (filters to rebind triggers)
//!     → caller's trigger (binding pass)
//! ```

pub mod catalog;
pub mod stream;

use tokio::sync::mpsc;

pub use catalog::{is_rebind_trigger, EventCatalog, EventDefinition, ResourceKind};
pub use stream::{parse_event_line, pump_events, EventParseError, EventSubscriber, RuntimeEvent};

/// Drain `rx`, calling `on_rebind` for every rebind-worthy event. Returns
/// when the producer side closes.
pub async fn forward_rebinds<F>(mut rx: mpsc::Receiver<RuntimeEvent>, mut on_rebind: F)
where
    F: FnMut(&RuntimeEvent),
{
    while let Some(event) = rx.recv().await {
        if is_rebind_trigger(&event.rule) {
            tracing::info!(rule = %event.rule, "Got event to trigger rebind");
            on_rebind(&event);
        } else {
            tracing::debug!(rule = %event.rule, "Ignoring runtime event");
        }
    }
}
