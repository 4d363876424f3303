//! Runtime event stream reader.
//!
//! # Data Flow
//! ```text
//! docker events --format '{{json .}}'
//!     → one JSON object per line
//!     → parse_event_line (status + Type required)
//!     → EventCatalog::classify
//!     → bounded mpsc (send awaits when full)
//! ```
//!
//! Lines that fail to parse or classify are logged and dropped; they never
//! reach the consumer. A stream that ends (runtime restart) is started again
//! after [`RESUBSCRIBE_DELAY`].

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::catalog::{EventCatalog, EventDefinition};
use crate::observability::metrics;

/// Why a line from the event stream was dropped.
#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("event is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event is not a JSON object")]
    NotObject,

    #[error("event has no `{0}` field")]
    MissingField(&'static str),

    #[error("event field `{0}` is not a string")]
    NotString(&'static str),

    #[error("no rule matches {kind} event with status {status:?}")]
    Unmatched { kind: String, status: String },
}

/// A classified runtime event.
#[derive(Debug, Clone)]
pub struct RuntimeEvent {
    pub rule: EventDefinition,
    /// The full record, passed through untouched.
    pub meta: Map<String, Value>,
}

fn string_field<'a>(record: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, EventParseError> {
    record
        .get(field)
        .ok_or(EventParseError::MissingField(field))?
        .as_str()
        .ok_or(EventParseError::NotString(field))
}

/// Parse and classify one line of the event stream.
pub fn parse_event_line(catalog: &EventCatalog, line: &str) -> Result<RuntimeEvent, EventParseError> {
    let Value::Object(meta) = serde_json::from_str::<Value>(line)? else {
        return Err(EventParseError::NotObject);
    };

    let status = string_field(&meta, "status")?;
    let kind = string_field(&meta, "Type")?;

    let rule = catalog
        .classify(kind, status)
        .ok_or_else(|| EventParseError::Unmatched {
            kind: kind.to_string(),
            status: status.to_string(),
        })?;

    Ok(RuntimeEvent { rule, meta })
}

/// Read `reader` to the end, forwarding every classified event to `tx`.
///
/// Returns the number of events forwarded. Stops early if the receiver is
/// dropped.
pub async fn pump_events<R>(reader: R, catalog: &EventCatalog, tx: &mpsc::Sender<RuntimeEvent>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let event = match parse_event_line(catalog, &line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "Dropping runtime event");
                continue;
            }
        };

        tracing::debug!(rule = %event.rule, "Runtime event");
        metrics::record_event(&event.rule.key());

        if tx.send(event).await.is_err() {
            tracing::debug!("Event consumer gone, stopping reader");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}

/// Pause before restarting an event stream that ended.
pub const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Spawns the runtime's event stream and feeds it through [`pump_events`].
/// The stream is restarted whenever it ends, until the receiver goes away
/// or the task is aborted.
#[derive(Debug, Clone)]
pub struct EventSubscriber {
    program: String,
    catalog: Arc<EventCatalog>,
    retry_delay: Duration,
}

impl EventSubscriber {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            catalog: Arc::new(EventCatalog::builtin()),
            retry_delay: RESUBSCRIBE_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn spawn_stream(&self) -> std::io::Result<(Child, ChildStdout)> {
        let mut child = Command::new(&self.program)
            .args(["events", "--format", "{{json .}}"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("event stream has no stdout"))?;
        Ok((child, stdout))
    }

    /// Start `<program> events` and forward its events to `tx` from a
    /// background task. Failing to start the first process is returned;
    /// later restarts are retried with a delay.
    pub fn subscribe(&self, tx: mpsc::Sender<RuntimeEvent>) -> std::io::Result<JoinHandle<()>> {
        let first = self.spawn_stream()?;
        tracing::info!(program = %self.program, "Subscribed to runtime events");

        let this = self.clone();
        Ok(tokio::spawn(async move {
            let mut stream = Some(first);
            loop {
                if let Some((mut child, stdout)) = stream.take() {
                    match pump_events(BufReader::new(stdout), &this.catalog, &tx).await {
                        Ok(count) => tracing::warn!(program = %this.program, forwarded = count, "Runtime event stream ended"),
                        Err(e) => tracing::error!(program = %this.program, error = %e, "Runtime event stream failed"),
                    }
                    let _ = child.kill().await;
                }

                if tx.is_closed() {
                    break;
                }
                tokio::time::sleep(this.retry_delay).await;

                match this.spawn_stream() {
                    Ok(next) => {
                        tracing::info!(program = %this.program, "Resubscribed to runtime events");
                        stream = Some(next);
                    }
                    Err(e) => tracing::error!(program = %this.program, error = %e, "Failed to restart runtime event stream"),
                }
            }
        }))
    }
}
