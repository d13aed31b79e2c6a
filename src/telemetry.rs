//! Fire-and-forget telemetry for assignment outcomes.

use color_eyre::Result;
use serde::Serialize;
use tracing::info;

/// Emitted once per successful fetch that carried assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VariantAssignmentEvent {
  pub assignment_context: String,
  #[serde(rename = "ClientID")]
  pub client_id: String,
}

/// Destination for telemetry events. Failures are logged by the caller and
/// otherwise ignored.
pub trait EventSink: Send + Sync {
  fn write_event(&self, event: &VariantAssignmentEvent) -> Result<()>;
}

/// Writes events into the `tracing` pipeline as JSON payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
  fn write_event(&self, event: &VariantAssignmentEvent) -> Result<()> {
    let payload = serde_json::to_string(event)?;
    info!(target: "expgate::telemetry", event = "VariantAssignment", %payload);
    Ok(())
  }
}

/// Sink that discards everything. Selected by `telemetry: false` in the config.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
  fn write_event(&self, _event: &VariantAssignmentEvent) -> Result<()> {
    Ok(()) // Discard
  }
}
