use db::events::AuditEvent;

/// Fire-and-forget audit trail of who did what to whom.
///
/// Emission is not part of correctness; a sink must never fail the batch.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Writes each event to the application log under the `audit` target.
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: AuditEvent) {
        match event.to_json() {
            Ok(payload) => log::info!(target: "audit", "{} {}", event.event_type(), payload),
            Err(err) => log::warn!(
                target: "audit",
                "unserializable {} event: {}",
                event.event_type(),
                err
            ),
        }
    }
}

/// Discards every event, for callers that keep no audit trail.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: AuditEvent) {}
}
