/// Audit events for corrective operations on learner state.
///
/// Every destructive or grade-affecting action taken by course staff is
/// described by one of these events and handed to the caller's event sink.
/// Events record who did what to whom; they are not part of correctness.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All audit events emitted by the batch-mutation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AuditEvent {
    /// A learner's attempt counter was zeroed.
    AttemptsReset {
        requested_by: String,
        user_id: i64,
        course_id: String,
        location: String,
        old_attempts: i64,
        occurred_at: DateTime<Utc>,
    },

    /// A learner's submission was re-run through grading.
    ProblemRegraded {
        requested_by: String,
        user_id: i64,
        course_id: String,
        location: String,
        occurred_at: DateTime<Utc>,
    },

    /// A learner's state row was removed.
    StateDeleted {
        requested_by: String,
        user_id: i64,
        course_id: String,
        location: String,
        occurred_at: DateTime<Utc>,
    },
}

impl AuditEvent {
    /// Get the learner ID this event concerns
    pub fn user_id(&self) -> i64 {
        match self {
            AuditEvent::AttemptsReset { user_id, .. } => *user_id,
            AuditEvent::ProblemRegraded { user_id, .. } => *user_id,
            AuditEvent::StateDeleted { user_id, .. } => *user_id,
        }
    }

    /// Get the event type string for sink-side filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::AttemptsReset { .. } => "attempts_reset",
            AuditEvent::ProblemRegraded { .. } => "problem_regraded",
            AuditEvent::StateDeleted { .. } => "state_deleted",
        }
    }

    /// Convert event to a JSON value for structured sinks
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Event builder helpers for common event creation patterns
impl AuditEvent {
    pub fn attempts_reset(
        requested_by: &str,
        user_id: i64,
        course_id: &str,
        location: &str,
        old_attempts: i64,
    ) -> Self {
        AuditEvent::AttemptsReset {
            requested_by: requested_by.to_string(),
            user_id,
            course_id: course_id.to_string(),
            location: location.to_string(),
            old_attempts,
            occurred_at: Utc::now(),
        }
    }

    pub fn problem_regraded(
        requested_by: &str,
        user_id: i64,
        course_id: &str,
        location: &str,
    ) -> Self {
        AuditEvent::ProblemRegraded {
            requested_by: requested_by.to_string(),
            user_id,
            course_id: course_id.to_string(),
            location: location.to_string(),
            occurred_at: Utc::now(),
        }
    }

    pub fn state_deleted(
        requested_by: &str,
        user_id: i64,
        course_id: &str,
        location: &str,
    ) -> Self {
        AuditEvent::StateDeleted {
            requested_by: requested_by.to_string(),
            user_id,
            course_id: course_id.to_string(),
            location: location.to_string(),
            occurred_at: Utc::now(),
        }
    }
}
