use crate::audit::EventSink;
use crate::problem::{ProblemDefinition, ProblemInstanceFactory, RegradeOptions};
use chrono::Utc;
use db::events::AuditEvent;
use db::models::student_state::{self, Entity as StateEntity, ATTEMPTS_KEY};
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set, TransactionTrait};

/// A corrective operation applied uniformly to every record in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOperation {
    /// Re-run grading through the problem's own regrade capability.
    Regrade { keep_existing_if_better: bool },
    /// Zero the attempt counter inside the stored state blob.
    ResetAttempts,
    /// Remove the record entirely.
    Delete,
}

impl StateOperation {
    /// Past-tense label spliced into synthesized status messages.
    pub fn default_label(&self) -> &'static str {
        match self {
            StateOperation::Regrade { .. } => "regraded",
            StateOperation::ResetAttempts => "reset",
            StateOperation::Delete => "deleted",
        }
    }
}

/// Per-record classification of one applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The record was updated, or was already in the requested state.
    Success,
    /// Recoverable per-record failure; the sweep continues.
    Skip,
    /// Systemic failure; the sweep must halt.
    Fatal(String),
}

/// Everything one mutation needs besides the record itself.
pub(crate) struct MutationContext<'a> {
    pub db: &'a DatabaseConnection,
    pub instances: &'a dyn ProblemInstanceFactory,
    pub events: &'a dyn EventSink,
    pub requested_by: &'a str,
}

/// Apply one operation to one enumerated record, fetching it fresh by id.
///
/// A record that vanished since enumeration is a Skip for every operation:
/// it was present when the set was enumerated, so it still counts as
/// attempted, but there is nothing left to mutate.
pub(crate) async fn apply_operation(
    ctx: &MutationContext<'_>,
    operation: StateOperation,
    record_id: i64,
    problem: &ProblemDefinition,
) -> Result<MutationOutcome, DbErr> {
    match operation {
        StateOperation::Regrade {
            keep_existing_if_better,
        } => regrade_record(ctx, record_id, problem, keep_existing_if_better).await,
        StateOperation::ResetAttempts => reset_attempts(ctx, record_id).await,
        StateOperation::Delete => delete_record(ctx, record_id).await,
    }
}

async fn regrade_record(
    ctx: &MutationContext<'_>,
    record_id: i64,
    problem: &ProblemDefinition,
    keep_existing_if_better: bool,
) -> Result<MutationOutcome, DbErr> {
    let Some(record) = StateEntity::find_by_id(record_id).one(ctx.db).await? else {
        return Ok(MutationOutcome::Skip);
    };

    let Some(mut instance) = ctx.instances.reconstitute(&record, problem).await else {
        // Reconstitution failing mid-sweep means permissions or courseware
        // changed under us, which no later record will escape either.
        return Ok(MutationOutcome::Fatal(format!(
            "no live instance of '{}' for learner {}; access revoked?",
            problem.location, record.user_id
        )));
    };

    if !instance.supports_regrade() {
        return Ok(MutationOutcome::Fatal(
            "specified problem does not support regrading".to_string(),
        ));
    }

    let result = instance
        .regrade(RegradeOptions {
            keep_existing_if_better,
        })
        .await;

    match result.success.as_deref() {
        Some("correct") | Some("incorrect") => {
            ctx.events.emit(AuditEvent::problem_regraded(
                ctx.requested_by,
                record.user_id,
                &record.course_id,
                &record.location,
            ));
            Ok(MutationOutcome::Success)
        }
        Some(other) => {
            log::debug!(
                "regrade of '{}' for learner {} returned indicator '{}'; skipping",
                record.location,
                record.user_id,
                other
            );
            Ok(MutationOutcome::Skip)
        }
        None => {
            log::debug!(
                "regrade of '{}' for learner {} returned no success indicator; skipping",
                record.location,
                record.user_id
            );
            Ok(MutationOutcome::Skip)
        }
    }
}

async fn reset_attempts(
    ctx: &MutationContext<'_>,
    record_id: i64,
) -> Result<MutationOutcome, DbErr> {
    // Read-modify-write of the blob must not interleave with another
    // mutator of the same record.
    let txn = ctx.db.begin().await?;

    let Some(record) = StateEntity::find_by_id(record_id).one(&txn).await? else {
        txn.commit().await?;
        return Ok(MutationOutcome::Skip);
    };

    let mut state: serde_json::Value = match serde_json::from_str(&record.state) {
        Ok(value) => value,
        Err(err) => {
            txn.commit().await?;
            log::warn!(
                "state blob of record {} is not valid JSON ({}); skipping",
                record.id,
                err
            );
            return Ok(MutationOutcome::Skip);
        }
    };

    let old_attempts = state
        .as_object()
        .and_then(|object| object.get(ATTEMPTS_KEY))
        .and_then(serde_json::Value::as_i64);

    match old_attempts {
        Some(old) if old > 0 => {
            // counter came from an object, so indexing cannot miss
            state[ATTEMPTS_KEY] = serde_json::Value::from(0);

            let user_id = record.user_id;
            let course_id = record.course_id.clone();
            let location = record.location.clone();

            let mut active: student_state::ActiveModel = record.into();
            active.state = Set(state.to_string());
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
            txn.commit().await?;

            ctx.events.emit(AuditEvent::attempts_reset(
                ctx.requested_by,
                user_id,
                &course_id,
                &location,
                old,
            ));
            Ok(MutationOutcome::Success)
        }
        _ => {
            // nothing to zero; a no-op reset is still a successful reset
            txn.commit().await?;
            Ok(MutationOutcome::Success)
        }
    }
}

async fn delete_record(ctx: &MutationContext<'_>, record_id: i64) -> Result<MutationOutcome, DbErr> {
    let Some(record) = StateEntity::find_by_id(record_id).one(ctx.db).await? else {
        return Ok(MutationOutcome::Skip);
    };

    let result = StateEntity::delete_by_id(record.id).exec(ctx.db).await?;
    if result.rows_affected == 0 {
        // lost the race to another mutator
        return Ok(MutationOutcome::Skip);
    }

    ctx.events.emit(AuditEvent::state_deleted(
        ctx.requested_by,
        record.user_id,
        &record.course_id,
        &record.location,
    ));
    Ok(MutationOutcome::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::resolve_location;
    use crate::problem::{ProblemInstance, RegradeResult};
    use async_trait::async_trait;
    use chrono::Utc;
    use db::models::user;
    use db::test_utils::setup_test_db;
    use std::sync::Mutex;

    const COURSE: &str = "org/name/run";

    /// Factory whose instances always answer with one fixed behavior.
    enum Grading {
        Deny,
        Unsupported,
        Indicator(Option<&'static str>),
    }

    struct StubFactory {
        grading: Grading,
    }

    struct StubInstance {
        supported: bool,
        indicator: Option<&'static str>,
    }

    #[async_trait]
    impl ProblemInstance for StubInstance {
        fn supports_regrade(&self) -> bool {
            self.supported
        }

        async fn regrade(&mut self, _options: RegradeOptions) -> RegradeResult {
            RegradeResult {
                success: self.indicator.map(String::from),
            }
        }
    }

    #[async_trait]
    impl ProblemInstanceFactory for StubFactory {
        async fn reconstitute(
            &self,
            _record: &student_state::Model,
            _problem: &ProblemDefinition,
        ) -> Option<Box<dyn ProblemInstance>> {
            match self.grading {
                Grading::Deny => None,
                Grading::Unsupported => Some(Box::new(StubInstance {
                    supported: false,
                    indicator: None,
                })),
                Grading::Indicator(indicator) => Some(Box::new(StubInstance {
                    supported: true,
                    indicator,
                })),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: AuditEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RecordingSink {
        fn event_types(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.event_type())
                .collect()
        }
    }

    async fn insert_user(db: &DatabaseConnection, username: &str) -> user::Model {
        use sea_orm::Set;
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert user")
    }

    async fn insert_state(
        db: &DatabaseConnection,
        user_id: i64,
        problem: &ProblemDefinition,
        state: &str,
    ) -> student_state::Model {
        use sea_orm::Set;
        student_state::ActiveModel {
            course_id: Set(COURSE.to_string()),
            location: Set(problem.location.as_str().to_string()),
            user_id: Set(user_id),
            state: Set(state.to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert state row")
    }

    fn hw1() -> ProblemDefinition {
        ProblemDefinition {
            location: resolve_location(COURSE, "hw1").unwrap(),
            display_name: Some("Homework 1".to_string()),
        }
    }

    struct Fixture {
        db: DatabaseConnection,
        problem: ProblemDefinition,
        record: student_state::Model,
        sink: RecordingSink,
    }

    async fn fixture(state: &str) -> Fixture {
        let db = setup_test_db().await;
        let problem = hw1();
        let user = insert_user(&db, "alice").await;
        let record = insert_state(&db, user.id, &problem, state).await;
        Fixture {
            db,
            problem,
            record,
            sink: RecordingSink::default(),
        }
    }

    fn ctx<'a>(fx: &'a Fixture, factory: &'a StubFactory) -> MutationContext<'a> {
        MutationContext {
            db: &fx.db,
            instances: factory,
            events: &fx.sink,
            requested_by: "staff",
        }
    }

    #[tokio::test]
    async fn reset_zeroes_a_positive_counter() {
        let fx = fixture(r#"{"attempts": 4, "score": 0.5}"#).await;
        let factory = StubFactory { grading: Grading::Deny };

        let outcome = apply_operation(&ctx(&fx, &factory), StateOperation::ResetAttempts, fx.record.id, &fx.problem)
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Success);

        let reloaded = StateEntity::find_by_id(fx.record.id)
            .one(&fx.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.attempts(), Some(0));
        // the rest of the blob is untouched
        let value: serde_json::Value = serde_json::from_str(&reloaded.state).unwrap();
        assert_eq!(value["score"], 0.5);
        assert_eq!(fx.sink.event_types(), vec!["attempts_reset"]);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let fx = fixture(r#"{"attempts": 2}"#).await;
        let factory = StubFactory { grading: Grading::Deny };

        for _ in 0..2 {
            let outcome = apply_operation(&ctx(&fx, &factory), StateOperation::ResetAttempts, fx.record.id, &fx.problem)
                .await
                .unwrap();
            assert_eq!(outcome, MutationOutcome::Success);

            let reloaded = StateEntity::find_by_id(fx.record.id)
                .one(&fx.db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(reloaded.attempts(), Some(0));
        }

        // only the first pass changed anything, so only one event
        assert_eq!(fx.sink.event_types(), vec!["attempts_reset"]);
    }

    #[tokio::test]
    async fn reset_without_a_counter_is_a_silent_success() {
        let fx = fixture(r#"{"seed": 11}"#).await;
        let factory = StubFactory { grading: Grading::Deny };

        let outcome = apply_operation(&ctx(&fx, &factory), StateOperation::ResetAttempts, fx.record.id, &fx.problem)
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Success);

        let reloaded = StateEntity::find_by_id(fx.record.id)
            .one(&fx.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.state, r#"{"seed": 11}"#);
        assert!(fx.sink.event_types().is_empty());
    }

    #[tokio::test]
    async fn reset_skips_a_corrupt_blob() {
        let fx = fixture("not json at all").await;
        let factory = StubFactory { grading: Grading::Deny };

        let outcome = apply_operation(&ctx(&fx, &factory), StateOperation::ResetAttempts, fx.record.id, &fx.problem)
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Skip);
        assert!(fx.sink.event_types().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_row_and_skips_thereafter() {
        let fx = fixture(r#"{"attempts": 1}"#).await;
        let factory = StubFactory { grading: Grading::Deny };

        let outcome = apply_operation(&ctx(&fx, &factory), StateOperation::Delete, fx.record.id, &fx.problem)
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Success);
        assert!(StateEntity::find_by_id(fx.record.id)
            .one(&fx.db)
            .await
            .unwrap()
            .is_none());

        let outcome = apply_operation(&ctx(&fx, &factory), StateOperation::Delete, fx.record.id, &fx.problem)
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Skip);

        assert_eq!(fx.sink.event_types(), vec!["state_deleted"]);
    }

    #[tokio::test]
    async fn regrade_succeeds_on_a_recognized_indicator() {
        let fx = fixture(r#"{"attempts": 1}"#).await;
        for indicator in ["correct", "incorrect"] {
            let factory = StubFactory {
                grading: Grading::Indicator(Some(indicator)),
            };
            let outcome = apply_operation(
                &ctx(&fx, &factory),
                StateOperation::Regrade {
                    keep_existing_if_better: true,
                },
                fx.record.id,
                &fx.problem,
            )
            .await
            .unwrap();
            assert_eq!(outcome, MutationOutcome::Success);
        }
        assert_eq!(fx.sink.event_types(), vec!["problem_regraded", "problem_regraded"]);
    }

    #[tokio::test]
    async fn regrade_skips_unusable_indicators() {
        let fx = fixture(r#"{"attempts": 1}"#).await;
        for indicator in [Some("unreliable"), None] {
            let factory = StubFactory {
                grading: Grading::Indicator(indicator),
            };
            let outcome = apply_operation(
                &ctx(&fx, &factory),
                StateOperation::Regrade {
                    keep_existing_if_better: false,
                },
                fx.record.id,
                &fx.problem,
            )
            .await
            .unwrap();
            assert_eq!(outcome, MutationOutcome::Skip);
        }
        assert!(fx.sink.event_types().is_empty());
    }

    #[tokio::test]
    async fn regrade_is_fatal_when_reconstitution_fails() {
        let fx = fixture(r#"{"attempts": 1}"#).await;
        let factory = StubFactory { grading: Grading::Deny };

        let outcome = apply_operation(
            &ctx(&fx, &factory),
            StateOperation::Regrade {
                keep_existing_if_better: false,
            },
            fx.record.id,
            &fx.problem,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, MutationOutcome::Fatal(ref reason) if reason.contains("access revoked")));
    }

    #[tokio::test]
    async fn regrade_is_fatal_without_the_capability() {
        let fx = fixture(r#"{"attempts": 1}"#).await;
        let factory = StubFactory {
            grading: Grading::Unsupported,
        };

        let outcome = apply_operation(
            &ctx(&fx, &factory),
            StateOperation::Regrade {
                keep_existing_if_better: false,
            },
            fx.record.id,
            &fx.problem,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, MutationOutcome::Fatal(ref reason) if reason.contains("support regrading")));
    }

    #[test]
    fn default_labels_read_in_past_tense() {
        assert_eq!(
            StateOperation::Regrade {
                keep_existing_if_better: false
            }
            .default_label(),
            "regraded"
        );
        assert_eq!(StateOperation::ResetAttempts.default_label(), "reset");
        assert_eq!(StateOperation::Delete.default_label(), "deleted");
    }
}
