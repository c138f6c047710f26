use crate::audit::EventSink;
use crate::error::BatchError;
use crate::learner::resolve_learner;
use crate::location::{resolve_location, LocationKey};
use crate::mutation::{apply_operation, MutationContext, MutationOutcome, StateOperation};
use crate::problem::{ProblemDefinitionStore, ProblemInstanceFactory};
use crate::records::RecordSet;
use sea_orm::DatabaseConnection;

/// Aggregate classification of one completed sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeTier {
    /// Nothing matched the filter keys.
    NoCandidates,
    /// Records matched, none could be updated.
    AllFailed,
    /// Every matched record was updated.
    AllSucceeded,
    /// Some matched records were updated, some not.
    Partial,
}

/// Counts and classification for one completed sweep. Derived, never
/// persisted; `attempted >= succeeded` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub attempted: u64,
    pub succeeded: u64,
    pub tier: OutcomeTier,
}

impl BatchOutcome {
    fn new(attempted: u64, succeeded: u64) -> Self {
        Self {
            attempted,
            succeeded,
            tier: classify(attempted, succeeded),
        }
    }
}

fn classify(attempted: u64, succeeded: u64) -> OutcomeTier {
    if attempted == 0 {
        OutcomeTier::NoCandidates
    } else if succeeded == 0 {
        OutcomeTier::AllFailed
    } else if succeeded == attempted {
        OutcomeTier::AllSucceeded
    } else {
        OutcomeTier::Partial
    }
}

/// One batch invocation as handed over by the presentation layer.
#[derive(Debug, Clone)]
pub struct BatchRequest<'a> {
    pub course_id: &'a str,
    pub problem_ref: &'a str,
    /// Username or email of one learner; `None` addresses every learner
    /// with a record for the problem.
    pub learner_ref: Option<&'a str>,
    pub operation: StateOperation,
    /// Past-tense label spliced into the status message; see
    /// [`StateOperation::default_label`].
    pub action_label: &'a str,
}

/// Completed sweep: the staff-facing status line plus the raw counts.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub message: String,
    pub outcome: BatchOutcome,
}

/// Drives one corrective operation over every matching state record.
pub struct BatchRunner<'a> {
    db: &'a DatabaseConnection,
    problems: &'a dyn ProblemDefinitionStore,
    instances: &'a dyn ProblemInstanceFactory,
    events: &'a dyn EventSink,
    requested_by: &'a str,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        problems: &'a dyn ProblemDefinitionStore,
        instances: &'a dyn ProblemInstanceFactory,
        events: &'a dyn EventSink,
        requested_by: &'a str,
    ) -> Self {
        Self {
            db,
            problems,
            instances,
            events,
            requested_by,
        }
    }

    /// Resolve the filter keys, sweep the record set in learner order, and
    /// synthesize one status message.
    ///
    /// All resolution failures surface before any record is touched. A
    /// Fatal mutation aborts the sweep mid-flight; mutations already
    /// applied are kept. The batch is deliberately non-transactional,
    /// trading whole-batch atomicity for forward progress, and the fatal
    /// error carries the partial counts so operators can see how far the
    /// sweep got.
    pub async fn run(&self, request: BatchRequest<'_>) -> Result<BatchReport, BatchError> {
        let location = resolve_location(request.course_id, request.problem_ref)?;

        let learner = match request.learner_ref {
            Some(identifier) => Some(resolve_learner(self.db, identifier).await?),
            None => None,
        };

        let problem = self
            .problems
            .find_by_location(request.course_id, &location)
            .await
            .ok_or_else(|| BatchError::ProblemNotFound(location.clone()))?;

        let mut records = RecordSet::new(request.course_id, location.clone());
        if let Some(learner) = &learner {
            records = records.for_learner(learner.id);
        }

        let ctx = MutationContext {
            db: self.db,
            instances: self.instances,
            events: self.events,
            requested_by: self.requested_by,
        };

        let mut attempted: u64 = 0;
        let mut succeeded: u64 = 0;
        let mut cursor: Option<i64> = None;
        loop {
            let page = records.page_after(self.db, cursor).await?;
            let Some(last) = page.last() else { break };
            cursor = Some(last.user_id);

            for record in &page {
                attempted += 1;
                match apply_operation(&ctx, request.operation, record.id, &problem).await? {
                    MutationOutcome::Success => succeeded += 1,
                    MutationOutcome::Skip => {
                        log::debug!(
                            "record of learner {} on '{}' could not be {}; continuing",
                            record.user_id,
                            location,
                            request.action_label
                        );
                    }
                    MutationOutcome::Fatal(reason) => {
                        return Err(BatchError::Fatal {
                            reason,
                            attempted,
                            succeeded,
                        });
                    }
                }
            }
        }

        let outcome = BatchOutcome::new(attempted, succeeded);
        let message = synthesize_message(
            &outcome,
            request.action_label,
            &location,
            learner.as_ref().map(|l| l.username.as_str()),
        );
        Ok(BatchReport { message, outcome })
    }
}

/// One status line covering the whole sweep, phrased for the target mode.
///
/// Single-learner mode never reports counts; the set has one record at
/// most, so partial success cannot arise there.
fn synthesize_message(
    outcome: &BatchOutcome,
    action: &str,
    location: &LocationKey,
    learner: Option<&str>,
) -> String {
    match learner {
        Some(username) => match outcome.tier {
            OutcomeTier::NoCandidates => format!(
                "Unable to find submission to be {action} for learner '{username}' and problem '{location}'."
            ),
            OutcomeTier::AllFailed => format!(
                "Problem failed to be {action} for learner '{username}' and problem '{location}'!"
            ),
            _ => format!(
                "Problem successfully {action} for learner '{username}' and problem '{location}'"
            ),
        },
        None => match outcome.tier {
            OutcomeTier::NoCandidates => format!(
                "Unable to find any learners with submissions to be {action} for problem '{location}'."
            ),
            OutcomeTier::AllFailed => format!(
                "Problem failed to be {action} for any of {attempted} learners for problem '{location}'!",
                attempted = outcome.attempted
            ),
            OutcomeTier::AllSucceeded => format!(
                "Problem successfully {action} for {attempted} learners for problem '{location}'!",
                attempted = outcome.attempted
            ),
            OutcomeTier::Partial => format!(
                "Problem {action} for {succeeded} of {attempted} learners for problem '{location}'!",
                succeeded = outcome.succeeded,
                attempted = outcome.attempted
            ),
        },
    }
}
