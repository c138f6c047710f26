use crate::location::LocationKey;
use sea_orm::DbErr;
use thiserror::Error;

/// Terminal failures of a batch invocation.
///
/// Every variant renders as a complete sentence fit for course staff;
/// callers branch on the variant, never on the text. Resolution failures
/// are raised before any record is touched. `Fatal` is the one mid-batch
/// failure: it aborts the sweep but keeps mutations already applied.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("malformed course id '{0}': expected exactly three '/'-separated parts")]
    MalformedCourseIdentifier(String),

    #[error("couldn't find a problem at '{0}'")]
    ProblemNotFound(LocationKey),

    #[error("couldn't find a learner with username or email '{0}'")]
    LearnerNotFound(String),

    #[error("'{0}' matches more than one learner account")]
    AmbiguousLearner(String),

    #[error("{reason}")]
    Fatal {
        reason: String,
        attempted: u64,
        succeeded: u64,
    },

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}
