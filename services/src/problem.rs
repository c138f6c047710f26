use crate::location::LocationKey;
use async_trait::async_trait;
use db::models::student_state;

/// Opaque handle to a problem definition held by the courseware store.
#[derive(Debug, Clone)]
pub struct ProblemDefinition {
    pub location: LocationKey,
    pub display_name: Option<String>,
}

/// Read side of the courseware store: the definition of a gradable item,
/// if one exists at the location. Checked once per batch, before any row
/// is enumerated, so "no such problem" and "problem exists, nobody has
/// submitted" stay distinguishable.
#[async_trait]
pub trait ProblemDefinitionStore: Send + Sync {
    async fn find_by_location(
        &self,
        course_id: &str,
        location: &LocationKey,
    ) -> Option<ProblemDefinition>;
}

/// Instructor-supplied options forwarded to a problem's regrade capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegradeOptions {
    pub keep_existing_if_better: bool,
}

/// Result of a problem instance's regrade call.
///
/// `success` is the grading indicator; only `"correct"` and `"incorrect"`
/// denote a completed grading pass. Anything else (including no indicator
/// at all) means the call produced no usable grade.
#[derive(Debug, Clone, Default)]
pub struct RegradeResult {
    pub success: Option<String>,
}

/// A live, stateful gradable instance reconstituted from a persisted row.
#[async_trait]
pub trait ProblemInstance: Send {
    /// Whether this problem type exposes a regrade capability at all.
    fn supports_regrade(&self) -> bool;

    /// Re-run grading against the stored submission state. The instance
    /// persists its own results through whatever channel it owns.
    async fn regrade(&mut self, options: RegradeOptions) -> RegradeResult;
}

/// Reconstitutes live instances from persisted rows.
///
/// Returns `None` when the binding cannot be established, typically because
/// the learner's course access has been revoked since the row was written.
#[async_trait]
pub trait ProblemInstanceFactory: Send + Sync {
    async fn reconstitute(
        &self,
        record: &student_state::Model,
        problem: &ProblemDefinition,
    ) -> Option<Box<dyn ProblemInstance>>;
}
