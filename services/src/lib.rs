pub mod audit;
pub mod batch;
pub mod error;
pub mod learner;
pub mod location;
pub mod mutation;
pub mod problem;
pub mod records;

pub use audit::{EventSink, LogEventSink, NullEventSink};
pub use batch::{BatchOutcome, BatchReport, BatchRequest, BatchRunner, OutcomeTier};
pub use error::BatchError;
pub use location::{resolve_location, LocationKey};
pub use mutation::{MutationOutcome, StateOperation};
pub use problem::{
    ProblemDefinition, ProblemDefinitionStore, ProblemInstance, ProblemInstanceFactory,
    RegradeOptions, RegradeResult,
};
