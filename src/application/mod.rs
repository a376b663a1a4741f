//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod cancel;
pub mod classifier;
pub mod error;
pub mod matcher;
pub mod report;
pub mod services;

pub use cancel::CancellationFlag;
pub use classifier::{EntityClassifier, Partition};
pub use error::{ApplicationError, ApplicationResult};
pub use matcher::{
    num_cpus, GeometricComparator, MatchOptions, MatchOutcome, PairComparator, ParallelMatcher,
    TaskFailure,
};
pub use report::{ClassificationResult, ReportBuilder, Summary};
