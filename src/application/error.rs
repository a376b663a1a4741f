//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::application::matcher::MatchOutcome;
use crate::domain::DomainError;

/// Application errors wrap domain errors and add orchestration-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Cooperative cancellation observed; `partial` holds what finished before it.
    #[error("matching cancelled after {completed} of {total} entities")]
    Cancelled {
        completed: usize,
        total: usize,
        partial: Box<MatchOutcome>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
