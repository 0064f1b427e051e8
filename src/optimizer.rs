//! Optimization studies and their persistence
//!
//! A study searches a box of named float parameters for the best value of a
//! benchmark objective. Candidates are drawn by a seeded uniform random
//! search, so a reloaded study continues the same sequence.

mod store;
mod study;

pub use store::{sanitize_name, StudyStore, DEFAULT_EXPERIMENT_DIR};
pub use study::{Study, Trial, MAX_TRIALS_PER_CALL};

use crate::benchmarks::BenchmarkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Experiment '{0}' not found.")]
    NotFound(String),
    #[error("Experiment '{0}' already exists.")]
    AlreadyExists(String),
    #[error("study name `{0}` has no usable characters")]
    InvalidName(String),
    #[error("unknown objective `{0}`")]
    UnknownObjective(String),
    #[error("objective `{got}` does not match study objective `{expected}`")]
    ObjectiveMismatch { expected: String, got: String },
    #[error("invalid bounds for `{parameter}`: {reason}")]
    InvalidBounds { parameter: String, reason: String },
    #[error("a study needs at least one parameter")]
    NoParameters,
    #[error("trial count must be between 1 and {max}, got {got}")]
    InvalidTrialCount { got: i64, max: u32 },
    #[error("objective `{objective}` produced a non-finite value ({value})")]
    NonFiniteObjective { objective: String, value: f64 },
    #[error("objective evaluation failed: {0}")]
    Benchmark(#[from] BenchmarkError),
    #[error("study file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("study file is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StudyResult<T> = Result<T, StudyError>;
