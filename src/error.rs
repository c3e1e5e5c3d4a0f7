//! Harness Error Types
//!
//! Fatal errors (`LoadError`, `SchedulingError`, `ConfigError`) abort before a
//! run produces results. Per-iteration problems never abort: they are captured
//! as [`crate::report::FailureRecord`]s tagged with an [`ErrorKind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Workload / suite loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Duplicate workload label: {0}")]
    DuplicateLabel(String),

    #[error("Malformed workload in suite '{suite}': {reason}")]
    Malformed { suite: String, reason: String },

    #[error("Unknown suite: {0}")]
    UnknownSuite(String),

    #[error("Suite registered twice: {0}")]
    DuplicateSuite(String),

    #[error("Test case '{case}' appears twice in suite '{suite}'")]
    DuplicateCase { suite: String, case: String },

    #[error("Failed to read suite file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse suite file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// The task group cannot accept the configured concurrency
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("worker_count must be at least 1")]
    NoWorkers,

    #[error("iterations_per_worker must be at least 1")]
    NoIterations,

    #[error("Task group saturated: capacity {capacity}, requested {requested}")]
    Saturated { capacity: usize, requested: usize },

    #[error("Failed to spawn {task}: {reason}")]
    SpawnFailed { task: String, reason: String },
}

/// A single Executor call failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Call timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Engine returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Engine error: {0}")]
    Engine(String),
}

impl ExecutionError {
    /// Stable code for logs and reports
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionError::Transport(_) => "TRANSPORT",
            ExecutionError::Timeout { .. } => "TIMEOUT",
            ExecutionError::Status { .. } => "STATUS",
            ExecutionError::Engine(_) => "ENGINE",
        }
    }
}

/// Configuration file errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level error for anything that prevents a run from starting
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarnessError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Classification of a non-fatal, per-iteration failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Actual result differs from the expected one
    Mismatch,
    /// The Executor reported a fault
    Execution,
    /// The worker panicked (inside a call or outside of one)
    WorkerCrash,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Mismatch => "MISMATCH_ERROR",
            ErrorKind::Execution => "EXECUTION_ERROR",
            ErrorKind::WorkerCrash => "WORKER_CRASH",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
