//! Failure records and run reports

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{IterationIndex, WorkerId};
use crate::error::{ErrorKind, ExecutionError};

/// Label used when a worker crashed outside any workload call
pub const NO_WORKLOAD: &str = "<none>";

/// One observed failure. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub workload_label: String,
    pub worker_id: WorkerId,
    pub iteration_index: IterationIndex,
    pub error_kind: ErrorKind,
    pub message: String,
    /// Actual-vs-expected description (mismatches only)
    pub diff: Option<String>,
}

impl FailureRecord {
    pub fn mismatch(
        label: &str,
        worker_id: WorkerId,
        iteration_index: IterationIndex,
        diff: String,
    ) -> Self {
        Self {
            workload_label: label.to_string(),
            worker_id,
            iteration_index,
            error_kind: ErrorKind::Mismatch,
            message: format!("result mismatch for '{}'", label),
            diff: Some(diff),
        }
    }

    pub fn execution(
        label: &str,
        worker_id: WorkerId,
        iteration_index: IterationIndex,
        err: &ExecutionError,
    ) -> Self {
        Self {
            workload_label: label.to_string(),
            worker_id,
            iteration_index,
            error_kind: ErrorKind::Execution,
            message: format!("[{}] {}", err.code(), err),
            diff: None,
        }
    }

    pub fn crash(
        label: &str,
        worker_id: WorkerId,
        iteration_index: IterationIndex,
        panic_message: String,
    ) -> Self {
        Self {
            workload_label: label.to_string(),
            worker_id,
            iteration_index,
            error_kind: ErrorKind::WorkerCrash,
            message: panic_message,
            diff: None,
        }
    }
}

/// Immutable result of a concurrent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub worker_count: usize,
    pub iterations_per_worker: usize,
    pub catalog_size: usize,
    pub total_executions: u64,
    /// Executions performed by each worker, indexed by worker id
    pub per_worker_executions: Vec<u64>,
    pub failures: Vec<FailureRecord>,
    pub elapsed: Duration,
}

impl RunReport {
    /// A run is successful iff no failure was recorded
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// `worker_count * iterations_per_worker * catalog_size`
    pub fn expected_executions(&self) -> u64 {
        (self.worker_count * self.iterations_per_worker * self.catalog_size) as u64
    }

    pub fn failure_count(&self, kind: ErrorKind) -> usize {
        self.failures.iter().filter(|f| f.error_kind == kind).count()
    }

    pub fn failures_for<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a FailureRecord> {
        self.failures.iter().filter(move |f| f.workload_label == label)
    }

    /// Records of one worker, in the order the worker produced them
    pub fn failures_of_worker(&self, worker_id: WorkerId) -> Vec<&FailureRecord> {
        self.failures
            .iter()
            .filter(|f| f.worker_id == worker_id)
            .collect()
    }

    pub fn executions_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.total_executions as f64 / secs
    }

    /// One-line summary for logs and CLI output
    pub fn triage_line(&self) -> String {
        if self.passed() {
            format!(
                "PASS: {} executions ({} workers x {} iterations x {} workloads) in {:.2?}",
                self.total_executions,
                self.worker_count,
                self.iterations_per_worker,
                self.catalog_size,
                self.elapsed,
            )
        } else {
            format!(
                "FAIL: {} executions, {} failures ({} mismatch, {} execution, {} crash) in {:.2?}",
                self.total_executions,
                self.failures.len(),
                self.failure_count(ErrorKind::Mismatch),
                self.failure_count(ErrorKind::Execution),
                self.failure_count(ErrorKind::WorkerCrash),
                self.elapsed,
            )
        }
    }

    /// Write the report as `<dir>/run_<run_id>.json`
    pub fn write_json(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("run_{}.json", self.run_id));
        fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        Ok(path)
    }
}
