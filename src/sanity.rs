//! Sanity Runner
//!
//! Single-threaded pre-flight pass: every workload once, in catalog order.
//! It never stops at the first failure, so every broken workload shows up
//! in the report. A concurrent run on top of a failing baseline would only
//! add noise, so callers must stop when [`SanityReport::passed`] is false.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::compare::{Comparison, compare};
use crate::executor::Executor;
use crate::task_group::panic_message;
use crate::workload::WorkloadCatalog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SanityOutcome {
    Passed,
    Mismatch { diff: String },
    ExecutionFailed { message: String },
    /// The executor panicked on this workload
    Crashed { message: String },
}

/// Result for one workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanityCheck {
    pub label: String,
    pub outcome: SanityOutcome,
}

impl SanityCheck {
    pub fn passed(&self) -> bool {
        self.outcome == SanityOutcome::Passed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SanityReport {
    pub checks: Vec<SanityCheck>,
    pub elapsed: Duration,
}

impl SanityReport {
    /// True iff every workload matched
    pub fn passed(&self) -> bool {
        self.checks.iter().all(SanityCheck::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SanityCheck> {
        self.checks.iter().filter(|c| !c.passed())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn summary(&self) -> String {
        format!(
            "sanity: {}/{} workloads passed in {:.2?}",
            self.checks.len() - self.failure_count(),
            self.checks.len(),
            self.elapsed
        )
    }
}

pub struct SanityRunner;

impl SanityRunner {
    pub fn run<E: Executor + ?Sized>(catalog: &WorkloadCatalog, executor: &E) -> SanityReport {
        let start = Instant::now();
        let mut checks = Vec::with_capacity(catalog.size());

        for workload in catalog.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| executor.execute(&workload.query)));
            let outcome = match result {
                Ok(Ok(actual)) => match compare(&workload.expected, &actual) {
                    Comparison::Match => SanityOutcome::Passed,
                    Comparison::Mismatch { diff } => {
                        warn!(label = %workload.label, %diff, "Sanity mismatch");
                        SanityOutcome::Mismatch { diff }
                    }
                },
                Ok(Err(e)) => {
                    warn!(label = %workload.label, error = %e, "Sanity execution failed");
                    SanityOutcome::ExecutionFailed {
                        message: e.to_string(),
                    }
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(label = %workload.label, panic = %message, "Executor panicked during sanity pass");
                    SanityOutcome::Crashed { message }
                }
            };
            checks.push(SanityCheck {
                label: workload.label.clone(),
                outcome,
            });
        }

        let report = SanityReport {
            checks,
            elapsed: start.elapsed(),
        };
        info!(
            passed = report.passed(),
            failures = report.failure_count(),
            "{}",
            report.summary()
        );
        report
    }
}
