//! Concurrent Runner
//!
//! Generates contention against the system under test and observes the
//! correctness of every result it returns.
//!
//! # Thread Architecture
//!
//! ```text
//!                        ┌─────────────────────────────┐
//!                        │ WorkloadCatalog (read-only) │
//!                        └──────────────┬──────────────┘
//!            ┌──────────────────────────┼──────────────────────────┐
//!            ▼                          ▼                          ▼
//!   ┌─────────────────┐        ┌─────────────────┐        ┌─────────────────┐
//!   │ olap-worker-0   │        │ olap-worker-1   │  ...   │ olap-worker-N-1 │
//!   │ I passes, own   │        │ I passes, own   │        │ I passes, own   │
//!   │ permutation     │        │ permutation     │        │ permutation     │
//!   └───┬─────────┬───┘        └───┬─────────┬───┘        └───┬─────────┬───┘
//!       │ execute │ mismatch       │         │                │         │
//!       ▼         ▼                ▼         ▼                ▼         ▼
//!   Executor   FailureAggregator (lock-free append, drained after join_all)
//! ```
//!
//! A failing call never ends a worker's run: every mismatch must be seen.
//! The runner only generates contention; whether identical concurrent
//! requests are coalesced is a property of the system under test.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::aggregator::FailureAggregator;
use crate::compare::{Comparison, compare};
use crate::config::RunConfig;
use crate::core_types::WorkerId;
use crate::error::{HarnessError, SchedulingError};
use crate::executor::Executor;
use crate::logging::WORKER_TARGET;
use crate::order::OrderPolicy;
use crate::report::{FailureRecord, NO_WORKLOAD, RunReport};
use crate::task_group::{TaskGroup, TaskOutcome, panic_message};
use crate::workload::WorkloadCatalog;

/// Thread name prefix of stress workers (`olap-worker-<id>`)
pub const WORKER_THREAD_PREFIX: &str = "olap-worker";

// ============================================================
// RUN STATISTICS
// ============================================================

/// Live counters shared by all workers of a run
#[derive(Debug, Default)]
pub struct RunStats {
    pub executions: AtomicU64,
    pub passes_completed: AtomicU64,
    pub mismatches: AtomicU64,
    pub execution_errors: AtomicU64,
    pub crashes: AtomicU64,
}

impl RunStats {
    pub fn incr_execution(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_pass(&self) {
        self.passes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_mismatch(&self) {
        self.mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_execution_error(&self) {
        self.execution_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_crash(&self) {
        self.crashes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            mismatches: self.mismatches.load(Ordering::Relaxed),
            execution_errors: self.execution_errors.load(Ordering::Relaxed),
            crashes: self.crashes.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of stats (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatsSnapshot {
    pub executions: u64,
    pub passes_completed: u64,
    pub mismatches: u64,
    pub execution_errors: u64,
    pub crashes: u64,
}

/// Marks a slot whose worker has not started a call yet
const NO_LABEL_INDEX: usize = usize::MAX;

/// Per-worker progress, readable after a crash
#[derive(Debug)]
struct WorkerSlot {
    executions: AtomicU64,
    iteration: AtomicUsize,
    label_index: AtomicUsize,
}

impl Default for WorkerSlot {
    fn default() -> Self {
        Self {
            executions: AtomicU64::new(0),
            iteration: AtomicUsize::new(0),
            label_index: AtomicUsize::new(NO_LABEL_INDEX),
        }
    }
}

impl WorkerSlot {
    /// Record for a worker that died outside an executor call, attributed
    /// to the workload it last touched
    fn crash_record(&self, catalog: &WorkloadCatalog, worker_id: WorkerId, msg: &str) -> FailureRecord {
        let label = catalog
            .get(self.label_index.load(Ordering::Relaxed))
            .map_or(NO_WORKLOAD, |w| w.label.as_str());
        FailureRecord::crash(
            label,
            worker_id,
            self.iteration.load(Ordering::Relaxed),
            format!("worker crashed: {}", msg),
        )
    }
}

/// Everything a worker borrows from the run
struct WorkerContext<'a, E: ?Sized> {
    config: &'a RunConfig,
    catalog: &'a WorkloadCatalog,
    executor: &'a E,
    policy: OrderPolicy,
    aggregator: &'a FailureAggregator,
    stats: &'a RunStats,
}

// ============================================================
// WORKER
// ============================================================

fn run_worker<E: Executor + ?Sized>(ctx: &WorkerContext<'_, E>, worker_id: WorkerId, slot: &WorkerSlot) {
    let catalog = ctx.catalog;

    for iteration in 0..ctx.config.iterations_per_worker() {
        slot.iteration.store(iteration, Ordering::Relaxed);
        let order = ctx.policy.pass_order(catalog.size(), worker_id, iteration);

        for index in order {
            let workload = &catalog[index];
            slot.label_index.store(index, Ordering::Relaxed);
            ctx.stats.incr_execution();
            slot.executions.fetch_add(1, Ordering::Relaxed);

            let result = catch_unwind(AssertUnwindSafe(|| ctx.executor.execute(&workload.query)));

            let record = match result {
                Ok(Ok(actual)) => match compare(&workload.expected, &actual) {
                    Comparison::Match => None,
                    Comparison::Mismatch { diff } => {
                        ctx.stats.incr_mismatch();
                        Some(FailureRecord::mismatch(&workload.label, worker_id, iteration, diff))
                    }
                },
                Ok(Err(e)) => {
                    ctx.stats.incr_execution_error();
                    Some(FailureRecord::execution(&workload.label, worker_id, iteration, &e))
                }
                Err(payload) => {
                    ctx.stats.incr_crash();
                    Some(FailureRecord::crash(
                        &workload.label,
                        worker_id,
                        iteration,
                        format!("executor panicked: {}", panic_message(payload.as_ref())),
                    ))
                }
            };

            if let Some(record) = record {
                debug!(
                    target: WORKER_TARGET,
                    worker_id,
                    iteration,
                    label = %record.workload_label,
                    kind = %record.error_kind,
                    "Failure recorded"
                );
                ctx.aggregator.append(record);
            }
        }

        ctx.stats.incr_pass();
    }
}

// ============================================================
// RUNNER
// ============================================================

pub struct ConcurrentRunner;

impl ConcurrentRunner {
    /// Run `worker_count` workers, each making `iterations_per_worker` full
    /// passes over the catalog, and collect every failure.
    ///
    /// Blocks until all workers finish. Fails only if the workers cannot all
    /// be scheduled; per-call failures end up in [`RunReport::failures`].
    pub fn run_test<E: Executor + ?Sized>(
        config: &RunConfig,
        catalog: &WorkloadCatalog,
        executor: &E,
    ) -> Result<RunReport, HarnessError> {
        let worker_count = config.worker_count();
        if worker_count > config.pool_size() {
            return Err(SchedulingError::Saturated {
                capacity: config.pool_size(),
                requested: worker_count,
            }
            .into());
        }

        let run_id = ulid::Ulid::new().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        let aggregator = FailureAggregator::new();
        let stats = RunStats::default();
        let slots: Vec<WorkerSlot> = (0..worker_count).map(|_| WorkerSlot::default()).collect();
        let ctx = WorkerContext {
            config,
            catalog,
            executor,
            policy: OrderPolicy::new(config.randomize_order(), config.seed()),
            aggregator: &aggregator,
            stats: &stats,
        };

        info!(
            %run_id,
            workers = worker_count,
            iterations = config.iterations_per_worker(),
            workloads = catalog.size(),
            randomize = config.randomize_order(),
            seed = ?config.seed(),
            "Starting concurrent run"
        );

        thread::scope(|s| -> Result<(), SchedulingError> {
            let mut group = TaskGroup::new(s, WORKER_THREAD_PREFIX, config.pool_size());
            group.reserve(worker_count)?;

            let mut spawn_error = None;
            for (worker_id, slot) in slots.iter().enumerate() {
                let ctx = &ctx;
                if let Err(e) = group.spawn(move || run_worker(ctx, worker_id, slot)) {
                    spawn_error = Some(e);
                    break;
                }
            }

            // Join whatever started, even when scheduling failed part way
            let outcomes = group.join_all();
            if let Some(e) = spawn_error {
                error!(%run_id, error = %e, started = outcomes.len(), "Worker scheduling failed");
                return Err(e);
            }

            for (worker_id, outcome) in outcomes.into_iter().enumerate() {
                if let TaskOutcome::Panicked(msg) = outcome {
                    warn!(%run_id, worker_id, panic = %msg, "Worker crashed");
                    stats.incr_crash();
                    aggregator.append(slots[worker_id].crash_record(catalog, worker_id, &msg));
                }
            }
            Ok(())
        })?;

        let elapsed = start.elapsed();
        let snapshot = stats.snapshot();
        let failures = aggregator.drain();
        let per_worker_executions = slots
            .iter()
            .map(|s| s.executions.load(Ordering::Relaxed))
            .collect();

        let report = RunReport {
            run_id,
            started_at,
            worker_count,
            iterations_per_worker: config.iterations_per_worker(),
            catalog_size: catalog.size(),
            total_executions: snapshot.executions,
            per_worker_executions,
            failures,
            elapsed,
        };

        debug_assert_eq!(
            report.failures.len() as u64,
            snapshot.mismatches + snapshot.execution_errors + snapshot.crashes
        );

        info!(
            run_id = %report.run_id,
            executions = snapshot.executions,
            passes = snapshot.passes_completed,
            mismatches = snapshot.mismatches,
            execution_errors = snapshot.execution_errors,
            crashes = snapshot.crashes,
            exec_per_sec = report.executions_per_sec(),
            "{}",
            report.triage_line()
        );
        Ok(report)
    }
}
