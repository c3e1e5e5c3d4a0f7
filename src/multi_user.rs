//! Multi-User Test Runner
//!
//! Runs a whole test suite as several virtual users at once: every user
//! thread repeats the full suite `iterations` times and records each case
//! outcome into one shared [`ResultCollector`].
//!
//! ```text
//!  virtual-user-0 ─┐
//!  virtual-user-1 ─┼──▶ ResultCollector { DashMap<test, tally>, SegQueue<failure> }
//!  virtual-user-N ─┘
//! ```

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::compare::{Comparison, compare};
use crate::core_types::{IterationIndex, VirtualUserId};
use crate::error::{HarnessError, LoadError, SchedulingError};
use crate::executor::Executor;
use crate::task_group::{TaskGroup, TaskOutcome, panic_message};
use crate::workload::WorkloadCatalog;

/// Test name used when a virtual user dies outside any test case
pub const NO_TEST: &str = "<virtual-user>";

// ============================================================
// SUITES
// ============================================================

/// A suite of independent, named test cases
pub trait TestSuite: Sync {
    fn name(&self) -> &str;

    fn case_count(&self) -> usize;

    fn case_name(&self, index: usize) -> &str;

    /// Run one case; `Err` carries the failure message
    fn run_case(&self, index: usize) -> Result<(), String>;
}

type CaseFn = Box<dyn Fn() -> Result<(), String> + Send + Sync>;

pub struct TestCase {
    name: String,
    body: CaseFn,
}

impl TestCase {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }
}

/// Suite built from closures
pub struct FnSuite {
    name: String,
    cases: Vec<TestCase>,
}

impl FnSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
        }
    }

    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }
}

impl TestSuite for FnSuite {
    fn name(&self) -> &str {
        &self.name
    }

    fn case_count(&self) -> usize {
        self.cases.len()
    }

    fn case_name(&self, index: usize) -> &str {
        &self.cases[index].name
    }

    fn run_case(&self, index: usize) -> Result<(), String> {
        (self.cases[index].body)()
    }
}

/// Every catalog workload as a test case against one executor
pub struct CatalogSuite<'a, E: ?Sized> {
    name: String,
    catalog: &'a WorkloadCatalog,
    executor: &'a E,
}

impl<'a, E: Executor + ?Sized> CatalogSuite<'a, E> {
    pub fn new(name: impl Into<String>, catalog: &'a WorkloadCatalog, executor: &'a E) -> Self {
        Self {
            name: name.into(),
            catalog,
            executor,
        }
    }
}

impl<E: Executor + ?Sized> TestSuite for CatalogSuite<'_, E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn case_count(&self) -> usize {
        self.catalog.size()
    }

    fn case_name(&self, index: usize) -> &str {
        &self.catalog[index].label
    }

    fn run_case(&self, index: usize) -> Result<(), String> {
        let workload = &self.catalog[index];
        let actual = self
            .executor
            .execute(&workload.query)
            .map_err(|e| format!("[{}] {}", e.code(), e))?;
        match compare(&workload.expected, &actual) {
            Comparison::Match => Ok(()),
            Comparison::Mismatch { diff } => Err(diff),
        }
    }
}

// ============================================================
// RESULT COLLECTOR
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestFailure {
    pub test: String,
    pub user: VirtualUserId,
    pub iteration: IterationIndex,
    pub message: String,
}

#[derive(Debug, Default)]
struct TestTally {
    passed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TallySnapshot {
    pub passed: u64,
    pub failed: u64,
}

/// Shared sink; each outcome is counted exactly once
#[derive(Debug, Default)]
pub struct ResultCollector {
    tallies: DashMap<String, TestTally>,
    failures: SegQueue<TestFailure>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tally(&self, test: &str, f: impl FnOnce(&TestTally)) {
        if let Some(tally) = self.tallies.get(test) {
            f(&tally);
            return;
        }
        let tally = self.tallies.entry(test.to_string()).or_default();
        f(&tally);
    }

    pub fn record_pass(&self, test: &str) {
        self.with_tally(test, |t| {
            t.passed.fetch_add(1, Ordering::Relaxed);
        });
    }

    pub fn record_failure(&self, failure: TestFailure) {
        self.with_tally(&failure.test, |t| {
            t.failed.fetch_add(1, Ordering::Relaxed);
        });
        self.failures.push(failure);
    }

    pub fn tally(&self, test: &str) -> TallySnapshot {
        self.tallies
            .get(test)
            .map(|t| TallySnapshot {
                passed: t.passed.load(Ordering::Relaxed),
                failed: t.failed.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    fn into_parts(self) -> (BTreeMap<String, TallySnapshot>, Vec<TestFailure>) {
        let per_test = self
            .tallies
            .into_iter()
            .map(|(name, t)| {
                (
                    name,
                    TallySnapshot {
                        passed: t.passed.into_inner(),
                        failed: t.failed.into_inner(),
                    },
                )
            })
            .collect();
        let mut failures = Vec::with_capacity(self.failures.len());
        while let Some(f) = self.failures.pop() {
            failures.push(f);
        }
        (per_test, failures)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiUserResult {
    pub suite: String,
    pub virtual_users: usize,
    pub iterations: usize,
    pub passed: u64,
    pub failed: u64,
    pub per_test: BTreeMap<String, TallySnapshot>,
    pub failures: Vec<TestFailure>,
    pub duration: Duration,
}

impl MultiUserResult {
    pub fn run_count(&self) -> u64 {
        self.passed + self.failed
    }

    pub fn was_successful(&self) -> bool {
        self.failed == 0
    }
}

// ============================================================
// RUNNER
// ============================================================

pub struct MultiUserTestRunner;

impl MultiUserTestRunner {
    pub fn do_run<S: TestSuite + ?Sized>(
        suite: &S,
        virtual_users: usize,
        iterations: usize,
    ) -> Result<MultiUserResult, HarnessError> {
        if virtual_users == 0 {
            return Err(SchedulingError::NoWorkers.into());
        }
        if iterations == 0 {
            return Err(SchedulingError::NoIterations.into());
        }

        // Tallies are keyed by case name, so names must be unique
        let collector = ResultCollector::new();
        for index in 0..suite.case_count() {
            let case = suite.case_name(index);
            if collector.tallies.contains_key(case) {
                return Err(LoadError::DuplicateCase {
                    suite: suite.name().to_string(),
                    case: case.to_string(),
                }
                .into());
            }
            collector.tallies.insert(case.to_string(), TestTally::default());
        }

        info!(
            suite = suite.name(),
            virtual_users,
            iterations,
            cases = suite.case_count(),
            "Starting multi-user run"
        );
        let start = Instant::now();

        thread::scope(|s| -> Result<(), SchedulingError> {
            let mut group = TaskGroup::new(s, "virtual-user", virtual_users);
            let mut spawn_error = None;
            for user in 0..virtual_users {
                let collector = &collector;
                if let Err(e) = group.spawn(move || run_user(suite, collector, user, iterations)) {
                    spawn_error = Some(e);
                    break;
                }
            }

            for (user, outcome) in group.join_all().into_iter().enumerate() {
                if let TaskOutcome::Panicked(msg) = outcome {
                    warn!(user, panic = %msg, "Virtual user crashed");
                    collector.record_failure(TestFailure {
                        test: NO_TEST.to_string(),
                        user,
                        iteration: 0,
                        message: msg,
                    });
                }
            }
            spawn_error.map_or(Ok(()), Err)
        })?;

        // All users are joined at this point
        let duration = start.elapsed();
        let (per_test, failures) = collector.into_parts();
        let passed = per_test.values().map(|t| t.passed).sum();
        let failed = per_test.values().map(|t| t.failed).sum();

        let result = MultiUserResult {
            suite: suite.name().to_string(),
            virtual_users,
            iterations,
            passed,
            failed,
            per_test,
            failures,
            duration,
        };
        info!(
            suite = %result.suite,
            runs = result.run_count(),
            failed = result.failed,
            duration_ms = result.duration.as_millis() as u64,
            "Multi-user run finished"
        );
        Ok(result)
    }
}

fn run_user<S: TestSuite + ?Sized>(
    suite: &S,
    collector: &ResultCollector,
    user: VirtualUserId,
    iterations: usize,
) {
    for iteration in 0..iterations {
        for index in 0..suite.case_count() {
            let name = suite.case_name(index);
            match catch_unwind(AssertUnwindSafe(|| suite.run_case(index))) {
                Ok(Ok(())) => collector.record_pass(name),
                Ok(Err(message)) => collector.record_failure(TestFailure {
                    test: name.to_string(),
                    user,
                    iteration,
                    message,
                }),
                Err(payload) => collector.record_failure(TestFailure {
                    test: name.to_string(),
                    user,
                    iteration,
                    message: format!("panicked: {}", panic_message(payload.as_ref())),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FixtureExecutor;
    use crate::workload::Workload;
    use std::sync::Arc;

    #[test]
    fn test_every_outcome_recorded_once() {
        let counter = Arc::new(AtomicU64::new(0));
        let c = counter.clone();
        let suite = FnSuite::new("counting")
            .with_case(TestCase::new("ok", move || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .with_case(TestCase::new("fails", || Err("nope".to_string())));

        let result = MultiUserTestRunner::do_run(&suite, 6, 25).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 150);
        assert_eq!(result.run_count(), 300);
        assert_eq!(result.passed, 150);
        assert_eq!(result.failed, 150);
        assert_eq!(result.failures.len(), 150);
        assert_eq!(result.per_test["ok"], TallySnapshot { passed: 150, failed: 0 });
        assert!(!result.was_successful());
    }

    #[test]
    fn test_panicking_case_is_a_failure() {
        let suite = FnSuite::new("p").with_case(TestCase::new("boom", || panic!("bad case")));
        let result = MultiUserTestRunner::do_run(&suite, 2, 3).unwrap();
        assert_eq!(result.failed, 6);
        assert!(result.failures.iter().all(|f| f.message.contains("bad case")));
    }

    #[test]
    fn test_catalog_suite() {
        let catalog = WorkloadCatalog::from_workloads(
            "s",
            vec![Workload::new("q1", "select 1", "A"), Workload::new("q2", "select 2", "B")],
        )
        .unwrap();
        let exec = FixtureExecutor::new().with("select 1", "A").with("select 2", "WRONG");
        let suite = CatalogSuite::new("catalog", &catalog, &exec);

        let result = MultiUserTestRunner::do_run(&suite, 3, 4).unwrap();
        assert_eq!(result.per_test["q1"], TallySnapshot { passed: 12, failed: 0 });
        assert_eq!(result.per_test["q2"], TallySnapshot { passed: 0, failed: 12 });
        assert!(result.failures.iter().all(|f| f.test == "q2"));
    }

    #[test]
    fn test_rejects_zero_users() {
        let suite = FnSuite::new("empty");
        assert!(matches!(
            MultiUserTestRunner::do_run(&suite, 0, 1),
            Err(HarnessError::Scheduling(SchedulingError::NoWorkers))
        ));
    }

    #[test]
    fn test_collector_tally_for_unknown_test() {
        let collector = ResultCollector::new();
        collector.record_pass("late");
        assert_eq!(collector.tally("late").passed, 1);
        assert_eq!(collector.tally("never"), TallySnapshot::default());
    }

    #[test]
    fn test_duplicate_case_names_rejected() {
        let runs = Arc::new(AtomicU64::new(0));
        let (a, b) = (runs.clone(), runs.clone());
        let suite = FnSuite::new("dup")
            .with_case(TestCase::new("same", move || {
                a.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .with_case(TestCase::new("same", move || {
                b.fetch_add(1, Ordering::SeqCst);
                Err("second".to_string())
            }));

        assert_eq!(
            MultiUserTestRunner::do_run(&suite, 2, 2).unwrap_err(),
            HarnessError::Load(LoadError::DuplicateCase {
                suite: "dup".to_string(),
                case: "same".to_string(),
            })
        );
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
