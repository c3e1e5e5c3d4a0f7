//! End-to-end runs through the public API with in-process executors.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use olap_stress::error::{ErrorKind, ExecutionError, HarnessError, SchedulingError};
use olap_stress::executor::{FixtureExecutor, FnExecutor};
use olap_stress::harness::{Harness, HarnessOutcome};
use olap_stress::runner::ConcurrentRunner;
use olap_stress::sanity::SanityRunner;
use olap_stress::workload::{Workload, WorkloadCatalog};
use olap_stress::RunConfig;

fn two_query_catalog() -> WorkloadCatalog {
    WorkloadCatalog::from_workloads(
        "scenario",
        vec![
            Workload::new("q1", "select a from t", "A"),
            Workload::new("q2", "select b from t", "B"),
        ],
    )
    .unwrap()
}

fn numbered_catalog(n: usize) -> WorkloadCatalog {
    let workloads = (0..n)
        .map(|i| Workload::new(format!("q{}", i), format!("select {}", i), format!("row {}", i)))
        .collect();
    WorkloadCatalog::from_workloads("numbered", workloads).unwrap()
}

fn config(workers: usize, iterations: usize) -> RunConfig {
    RunConfig::builder()
        .workers(workers)
        .iterations(iterations)
        .build()
        .unwrap()
}

// ============================================================
// SCENARIOS
// ============================================================

#[test]
fn scenario_a_correct_executor_has_no_failures() {
    let catalog = two_query_catalog();
    let executor = FixtureExecutor::from_catalog(&catalog);

    let report = ConcurrentRunner::run_test(&config(5, 20), &catalog, &executor).unwrap();

    assert_eq!(report.total_executions, 200);
    assert!(report.failures.is_empty());
    assert!(report.passed());
    assert_eq!(report.per_worker_executions, vec![40; 5]);
}

#[test]
fn scenario_b_constant_wrong_answer_fails_every_invocation() {
    let catalog = two_query_catalog();
    let executor = FixtureExecutor::new()
        .with("select a from t", "A")
        .with("select b from t", "WRONG");

    let report = ConcurrentRunner::run_test(&config(5, 20), &catalog, &executor).unwrap();

    assert_eq!(report.total_executions, 200);
    assert_eq!(report.failures.len(), 5 * 20);
    assert!(report.failures.iter().all(|f| f.workload_label == "q2"));
    assert!(report.failures.iter().all(|f| f.error_kind == ErrorKind::Mismatch));

    // Each (worker, iteration) pair fails exactly once
    let keys: HashSet<_> = report
        .failures
        .iter()
        .map(|f| (f.worker_id, f.iteration_index))
        .collect();
    assert_eq!(keys.len(), 100);
}

#[test]
fn scenario_c_single_execution_error_is_recorded_once() {
    let catalog = two_query_catalog();
    let q1_calls = AtomicUsize::new(0);
    let executor = FnExecutor::new(|query: &str| match query {
        "select a from t" => {
            if q1_calls.fetch_add(1, Ordering::SeqCst) == 37 {
                Err(ExecutionError::Engine("backend restarted".to_string()))
            } else {
                Ok("A".to_string())
            }
        }
        _ => Ok("B".to_string()),
    });

    let report = ConcurrentRunner::run_test(&config(5, 20), &catalog, &executor).unwrap();

    assert_eq!(report.total_executions, 200);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.workload_label, "q1");
    assert_eq!(failure.error_kind, ErrorKind::Execution);
    assert!(failure.message.contains("backend restarted"));
    assert_eq!(report.failure_count(ErrorKind::Mismatch), 0);
}

#[test]
fn scenario_d_broken_baseline_skips_concurrent_run() {
    let catalog = two_query_catalog();
    let calls = AtomicUsize::new(0);
    let executor = FnExecutor::new(|query: &str| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(if query == "select a from t" { "A" } else { "stale" }.to_string())
    });

    let sanity = SanityRunner::run(&catalog, &executor);
    assert!(!sanity.passed());
    assert_eq!(sanity.failure_count(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let cfg = RunConfig::builder()
        .workers(5)
        .iterations(20)
        .sanity_check_first(true)
        .build()
        .unwrap();
    let outcome = Harness::run(&cfg, &catalog, &executor).unwrap();

    assert!(matches!(outcome, HarnessOutcome::SanityFailed(_)));
    assert!(!outcome.passed());
    // Only the second sanity pass reached the executor
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

// ============================================================
// INVARIANTS
// ============================================================

#[test]
fn total_executions_match_workers_times_iterations_times_catalog() {
    for (workers, iterations, size) in [(1, 1, 1), (3, 7, 4), (8, 5, 3), (2, 10, 9)] {
        let catalog = numbered_catalog(size);
        let executor = FixtureExecutor::from_catalog(&catalog);
        let cfg = RunConfig::builder()
            .workers(workers)
            .iterations(iterations)
            .randomize_order(true)
            .seed(7)
            .build()
            .unwrap();

        let report = ConcurrentRunner::run_test(&cfg, &catalog, &executor).unwrap();

        assert_eq!(report.total_executions, (workers * iterations * size) as u64);
        assert_eq!(report.total_executions, report.expected_executions());
        assert!(
            report
                .per_worker_executions
                .iter()
                .all(|&n| n == (iterations * size) as u64)
        );
    }
}

#[test]
fn injected_mismatches_are_counted_exactly() {
    let catalog = numbered_catalog(6);
    let calls = AtomicUsize::new(0);
    // Every 13th call overall returns garbage
    let executor = FnExecutor::new(|query: &str| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n % 13 == 0 {
            return Ok("garbage".to_string());
        }
        let index: usize = query.trim_start_matches("select ").parse().unwrap();
        Ok(format!("row {}", index))
    });

    let report = ConcurrentRunner::run_test(&config(4, 10), &catalog, &executor).unwrap();

    let total = 4 * 10 * 6;
    let injected = (0..total).filter(|n| n % 13 == 0).count();
    assert_eq!(report.total_executions, total as u64);
    assert_eq!(report.failures.len(), injected);
    assert_eq!(report.failure_count(ErrorKind::Mismatch), injected);
    assert!(report.failures.iter().all(|f| f.diff.is_some()));
}

#[test]
fn leading_line_break_is_not_a_mismatch() {
    let catalog = two_query_catalog();
    let executor = FixtureExecutor::new()
        .with("select a from t", "\nA")
        .with("select b from t", "\r\nB");

    let report = ConcurrentRunner::run_test(&config(2, 3), &catalog, &executor).unwrap();
    assert!(report.passed());
}

#[test]
fn panicking_executor_becomes_crash_record() {
    let catalog = two_query_catalog();
    let calls = AtomicUsize::new(0);
    let executor = FnExecutor::new(|query: &str| {
        if query == "select b from t" && calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("driver blew up");
        }
        Ok(if query == "select a from t" { "A" } else { "B" }.to_string())
    });

    let report = ConcurrentRunner::run_test(&config(3, 4), &catalog, &executor).unwrap();

    assert_eq!(report.failure_count(ErrorKind::WorkerCrash), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].workload_label, "q2");
    // The crashed call still counts and the worker carries on
    assert_eq!(report.total_executions, 24);
}

// ============================================================
// ORDERING
// ============================================================

/// Records the query sequence observed on each worker thread
fn recorded_orders(cfg: &RunConfig, catalog: &WorkloadCatalog) -> BTreeMap<String, Vec<String>> {
    let seen: Mutex<BTreeMap<String, Vec<String>>> = Mutex::new(BTreeMap::new());
    let executor = FnExecutor::new(|query: &str| {
        let name = thread::current().name().unwrap_or("unnamed").to_string();
        seen.lock().unwrap().entry(name).or_default().push(query.to_string());
        let index: usize = query.trim_start_matches("select ").parse().unwrap();
        Ok(format!("row {}", index))
    });

    let report = ConcurrentRunner::run_test(cfg, catalog, &executor).unwrap();
    assert!(report.passed());
    seen.into_inner().unwrap()
}

#[test]
fn same_seed_reproduces_every_worker_order() {
    let catalog = numbered_catalog(8);
    let cfg = RunConfig::builder()
        .workers(3)
        .iterations(4)
        .randomize_order(true)
        .seed(0xC0FFEE)
        .build()
        .unwrap();

    let first = recorded_orders(&cfg, &catalog);
    let second = recorded_orders(&cfg, &catalog);

    assert_eq!(first.len(), 3);
    assert!(first.keys().all(|k| k.starts_with("olap-worker-")));
    assert_eq!(first, second);

    // Every pass is a full permutation of the catalog
    for order in first.values() {
        for pass in order.chunks(8) {
            let distinct: HashSet<_> = pass.iter().collect();
            assert_eq!(distinct.len(), 8);
        }
    }
}

#[test]
fn different_seeds_change_the_order() {
    let catalog = numbered_catalog(8);
    let build = |seed| {
        RunConfig::builder()
            .workers(2)
            .iterations(3)
            .randomize_order(true)
            .seed(seed)
            .build()
            .unwrap()
    };

    assert_ne!(
        recorded_orders(&build(1), &catalog),
        recorded_orders(&build(2), &catalog)
    );
}

#[test]
fn sequential_order_follows_catalog() {
    let catalog = numbered_catalog(5);
    let orders = recorded_orders(&config(2, 2), &catalog);
    let expected: Vec<String> = (0..2)
        .flat_map(|_| (0..5).map(|i| format!("select {}", i)))
        .collect();
    assert!(orders.values().all(|o| *o == expected));
}

// ============================================================
// SCHEDULING
// ============================================================

#[test]
fn oversubscribed_pool_is_rejected_before_any_call() {
    let catalog = two_query_catalog();
    let calls = AtomicUsize::new(0);
    let executor = FnExecutor::new(|_: &str| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok("A".to_string())
    });
    let cfg = RunConfig::builder()
        .workers(4)
        .iterations(1)
        .pool_size(2)
        .build()
        .unwrap();

    let err = ConcurrentRunner::run_test(&cfg, &catalog, &executor).unwrap_err();
    assert_eq!(
        err,
        HarnessError::Scheduling(SchedulingError::Saturated {
            capacity: 2,
            requested: 4
        })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn zero_workers_or_iterations_are_rejected() {
    assert_eq!(
        RunConfig::builder().workers(0).iterations(1).build(),
        Err(SchedulingError::NoWorkers)
    );
    assert_eq!(
        RunConfig::builder().workers(1).iterations(0).build(),
        Err(SchedulingError::NoIterations)
    );
}
