//! olap_stress - command line entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌────────────┐    ┌──────────┐
//! │  Config  │───▶│  Suites  │───▶│  Flush   │───▶│ Sanity +   │───▶│  Report  │
//! │  (YAML)  │    │ (YAML)   │    │  caches  │    │ Concurrent │    │  (JSON)  │
//! └──────────┘    └──────────┘    └──────────┘    └────────────┘    └──────────┘
//! ```
//!
//! Usage:
//!   olap_stress [--env dev] [--suite NAME]... [--workers N] [--iterations N]
//!               [--seed N] [--shuffle] [--no-sanity] [--multi-user] [--list-suites]

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use olap_stress::config::AppConfig;
use olap_stress::executor::{CacheController, HttpExecutor};
use olap_stress::harness::{Harness, HarnessOutcome};
use olap_stress::multi_user::{CatalogSuite, MultiUserTestRunner};
use olap_stress::properties::PropertyStore;
use olap_stress::suite::SuiteRegistry;

// ============================================================
// ARGUMENTS
// ============================================================

fn arg_value(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn arg_values(name: &str) -> Vec<String> {
    let args: Vec<String> = std::env::args().collect();
    args.windows(2)
        .filter(|w| w[0] == name)
        .map(|w| w[1].clone())
        .collect()
}

fn has_flag(name: &str) -> bool {
    std::env::args().any(|a| a == name)
}

fn get_env() -> String {
    arg_value(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn parse_arg<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match arg_value(&[name]) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", name, raw, e)),
        None => Ok(None),
    }
}

// ============================================================
// MAIN
// ============================================================

fn main() -> Result<ExitCode> {
    let env = get_env();
    let app_config = AppConfig::load(&env).context("Failed to load application config")?;
    let _log_guard = olap_stress::logging::init_logging(&app_config);

    tracing::info!(
        "Starting olap_stress ({}) in {} mode",
        env!("GIT_HASH"),
        env
    );

    // Suites
    let mut registry = SuiteRegistry::new();
    for path in &app_config.suites {
        registry
            .register_yaml(Path::new(path))
            .with_context(|| format!("Failed to register suite {}", path))?;
    }

    if has_flag("--list-suites") {
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let requested = arg_values("--suite");
    let catalog = if requested.is_empty() {
        registry.resolve_all()
    } else {
        let names: Vec<&str> = requested.iter().map(String::as_str).collect();
        registry.resolve(&names)
    }
    .context("Failed to build workload catalog")?;
    println!(
        "Loaded {} workloads from {} suites",
        catalog.size(),
        catalog.suites().len()
    );

    // Engine boundary
    let properties = Arc::new(PropertyStore::with_values(
        app_config.executor.properties.clone(),
    ));
    let executor = HttpExecutor::new(app_config.executor.http_config(), properties)
        .context("Failed to create executor")?;

    for region in &app_config.flush_regions {
        executor
            .flush(region)
            .with_context(|| format!("Failed to flush cache region {}", region))?;
        tracing::info!(region = %region, "Cache region flushed");
    }

    // Run configuration: file defaults, then command line overrides
    let mut builder = app_config.run.to_builder();
    if let Some(n) = parse_arg::<usize>("--workers")? {
        builder = builder.workers(n).pool_size(n);
    }
    if let Some(n) = parse_arg::<usize>("--iterations")? {
        builder = builder.iterations(n);
    }
    if let Some(seed) = parse_arg::<u64>("--seed")? {
        builder = builder.seed(seed);
    }
    if has_flag("--shuffle") {
        builder = builder.randomize_order(true);
    }
    if has_flag("--no-sanity") {
        builder = builder.sanity_check_first(false);
    }
    let run_config = builder.build().context("Invalid run configuration")?;

    if has_flag("--multi-user") {
        let suite = CatalogSuite::new("catalog", &catalog, &executor);
        let result = MultiUserTestRunner::do_run(
            &suite,
            run_config.worker_count(),
            run_config.iterations_per_worker(),
        )?;
        println!(
            "{}: {} runs, {} failed in {:.2?}",
            if result.was_successful() { "PASS" } else { "FAIL" },
            result.run_count(),
            result.failed,
            result.duration
        );
        for failure in result.failures.iter().take(20) {
            println!(
                "  [user {} iter {}] {}: {}",
                failure.user, failure.iteration, failure.test, failure.message
            );
        }
        return Ok(if result.was_successful() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let outcome = Harness::run(&run_config, &catalog, &executor)?;
    match &outcome {
        HarnessOutcome::SanityFailed(sanity) => {
            println!("{}", sanity.summary());
            for check in sanity.failures() {
                println!("  {}: {:?}", check.label, check.outcome);
            }
            println!("Concurrent run skipped: baseline is broken");
        }
        HarnessOutcome::Completed { report, .. } => {
            println!("{}", report.triage_line());
            for failure in report.failures.iter().take(20) {
                println!(
                    "  [worker {} iter {}] {} {}: {}",
                    failure.worker_id,
                    failure.iteration_index,
                    failure.error_kind,
                    failure.workload_label,
                    failure.diff.as_deref().unwrap_or(&failure.message)
                );
            }
            let path = report
                .write_json(Path::new(&app_config.output_dir))
                .context("Failed to write run report")?;
            println!("Report written to {}", path.display());
        }
    }

    Ok(if outcome.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
