//! Gated run: sanity pass first, concurrent stress second.

use tracing::{info, warn};

use crate::config::RunConfig;
use crate::error::HarnessError;
use crate::executor::Executor;
use crate::report::RunReport;
use crate::runner::ConcurrentRunner;
use crate::sanity::{SanityReport, SanityRunner};
use crate::workload::WorkloadCatalog;

#[derive(Debug, Clone)]
pub enum HarnessOutcome {
    /// The baseline is broken; the concurrent phase was not started
    SanityFailed(SanityReport),
    Completed {
        sanity: Option<SanityReport>,
        report: RunReport,
    },
}

impl HarnessOutcome {
    /// True iff the sanity gate (if any) and the concurrent run both passed
    pub fn passed(&self) -> bool {
        match self {
            HarnessOutcome::SanityFailed(_) => false,
            HarnessOutcome::Completed { report, .. } => report.passed(),
        }
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            HarnessOutcome::SanityFailed(_) => None,
            HarnessOutcome::Completed { report, .. } => Some(report),
        }
    }
}

pub struct Harness;

impl Harness {
    pub fn run<E: Executor + ?Sized>(
        config: &RunConfig,
        catalog: &WorkloadCatalog,
        executor: &E,
    ) -> Result<HarnessOutcome, HarnessError> {
        let sanity = if config.sanity_check_first() {
            let sanity = SanityRunner::run(catalog, executor);
            if !sanity.passed() {
                warn!(
                    failures = sanity.failure_count(),
                    "Sanity gate failed, skipping concurrent run"
                );
                return Ok(HarnessOutcome::SanityFailed(sanity));
            }
            info!("Sanity gate passed");
            Some(sanity)
        } else {
            None
        };

        let report = ConcurrentRunner::run_test(config, catalog, executor)?;
        Ok(HarnessOutcome::Completed { sanity, report })
    }
}
