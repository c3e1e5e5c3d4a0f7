//! Workload Catalog
//!
//! An ordered, immutable list of `(label, query, expected)` triples assembled
//! from one or more named suites. Once loaded the catalog is never mutated,
//! so workers read it concurrently through a shared reference with no
//! synchronization.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core_types::WorkloadIndex;
use crate::error::LoadError;

/// One query under test together with its canonical expected result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub label: String,
    pub query: String,
    pub expected: String,
}

impl Workload {
    pub fn new(
        label: impl Into<String>,
        query: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            query: query.into(),
            expected: expected.into(),
        }
    }
}

/// A named suite yielding an ordered list of workloads
pub trait WorkloadSource {
    fn suite_name(&self) -> &str;

    fn workloads(&self) -> Result<Vec<Workload>, LoadError>;
}

/// In-memory suite, mostly useful for tests and registry factories
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    workloads: Vec<Workload>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, workloads: Vec<Workload>) -> Self {
        Self {
            name: name.into(),
            workloads,
        }
    }

    pub fn into_workloads(self) -> Vec<Workload> {
        self.workloads
    }
}

impl WorkloadSource for StaticSource {
    fn suite_name(&self) -> &str {
        &self.name
    }

    fn workloads(&self) -> Result<Vec<Workload>, LoadError> {
        Ok(self.workloads.clone())
    }
}

/// Immutable, ordered workload list with a label index
#[derive(Debug, Clone, Default)]
pub struct WorkloadCatalog {
    workloads: Vec<Workload>,
    by_label: FxHashMap<String, WorkloadIndex>,
    suites: Vec<String>,
}

impl WorkloadCatalog {
    /// Assemble a catalog from sources, in source order then workload order.
    ///
    /// Fails on the first malformed workload or duplicate label; nothing is
    /// partially loaded.
    pub fn load(sources: &[&dyn WorkloadSource]) -> Result<Self, LoadError> {
        let mut catalog = WorkloadCatalog::default();

        for source in sources {
            let suite = source.suite_name().to_string();
            for workload in source.workloads()? {
                catalog.push(&suite, workload)?;
            }
            catalog.suites.push(suite);
        }

        tracing::debug!(
            workloads = catalog.size(),
            suites = catalog.suites.len(),
            "Workload catalog loaded"
        );
        Ok(catalog)
    }

    /// Single-suite shortcut
    pub fn from_workloads(
        suite: impl Into<String>,
        workloads: Vec<Workload>,
    ) -> Result<Self, LoadError> {
        let source = StaticSource::new(suite, workloads);
        Self::load(&[&source])
    }

    fn push(&mut self, suite: &str, workload: Workload) -> Result<(), LoadError> {
        if workload.label.trim().is_empty() {
            return Err(LoadError::Malformed {
                suite: suite.to_string(),
                reason: format!("empty label at position {}", self.workloads.len()),
            });
        }
        if workload.query.trim().is_empty() {
            return Err(LoadError::Malformed {
                suite: suite.to_string(),
                reason: format!("empty query for '{}'", workload.label),
            });
        }
        if self.by_label.contains_key(&workload.label) {
            return Err(LoadError::DuplicateLabel(workload.label));
        }

        self.by_label
            .insert(workload.label.clone(), self.workloads.len());
        self.workloads.push(workload);
        Ok(())
    }

    pub fn get(&self, index: WorkloadIndex) -> Option<&Workload> {
        self.workloads.get(index)
    }

    pub fn size(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workload> {
        self.workloads.iter()
    }

    /// Look up a workload by its unique label
    pub fn find(&self, label: &str) -> Option<&Workload> {
        self.by_label.get(label).map(|&i| &self.workloads[i])
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.workloads.iter().map(|w| w.label.as_str())
    }

    /// Names of the suites the catalog was assembled from, in load order
    pub fn suites(&self) -> &[String] {
        &self.suites
    }
}

impl std::ops::Index<WorkloadIndex> for WorkloadCatalog {
    type Output = Workload;

    fn index(&self, index: WorkloadIndex) -> &Workload {
        &self.workloads[index]
    }
}
