//! Suite Registry
//!
//! Explicit mapping from suite name to a factory producing its ordered
//! workload list. Suites are registered up front (in code or from YAML
//! files) and resolved by name when a catalog is assembled.
//!
//! # YAML suite format
//!
//! ```yaml
//! name: cache_hits
//! workloads:
//!   - label: sales_by_quarter
//!     query: "select [Measures].[Unit Sales] on 0 from [Sales]"
//!     expected: |
//!       Axis #0:
//!       {}
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::LoadError;
use crate::workload::{StaticSource, Workload, WorkloadCatalog, WorkloadSource};

type SuiteFactory = Box<dyn Fn() -> Vec<Workload> + Send + Sync>;

#[derive(Debug, Deserialize)]
struct SuiteFile {
    name: String,
    #[serde(default)]
    workloads: Vec<Workload>,
}

/// Parse a YAML suite file into an in-memory source
pub fn load_yaml_suite(path: &Path) -> Result<StaticSource, LoadError> {
    let content = fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_yaml_suite(&content, &path.display().to_string())
}

fn parse_yaml_suite(content: &str, origin: &str) -> Result<StaticSource, LoadError> {
    let file: SuiteFile = serde_yaml::from_str(content).map_err(|e| LoadError::Parse {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;
    if file.name.trim().is_empty() {
        return Err(LoadError::Malformed {
            suite: origin.to_string(),
            reason: "suite name is empty".to_string(),
        });
    }
    Ok(StaticSource::new(file.name, file.workloads))
}

/// Name → factory registry, resolved statically
#[derive(Default)]
pub struct SuiteRegistry {
    factories: BTreeMap<String, SuiteFactory>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), LoadError>
    where
        F: Fn() -> Vec<Workload> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(LoadError::DuplicateSuite(name));
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Parse a YAML suite file and register it under its declared name.
    ///
    /// Returns the registered name.
    pub fn register_yaml(&mut self, path: &Path) -> Result<String, LoadError> {
        let source = load_yaml_suite(path)?;
        let name = source.suite_name().to_string();
        tracing::info!(suite = %name, path = %path.display(), "Registered YAML suite");
        let workloads = source.into_workloads();
        self.register(name.clone(), move || workloads.clone())?;
        Ok(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered suite names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a catalog from the named suites, in the order given
    pub fn resolve(&self, names: &[&str]) -> Result<WorkloadCatalog, LoadError> {
        let mut sources = Vec::with_capacity(names.len());
        for name in names {
            let factory = self
                .factories
                .get(*name)
                .ok_or_else(|| LoadError::UnknownSuite(name.to_string()))?;
            sources.push(StaticSource::new(*name, factory()));
        }
        let refs: Vec<&dyn WorkloadSource> =
            sources.iter().map(|s| s as &dyn WorkloadSource).collect();
        WorkloadCatalog::load(&refs)
    }

    /// Build a catalog from every registered suite, in name order
    pub fn resolve_all(&self) -> Result<WorkloadCatalog, LoadError> {
        let names: Vec<&str> = self.names().collect();
        self.resolve(&names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SuiteRegistry {
        let mut reg = SuiteRegistry::new();
        reg.register("basic", || {
            vec![
                Workload::new("q1", "select 1", "A"),
                Workload::new("q2", "select 2", "B"),
            ]
        })
        .unwrap();
        reg.register("extra", || vec![Workload::new("q3", "select 3", "C")])
            .unwrap();
        reg
    }

    #[test]
    fn test_resolve_in_requested_order() {
        let catalog = registry().resolve(&["extra", "basic"]).unwrap();
        assert_eq!(catalog.labels().collect::<Vec<_>>(), vec!["q3", "q1", "q2"]);
    }

    #[test]
    fn test_unknown_suite() {
        let err = registry().resolve(&["missing"]).unwrap_err();
        assert_eq!(err, LoadError::UnknownSuite("missing".into()));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut reg = registry();
        let err = reg.register("basic", Vec::new).unwrap_err();
        assert_eq!(err, LoadError::DuplicateSuite("basic".into()));
    }

    #[test]
    fn test_resolve_all_sorted_by_name() {
        let reg = registry();
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["basic", "extra"]);
        assert_eq!(reg.resolve_all().unwrap().size(), 3);
    }

    #[test]
    fn test_parse_yaml_suite() {
        let yaml = r#"
name: cache
workloads:
  - label: q1
    query: "select 1"
    expected: |
      Axis #0:
      {}
  - label: q2
    query: "select 2"
    expected: "B"
"#;
        let source = parse_yaml_suite(yaml, "inline").unwrap();
        assert_eq!(source.suite_name(), "cache");
        let workloads = source.workloads().unwrap();
        assert_eq!(workloads.len(), 2);
        assert_eq!(workloads[0].expected, "Axis #0:\n{}\n");
    }

    #[test]
    fn test_parse_yaml_suite_errors() {
        assert!(matches!(
            parse_yaml_suite("name: [unterminated", "bad"),
            Err(LoadError::Parse { .. })
        ));
        assert!(matches!(
            parse_yaml_suite("name: ''\nworkloads: []", "blank"),
            Err(LoadError::Malformed { .. })
        ));
    }

    #[test]
    fn test_missing_yaml_file() {
        let err = load_yaml_suite(Path::new("/nonexistent/suite.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_yaml_suite_resolves_every_time() {
        let dir = std::env::temp_dir().join(format!("olap_stress_suite_{}", ulid::Ulid::new()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cube.yaml");
        fs::write(
            &path,
            "name: cube\nworkloads:\n  - label: c1\n    query: select 1\n    expected: A\n",
        )
        .unwrap();

        let mut reg = SuiteRegistry::new();
        assert_eq!(reg.register_yaml(&path).unwrap(), "cube");
        for _ in 0..2 {
            let catalog = reg.resolve(&["cube"]).unwrap();
            assert_eq!(catalog.size(), 1);
            assert_eq!(catalog.find("c1").unwrap().expected, "A");
        }

        fs::remove_dir_all(&dir).unwrap();
    }
}
