use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use crate::error::{ConfigError, SchedulingError};
use crate::executor::HttpExecutorConfig;

// ============================================================
// RUN CONFIGURATION
// ============================================================

/// Parameters of one concurrent run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    worker_count: usize,
    iterations_per_worker: usize,
    randomize_order: bool,
    sanity_check_first: bool,
    seed: Option<u64>,
    pool_size: usize,
}

impl RunConfig {
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn iterations_per_worker(&self) -> usize {
        self.iterations_per_worker
    }

    pub fn randomize_order(&self) -> bool {
        self.randomize_order
    }

    pub fn sanity_check_first(&self) -> bool {
        self.sanity_check_first
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Capacity of the worker task group
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunConfigBuilder {
    worker_count: Option<usize>,
    iterations_per_worker: Option<usize>,
    randomize_order: bool,
    sanity_check_first: bool,
    seed: Option<u64>,
    pool_size: Option<usize>,
}

impl RunConfigBuilder {
    pub fn workers(mut self, n: usize) -> Self {
        self.worker_count = Some(n);
        self
    }

    pub fn iterations(mut self, n: usize) -> Self {
        self.iterations_per_worker = Some(n);
        self
    }

    pub fn randomize_order(mut self, on: bool) -> Self {
        self.randomize_order = on;
        self
    }

    pub fn sanity_check_first(mut self, on: bool) -> Self {
        self.sanity_check_first = on;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn maybe_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Defaults to the worker count
    pub fn pool_size(mut self, n: usize) -> Self {
        self.pool_size = Some(n);
        self
    }

    pub fn build(self) -> Result<RunConfig, SchedulingError> {
        let worker_count = self.worker_count.unwrap_or(1);
        let iterations_per_worker = self.iterations_per_worker.unwrap_or(1);
        if worker_count == 0 {
            return Err(SchedulingError::NoWorkers);
        }
        if iterations_per_worker == 0 {
            return Err(SchedulingError::NoIterations);
        }
        Ok(RunConfig {
            worker_count,
            iterations_per_worker,
            randomize_order: self.randomize_order,
            sanity_check_first: self.sanity_check_first,
            seed: self.seed,
            pool_size: self.pool_size.unwrap_or(worker_count),
        })
    }
}

// ============================================================
// APPLICATION CONFIGURATION (config/<env>.yaml)
// ============================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub run: RunSettings,
    pub executor: ExecutorSettings,
    /// YAML suite files to register
    #[serde(default)]
    pub suites: Vec<String>,
    /// Cache regions flushed before the run starts
    #[serde(default)]
    pub flush_regions: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_output_dir() -> String {
    "output".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunSettings {
    pub worker_count: usize,
    pub iterations_per_worker: usize,
    #[serde(default)]
    pub randomize_order: bool,
    #[serde(default = "default_true")]
    pub sanity_check_first: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub pool_size: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            worker_count: 5,
            iterations_per_worker: 20,
            randomize_order: true,
            sanity_check_first: true,
            seed: None,
            pool_size: None,
        }
    }
}

impl RunSettings {
    pub fn to_builder(&self) -> RunConfigBuilder {
        let builder = RunConfig::builder()
            .workers(self.worker_count)
            .iterations(self.iterations_per_worker)
            .randomize_order(self.randomize_order)
            .sanity_check_first(self.sanity_check_first)
            .maybe_seed(self.seed);
        match self.pool_size {
            Some(n) => builder.pool_size(n),
            None => builder,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecutorSettings {
    pub url: String,
    #[serde(default)]
    pub flush_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Engine properties sent with every query
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl ExecutorSettings {
    pub fn http_config(&self) -> HttpExecutorConfig {
        HttpExecutorConfig {
            url: self.url.clone(),
            flush_url: self.flush_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&content, &config_path)
    }

    pub fn from_yaml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        if config.executor.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "executor.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(config)
    }
}
