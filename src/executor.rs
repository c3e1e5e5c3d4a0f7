//! Executor boundary
//!
//! The engine under test is reached only through [`Executor`] (run one query,
//! get its canonical result text) and, for setup code, [`CacheController`].
//! Runners never flush caches themselves.
//!
//! Implementations:
//! - [`HttpExecutor`] - POSTs queries to a running engine, with a per-call
//!   timeout so one wedged call cannot stall a run forever
//! - [`FixtureExecutor`] - in-memory query → result map
//! - [`FnExecutor`] - wraps a closure (tests, fault injection)

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ExecutionError;
use crate::properties::PropertyStore;
use crate::workload::WorkloadCatalog;

/// Runs one query against the system under test
pub trait Executor: Send + Sync {
    fn execute(&self, query: &str) -> Result<String, ExecutionError>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, query: &str) -> Result<String, ExecutionError> {
        (**self).execute(query)
    }
}

/// Cache control used by setup code surrounding a run
pub trait CacheController: Send + Sync {
    fn flush(&self, region: &str) -> Result<(), ExecutionError>;
}

// ============================================================
// CLOSURE EXECUTOR
// ============================================================

pub struct FnExecutor<F> {
    f: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&str) -> Result<String, ExecutionError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Executor for FnExecutor<F>
where
    F: Fn(&str) -> Result<String, ExecutionError> + Send + Sync,
{
    fn execute(&self, query: &str) -> Result<String, ExecutionError> {
        (self.f)(query)
    }
}

// ============================================================
// FIXTURE EXECUTOR
// ============================================================

/// Answers from a fixed query → result map; unknown queries are engine errors
#[derive(Debug, Clone, Default)]
pub struct FixtureExecutor {
    results: FxHashMap<String, String>,
}

impl FixtureExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor that answers every workload in the catalog correctly
    pub fn from_catalog(catalog: &WorkloadCatalog) -> Self {
        let mut fixture = Self::new();
        for workload in catalog.iter() {
            fixture.insert(workload.query.clone(), workload.expected.clone());
        }
        fixture
    }

    pub fn insert(&mut self, query: impl Into<String>, result: impl Into<String>) {
        self.results.insert(query.into(), result.into());
    }

    pub fn with(mut self, query: impl Into<String>, result: impl Into<String>) -> Self {
        self.insert(query, result);
        self
    }
}

impl Executor for FixtureExecutor {
    fn execute(&self, query: &str) -> Result<String, ExecutionError> {
        self.results
            .get(query)
            .cloned()
            .ok_or_else(|| ExecutionError::Engine(format!("no fixture for query: {}", query)))
    }
}

// ============================================================
// HTTP EXECUTOR
// ============================================================

#[derive(Debug, Clone)]
pub struct HttpExecutorConfig {
    /// Endpoint accepting `{"query", "properties"}` and returning result text
    pub url: String,
    /// Endpoint accepting `{"region"}` to flush a cache region
    pub flush_url: Option<String>,
    /// Per-call timeout
    pub timeout: Duration,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    properties: BTreeMap<&'a str, &'a str>,
}

#[derive(Serialize)]
struct FlushRequest<'a> {
    region: &'a str,
}

/// Executor talking to an engine over HTTP.
///
/// Calls are blocking from the caller's point of view: each worker thread
/// drives its own request on the executor's private runtime. Must not be
/// used from inside another tokio runtime.
pub struct HttpExecutor {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    config: HttpExecutorConfig,
    properties: Arc<PropertyStore>,
}

impl HttpExecutor {
    pub fn new(
        config: HttpExecutorConfig,
        properties: Arc<PropertyStore>,
    ) -> Result<Self, ExecutionError> {
        info!(url = %config.url, timeout_ms = config.timeout.as_millis() as u64, "Initializing HTTP executor");

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ExecutionError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("http-executor")
            .enable_all()
            .build()
            .map_err(|e| ExecutionError::Transport(format!("Failed to start runtime: {}", e)))?;

        Ok(Self {
            client,
            runtime,
            config,
            properties,
        })
    }

    fn timeout_ms(&self) -> u64 {
        self.config.timeout.as_millis() as u64
    }

    fn map_reqwest(&self, e: reqwest::Error) -> ExecutionError {
        if e.is_timeout() {
            ExecutionError::Timeout {
                timeout_ms: self.timeout_ms(),
            }
        } else {
            ExecutionError::Transport(e.to_string())
        }
    }

    /// POST a JSON body and return the response text of a 2xx reply
    fn post<T: Serialize>(&self, url: &str, body: &T) -> Result<String, ExecutionError> {
        let request = self.client.post(url).json(body);
        let call = async {
            let response = request.send().await.map_err(|e| self.map_reqwest(e))?;
            let status = response.status();
            let text = response.text().await.map_err(|e| self.map_reqwest(e))?;
            if !status.is_success() {
                return Err(ExecutionError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }
            Ok(text)
        };

        self.runtime
            .block_on(async { tokio::time::timeout(self.config.timeout, call).await })
            .unwrap_or(Err(ExecutionError::Timeout {
                timeout_ms: self.timeout_ms(),
            }))
    }
}

impl Executor for HttpExecutor {
    fn execute(&self, query: &str) -> Result<String, ExecutionError> {
        let snapshot = self.properties.snapshot();
        let body = QueryRequest {
            query,
            properties: snapshot.iter().collect(),
        };
        self.post(&self.config.url, &body)
    }
}

impl CacheController for HttpExecutor {
    fn flush(&self, region: &str) -> Result<(), ExecutionError> {
        let url = self.config.flush_url.as_deref().ok_or_else(|| {
            ExecutionError::Engine("no flush endpoint configured".to_string())
        })?;
        debug!(region, "Flushing cache region");
        self.post(url, &FlushRequest { region }).map(|_| ())
    }
}
