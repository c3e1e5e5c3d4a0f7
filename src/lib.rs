//! olap_stress - Concurrent Validation Harness
//!
//! Replays labeled OLAP queries against an engine under concurrent load and
//! collects every mismatch or fault without loss, duplication or corruption.
//! The engine itself is external and reached only through [`Executor`].
//!
//! # Modules
//!
//! - [`core_types`] - Index aliases (WorkerId, IterationIndex, ...)
//! - [`workload`] - Workload and the immutable WorkloadCatalog
//! - [`suite`] - Explicit suite registry and YAML suite loading
//! - [`executor`] - Executor / CacheController boundary and implementations
//! - [`properties`] - Caller-owned engine properties with scoped overrides
//! - [`compare`] - Result comparison (one leading line break tolerated)
//! - [`sanity`] - Single-threaded pre-flight gate
//! - [`aggregator`] - Lock-free failure sink
//! - [`task_group`] - Fixed-size scoped worker group
//! - [`order`] - Per-worker, per-pass permutations
//! - [`runner`] - Concurrent runner
//! - [`harness`] - Sanity gate + concurrent run
//! - [`multi_user`] - Virtual-user suite runner
//! - [`report`] - Failure records and run reports

// Core types - must be first!
pub mod core_types;

pub mod error;

// Workloads and the engine boundary
pub mod executor;
pub mod properties;
pub mod suite;
pub mod workload;

// Runners
pub mod aggregator;
pub mod compare;
pub mod harness;
pub mod multi_user;
pub mod order;
pub mod report;
pub mod runner;
pub mod sanity;
pub mod task_group;

// Ambient
pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use aggregator::FailureAggregator;
pub use config::{AppConfig, RunConfig};
pub use core_types::{IterationIndex, VirtualUserId, WorkerId, WorkloadIndex};
pub use error::{
    ConfigError, ErrorKind, ExecutionError, HarnessError, LoadError, SchedulingError,
};
pub use executor::{CacheController, Executor, FixtureExecutor, FnExecutor, HttpExecutor};
pub use harness::{Harness, HarnessOutcome};
pub use multi_user::{CatalogSuite, FnSuite, MultiUserResult, MultiUserTestRunner, TestCase, TestSuite};
pub use properties::{PropertyScope, PropertySnapshot, PropertyStore};
pub use report::{FailureRecord, RunReport};
pub use runner::ConcurrentRunner;
pub use sanity::{SanityReport, SanityRunner};
pub use suite::SuiteRegistry;
pub use workload::{Workload, WorkloadCatalog, WorkloadSource};
