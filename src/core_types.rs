//! Core types used throughout the harness
//!
//! Plain aliases that give semantic meaning to the indices flowing
//! between the runners, the aggregator and the reports.

/// Worker ID - index of a worker within one concurrent run.
///
/// # Constraints:
/// - Dense: `0..worker_count`
/// - Stable for the whole run (used to derive per-worker permutations)
pub type WorkerId = usize;

/// Zero-based pass number of a worker over the catalog.
pub type IterationIndex = usize;

/// Position of a workload inside its catalog.
pub type WorkloadIndex = usize;

/// Virtual user ID in a multi-user run
pub type VirtualUserId = usize;
