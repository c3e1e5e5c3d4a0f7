//! Failure Aggregator
//!
//! Thread-safe sink for [`FailureRecord`]s produced by concurrent workers.
//!
//! # Lifecycle
//!
//! ```text
//!  writer phase:  N workers ──append(&self)──▶ SegQueue (lock-free, FIFO)
//!                                  │
//!                         all workers joined
//!                                  │
//!  reader phase:  drain(self) ──▶ Vec<FailureRecord>
//! ```
//!
//! `drain` takes the aggregator by value, so it cannot be called while any
//! worker still holds a reference: the two phases never overlap.
//!
//! Each `append` is a single linearizable push. A worker's own records keep
//! their push order; records of different workers interleave arbitrarily.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::SegQueue;

use crate::report::FailureRecord;

#[derive(Debug, Default)]
pub struct FailureAggregator {
    queue: SegQueue<FailureRecord>,
    appended: AtomicU64,
}

impl FailureAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one failure. Safe under unbounded concurrent calls.
    pub fn append(&self, record: FailureRecord) {
        self.queue.push(record);
        self.appended.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of records appended so far (exact once writers have stopped)
    pub fn len(&self) -> u64 {
        self.appended.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the aggregator, returning every record exactly once
    pub fn drain(self) -> Vec<FailureRecord> {
        let expected = self.appended.into_inner();
        let mut records = Vec::with_capacity(expected as usize);
        while let Some(record) = self.queue.pop() {
            records.push(record);
        }
        debug_assert_eq!(records.len() as u64, expected, "aggregator lost records");
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_drain_empty() {
        let agg = FailureAggregator::new();
        assert!(agg.is_empty());
        assert!(agg.drain().is_empty());
    }

    #[test]
    fn test_concurrent_append_no_loss_no_dup() {
        const WORKERS: usize = 8;
        const PER_WORKER: usize = 5_000;

        let agg = FailureAggregator::new();
        thread::scope(|s| {
            for w in 0..WORKERS {
                let agg = &agg;
                s.spawn(move || {
                    for i in 0..PER_WORKER {
                        agg.append(FailureRecord::mismatch("q", w, i, String::new()));
                    }
                });
            }
        });

        assert_eq!(agg.len(), (WORKERS * PER_WORKER) as u64);
        let records = agg.drain();
        assert_eq!(records.len(), WORKERS * PER_WORKER);

        let mut seen = std::collections::HashSet::new();
        for r in &records {
            assert!(seen.insert((r.worker_id, r.iteration_index)), "duplicate record");
        }
    }

    #[test]
    fn test_per_worker_order_preserved() {
        let agg = FailureAggregator::new();
        thread::scope(|s| {
            for w in 0..4 {
                let agg = &agg;
                s.spawn(move || {
                    for i in 0..1_000 {
                        agg.append(FailureRecord::mismatch("q", w, i, String::new()));
                    }
                });
            }
        });

        let records = agg.drain();
        for w in 0..4 {
            let iters: Vec<usize> = records
                .iter()
                .filter(|r| r.worker_id == w)
                .map(|r| r.iteration_index)
                .collect();
            assert_eq!(iters, (0..1_000).collect::<Vec<_>>());
        }
    }
}
