//! Per-worker iteration order
//!
//! With randomization on, every worker draws its own permutation of catalog
//! indices for every pass; there is no shared shuffle. Seeded runs derive
//! each permutation from `(seed, worker_id, iteration_index)`, so two runs
//! with the same seed replay the same per-worker orders even though their
//! cross-worker interleaving differs.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::core_types::{IterationIndex, WorkerId, WorkloadIndex};

/// SplitMix64 finalizer
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive the RNG seed of one (worker, iteration) pass.
///
/// ```text
/// h = mix(seed)
/// h = mix(h ^ worker_id)
/// h = mix(h ^ iteration_index)
/// ```
pub fn derive_pass_seed(seed: u64, worker_id: WorkerId, iteration: IterationIndex) -> u64 {
    let h = mix64(seed);
    let h = mix64(h ^ worker_id as u64);
    mix64(h ^ iteration as u64)
}

/// How a worker orders the catalog on each pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPolicy {
    /// Catalog order every pass
    Sequential,
    /// Fresh permutation per pass, from the seed when given, else OS entropy
    Shuffled { seed: Option<u64> },
}

impl OrderPolicy {
    pub fn new(randomize: bool, seed: Option<u64>) -> Self {
        if randomize {
            OrderPolicy::Shuffled { seed }
        } else {
            OrderPolicy::Sequential
        }
    }

    pub fn pass_order(
        &self,
        len: usize,
        worker_id: WorkerId,
        iteration: IterationIndex,
    ) -> Vec<WorkloadIndex> {
        let mut indices: Vec<WorkloadIndex> = (0..len).collect();
        if let OrderPolicy::Shuffled { seed } = *self {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(derive_pass_seed(seed, worker_id, iteration)),
                None => StdRng::from_entropy(),
            };
            indices.shuffle(&mut rng);
        }
        indices
    }
}
