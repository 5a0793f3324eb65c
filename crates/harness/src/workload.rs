//! Workload generator
//!
//! Produces a reproducible stream of [`Operation`]s over the key domain
//! `[0, row_count)`. Each draw takes, in order: the key, the value suffix, and
//! the operation kind, all uniform. Values are `x0..x{row_count-1}`, so writes
//! repeat and updates are often no-ops in effect but never in execution path.
//!
//! The generator never looks at results; it only decides what to ask next.
//! Replaying a worker means building the same generator again:
//!
//! ```ignore
//! let ops: Vec<_> = WorkloadGenerator::for_worker(seed_base, 3, 3).take(100).collect();
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stress_core::Operation;

/// Number of operation kinds drawn from
const OPERATION_KINDS: u32 = 4;

/// Seeded, unbounded operation stream
#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    rng: StdRng,
    seed: u64,
    row_count: u32,
}

impl WorkloadGenerator {
    /// Generator for `seed` over `row_count` keys (at least one key)
    pub fn new(seed: u64, row_count: u32) -> Self {
        WorkloadGenerator {
            rng: StdRng::seed_from_u64(seed),
            seed,
            row_count: row_count.max(1),
        }
    }

    /// Generator of worker `worker`, seeded with `seed_base + worker`
    pub fn for_worker(seed_base: u64, worker: usize, row_count: u32) -> Self {
        Self::new(seed_base.wrapping_add(worker as u64), row_count)
    }

    /// Seed this generator was built with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Size of the key domain
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Draw the next operation
    pub fn next_operation(&mut self) -> Operation {
        let key = i64::from(self.rng.gen_range(0..self.row_count));
        let value = format!("x{}", self.rng.gen_range(0..self.row_count));
        match self.rng.gen_range(0..OPERATION_KINDS) {
            0 => Operation::Insert { key, value },
            1 => Operation::Update { key, value },
            2 => Operation::Delete { key },
            _ => Operation::PointQuery { key },
        }
    }
}

impl Iterator for WorkloadGenerator {
    type Item = Operation;

    fn next(&mut self) -> Option<Operation> {
        Some(self.next_operation())
    }
}

/// Bounded operation sequence for `seed`: the first `budget` operations
pub fn generate(seed: u64, row_count: u32, budget: usize) -> Vec<Operation> {
    WorkloadGenerator::new(seed, row_count)
        .take(budget)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_same_seed_same_sequence() {
        assert_eq!(generate(42, 3, 500), generate(42, 3, 500));
    }

    #[test]
    fn test_different_workers_get_different_streams() {
        let a: Vec<_> = WorkloadGenerator::for_worker(0, 0, 3).take(50).collect();
        let b: Vec<_> = WorkloadGenerator::for_worker(0, 1, 3).take(50).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_for_worker_offsets_seed() {
        let generator = WorkloadGenerator::for_worker(100, 7, 3);
        assert_eq!(generator.seed(), 107);
        assert_eq!(
            generator.take(20).collect::<Vec<_>>(),
            generate(107, 3, 20)
        );
    }

    #[test]
    fn test_all_kinds_and_keys_appear() {
        let ops = generate(1, 3, 1000);
        let kinds: HashSet<_> = ops.iter().map(Operation::name).collect();
        assert_eq!(kinds.len(), 4);
        let keys: HashSet<_> = ops.iter().map(Operation::key).collect();
        assert_eq!(keys, (0..3).collect::<HashSet<i64>>());
    }

    #[test]
    fn test_zero_row_count_clamped_to_one_key() {
        let generator = WorkloadGenerator::new(9, 0);
        assert_eq!(generator.row_count(), 1);
        assert!(generator.take(100).all(|op| op.key() == 0));
    }

    proptest! {
        #[test]
        fn prop_keys_and_values_stay_in_domain(seed in any::<u64>(), row_count in 1u32..16) {
            for op in generate(seed, row_count, 200) {
                prop_assert!(op.key() >= 0 && op.key() < i64::from(row_count));
                match op {
                    Operation::Insert { value, .. } | Operation::Update { value, .. } => {
                        let suffix: u32 = value.trim_start_matches('x').parse().unwrap();
                        prop_assert!(value.starts_with('x'));
                        prop_assert!(suffix < row_count);
                    }
                    Operation::Delete { .. } | Operation::PointQuery { .. } => {}
                }
            }
        }

        #[test]
        fn prop_generation_is_reproducible(seed in any::<u64>(), budget in 0usize..300) {
            prop_assert_eq!(generate(seed, 3, budget), generate(seed, 3, budget));
        }

        #[test]
        fn prop_prefix_is_stable(seed in any::<u64>(), short in 0usize..100) {
            let long = generate(seed, 3, short + 50);
            prop_assert_eq!(&long[..short], &generate(seed, 3, short)[..]);
        }
    }
}
