//! Rayon-based parallelisation utilities.
//!
//! Stages map exposure rows independently once group totals have been
//! gathered, so switching between the sequential and parallel paths never
//! changes results.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Batch size for parallel processing.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Row count below which stages stay sequential.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 2_000;

/// Configuration for parallel execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Batch size for chunked processing
    pub batch_size: usize,
    /// Minimum items before using parallelism
    pub parallel_threshold: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl ParallelConfig {
    /// Creates a new parallel configuration.
    pub fn new(batch_size: usize, parallel_threshold: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            parallel_threshold,
        }
    }

    /// Forces the sequential path regardless of row count.
    pub fn sequential() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, usize::MAX)
    }

    /// Returns whether to use parallel processing for the given item count.
    #[inline]
    pub fn should_parallelize(&self, n_items: usize) -> bool {
        n_items >= self.parallel_threshold
    }

    /// Consumes `items`, mapping each through `mapper`, in parallel when
    /// the row count reaches the threshold. Order is preserved.
    pub fn map_owned<T, R, F>(&self, items: Vec<T>, mapper: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        if self.should_parallelize(items.len()) {
            items
                .into_par_iter()
                .with_min_len(self.batch_size.max(1))
                .map(mapper)
                .collect()
        } else {
            items.into_iter().map(mapper).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parallelize() {
        let config = ParallelConfig::new(10, 50);
        assert!(!config.should_parallelize(49));
        assert!(config.should_parallelize(50));
        assert!(!ParallelConfig::sequential().should_parallelize(1_000_000));
    }

    #[test]
    fn test_new_clamps_batch_size() {
        assert_eq!(ParallelConfig::new(0, 10).batch_size, 1);
    }

    #[test]
    fn test_map_owned_paths_agree() {
        let items: Vec<u64> = (0..5_000).collect();
        let par = ParallelConfig::new(64, 1).map_owned(items.clone(), |x| x * x);
        let seq = ParallelConfig::sequential().map_owned(items, |x| x * x);
        assert_eq!(par, seq);
    }
}
