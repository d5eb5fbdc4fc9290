//! Sharded fan-out over targets with in-order reassembly.
//!
//! Work is split into contiguous shards of target indices, one task per
//! shard. With more than one worker the shards run on a dedicated rayon pool;
//! results are gathered in shard order, so the concatenated output lines up
//! with the input. The first failing shard fails the whole call, and
//! outstanding shards are abandoned.

use std::ops::Range;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::ZfindError;

pub struct WorkerPool {
    ncpu: usize,
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    /// A pool of `ncpu` workers; `ncpu <= 1` runs shards inline.
    pub fn new(ncpu: usize) -> Result<Self, ZfindError> {
        let ncpu = ncpu.max(1);
        let pool = if ncpu > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(ncpu)
                    .thread_name(|i| format!("zfind-worker-{i}"))
                    .build()
                    .map_err(|e| ZfindError::Engine(format!("failed to start worker pool: {e}")))?,
            )
        } else {
            None
        };
        Ok(Self { ncpu, pool })
    }

    pub fn ncpu(&self) -> usize {
        self.ncpu
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Run `task` over contiguous shards of `0..n` and concatenate the results.
    ///
    /// Each task must return exactly one item per index of its shard. On
    /// failure the error is returned together with the failing shard's range.
    pub fn map_shards<R, F>(&self, n: usize, task: F) -> Result<Vec<R>, (Range<usize>, ZfindError)>
    where
        R: Send,
        F: Fn(Range<usize>) -> Result<Vec<R>, ZfindError> + Sync,
    {
        let shards = split_even(n, self.ncpu);
        let run = |range: &Range<usize>| -> Result<Vec<R>, (Range<usize>, ZfindError)> {
            let out = task(range.clone()).map_err(|e| (range.clone(), e))?;
            if out.len() != range.len() {
                let err = ZfindError::Engine(format!(
                    "returned {} results for {} targets",
                    out.len(),
                    range.len()
                ));
                return Err((range.clone(), err));
            }
            Ok(out)
        };

        let parts: Vec<Vec<R>> = match &self.pool {
            Some(pool) => pool.install(|| shards.par_iter().map(run).collect::<Result<Vec<_>, _>>())?,
            None => shards.iter().map(run).collect::<Result<Vec<_>, _>>()?,
        };
        Ok(parts.into_iter().flatten().collect())
    }
}

/// Split `0..n` into at most `parts` contiguous, near-equal ranges; the first
/// `n % parts` ranges get one extra element.
pub fn split_even(n: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1).min(n.max(1));
    let base = n / parts;
    let extra = n % parts;
    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let len = base + usize::from(i < extra);
        out.push(start..start + len);
        start += len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_even_covers_range_contiguously() {
        assert_eq!(split_even(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(split_even(2, 8), vec![0..1, 1..2]);
        assert_eq!(split_even(0, 4), vec![0..0]);
    }

    #[test]
    fn parallel_results_keep_input_order() {
        let pool = WorkerPool::new(4).unwrap();
        assert!(pool.is_parallel());
        let out = pool
            .map_shards(103, |range| Ok(range.map(|i| i * 2).collect()))
            .unwrap();
        assert_eq!(out, (0..103).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn failing_shard_fails_the_call() {
        let pool = WorkerPool::new(3).unwrap();
        let err = pool
            .map_shards(9, |range| {
                if range.contains(&5) {
                    Err(ZfindError::Engine("boom".to_string()))
                } else {
                    Ok(range.collect::<Vec<_>>())
                }
            })
            .unwrap_err();
        assert_eq!(err.0, 3..6);
        assert!(matches!(err.1, ZfindError::Engine(_)));
    }

    #[test]
    fn short_shard_output_is_an_error() {
        let pool = WorkerPool::new(1).unwrap();
        let err = pool.map_shards(4, |_| Ok(vec![0u8])).unwrap_err();
        assert_eq!(err.0, 0..4);
    }
}
