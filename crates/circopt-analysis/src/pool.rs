//! Fixed-size worker pools over independent units of work.
//!
//! Each unit only reads its input and calls a verifier. Units are divided
//! into one contiguous chunk per worker; a worker builds its own verifier from
//! the shared factory when it starts its chunk and keeps it until the chunk
//! is done, so no verifier ever crosses a worker boundary. The caller blocks
//! until every unit has completed and receives the results in input order,
//! ready for a sequential reduction.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::verifier::VerifierFactory;
use crate::yield_analysis::split_work;

/// Reject a zero worker count.
pub(crate) fn check_workers(workers: usize) -> Result<()> {
    if workers == 0 {
        return Err(Error::InvalidConfiguration(
            "worker count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Run `work` over every item on `workers` workers.
///
/// With a single worker everything runs on the calling thread using one
/// verifier. The first error aborts the batch and is returned unchanged.
pub(crate) fn run_with_verifiers<F, I, T, W>(
    factory: &F,
    workers: usize,
    items: &[I],
    work: W,
) -> Result<Vec<T>>
where
    F: VerifierFactory,
    I: Sync,
    T: Send,
    W: Fn(&mut F::Verifier, &I) -> Result<T> + Sync,
{
    check_workers(workers)?;

    if items.is_empty() {
        return Ok(Vec::new());
    }

    if workers == 1 {
        let mut verifier = factory.create()?;
        return items.iter().map(|item| work(&mut verifier, item)).collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::WorkerPool(e.to_string()))?;

    // One contiguous chunk per worker, so each worker creates exactly one
    // verifier
    let mut chunks: Vec<&[I]> = Vec::with_capacity(workers);
    let mut rest = items;
    for size in split_work(items.len(), workers) {
        let (chunk, tail) = rest.split_at(size);
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        rest = tail;
    }

    log::debug!(
        "Dispatching {} work items to {} workers",
        items.len(),
        chunks.len()
    );

    let results: Vec<Vec<T>> = pool.install(|| {
        chunks
            .par_iter()
            .map(|chunk| {
                let mut verifier = factory.create()?;
                chunk
                    .iter()
                    .map(|item| work(&mut verifier, item))
                    .collect::<Result<Vec<T>>>()
            })
            .collect::<Result<Vec<_>>>()
    })?;

    Ok(results.into_iter().flatten().collect())
}
