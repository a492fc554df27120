//! Monte Carlo yield estimation.
//!
//! Every sample draws each parameter independently from its normal
//! distribution, verifies the resulting parameter set and counts the
//! outcome. Work is divided into near-equal chunks, one per worker; every
//! worker owns its verifier and a random stream seeded from the run seed,
//! the call's batch number and its worker index. Chunk tallies are summed
//! once every worker has finished.

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parameters::ParameterSet;
use crate::pool::{check_workers, run_with_verifiers};
use crate::rng::{derive_seed, gaussian_scaled};
use crate::verifier::{Verifier, VerifierFactory};

/// Running count of passing and failing samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldTally {
    success: usize,
    failure: usize,
}

impl YieldTally {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_success(&mut self) {
        self.success += 1;
    }

    #[inline]
    pub fn add_failure(&mut self) {
        self.failure += 1;
    }

    /// Record one outcome.
    #[inline]
    pub fn add_event(&mut self, did_succeed: bool) {
        if did_succeed {
            self.add_success();
        } else {
            self.add_failure();
        }
    }

    /// Fold another tally into this one.
    #[inline]
    pub fn merge(&mut self, other: &Self) {
        self.success += other.success;
        self.failure += other.failure;
    }

    pub fn num_success(&self) -> usize {
        self.success
    }

    pub fn num_failure(&self) -> usize {
        self.failure
    }

    pub fn num_total(&self) -> usize {
        self.success + self.failure
    }

    /// Fraction of passing samples, in [0, 1].
    pub fn percentage(&self) -> Result<f64> {
        if self.num_total() == 0 {
            return Err(Error::NoSamples);
        }
        Ok(self.success as f64 / self.num_total() as f64)
    }
}

/// Independent normal variation of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalDistribution {
    pub mean: f64,
    pub variance: f64,
}

impl NormalDistribution {
    pub fn new(mean: f64, variance: f64) -> Self {
        Self { mean, variance }
    }

    #[inline]
    pub fn sigma(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Sample at the given stream coordinates.
    #[inline]
    pub fn sample(&self, seed: u64, sample_idx: u32, param_idx: u32) -> f64 {
        gaussian_scaled(seed, sample_idx, param_idx, self.mean, self.sigma())
    }
}

/// Split `total` samples into `workers` near-equal chunks.
///
/// The remainder goes to the first chunks, one extra sample each.
pub fn split_work(total: usize, workers: usize) -> Vec<usize> {
    if workers == 0 {
        return Vec::new();
    }
    let per_worker = total / workers;
    let remainder = total % workers;
    (0..workers)
        .map(|i| per_worker + usize::from(i < remainder))
        .collect()
}

/// Monte Carlo yield analysis over a set of parameter distributions.
pub struct YieldAnalysis<F: VerifierFactory> {
    factory: F,
    distributions: IndexMap<String, NormalDistribution>,
    tally: YieldTally,
    seed: u64,
    batches: u32,
}

impl<F: VerifierFactory> YieldAnalysis<F> {
    /// Create an analysis seeded from the wall clock.
    pub fn new(factory: F, distributions: IndexMap<String, NormalDistribution>) -> Result<Self> {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::with_seed(factory, distributions, seed)
    }

    /// Create an analysis with an explicit run seed.
    pub fn with_seed(
        factory: F,
        distributions: IndexMap<String, NormalDistribution>,
        seed: u64,
    ) -> Result<Self> {
        for (name, distribution) in &distributions {
            let variance_ok = distribution.variance.is_finite() && distribution.variance >= 0.0;
            if !variance_ok || !distribution.mean.is_finite() {
                return Err(Error::InvalidConfiguration(format!(
                    "{}: distribution needs a finite mean and non-negative variance",
                    name
                )));
            }
        }

        Ok(Self {
            factory,
            distributions,
            tally: YieldTally::new(),
            seed,
            batches: 0,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tally(&self) -> &YieldTally {
        &self.tally
    }

    pub fn num_success(&self) -> usize {
        self.tally.num_success()
    }

    pub fn num_failure(&self) -> usize {
        self.tally.num_failure()
    }

    pub fn num_total(&self) -> usize {
        self.tally.num_total()
    }

    pub fn percentage(&self) -> Result<f64> {
        self.tally.percentage()
    }

    /// Draw `total_samples` samples on `workers` workers and add them to the
    /// running tally.
    ///
    /// Nothing is added when any worker fails.
    pub fn sample(&mut self, total_samples: usize, workers: usize) -> Result<()> {
        check_workers(workers)?;

        check_index_range("worker", workers)?;
        let chunks: Vec<(u32, usize)> = split_work(total_samples, workers)
            .into_iter()
            .enumerate()
            .map(|(worker, count)| {
                check_index_range("samples per worker", count)?;
                Ok((worker as u32, count))
            })
            .collect::<Result<_>>()?;

        let batch = self.batches;
        self.batches = self.batches.wrapping_add(1);

        log::info!(
            "Yield analysis: {} samples on {} workers (seed {}, batch {})",
            total_samples,
            workers,
            self.seed,
            batch
        );

        let seed = self.seed;
        let distributions = &self.distributions;
        let tallies = run_with_verifiers(&self.factory, workers, &chunks, |verifier, &(worker, count)| {
            sample_chunk(verifier, distributions, derive_seed(seed, batch, worker), count)
        })?;

        let mut batch_tally = YieldTally::new();
        for tally in &tallies {
            batch_tally.merge(tally);
        }
        self.tally.merge(&batch_tally);

        log::debug!(
            "Batch {}: {} / {} passed",
            batch,
            batch_tally.num_success(),
            batch_tally.num_total()
        );

        Ok(())
    }
}

/// Sample and worker indices feed the `u32` counters of the hash stream.
fn check_index_range(what: &str, count: usize) -> Result<()> {
    if u32::try_from(count).is_err() {
        return Err(Error::InvalidConfiguration(format!(
            "{} count {} exceeds {}",
            what,
            count,
            u32::MAX
        )));
    }
    Ok(())
}

/// Draw and verify `count` samples from one seeded stream.
fn sample_chunk<V: Verifier>(
    verifier: &mut V,
    distributions: &IndexMap<String, NormalDistribution>,
    seed: u64,
    count: usize,
) -> Result<YieldTally> {
    let mut tally = YieldTally::new();
    let mut parameters: ParameterSet = distributions
        .iter()
        .map(|(name, distribution)| (name.clone(), distribution.mean))
        .collect();

    for sample_idx in 0..count {
        for (param_idx, (_, distribution)) in distributions.iter().enumerate() {
            let value = distribution.sample(seed, sample_idx as u32, param_idx as u32);
            if let Some(slot) = parameters.get_index_mut(param_idx) {
                *slot.1 = value;
            }
        }
        tally.add_event(verifier.verify(&parameters)?);
    }

    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::VerifierError;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_tally_percentage() {
        let mut tally = YieldTally::new();
        assert!(matches!(tally.percentage(), Err(Error::NoSamples)));

        tally.add_event(true);
        tally.add_event(true);
        tally.add_event(false);
        tally.add_success();

        assert_eq!(tally.num_success(), 3);
        assert_eq!(tally.num_failure(), 1);
        assert_eq!(tally.num_total(), 4);
        assert!((tally.percentage().unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_tally_merge() {
        let mut a = YieldTally::new();
        a.add_success();
        let mut b = YieldTally::new();
        b.add_failure();
        b.add_failure();

        a.merge(&b);
        assert_eq!(a.num_success(), 1);
        assert_eq!(a.num_failure(), 2);
    }

    #[test]
    fn test_split_work() {
        assert_eq!(split_work(10, 3), vec![4, 3, 3]);
        assert_eq!(split_work(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_work(12, 4), vec![3, 3, 3, 3]);
        assert_eq!(split_work(7, 1), vec![7]);
        assert!(split_work(7, 0).is_empty());
        assert_eq!(split_work(1001, 8).iter().sum::<usize>(), 1001);
    }

    #[test]
    fn test_distribution_sigma() {
        let distribution = NormalDistribution::new(10.0, 4.0);
        assert_eq!(distribution.sigma(), 2.0);

        let degenerate = NormalDistribution::new(3.5, 0.0);
        for i in 0..50 {
            assert_eq!(degenerate.sample(11, i, 0), 3.5);
        }
    }

    struct Below {
        limit: f64,
    }

    impl Verifier for Below {
        fn verify(&mut self, parameters: &ParameterSet) -> std::result::Result<bool, VerifierError> {
            Ok(parameters["x"] < self.limit)
        }
    }

    impl VerifierFactory for Below {
        type Verifier = Below;

        fn create(&self) -> std::result::Result<Below, VerifierError> {
            Ok(Below { limit: self.limit })
        }
    }

    fn distributions(mean: f64, variance: f64) -> IndexMap<String, NormalDistribution> {
        let mut map = IndexMap::new();
        map.insert("x".to_string(), NormalDistribution::new(mean, variance));
        map
    }

    #[test]
    fn test_index_range() {
        assert!(check_index_range("samples per worker", u32::MAX as usize).is_ok());
        let err = check_index_range("samples per worker", u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(ref m) if m.contains("samples per worker")));
    }

    #[test]
    fn test_rejects_negative_variance() {
        let result = YieldAnalysis::with_seed(Below { limit: 0.0 }, distributions(1.0, -1.0), 1);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_same_seed_reproduces() {
        let mut a = YieldAnalysis::with_seed(Below { limit: 0.0 }, distributions(0.0, 1.0), 99).unwrap();
        let mut b = YieldAnalysis::with_seed(Below { limit: 0.0 }, distributions(0.0, 1.0), 99).unwrap();

        a.sample(500, 3).unwrap();
        b.sample(500, 3).unwrap();

        assert_eq!(a.tally(), b.tally());
        assert_eq!(a.num_total(), 500);
    }

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<f64>>>,
    }

    impl Verifier for Recorder {
        fn verify(&mut self, parameters: &ParameterSet) -> std::result::Result<bool, VerifierError> {
            self.seen.lock().unwrap().push(parameters["x"]);
            Ok(true)
        }
    }

    impl VerifierFactory for Recorder {
        type Verifier = Recorder;

        fn create(&self) -> std::result::Result<Recorder, VerifierError> {
            Ok(self.clone())
        }
    }

    #[test]
    fn test_successive_batches_draw_fresh_samples() {
        let recorder = Recorder::default();
        let mut analysis =
            YieldAnalysis::with_seed(recorder.clone(), distributions(0.0, 1.0), 5).unwrap();

        analysis.sample(20, 1).unwrap();
        analysis.sample(20, 1).unwrap();
        assert_eq!(analysis.num_total(), 40);
        assert!((analysis.percentage().unwrap() - 1.0).abs() < 1e-12);

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 40);
        assert_ne!(&seen[..20], &seen[20..]);
    }

    #[test]
    fn test_zero_samples_leave_tally_empty() {
        let mut analysis =
            YieldAnalysis::with_seed(Below { limit: 0.0 }, distributions(0.0, 1.0), 5).unwrap();
        analysis.sample(0, 2).unwrap();
        assert_eq!(analysis.num_total(), 0);
        assert!(matches!(analysis.percentage(), Err(Error::NoSamples)));
    }
}
