//! Reproducible random numbers for Monte Carlo sampling and candidate search.
//!
//! Two flavours share one hash function:
//!
//! - A stateless, counter-based generator: each value is computed from its
//!   coordinates `(seed, sample_idx, param_idx)`. Workers never share a
//!   generator and never need to synchronise; a worker's whole sample stream
//!   is fixed by the seed it was handed.
//! - [`SplitMix64`], a small stateful stream for sequential algorithms such
//!   as differential evolution.
//!
//! Gaussian values use the Box-Muller transform over two uniform draws.

use std::f64::consts::PI;

/// SplitMix64 mixing function.
#[inline]
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

/// Combine a seed with two indices into a unique hash input.
#[inline]
pub fn combine_indices(seed: u64, sample_idx: u32, param_idx: u32) -> u64 {
    seed ^ (sample_idx as u64).wrapping_mul(0x517cc1b727220a95)
        ^ (param_idx as u64).wrapping_mul(0x5851f42d4c957f2d)
}

/// Derive an independent seed for one unit of work.
///
/// Used to give every Monte Carlo worker (and every batch of work) its own
/// stream from a single run-level seed.
#[inline]
pub fn derive_seed(seed: u64, batch: u32, worker: u32) -> u64 {
    splitmix64(combine_indices(splitmix64(seed), batch, worker))
}

/// Uniform f64 in [0, 1) from hash coordinates.
#[inline]
pub fn uniform(seed: u64, sample_idx: u32, param_idx: u32) -> f64 {
    let hash = splitmix64(combine_indices(seed, sample_idx, param_idx));
    // Upper 53 bits fill the f64 mantissa
    (hash >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

/// Standard normal value from hash coordinates.
///
/// `param_idx * 2` and `param_idx * 2 + 1` provide the two uniform sources.
#[inline]
pub fn gaussian(seed: u64, sample_idx: u32, param_idx: u32) -> f64 {
    let u1 = uniform(seed, sample_idx, param_idx.wrapping_mul(2));
    let u2 = uniform(seed, sample_idx, param_idx.wrapping_mul(2).wrapping_add(1));

    // Avoid log(0)
    let u1 = u1.max(1e-10);

    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Normal value with the given mean and standard deviation.
#[inline]
pub fn gaussian_scaled(seed: u64, sample_idx: u32, param_idx: u32, mean: f64, sigma: f64) -> f64 {
    mean + gaussian(seed, sample_idx, param_idx) * sigma
}

/// Stateful SplitMix64 stream.
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    /// Create a stream from a seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next raw 64-bit value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let z = splitmix64(self.state);
        self.state = self.state.wrapping_add(0x9e3779b97f4a7c15);
        z
    }

    /// Uniform f64 in [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform f64 in [low, high).
    #[inline]
    pub fn range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Uniform index in [0, n). `n` must be non-zero.
    #[inline]
    pub fn index(&mut self, n: usize) -> usize {
        // Multiply-shift reduction onto [0, n)
        ((self.next_u64() as u128 * n as u128) >> 64) as usize
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.index(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_a_pure_function() {
        let first: Vec<u64> = (0..16).map(splitmix64).collect();
        let second: Vec<u64> = (0..16).map(splitmix64).collect();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_uniform_stays_in_unit_interval() {
        let within = (0..500u32)
            .flat_map(|sample| (0..8u32).map(move |param| uniform(3, sample, param)))
            .all(|u| (0.0..1.0).contains(&u));
        assert!(within);
    }

    #[test]
    fn test_sample_and_parameter_indices_decorrelate() {
        let base = uniform(11, 4, 2);
        assert_ne!(base, uniform(11, 5, 2));
        assert_ne!(base, uniform(11, 4, 3));
        assert_ne!(base, uniform(12, 4, 2));
    }

    #[test]
    fn test_derive_seed_distinguishes_workers_and_batches() {
        let a = derive_seed(7, 0, 0);
        assert_eq!(a, derive_seed(7, 0, 0));
        assert_ne!(a, derive_seed(7, 0, 1));
        assert_ne!(a, derive_seed(7, 1, 0));
        assert_ne!(a, derive_seed(8, 0, 0));
    }

    #[test]
    fn test_gaussian_moments() {
        let n = 20_000u32;
        let draws: Vec<f64> = (0..n).map(|i| gaussian(2024, i, 1)).collect();

        let mean = draws.iter().sum::<f64>() / n as f64;
        let sigma = (draws.iter().map(|z| (z - mean) * (z - mean)).sum::<f64>() / n as f64).sqrt();
        assert!(mean.abs() < 0.04, "mean {}", mean);
        assert!((sigma - 1.0).abs() < 0.04, "sigma {}", sigma);

        let beyond_two = draws.iter().filter(|z| z.abs() > 2.0).count() as f64 / n as f64;
        assert!((beyond_two - 0.0455).abs() < 0.01, "tail {}", beyond_two);
    }

    #[test]
    fn test_gaussian_scaled_zero_sigma_is_mean() {
        for i in 0..100 {
            assert_eq!(gaussian_scaled(9, i, 3, 42.0, 0.0), 42.0);
        }
    }

    #[test]
    fn test_stream_steps_the_hash_input() {
        let mut rng = SplitMix64::new(42);
        for k in 0..8u64 {
            let input = 42u64.wrapping_add(k.wrapping_mul(0x9e3779b97f4a7c15));
            assert_eq!(rng.next_u64(), splitmix64(input));
        }
    }

    #[test]
    fn test_stream_range_and_index() {
        let mut rng = SplitMix64::new(1);
        for _ in 0..1000 {
            let x = rng.range(-2.0, 3.0);
            assert!((-2.0..3.0).contains(&x));
            assert!(rng.index(7) < 7);
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = SplitMix64::new(5);
        let mut items: Vec<usize> = (0..50).collect();
        rng.shuffle(&mut items);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(items, sorted);
    }
}
