//! Bounded differential evolution.
//!
//! A population-based global minimizer over a box, using the `best1bin`
//! strategy. The population lives in the unit hypercube and is scaled onto
//! the box whenever the cost function is evaluated.
//!
//! # Algorithm
//!
//! 1. Latin-hypercube initialization: each axis is split into `M` equal
//!    strata and every member gets one stratum per axis, shuffled
//!    independently per axis.
//! 2. Each generation draws a mutation factor uniformly from the dither
//!    range. For every member `i`, two other distinct members `r0, r1` are
//!    picked and the mutant `best + F · (r0 − r1)` is crossed with member
//!    `i` binomially (one coordinate is always taken from the mutant).
//!    Coordinates that leave the unit cube are re-drawn uniformly.
//! 3. A trial replaces its parent when its energy is not worse, and becomes
//!    the new best when it is strictly better.
//! 4. The run has converged when the population's energies satisfy
//!    `std ≤ atol + tol · |mean|`.

use crate::error::{Error, Result};
use crate::rng::SplitMix64;

/// Tuning knobs for [`DifferentialEvolution`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionConfig {
    /// Population size as a multiple of the problem dimension.
    pub population_factor: usize,
    /// Generation budget.
    pub max_generations: usize,
    /// Relative convergence tolerance.
    pub tolerance: f64,
    /// Absolute convergence tolerance.
    pub absolute_tolerance: f64,
    /// Range the per-generation mutation factor is drawn from.
    pub mutation: (f64, f64),
    /// Crossover probability.
    pub recombination: f64,
    pub seed: u64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_factor: 25,
            max_generations: 10_000,
            tolerance: 0.01,
            absolute_tolerance: 0.0,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            seed: 0,
        }
    }
}

/// Result of one minimization.
#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    pub x: Vec<f64>,
    pub cost: f64,
    pub generations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub message: String,
}

/// Differential evolution minimizer.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    config: EvolutionConfig,
}

impl DifferentialEvolution {
    pub fn new(config: EvolutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Minimize `cost` over `bounds`.
    ///
    /// Errors from `cost` abort the run. Running out of generations is not an
    /// error; it is reported through [`EvolutionOutcome::converged`].
    pub fn minimize<C>(&self, bounds: &[(f64, f64)], mut cost: C) -> Result<EvolutionOutcome>
    where
        C: FnMut(&[f64]) -> Result<f64>,
    {
        let dimension = bounds.len();
        if dimension == 0 {
            return Err(Error::InvalidConfiguration(
                "differential evolution needs at least one dimension".to_string(),
            ));
        }
        if let Some((i, _)) = bounds
            .iter()
            .enumerate()
            .find(|(_, (lower, upper))| !(lower < upper) || !lower.is_finite() || !upper.is_finite())
        {
            return Err(Error::InvalidConfiguration(format!(
                "differential evolution bound {} is not a finite, non-empty interval",
                i
            )));
        }

        let config = &self.config;
        let members = (config.population_factor * dimension).max(5);
        let mut rng = SplitMix64::new(config.seed);

        let scale = |unit: &[f64], out: &mut Vec<f64>| {
            out.clear();
            out.extend(
                unit.iter()
                    .zip(bounds)
                    .map(|(u, (lower, upper))| lower + u * (upper - lower)),
            );
        };

        let mut population = latin_hypercube(&mut rng, members, dimension);
        let mut energies = Vec::with_capacity(members);
        let mut point = Vec::with_capacity(dimension);
        let mut evaluations = 0;

        for member in &population {
            scale(member, &mut point);
            energies.push(cost(&point)?);
            evaluations += 1;
        }

        // Keep the best member at index 0
        let best = argmin(&energies);
        population.swap(0, best);
        energies.swap(0, best);

        let mut trial = vec![0.0; dimension];
        let mut generations = 0;
        let mut converged = false;

        while generations < config.max_generations {
            generations += 1;
            let factor = rng.range(config.mutation.0, config.mutation.1);

            for candidate in 0..members {
                let (r0, r1) = pick_two_others(&mut rng, members, candidate);
                let fill = rng.index(dimension);

                for j in 0..dimension {
                    let crossover = j == fill || rng.next_f64() < config.recombination;
                    trial[j] = if crossover {
                        population[0][j] + factor * (population[r0][j] - population[r1][j])
                    } else {
                        population[candidate][j]
                    };
                    if !(0.0..=1.0).contains(&trial[j]) {
                        trial[j] = rng.next_f64();
                    }
                }

                scale(&trial, &mut point);
                let energy = cost(&point)?;
                evaluations += 1;

                if energy <= energies[candidate] {
                    population[candidate].copy_from_slice(&trial);
                    energies[candidate] = energy;

                    if energy < energies[0] {
                        population.swap(0, candidate);
                        energies.swap(0, candidate);
                    }
                }
            }

            if has_converged(&energies, config.tolerance, config.absolute_tolerance) {
                converged = true;
                break;
            }
        }

        scale(&population[0], &mut point);
        let message = if converged {
            "Optimization terminated successfully.".to_string()
        } else {
            "Maximum number of iterations has been exceeded.".to_string()
        };

        Ok(EvolutionOutcome {
            x: point,
            cost: energies[0],
            generations,
            evaluations,
            converged,
            message,
        })
    }
}

/// Stratified initial population in the unit cube.
fn latin_hypercube(rng: &mut SplitMix64, members: usize, dimension: usize) -> Vec<Vec<f64>> {
    let segment = 1.0 / members as f64;
    let mut population = vec![vec![0.0; dimension]; members];
    let mut order: Vec<usize> = (0..members).collect();

    for j in 0..dimension {
        rng.shuffle(&mut order);
        for (stratum, &member) in order.iter().enumerate() {
            population[member][j] = (stratum as f64 + rng.next_f64()) * segment;
        }
    }
    population
}

/// Two distinct member indices, both different from `candidate`.
fn pick_two_others(rng: &mut SplitMix64, members: usize, candidate: usize) -> (usize, usize) {
    let mut r0 = rng.index(members);
    while r0 == candidate {
        r0 = rng.index(members);
    }
    let mut r1 = rng.index(members);
    while r1 == candidate || r1 == r0 {
        r1 = rng.index(members);
    }
    (r0, r1)
}

fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold(0, |best, (i, v)| if *v < values[best] { i } else { best })
}

fn has_converged(energies: &[f64], tolerance: f64, absolute_tolerance: f64) -> bool {
    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    let variance = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() <= absolute_tolerance + tolerance * mean.abs()
}
