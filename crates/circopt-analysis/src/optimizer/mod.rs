//! Yield-aware parameter optimization.
//!
//! The optimizer keeps two point sets: guesses that passed verification and
//! failure points that failed it or sit on a measured margin boundary. It
//! repeatedly searches a small box around the best guess for the point
//! farthest (in relative terms) from every known failure, using the score in
//! [`score`] as the objective, verifies that candidate, and feeds what it
//! learns back into the two sets.
//!
//! # Main loop
//!
//! 1. Margin-analyze the starting point and record every boundary that did
//!    not reach its scan extreme as a failure point.
//! 2. Up to `max_iterations` times:
//!    - take the highest-scoring guess,
//!    - minimize `-score` over `[(1 - r)·x, (1 + r)·x]` (clipped to the
//!      parameter limits) with differential evolution,
//!    - verify the candidate; a failing candidate becomes a failure point,
//!    - otherwise margin-analyze it, add it as a guess and compare its
//!      estimated score with the score it has now that its own boundaries are
//!      known. The run converges when the estimate was off by less than
//!      `converge`.
//! 3. Report the best guess.

mod bounds;
mod evolution;
mod score;
mod state;

pub use bounds::{ParameterBounds, search_box};
pub use evolution::{DifferentialEvolution, EvolutionConfig, EvolutionOutcome};
pub use score::{check_positive, score};
pub use state::OptimizeState;

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::margin::{Direction, MarginAnalysis, MarginConfig};
use crate::parameters::{ParameterLayout, ParameterSet};
use crate::rng::derive_seed;
use crate::verifier::VerifierFactory;

/// Candidate search strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeMethod {
    /// Margin analysis combined with a surrogate-score global search.
    #[default]
    Hybrid,
}

/// Optimizer hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeConfig {
    pub method: OptimizeMethod,
    /// Relative half-width of the candidate box.
    pub search_radius: f64,
    /// Convergence threshold on the score estimation error.
    pub converge: f64,
    /// Maximum number of candidate proposals.
    pub max_iterations: usize,
    /// Seed for the candidate search. Taken from the wall clock when unset.
    pub seed: Option<u64>,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            method: OptimizeMethod::Hybrid,
            search_radius: 0.05,
            converge: 0.01,
            max_iterations: 1000,
            seed: None,
        }
    }
}

impl OptimizeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.search_radius > 0.0 && self.search_radius < 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "search_radius must lie in (0, 1), got {}",
                self.search_radius
            )));
        }
        if !self.converge.is_finite() {
            return Err(Error::InvalidConfiguration(
                "converge must be finite".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfiguration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Final result of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizeOutcome {
    /// Best guess found.
    pub point: ParameterSet,
    /// Score of the best guess against the final failure cloud.
    pub score: f64,
    /// Candidate proposals made.
    pub iterations: usize,
    pub converged: bool,
    /// Size of the guess history.
    pub guesses: usize,
    /// Size of the failure point cloud.
    pub failure_points: usize,
}

/// Iterative yield-aware optimizer.
pub struct Optimizer<F: VerifierFactory> {
    margin: MarginAnalysis<F>,
    config: OptimizeConfig,
    evolution: EvolutionConfig,
    layout: ParameterLayout,
    bounds: Vec<ParameterBounds>,
    state: OptimizeState,
    margin_workers: usize,
    seed: u64,
}

impl<F: VerifierFactory> Optimizer<F> {
    /// Create an optimizer over the parameters in `bounds`, in that order.
    pub fn new(
        factory: F,
        margin_config: MarginConfig,
        config: OptimizeConfig,
        bounds: IndexMap<String, ParameterBounds>,
    ) -> Result<Self> {
        config.validate()?;
        if bounds.is_empty() {
            return Err(Error::InvalidConfiguration(
                "optimization needs at least one parameter".to_string(),
            ));
        }
        for (name, bound) in &bounds {
            bound.validate(name)?;
        }

        let layout = ParameterLayout::new(bounds.keys().cloned());
        let margin_workers = default_margin_workers(layout.len());
        let seed = config.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        });

        Ok(Self {
            margin: MarginAnalysis::new(factory, margin_config)?,
            config,
            evolution: EvolutionConfig::default(),
            state: OptimizeState::new(layout.len()),
            bounds: bounds.into_values().collect(),
            layout,
            margin_workers,
            seed,
        })
    }

    /// Set the number of margin analysis workers.
    pub fn with_margin_workers(mut self, workers: usize) -> Self {
        self.margin_workers = workers;
        self
    }

    /// Replace the candidate search settings. The seed is managed per
    /// iteration and is ignored.
    pub fn with_evolution(mut self, evolution: EvolutionConfig) -> Self {
        self.evolution = evolution;
        self
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    pub fn state(&self) -> &OptimizeState {
        &self.state
    }

    pub fn margin_workers(&self) -> usize {
        self.margin_workers
    }

    /// Run the optimization from `x0`, which must pass verification.
    ///
    /// Every call starts from an empty guess history and failure cloud.
    pub fn optimize(&mut self, x0: &ParameterSet) -> Result<OptimizeOutcome> {
        self.state = OptimizeState::new(self.layout.len());

        let start = self.layout.to_dense(x0)?;
        for (i, (name, value)) in self.layout.keys().iter().zip(start.iter()).enumerate() {
            if !self.bounds[i].contains(*value) {
                return Err(Error::InvalidConfiguration(format!(
                    "{}: starting value {} lies outside its limits",
                    name, value
                )));
            }
        }
        check_positive(start.as_slice())?;

        log::info!(
            "Starting optimization of {} parameters (at most {} iterations)",
            self.layout.len(),
            self.config.max_iterations
        );
        self.analyze_point(start.as_slice())?;

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let (best, best_score) = self.best_guess()?;
            log::info!(
                "Iteration {}: best score {:.4} at {:?}",
                iterations,
                best_score,
                best
            );

            let candidate = self.next_guess(&best, iterations)?;
            let estimated = self.state.score(&candidate)?;
            log::info!("Next guess {:?} (estimated score {:.4})", candidate, estimated);

            let parameters = self.layout.to_set(&candidate)?;
            if !self.margin.verify(&parameters)? {
                log::info!("Guess failed verification; recorded as a point of failure");
                self.state.add_failure(&candidate)?;
                continue;
            }

            self.analyze_point(&candidate)?;

            let actual = self.state.score(&candidate)?;
            let estimation_error = estimated - actual;
            log::info!(
                "Actual score {:.4}, estimation error {:.6}",
                actual,
                estimation_error
            );

            if estimation_error < self.config.converge {
                log::info!("Convergence reached after {} iterations", iterations);
                converged = true;
                break;
            }
        }

        if !converged {
            log::warn!(
                "Reached maximum number of iterations ({}) without convergence",
                self.config.max_iterations
            );
        }

        let (point, score) = self.best_guess()?;
        Ok(OptimizeOutcome {
            point: self.layout.to_set(&point)?,
            score,
            iterations,
            converged,
            guesses: self.state.guesses().len(),
            failure_points: self.state.failures().len(),
        })
    }

    fn best_guess(&self) -> Result<(Vec<f64>, f64)> {
        self.state
            .best_guess()?
            .ok_or_else(|| Error::InvalidConfiguration("no verified guesses".to_string()))
    }

    /// Margin-analyze a verified point, then record it as a guess and its
    /// constrained boundaries as failure points.
    fn analyze_point(&mut self, point: &[f64]) -> Result<()> {
        let parameters = self.layout.to_set(point)?;
        let margins = self.margin.analyse(&parameters, self.margin_workers)?;
        self.state.add_guess(point)?;

        let config = *self.margin.config();
        let mut boundary = point.to_vec();
        let mut recorded = 0;

        for (i, name) in self.layout.keys().iter().enumerate() {
            let margin = margins
                .get(name)
                .ok_or_else(|| Error::MissingParameter(name.clone()))?;

            for direction in [Direction::Negative, Direction::Positive] {
                let scale = margin.scale(direction);
                if config.reached_extreme(direction, scale) {
                    continue;
                }
                boundary[i] = point[i] * scale;
                self.state.add_failure(&boundary)?;
                recorded += 1;
            }
            boundary[i] = point[i];
        }

        log::debug!(
            "Recorded {} margin boundaries ({} points of failure in total)",
            recorded,
            self.state.failures().len()
        );
        Ok(())
    }

    /// Find the next candidate around `best`.
    fn next_guess(&self, best: &[f64], iteration: usize) -> Result<Vec<f64>> {
        let region = search_box(
            self.layout.keys(),
            &self.bounds,
            best,
            self.config.search_radius,
        )?;
        for (name, (lower, upper)) in self.layout.keys().iter().zip(&region) {
            log::debug!("  {}: [{}, {}]", name, lower, upper);
        }

        let solver = DifferentialEvolution::new(EvolutionConfig {
            seed: derive_seed(self.seed, iteration as u32, 0),
            ..self.evolution
        });
        let state = &self.state;
        let outcome = solver.minimize(&region, |x| Ok(-state.score(x)?))?;

        log::debug!(
            "Differential evolution: {} evaluations, {} generations",
            outcome.evaluations,
            outcome.generations
        );

        if !outcome.converged {
            return Err(Error::CandidateSearchFailure {
                message: outcome.message,
                iterations: outcome.generations,
                evaluations: outcome.evaluations,
            });
        }
        Ok(outcome.x)
    }
}

/// Default margin worker count: two line searches per parameter, capped at
/// the available cores.
pub fn default_margin_workers(num_parameters: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (2 * num_parameters).min(cores).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::{Verifier, VerifierError};

    /// Passes while every parameter stays inside its window.
    #[derive(Clone)]
    struct Window {
        limits: Vec<(String, f64, f64)>,
    }

    impl Verifier for Window {
        fn verify(&mut self, parameters: &ParameterSet) -> std::result::Result<bool, VerifierError> {
            Ok(self
                .limits
                .iter()
                .all(|(name, lo, hi)| parameters[name.as_str()] > *lo && parameters[name.as_str()] < *hi))
        }
    }

    impl VerifierFactory for Window {
        type Verifier = Window;

        fn create(&self) -> std::result::Result<Window, VerifierError> {
            Ok(self.clone())
        }
    }

    fn single(lo: f64, hi: f64) -> (Window, IndexMap<String, ParameterBounds>) {
        let window = Window {
            limits: vec![("x".to_string(), lo, hi)],
        };
        let mut bounds = IndexMap::new();
        bounds.insert("x".to_string(), ParameterBounds::default());
        (window, bounds)
    }

    fn start(x: f64) -> ParameterSet {
        let mut set = ParameterSet::new();
        set.insert("x".to_string(), x);
        set
    }

    #[test]
    fn test_config_validation() {
        assert!(OptimizeConfig::default().validate().is_ok());

        let bad_radius = OptimizeConfig {
            search_radius: 1.0,
            ..OptimizeConfig::default()
        };
        assert!(bad_radius.validate().is_err());

        let no_iterations = OptimizeConfig {
            max_iterations: 0,
            ..OptimizeConfig::default()
        };
        assert!(no_iterations.validate().is_err());
    }

    #[test]
    fn test_initial_boundaries_become_failure_points() {
        let (window, bounds) = single(99.0, 101.0);
        let config = OptimizeConfig {
            max_iterations: 1,
            seed: Some(1),
            ..OptimizeConfig::default()
        };
        let mut optimizer = Optimizer::new(window, MarginConfig::default(), config, bounds)
            .unwrap()
            .with_margin_workers(1);

        optimizer.analyze_point(&[100.0]).unwrap();

        let failures: Vec<f64> = optimizer.state().failures().iter().map(|f| f[0]).collect();
        assert_eq!(failures.len(), 2);
        assert!((failures[0] - 98.59375).abs() < 1e-9);
        assert!((failures[1] - 101.40625).abs() < 1e-9);
        assert_eq!(optimizer.state().guesses().len(), 1);
    }

    #[test]
    fn test_unconstrained_sides_are_not_recorded() {
        let (window, bounds) = single(0.0, 101.0);
        let mut optimizer =
            Optimizer::new(window, MarginConfig::default(), OptimizeConfig::default(), bounds)
                .unwrap()
                .with_margin_workers(1);

        optimizer.analyze_point(&[100.0]).unwrap();
        assert_eq!(optimizer.state().failures().len(), 1);
        assert!(optimizer.state().failures().row(0).unwrap()[0] > 100.0);
    }

    #[test]
    fn test_failing_candidates_consume_iterations() {
        // The window is much narrower than the search box, so the farthest
        // point from the boundaries always fails verification.
        let (window, bounds) = single(99.0, 101.0);
        let config = OptimizeConfig {
            max_iterations: 2,
            seed: Some(3),
            ..OptimizeConfig::default()
        };
        let mut optimizer = Optimizer::new(window, MarginConfig::default(), config, bounds)
            .unwrap()
            .with_margin_workers(1);

        let outcome = optimizer.optimize(&start(100.0)).unwrap();

        assert_eq!(outcome.iterations, 2);
        assert!(!outcome.converged);
        assert_eq!(outcome.guesses, 1);
        assert_eq!(outcome.failure_points, 4);
        assert_eq!(outcome.point["x"], 100.0);
    }

    #[test]
    fn test_repeated_runs_start_from_scratch() {
        let (window, bounds) = single(99.0, 101.0);
        let config = OptimizeConfig {
            max_iterations: 2,
            seed: Some(3),
            ..OptimizeConfig::default()
        };
        let mut optimizer = Optimizer::new(window, MarginConfig::default(), config, bounds)
            .unwrap()
            .with_margin_workers(1);

        let first = optimizer.optimize(&start(100.0)).unwrap();
        let second = optimizer.optimize(&start(100.0)).unwrap();

        assert_eq!(second.guesses, 1);
        assert_eq!(second.failure_points, 4);
        assert_eq!(first, second);
        assert_eq!(optimizer.state().guesses().len(), 1);
        assert_eq!(optimizer.state().failures().len(), 4);
    }

    #[test]
    fn test_converges_when_estimate_holds() {
        // Only the upper side is constrained: the first boundary sits at
        // 149.21875 and the box around 100 is [95, 105]. The best candidate
        // lies near 95, where the new boundary is measured above 149.7, so the
        // estimated score is exact.
        let (window, bounds) = single(0.0, 150.0);
        let config = OptimizeConfig {
            max_iterations: 10,
            seed: Some(5),
            ..OptimizeConfig::default()
        };
        let mut optimizer = Optimizer::new(window, MarginConfig::default(), config, bounds)
            .unwrap()
            .with_margin_workers(1);

        let outcome = optimizer.optimize(&start(100.0)).unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.guesses, 2);
        assert_eq!(outcome.failure_points, 2);
        let x = outcome.point["x"];
        assert!(x > 94.9 && x < 96.0, "x = {}", x);
        assert!(outcome.score > 50.0);
    }

    #[test]
    fn test_invalid_start() {
        let (window, bounds) = single(99.0, 101.0);
        let mut optimizer =
            Optimizer::new(window, MarginConfig::default(), OptimizeConfig::default(), bounds)
                .unwrap()
                .with_margin_workers(1);

        let err = optimizer.optimize(&start(200.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidStartingPoint));
    }

    #[test]
    fn test_start_outside_limits() {
        let (window, _) = single(0.0, 1000.0);
        let mut bounds = IndexMap::new();
        bounds.insert("x".to_string(), ParameterBounds::new(Some(10.0), Some(20.0)));
        let mut optimizer =
            Optimizer::new(window, MarginConfig::default(), OptimizeConfig::default(), bounds)
                .unwrap();

        let err = optimizer.optimize(&start(50.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_search_budget_exhaustion_is_fatal() {
        let (window, bounds) = single(90.0, 110.0);
        let config = OptimizeConfig {
            seed: Some(2),
            ..OptimizeConfig::default()
        };
        let mut optimizer = Optimizer::new(window, MarginConfig::default(), config, bounds)
            .unwrap()
            .with_margin_workers(1)
            .with_evolution(EvolutionConfig {
                max_generations: 1,
                ..EvolutionConfig::default()
            });

        let err = optimizer.optimize(&start(100.0)).unwrap_err();
        assert!(matches!(err, Error::CandidateSearchFailure { .. }));
    }
}
