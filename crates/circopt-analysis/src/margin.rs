//! Margin analysis.
//!
//! For a nominal parameter set that passes verification, find for every
//! parameter how far it can be scaled down and up, holding all other
//! parameters at nominal, before verification fails.
//!
//! Each (parameter, direction) pair is an independent line search:
//!
//! 1. A coarse scan walks from 1.0 towards the configured extreme
//!    (`max_search` or `min_search`) in `scan_steps` equal increments and
//!    stops at the first failing scale.
//! 2. If a failing scale was found, `binary_search_steps` bisections refine
//!    the bracket between the last passing and first failing scale. The
//!    reported scale is the midpoint of the final bracket, which is within
//!    `width / 2^(binary_search_steps + 1)` of the true boundary.
//!
//! A direction that never fails over the scan range reports the scan
//! extreme itself.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parameters::{ParameterSet, is_close};
use crate::pool::{check_workers, run_with_verifiers};
use crate::verifier::{Verifier, VerifierFactory};

/// Search hyperparameters for margin analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarginConfig {
    /// Largest scale explored in the positive direction.
    pub max_search: f64,
    /// Smallest scale explored in the negative direction. Must be positive.
    pub min_search: f64,
    /// Number of coarse scan increments per direction.
    pub scan_steps: usize,
    /// Number of bisection iterations after the scan brackets a boundary.
    pub binary_search_steps: usize,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            max_search: 1.9,
            min_search: 0.1,
            scan_steps: 4,
            binary_search_steps: 3,
        }
    }
}

impl MarginConfig {
    /// Check the search range and step counts.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_search > 0.0 && self.min_search < 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "min_search must lie in (0, 1), got {}",
                self.min_search
            )));
        }
        if !(self.max_search > 1.0 && self.max_search.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "max_search must be a finite value above 1, got {}",
                self.max_search
            )));
        }
        if self.scan_steps == 0 {
            return Err(Error::InvalidConfiguration(
                "scan_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Scan extreme for a direction.
    pub fn extreme(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Negative => self.min_search,
            Direction::Positive => self.max_search,
        }
    }

    /// True when a reported scale is the scan extreme, i.e. the parameter was
    /// unconstrained in that direction.
    pub fn reached_extreme(&self, direction: Direction, scale: f64) -> bool {
        is_close(scale, self.extreme(direction))
    }

    /// Worst-case distance between a refined boundary and the true one.
    pub fn resolution(&self, direction: Direction) -> f64 {
        let step = (self.extreme(direction) - 1.0).abs() / self.scan_steps as f64;
        let halvings = i32::try_from(self.binary_search_steps)
            .map_or(i32::MAX, |steps| steps.saturating_add(1));
        step / 2f64.powi(halvings)
    }
}

/// Direction of a margin line search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Negative,
    Positive,
}

impl Direction {
    /// Suffix used when naming a margin side, e.g. `R1-` or `R1+`.
    pub fn suffix(self) -> char {
        match self {
            Direction::Negative => '-',
            Direction::Positive => '+',
        }
    }
}

/// Scale factors bounding the verified region along one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub negative: f64,
    pub positive: f64,
}

impl Margin {
    /// Scale for one side.
    pub fn scale(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Negative => self.negative,
            Direction::Positive => self.positive,
        }
    }
}

/// Parameters with the smallest deviation from nominal.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalMargin {
    /// Smallest `|1 - scale|` over every margin side.
    pub deviation: f64,
    /// Every side that attains it.
    pub parameters: Vec<(String, Direction)>,
}

/// Margins for every parameter, in the nominal set's order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarginResult {
    margins: IndexMap<String, Margin>,
}

impl MarginResult {
    pub fn get(&self, name: &str) -> Option<&Margin> {
        self.margins.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Margin)> {
        self.margins.iter()
    }

    pub fn len(&self) -> usize {
        self.margins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.margins.is_empty()
    }

    /// Determine the critical margin. `None` for an empty result.
    pub fn critical(&self) -> Option<CriticalMargin> {
        let mut deviation = f64::INFINITY;
        let mut parameters: Vec<(String, Direction)> = Vec::new();

        for (name, margin) in &self.margins {
            for direction in [Direction::Negative, Direction::Positive] {
                let value = (1.0 - margin.scale(direction)).abs();
                if is_close(deviation, value) {
                    parameters.push((name.clone(), direction));
                } else if deviation > value {
                    deviation = value;
                    parameters = vec![(name.clone(), direction)];
                }
            }
        }

        if parameters.is_empty() {
            None
        } else {
            Some(CriticalMargin {
                deviation,
                parameters,
            })
        }
    }
}

impl FromIterator<(String, Margin)> for MarginResult {
    fn from_iter<T: IntoIterator<Item = (String, Margin)>>(iter: T) -> Self {
        Self {
            margins: iter.into_iter().collect(),
        }
    }
}

/// Margin analysis driver.
///
/// Holds the verifier factory and, lazily, one verifier for calls made on
/// the controlling thread (the starting-point check and single-worker runs).
pub struct MarginAnalysis<F: VerifierFactory> {
    factory: F,
    config: MarginConfig,
    verifier: Option<F::Verifier>,
}

impl<F: VerifierFactory> MarginAnalysis<F> {
    /// Create an analysis, validating the configuration.
    pub fn new(factory: F, config: MarginConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            factory,
            config,
            verifier: None,
        })
    }

    pub fn config(&self) -> &MarginConfig {
        &self.config
    }

    /// Verify a parameter set on the controlling thread.
    pub fn verify(&mut self, parameters: &ParameterSet) -> Result<bool> {
        Ok(self.local_verifier()?.verify(parameters)?)
    }

    fn local_verifier(&mut self) -> Result<&mut F::Verifier> {
        let verifier = match self.verifier.take() {
            Some(verifier) => verifier,
            None => self.factory.create()?,
        };
        Ok(self.verifier.insert(verifier))
    }

    /// Find the margins of every parameter around `nominal`.
    ///
    /// Fails with [`Error::InvalidStartingPoint`] when `nominal` itself does
    /// not pass verification. Verifier errors propagate unchanged.
    pub fn analyse(&mut self, nominal: &ParameterSet, workers: usize) -> Result<MarginResult> {
        check_workers(workers)?;

        if !self.verify(nominal)? {
            return Err(Error::InvalidStartingPoint);
        }

        let items: Vec<(&str, Direction)> = nominal
            .keys()
            .flat_map(|name| {
                [
                    (name.as_str(), Direction::Positive),
                    (name.as_str(), Direction::Negative),
                ]
            })
            .collect();

        log::info!(
            "Margin analysis of {} parameters ({} line searches, {} workers)",
            nominal.len(),
            items.len(),
            workers
        );

        let config = self.config;
        let scales = if workers == 1 {
            let verifier = self.local_verifier()?;
            items
                .iter()
                .map(|(name, direction)| search_line(verifier, nominal, name, *direction, &config))
                .collect::<Result<Vec<f64>>>()?
        } else {
            run_with_verifiers(&self.factory, workers, &items, |verifier, (name, direction)| {
                search_line(verifier, nominal, name, *direction, &config)
            })?
        };

        let mut positive: IndexMap<&str, f64> = IndexMap::new();
        let mut negative: IndexMap<&str, f64> = IndexMap::new();
        for ((name, direction), scale) in items.iter().zip(scales) {
            match direction {
                Direction::Positive => positive.insert(*name, scale),
                Direction::Negative => negative.insert(*name, scale),
            };
        }

        nominal
            .keys()
            .map(|name| {
                let margin = match (negative.get(name.as_str()), positive.get(name.as_str())) {
                    (Some(&negative), Some(&positive)) => Margin { negative, positive },
                    _ => return Err(Error::MissingParameter(name.clone())),
                };
                Ok((name.clone(), margin))
            })
            .collect()
    }
}

/// One line search along a single parameter and direction.
///
/// Only `name` is modified; every other entry stays at its nominal value for
/// every call.
pub fn search_line<V: Verifier>(
    verifier: &mut V,
    nominal: &ParameterSet,
    name: &str,
    direction: Direction,
    config: &MarginConfig,
) -> Result<f64> {
    let value = nominal
        .get(name)
        .copied()
        .ok_or_else(|| Error::MissingParameter(name.to_string()))?;
    let mut parameters = nominal.clone();

    let mut search_from = 1.0;
    let mut search_to = config.extreme(direction);

    // Coarse scan, assuming the nominal point is valid
    let step = (search_to - search_from) / config.scan_steps as f64;
    let mut bracketed = false;

    for i in 1..=config.scan_steps {
        let current = 1.0 + i as f64 * step;
        parameters.insert(name.to_string(), value * current);

        if !verifier.verify(&parameters)? {
            bracketed = true;
            search_to = current;
            break;
        }

        search_from = current;
    }

    if !bracketed {
        log::debug!(
            "{}{}: unconstrained up to {}",
            name,
            direction.suffix(),
            search_to
        );
        return Ok(search_to);
    }

    for _ in 0..config.binary_search_steps {
        let sample = (search_from + search_to) / 2.0;
        parameters.insert(name.to_string(), value * sample);

        if verifier.verify(&parameters)? {
            search_from = sample;
        } else {
            search_to = sample;
        }
    }

    let boundary = (search_from + search_to) / 2.0;
    log::debug!("{}{}: boundary at {:.4}", name, direction.suffix(), boundary);
    Ok(boundary)
}
