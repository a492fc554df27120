//! Spec-file verification of JoSIM simulations.

use std::f64::consts::PI;
use std::path::PathBuf;

use circopt_analysis::{ParameterSet, Verifier, VerifierError, VerifierFactory};

use crate::error::{Error, Result};
use crate::netlist::Netlist;
use crate::output::SimulationOutput;
use crate::runner::{JosimConfig, run_josim};
use crate::spec_file::SpecFile;

/// Everything needed to build a [`JosimVerifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyConfig {
    /// Reference spec file.
    pub spec_file: PathBuf,
    /// Circuit netlist.
    pub circuit: PathBuf,
    /// Largest tolerated deviation, in flips, between simulation and spec.
    pub threshold: f64,
    pub josim: JosimConfig,
}

impl VerifyConfig {
    pub fn new(spec_file: impl Into<PathBuf>, circuit: impl Into<PathBuf>) -> Self {
        Self {
            spec_file: spec_file.into(),
            circuit: circuit.into(),
            threshold: 0.05,
            josim: JosimConfig::default(),
        }
    }
}

/// Verifier that simulates the circuit and checks its phase flips against a
/// spec file.
#[derive(Debug, Clone)]
pub struct JosimVerifier {
    spec: SpecFile,
    netlist: Netlist,
    threshold: f64,
    josim: JosimConfig,
}

impl JosimVerifier {
    /// Load the spec file and prepare the netlist.
    pub fn new(config: &VerifyConfig) -> Result<Self> {
        let spec = SpecFile::from_path(&config.spec_file)?;
        let netlist = Netlist::from_path(&config.circuit, spec.names())?;
        log::debug!(
            "Prepared {} with {} traces, {} check times and {} parameters",
            config.circuit.display(),
            spec.names().len(),
            spec.len(),
            netlist.parameters().count()
        );

        Ok(Self {
            spec,
            netlist,
            threshold: config.threshold,
            josim: config.josim.clone(),
        })
    }

    pub fn spec(&self) -> &SpecFile {
        &self.spec
    }

    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    /// Simulate with the given parameters without comparing.
    pub fn simulate(&self, parameters: &ParameterSet) -> Result<SimulationOutput> {
        let text = self.netlist.render(parameters)?;
        run_josim(&text, &self.josim)
    }

    /// Simulate and compare against the spec file.
    pub fn check(&self, parameters: &ParameterSet) -> Result<bool> {
        let output = self.simulate(parameters)?;
        matches_spec(&self.spec, &output, self.threshold)
    }
}

impl Verifier for JosimVerifier {
    fn verify(&mut self, parameters: &ParameterSet) -> std::result::Result<bool, VerifierError> {
        Ok(self.check(parameters)?)
    }
}

/// Compare simulated phases with the spec file.
///
/// Phases are calibrated on the first check time, so only flips relative to
/// that time matter. At every later check time the observed flips
/// `(phase(t) - phase(t0)) / 2π` must be within `threshold` of the expected
/// flips for every trace.
pub fn matches_spec(spec: &SpecFile, output: &SimulationOutput, threshold: f64) -> Result<bool> {
    let traces = spec
        .names()
        .iter()
        .map(|name| {
            output
                .phase(name)
                .ok_or_else(|| Error::TraceNotFound(name.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let times = spec.times();
    let flips = spec.flips();

    let calibration: Vec<f64> = traces.iter().map(|trace| trace.sample(times[0])).collect();
    let expected0 = &flips[0];

    for (time, expected) in times.iter().zip(flips).skip(1) {
        for (j, trace) in traces.iter().enumerate() {
            let sampled = (trace.sample(*time) - calibration[j]) / (2.0 * PI);
            let wanted = (expected[j] - expected0[j]) as f64;
            if (sampled - wanted).abs() > threshold {
                log::debug!(
                    "{} at {:e}: {:.3} flips, expected {}",
                    spec.names()[j],
                    time,
                    sampled,
                    wanted
                );
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// Builds a fresh [`JosimVerifier`] per worker from configuration only.
#[derive(Debug, Clone)]
pub struct JosimVerifierFactory {
    config: VerifyConfig,
}

impl JosimVerifierFactory {
    pub fn new(config: VerifyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }
}

impl VerifierFactory for JosimVerifierFactory {
    type Verifier = JosimVerifier;

    fn create(&self) -> std::result::Result<JosimVerifier, VerifierError> {
        Ok(JosimVerifier::new(&self.config)?)
    }
}
