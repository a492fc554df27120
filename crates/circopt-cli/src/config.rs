//! TOML run configuration.
//!
//! A configuration file describes one run. The top-level `mode` key picks
//! the record shape:
//!
//! ```toml
//! mode = "margin"
//!
//! [verify]
//! method = "spec_file"
//! file = "dff_spec.txt"
//! circuit = "dff.cir"
//!
//! [margin]
//! scan_steps = 6
//!
//! [parameters.LB1]
//! nominal = 2e-12
//! ```
//!
//! Unknown keys are rejected, relative paths are resolved against the
//! directory holding the configuration file and every value is validated
//! once, at load.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use circopt_analysis::{
    MarginConfig, NormalDistribution, OptimizeConfig, OptimizeMethod, ParameterBounds,
    ParameterSet,
};
use circopt_verify::{JosimConfig, VerifyConfig};
use indexmap::IndexMap;
use serde::Deserialize;

/// One run, selected by the `mode` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RunConfig {
    Verify(VerifyRun),
    Margin(MarginRun),
    Yield(YieldRun),
    Optimize(OptimizeRun),
}

/// Check a single nominal point.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRun {
    pub verify: VerifySection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarginRun {
    pub verify: VerifySection,
    #[serde(default)]
    pub margin: MarginConfig,
    pub parameters: IndexMap<String, NominalParameter>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YieldRun {
    pub verify: VerifySection,
    #[serde(rename = "yield")]
    pub sampling: YieldSection,
    pub parameters: IndexMap<String, YieldParameter>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizeRun {
    pub verify: VerifySection,
    #[serde(default)]
    pub margin: MarginConfig,
    #[serde(default)]
    pub optimize: OptimizeSection,
    pub parameters: IndexMap<String, OptimizeParameter>,
}

/// How a parameter set is judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMethod {
    /// Compare phase flips against a reference spec file.
    #[default]
    SpecFile,
}

/// `[verify]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySection {
    #[serde(default)]
    pub method: VerifyMethod,
    /// Reference spec file.
    pub file: PathBuf,
    /// Circuit netlist.
    pub circuit: PathBuf,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub wrspice_compatibility: bool,
    /// Simulator executable, `josim-cli` from `PATH` when absent.
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_threshold() -> f64 {
    0.05
}

impl VerifySection {
    pub fn to_verify_config(&self) -> VerifyConfig {
        let defaults = JosimConfig::default();
        let mut config = VerifyConfig::new(&self.file, &self.circuit);
        config.threshold = self.threshold;
        config.josim = JosimConfig {
            executable: self.executable.clone().unwrap_or(defaults.executable),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            wrspice_compatibility: self.wrspice_compatibility,
        };
        config
    }

    fn resolve(&mut self, base: &Path) {
        self.file = resolve_path(base, &self.file);
        self.circuit = resolve_path(base, &self.circuit);
    }

    fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold.is_finite()) {
            bail!("verify.threshold must be positive, got {}", self.threshold);
        }
        if self.timeout_secs == Some(0) {
            bail!("verify.timeout_secs must be at least 1");
        }
        Ok(())
    }
}

/// `[yield]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YieldSection {
    pub num_samples: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// `[optimize]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizeSection {
    pub method: OptimizeMethod,
    pub search_radius: f64,
    pub converge: f64,
    pub max_iterations: usize,
    /// JSON file receiving the outcome.
    pub output: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for OptimizeSection {
    fn default() -> Self {
        let defaults = OptimizeConfig::default();
        Self {
            method: defaults.method,
            search_radius: defaults.search_radius,
            converge: defaults.converge,
            max_iterations: defaults.max_iterations,
            output: None,
            seed: None,
        }
    }
}

impl OptimizeSection {
    pub fn to_optimize_config(&self) -> OptimizeConfig {
        OptimizeConfig {
            method: self.method,
            search_radius: self.search_radius,
            converge: self.converge,
            max_iterations: self.max_iterations,
            seed: self.seed,
        }
    }
}

/// `[parameters.<name>]` for margin runs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NominalParameter {
    pub nominal: f64,
}

/// `[parameters.<name>]` for yield runs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YieldParameter {
    pub nominal: f64,
    /// Variance of the normal distribution, not its standard deviation.
    /// Samples are drawn with `sqrt(variance)` as the spread, so a 5 %
    /// standard deviation on a nominal of 1.0 is written as `0.0025`.
    pub variance: f64,
}

/// `[parameters.<name>]` for optimization runs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizeParameter {
    pub nominal: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl OptimizeParameter {
    pub fn bounds(&self) -> ParameterBounds {
        ParameterBounds::new(self.min, self.max)
    }
}

impl RunConfig {
    /// Load, resolve and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: RunConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve(base);
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn verify(&self) -> &VerifySection {
        match self {
            RunConfig::Verify(run) => &run.verify,
            RunConfig::Margin(run) => &run.verify,
            RunConfig::Yield(run) => &run.verify,
            RunConfig::Optimize(run) => &run.verify,
        }
    }

    fn verify_mut(&mut self) -> &mut VerifySection {
        match self {
            RunConfig::Verify(run) => &mut run.verify,
            RunConfig::Margin(run) => &mut run.verify,
            RunConfig::Yield(run) => &mut run.verify,
            RunConfig::Optimize(run) => &mut run.verify,
        }
    }

    fn resolve(&mut self, base: &Path) {
        self.verify_mut().resolve(base);
        if let RunConfig::Optimize(run) = self {
            if let Some(output) = &run.optimize.output {
                run.optimize.output = Some(resolve_path(base, output));
            }
        }
    }

    /// Fail on the first invalid value, naming its field.
    pub fn validate(&self) -> Result<()> {
        self.verify().validate()?;

        match self {
            RunConfig::Verify(_) => {}
            RunConfig::Margin(run) => {
                run.margin.validate().context("invalid [margin] section")?;
                check_not_empty(run.parameters.len())?;
                for (name, parameter) in &run.parameters {
                    check_nominal(name, parameter.nominal)?;
                }
            }
            RunConfig::Yield(run) => {
                if run.sampling.num_samples == 0 {
                    bail!("yield.num_samples must be at least 1");
                }
                check_not_empty(run.parameters.len())?;
                for (name, parameter) in &run.parameters {
                    check_nominal(name, parameter.nominal)?;
                    if !(parameter.variance >= 0.0 && parameter.variance.is_finite()) {
                        bail!(
                            "parameters.{}.variance must be non-negative, got {}",
                            name,
                            parameter.variance
                        );
                    }
                }
            }
            RunConfig::Optimize(run) => {
                run.margin.validate().context("invalid [margin] section")?;
                run.optimize
                    .to_optimize_config()
                    .validate()
                    .context("invalid [optimize] section")?;
                check_not_empty(run.parameters.len())?;
                for (name, parameter) in &run.parameters {
                    check_nominal(name, parameter.nominal)?;
                    let bounds = parameter.bounds();
                    bounds
                        .validate(name)
                        .with_context(|| format!("invalid limits in parameters.{}", name))?;
                    if !bounds.contains(parameter.nominal) {
                        bail!(
                            "parameters.{}.nominal {} lies outside [{}, {}]",
                            name,
                            parameter.nominal,
                            bounds.minimum(),
                            bounds.maximum()
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

impl MarginRun {
    pub fn nominal(&self) -> ParameterSet {
        self.parameters
            .iter()
            .map(|(name, p)| (name.clone(), p.nominal))
            .collect()
    }
}

impl YieldRun {
    pub fn distributions(&self) -> IndexMap<String, NormalDistribution> {
        self.parameters
            .iter()
            .map(|(name, p)| (name.clone(), NormalDistribution::new(p.nominal, p.variance)))
            .collect()
    }
}

impl OptimizeRun {
    pub fn nominal(&self) -> ParameterSet {
        self.parameters
            .iter()
            .map(|(name, p)| (name.clone(), p.nominal))
            .collect()
    }

    pub fn bounds(&self) -> IndexMap<String, ParameterBounds> {
        self.parameters
            .iter()
            .map(|(name, p)| (name.clone(), p.bounds()))
            .collect()
    }
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn check_not_empty(count: usize) -> Result<()> {
    if count == 0 {
        bail!("parameters must name at least one parameter");
    }
    Ok(())
}

fn check_nominal(name: &str, nominal: f64) -> Result<()> {
    if !(nominal > 0.0 && nominal.is_finite()) {
        bail!("parameters.{}.nominal must be positive, got {}", name, nominal);
    }
    Ok(())
}
