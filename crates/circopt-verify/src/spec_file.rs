//! Reference spec files.
//!
//! A spec file lists, for a set of junctions, the expected number of 2π
//! phase flips at given times:
//!
//! ```text
//! time    B1  B2
//! 10e-12  0   0
//! 50e-12  1   0
//! 90e-12  1   1
//! ```
//!
//! Blank lines are ignored. The header must start with `time` and name at
//! least one trace, and every data line must have as many tokens as the
//! header.

use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Parsed spec file.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFile {
    names: Vec<String>,
    times: Vec<f64>,
    flips: Vec<Vec<i64>>,
}

impl SpecFile {
    /// Read and parse a spec file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    /// Trace names, in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Check times.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Expected flip counts per check time, one entry per trace.
    pub fn flips(&self) -> &[Vec<i64>] {
        &self.flips
    }

    /// Number of check times.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

impl FromStr for SpecFile {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let lines: Vec<(usize, Vec<&str>)> = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| (i + 1, line.split_whitespace().collect()))
            .collect();

        if lines.len() <= 2 {
            return Err(Error::SpecFileParse(
                "spec file doesn't have enough lines".to_string(),
            ));
        }

        let (_, header) = &lines[0];
        if header[0] != "time" {
            return Err(Error::SpecFileParse(
                "spec file should start with: 'time' names...".to_string(),
            ));
        }
        if header.len() < 2 {
            return Err(Error::SpecFileParse(
                "spec file must specify at least one variable".to_string(),
            ));
        }

        let names: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();
        let mut times = Vec::with_capacity(lines.len() - 1);
        let mut flips = Vec::with_capacity(lines.len() - 1);

        for (number, tokens) in &lines[1..] {
            if tokens.len() != header.len() {
                return Err(Error::SpecFileParse(format!(
                    "line {}: expected {} tokens, found {}",
                    number,
                    header.len(),
                    tokens.len()
                )));
            }

            let time = tokens[0].parse::<f64>().map_err(|_| {
                Error::SpecFileParse(format!(
                    "line {}: expected a real number specifying time, found '{}'",
                    number, tokens[0]
                ))
            })?;

            let row = tokens[1..]
                .iter()
                .map(|token| {
                    token.parse::<i64>().map_err(|_| {
                        Error::SpecFileParse(format!(
                            "line {}: number of phase flips should be an integer, found '{}'",
                            number, token
                        ))
                    })
                })
                .collect::<Result<Vec<i64>>>()?;

            times.push(time);
            flips.push(row);
        }

        Ok(Self {
            names,
            times,
            flips,
        })
    }
}
