//! Netlist preparation and parameter substitution.
//!
//! The circuit file is read once. Existing output control lines (`.print`,
//! `.plot`, `.file`) are removed and one `.print phase <NAME>` line per
//! traced junction is inserted before `.end`. Every verification then
//! rewrites the values of the `.param` lines it sets.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use circopt_analysis::ParameterSet;

use crate::error::{Error, Result};

const OUTPUT_CONTROLS: [&str; 3] = [".print", ".plot", ".file"];

/// Circuit netlist ready for repeated parameter substitution.
#[derive(Debug, Clone)]
pub struct Netlist {
    lines: Vec<String>,
    /// Lowercase parameter name to (line index, name as written).
    params: HashMap<String, (usize, String)>,
}

impl Netlist {
    /// Read a circuit file and prepare it for the given traces.
    pub fn from_path(path: &Path, traces: &[String]) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(&text, traces))
    }

    /// Prepare netlist text for the given traces.
    pub fn new(text: &str, traces: &[String]) -> Self {
        let mut lines: Vec<String> = text
            .lines()
            .filter(|line| {
                let keyword = first_token(line);
                !OUTPUT_CONTROLS.iter().any(|c| keyword.eq_ignore_ascii_case(c))
            })
            .map(str::to_string)
            .collect();

        let end = lines
            .iter()
            .rposition(|line| first_token(line).eq_ignore_ascii_case(".end"));
        let end = match end {
            Some(index) => index,
            None => {
                lines.push(".end".to_string());
                lines.len() - 1
            }
        };

        for (offset, name) in traces.iter().enumerate() {
            lines.insert(end + offset, format!(".print phase {}", name.to_uppercase()));
        }

        let params = lines
            .iter()
            .enumerate()
            .filter_map(|(index, line)| {
                param_name(line).map(|name| (name.to_lowercase(), (index, name.to_string())))
            })
            .collect();

        Self { lines, params }
    }

    /// Names of the parameters defined by `.param` lines.
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.params.values().map(|(_, name)| name.as_str())
    }

    /// Netlist text with the given parameter values substituted.
    pub fn render(&self, parameters: &ParameterSet) -> Result<String> {
        let mut replaced: HashMap<usize, String> = HashMap::with_capacity(parameters.len());
        for (name, value) in parameters {
            let (index, written) = self
                .params
                .get(&name.to_lowercase())
                .ok_or_else(|| Error::ParameterNotFound(name.clone()))?;
            replaced.insert(*index, format!(".param {}={:e}", written, value));
        }

        let mut out = String::new();
        for (index, line) in self.lines.iter().enumerate() {
            let line = replaced.get(&index).unwrap_or(line);
            // Writing to a String cannot fail
            let _ = writeln!(out, "{}", line);
        }
        Ok(out)
    }
}

fn first_token(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// Name assigned by a `.param name=value` line.
fn param_name(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let keyword = trimmed.get(..6)?;
    if !keyword.eq_ignore_ascii_case(".param") {
        return None;
    }
    let rest = &trimmed[6..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (name, _) = rest.split_once('=')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some(name)
}
