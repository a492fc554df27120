//! Simulator CSV output.
//!
//! JoSIM writes one `time` column followed by one column per printed
//! quantity. Phase traces are headed `P(<NAME>)`.

use crate::error::{Error, Result};

/// Time series produced by one simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    time: Vec<f64>,
    names: Vec<String>,
    /// Column-major trace values, one vector per name.
    traces: Vec<Vec<f64>>,
}

/// Borrowed view of one trace.
#[derive(Debug, Clone, Copy)]
pub struct Trace<'a> {
    time: &'a [f64],
    values: &'a [f64],
}

impl SimulationOutput {
    /// Parse CSV text.
    pub fn parse_csv(text: &str) -> Result<Self> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| Error::OutputParse("empty output".to_string()))?;
        let columns: Vec<String> = header
            .split(',')
            .map(|c| c.trim().trim_matches('"').to_string())
            .collect();

        if columns.len() < 2 || !columns[0].eq_ignore_ascii_case("time") {
            return Err(Error::OutputParse(format!(
                "expected a 'time' column followed by traces, found '{}'",
                header
            )));
        }

        let mut time = Vec::new();
        let mut traces = vec![Vec::new(); columns.len() - 1];

        for (row, line) in lines.enumerate() {
            let values = line
                .split(',')
                .map(|v| v.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
                .map_err(|e| Error::OutputParse(format!("row {}: {}", row + 1, e)))?;

            if values.len() != columns.len() {
                return Err(Error::OutputParse(format!(
                    "row {}: expected {} values, found {}",
                    row + 1,
                    columns.len(),
                    values.len()
                )));
            }

            time.push(values[0]);
            for (trace, value) in traces.iter_mut().zip(&values[1..]) {
                trace.push(*value);
            }
        }

        if time.is_empty() {
            return Err(Error::OutputParse("no data rows".to_string()));
        }

        Ok(Self {
            time,
            names: columns[1..].to_vec(),
            traces,
        })
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Column headers of the traces.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Phase trace for a junction, headed `P(name)` or `name`.
    pub fn phase(&self, name: &str) -> Option<Trace<'_>> {
        let wrapped = format!("P({})", name);
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(&wrapped))
            .or_else(|| self.names.iter().position(|n| n.eq_ignore_ascii_case(name)))
            .map(|index| Trace {
                time: &self.time,
                values: &self.traces[index],
            })
    }
}

impl<'a> Trace<'a> {
    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    /// Linearly interpolated value at `t`, clamped to the end values.
    pub fn sample(&self, t: f64) -> f64 {
        let n = self.time.len();
        if t <= self.time[0] {
            return self.values[0];
        }
        if t >= self.time[n - 1] {
            return self.values[n - 1];
        }

        let i = self.time.partition_point(|x| *x <= t);
        let (t0, t1) = (self.time[i - 1], self.time[i]);
        let (v0, v1) = (self.values[i - 1], self.values[i]);
        if t1 == t0 {
            return v1;
        }
        v0 + (v1 - v0) * (t - t0) / (t1 - t0)
    }
}
