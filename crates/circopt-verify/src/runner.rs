//! JoSIM process runner.
//!
//! This module handles invoking the JoSIM command-line simulator as a
//! subprocess to run transient simulations.

use std::io::{Read, Write};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::Builder;

use crate::error::{Error, Result};
use crate::output::SimulationOutput;

/// Configuration for the JoSIM runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JosimConfig {
    /// Path to the JoSIM executable (default: "josim-cli" in PATH).
    pub executable: String,
    /// Timeout for one simulation in seconds.
    pub timeout_secs: u64,
    /// Parse the netlist with WRspice syntax conventions.
    pub wrspice_compatibility: bool,
}

impl Default for JosimConfig {
    fn default() -> Self {
        Self {
            executable: "josim-cli".to_string(),
            timeout_secs: 600,
            wrspice_compatibility: false,
        }
    }
}

/// Run a netlist through JoSIM and return the parsed CSV output.
pub fn run_josim(netlist: &str, config: &JosimConfig) -> Result<SimulationOutput> {
    let mut netlist_file = Builder::new()
        .prefix("circopt-")
        .suffix(".cir")
        .tempfile()
        .map_err(|e| Error::TempFile(e.to_string()))?;

    netlist_file
        .write_all(netlist.as_bytes())
        .map_err(|e| Error::TempFile(e.to_string()))?;
    netlist_file
        .flush()
        .map_err(|e| Error::TempFile(e.to_string()))?;

    // The output format follows the file extension
    let output_file = Builder::new()
        .prefix("circopt-")
        .suffix(".csv")
        .tempfile()
        .map_err(|e| Error::TempFile(e.to_string()))?;

    // -o file: write traces as CSV
    // -c 1: WRspice syntax convention
    let mut cmd = Command::new(&config.executable);
    cmd.arg("-o").arg(output_file.path());
    if config.wrspice_compatibility {
        cmd.arg("-c").arg("1");
    }
    cmd.arg(netlist_file.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    log::debug!("Running {:?}", cmd);
    let child = cmd.spawn().map_err(|e| Error::JosimNotFound(e.to_string()))?;

    let output = wait_with_timeout(child, Duration::from_secs(config.timeout_secs))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        return Err(Error::JosimExecutionFailed(format!(
            "josim exited with {}\nstderr: {}\nstdout: {}",
            output.status, stderr, stdout
        )));
    }

    let text = std::fs::read_to_string(output_file.path())
        .map_err(|e| Error::OutputParse(format!("failed to read output file: {}", e)))?;

    if text.trim().is_empty() {
        return Err(Error::OutputParse(
            "josim produced an empty output file".to_string(),
        ));
    }

    SimulationOutput::parse_csv(&text)
}

/// Wait for a child process with timeout.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<Output> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(50);

    // Drain the pipes while waiting so a chatty simulator cannot block on a
    // full pipe buffer
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::JosimTimeout(timeout.as_secs()));
                }
                thread::sleep(poll_interval);
            }
            Err(e) => {
                return Err(Error::JosimExecutionFailed(e.to_string()));
            }
        }
    };

    Ok(Output {
        status,
        stdout: stdout.and_then(|h| h.join().ok()).unwrap_or_default(),
        stderr: stderr.and_then(|h| h.join().ok()).unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).ok();
        buf
    })
}
