//! Validity oracles: decide whether a candidate rule assembles the intended
//! shape, and only that shape

use crate::config::{OracleConfig, OracleKind};
use crate::error::SolveError;
use crate::polycube::{ProblemSpec, Rule, Topology};
use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleVerdict {
    /// Always assembles exactly the target shape
    Valid,
    /// Can grow without bound
    Unbounded,
    /// Sometimes assembles something else
    NonDeterministic,
}

impl OracleVerdict {
    pub fn is_valid(&self) -> bool {
        *self == OracleVerdict::Valid
    }
}

pub trait ValidityOracle: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, rule: &Rule, topology: &Topology) -> Result<OracleVerdict>;

    /// Fraction of assemblies that reach the target shape
    fn assembly_ratio(&self, rule: &Rule, topology: &Topology) -> Result<f64> {
        Ok(match self.validate(rule, topology)? {
            OracleVerdict::Valid => 1.0,
            _ => 0.0,
        })
    }
}

/// Trusts the SAT model: every decoded rule is accepted
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ValidityOracle for AcceptAll {
    fn name(&self) -> &str {
        "accept_all"
    }

    fn validate(&self, _rule: &Rule, _topology: &Topology) -> Result<OracleVerdict> {
        Ok(OracleVerdict::Valid)
    }
}

/// Runs an external assembly checker.
///
/// The command receives the configured arguments followed by the rule in hex,
/// and the topology as a JSON problem document on stdin. Exit status 0 means
/// valid, 2 unbounded, anything else non-deterministic. The first number on
/// stdout, if any, is the assembly ratio.
#[derive(Debug, Clone)]
pub struct ExternalOracle {
    command: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    dimensions: usize,
    torsion: bool,
}

struct OracleRun {
    status: Option<i32>,
    stdout: String,
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const OUTPUT_GRACE: Duration = Duration::from_millis(100);

impl ExternalOracle {
    pub fn new(command: PathBuf, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command,
            args,
            timeout,
            dimensions: 3,
            torsion: true,
        }
    }

    /// Lattice settings written into the problem document
    pub fn with_lattice(mut self, dimensions: usize, torsion: bool) -> Self {
        self.dimensions = dimensions;
        self.torsion = torsion;
        self
    }

    fn run(&self, rule: &Rule, topology: &Topology) -> Result<OracleRun> {
        let hex = rule.to_hex()?;
        let problem = ProblemSpec::new(topology, self.dimensions, self.torsion);
        let input = serde_json::to_string(&problem).context("Failed to serialize topology")?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(&hex)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start oracle {}", self.command.display()))?;

        let mut stdin = child.stdin.take().context("Oracle stdin was not captured")?;
        let mut stdout = child.stdout.take().context("Oracle stdout was not captured")?;

        // Pipes are serviced off-thread; only the deadline below may block
        thread::spawn(move || {
            // The checker may exit without reading its input
            let _ = stdin.write_all(input.as_bytes());
        });
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let result = stdout
                .read_to_end(&mut buffer)
                .map(|_| String::from_utf8_lossy(&buffer).into_owned());
            let _ = sender.send(result);
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().context("Failed to wait for oracle")? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SolveError::OracleTimeout {
                    command: self.command.display().to_string(),
                    seconds: self.timeout.as_secs_f64(),
                    rule: hex,
                }
                .into());
            }
            thread::sleep(POLL_INTERVAL);
        };

        // A background process of the checker can hold stdout open past its exit
        let wait = deadline
            .saturating_duration_since(Instant::now())
            .max(OUTPUT_GRACE);
        let stdout = match receiver.recv_timeout(wait) {
            Ok(result) => result.context("Failed to read oracle output")?,
            Err(_) => {
                debug!("Oracle {} left stdout open; ignoring its output", self.command.display());
                String::new()
            }
        };
        debug!("Oracle {} on {}: {:?}", self.command.display(), hex, status.code());

        Ok(OracleRun {
            status: status.code(),
            stdout,
        })
    }
}

impl ValidityOracle for ExternalOracle {
    fn name(&self) -> &str {
        "external"
    }

    fn validate(&self, rule: &Rule, topology: &Topology) -> Result<OracleVerdict> {
        let run = self.run(rule, topology)?;
        Ok(match run.status {
            Some(0) => OracleVerdict::Valid,
            Some(2) => OracleVerdict::Unbounded,
            _ => OracleVerdict::NonDeterministic,
        })
    }

    fn assembly_ratio(&self, rule: &Rule, topology: &Topology) -> Result<f64> {
        let run = self.run(rule, topology)?;
        let ratio = run
            .stdout
            .split_whitespace()
            .find_map(|token| token.parse::<f64>().ok());
        match (ratio, run.status) {
            (Some(r), _) => Ok(r),
            (None, Some(0)) => Ok(1.0),
            (None, _) => Ok(0.0),
        }
    }
}

/// Build the oracle the settings ask for
pub fn from_config(
    config: &OracleConfig,
    dimensions: usize,
    torsion: bool,
) -> Result<Arc<dyn ValidityOracle>> {
    match config.kind {
        OracleKind::AcceptAll => Ok(Arc::new(AcceptAll)),
        OracleKind::External => {
            let command = config
                .command
                .clone()
                .context("The external oracle needs a command")?;
            Ok(Arc::new(ExternalOracle::new(
                command,
                config.args.clone(),
                Duration::from_secs(config.timeout_seconds),
            )
            .with_lattice(dimensions, torsion)))
        }
    }
}
