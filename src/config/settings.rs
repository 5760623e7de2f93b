//! Configuration settings for the polycube rule search

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub problem: ProblemConfig,
    pub search: SearchConfig,
    pub solver: SolverConfig,
    pub oracle: OracleConfig,
    pub output: OutputConfig,
    pub encoding: EncodingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemConfig {
    /// JSON problem file or coordinate list
    pub topology_file: PathBuf,
    /// Overrides the problem file's `nDim`
    #[serde(default)]
    pub dimensions: Option<usize>,
    /// Overrides the problem file's `torsion`
    #[serde(default)]
    pub torsion: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub min_cube_types: usize,
    /// Defaults to the number of positions
    #[serde(default)]
    pub max_cube_types: Option<usize>,
    pub min_colors: usize,
    /// Defaults to the number of bindings
    #[serde(default)]
    pub max_colors: Option<usize>,
    /// Finish as soon as the cheapest remaining budget is settled
    pub stop_at_first: bool,
    /// Candidate rules to try per budget before giving up
    pub max_retries: usize,
    /// Models drawn per solver round
    pub samples_per_round: usize,
    pub error_policy: ErrorPolicy,
    /// Worker threads; 0 uses one per core
    pub threads: usize,
}

/// How a budget that failed with an internal error counts when deciding
/// whether a cheaper answer could still exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Treat like a timeout: cheaper answers stay possible, so it blocks a final answer
    Block,
    /// Treat like an unsatisfiable budget
    RuleOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Wall time limit per budget, across all its retries
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub kind: OracleKind,
    /// Program for the external oracle; receives the hex rule as last argument
    #[serde(default)]
    pub command: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    AcceptAll,
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub output_directory: PathBuf,
    /// Write each budget's CNF next to the report
    pub save_cnf: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Text,
    Json,
    Hex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    pub symmetry_breaking: bool,
    pub fix_empty_patches: bool,
    /// Require every cube type in a budget to be placed at least once. On by
    /// default; turn off for the looser encoding where a budget is an upper bound.
    pub require_all_species: bool,
    /// Run the simplifier on found rules before reporting
    pub simplify: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            problem: ProblemConfig {
                topology_file: PathBuf::from("input/problems/dimer.json"),
                dimensions: None,
                torsion: None,
            },
            search: SearchConfig {
                min_cube_types: 1,
                max_cube_types: None,
                min_colors: 1,
                max_colors: None,
                stop_at_first: true,
                max_retries: 100,
                samples_per_round: 1,
                error_policy: ErrorPolicy::Block,
                threads: 0,
            },
            solver: SolverConfig {
                timeout_seconds: 300,
            },
            oracle: OracleConfig {
                kind: OracleKind::AcceptAll,
                command: None,
                args: Vec::new(),
                timeout_seconds: 30,
            },
            output: OutputConfig {
                format: OutputFormat::Text,
                output_directory: PathBuf::from("output/rules"),
                save_cnf: false,
            },
            encoding: EncodingConfig {
                symmetry_breaking: true,
                fix_empty_patches: true,
                require_all_species: true,
                simplify: false,
            },
        }
    }
}

impl Settings {
    /// Load settings from a YAML file. The problem file is checked later, by
    /// [`Settings::validate`], once command line overrides are applied.
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        settings.validate_values()?;
        Ok(settings)
    }

    /// Save settings to a YAML file
    pub fn to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize settings")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate everything except the existence of the problem file
    pub fn validate_values(&self) -> Result<()> {
        let search = &self.search;
        if search.min_cube_types == 0 {
            anyhow::bail!("Minimum number of cube types must be positive");
        }
        if search.min_colors == 0 {
            anyhow::bail!("Minimum number of colors must be positive");
        }
        if let Some(max) = search.max_cube_types {
            if max < search.min_cube_types {
                anyhow::bail!("Maximum cube types {} is below the minimum {}", max, search.min_cube_types);
            }
        }
        if let Some(max) = search.max_colors {
            if max < search.min_colors {
                anyhow::bail!("Maximum colors {} is below the minimum {}", max, search.min_colors);
            }
            if max > crate::polycube::rule::MAX_HEX_COLOR as usize {
                anyhow::bail!("At most {} colors are supported", crate::polycube::rule::MAX_HEX_COLOR);
            }
        }
        if search.max_retries == 0 {
            anyhow::bail!("Maximum retries must be positive");
        }
        if search.samples_per_round == 0 {
            anyhow::bail!("Samples per round must be positive");
        }
        if self.solver.timeout_seconds == 0 {
            anyhow::bail!("Solver timeout must be positive");
        }
        if let Some(dimensions) = self.problem.dimensions {
            if !(1..=3).contains(&dimensions) {
                anyhow::bail!("Dimensions must be 1, 2 or 3, got {}", dimensions);
            }
        }
        if self.oracle.kind == OracleKind::External && self.oracle.command.is_none() {
            anyhow::bail!("The external oracle needs a command");
        }
        Ok(())
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        self.validate_values()?;

        if !self.problem.topology_file.exists() {
            anyhow::bail!(
                "Topology file does not exist: {}",
                self.problem.topology_file.display()
            );
        }

        Ok(())
    }

    /// Merge settings with command line overrides
    pub fn merge_with_cli(&mut self, cli_overrides: &CliOverrides) {
        if let Some(ref topology_file) = cli_overrides.topology_file {
            self.problem.topology_file = topology_file.clone();
        }
        if let Some(max) = cli_overrides.max_cube_types {
            self.search.max_cube_types = Some(max);
        }
        if let Some(max) = cli_overrides.max_colors {
            self.search.max_colors = Some(max);
        }
        if let Some(threads) = cli_overrides.threads {
            self.search.threads = threads;
        }
        if let Some(timeout) = cli_overrides.timeout_seconds {
            self.solver.timeout_seconds = timeout;
        }
        if cli_overrides.exhaustive {
            self.search.stop_at_first = false;
        }
        if let Some(ref output_dir) = cli_overrides.output_dir {
            self.output.output_directory = output_dir.clone();
        }
        if let Some(format) = cli_overrides.format {
            self.output.format = format;
        }
    }
}

/// Command line overrides for settings
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub topology_file: Option<PathBuf>,
    pub max_cube_types: Option<usize>,
    pub max_colors: Option<usize>,
    pub threads: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub exhaustive: bool,
    pub output_dir: Option<PathBuf>,
    pub format: Option<OutputFormat>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_values_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate_values().is_ok());
        assert_eq!(settings.search.error_policy, ErrorPolicy::Block);
        assert_eq!(settings.search.max_retries, 100);
    }

    #[test]
    fn test_round_trip_through_yaml() {
        let dir = tempdir().unwrap();
        let problem = dir.path().join("dimer.json");
        std::fs::write(&problem, r#"{"bindings": [[0,0,1,1]]}"#).unwrap();

        let mut settings = Settings::default();
        settings.problem.topology_file = problem;
        settings.search.error_policy = ErrorPolicy::RuleOut;
        settings.output.format = OutputFormat::Hex;

        let path = dir.path().join("config").join("settings.yaml");
        settings.to_file(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("error_policy: rule_out"));
        assert!(text.contains("kind: accept_all"));

        assert_eq!(Settings::from_file(&path).unwrap(), settings);
    }

    #[test]
    fn test_missing_topology_file() {
        let mut settings = Settings::default();
        settings.problem.topology_file = PathBuf::from("/nonexistent/problem.json");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_values() {
        let mut settings = Settings::default();
        settings.search.max_retries = 0;
        assert!(settings.validate_values().is_err());

        let mut settings = Settings::default();
        settings.search.min_colors = 3;
        settings.search.max_colors = Some(2);
        assert!(settings.validate_values().is_err());

        let mut settings = Settings::default();
        settings.oracle.kind = OracleKind::External;
        assert!(settings.validate_values().is_err());
        settings.oracle.command = Some(PathBuf::from("/bin/true"));
        assert!(settings.validate_values().is_ok());

        let mut settings = Settings::default();
        settings.problem.dimensions = Some(4);
        assert!(settings.validate_values().is_err());
    }

    #[test]
    fn test_merge_with_cli() {
        let mut settings = Settings::default();
        let overrides = CliOverrides {
            topology_file: Some(PathBuf::from("square.txt")),
            max_colors: Some(3),
            threads: Some(2),
            exhaustive: true,
            format: Some(OutputFormat::Json),
            ..CliOverrides::default()
        };
        settings.merge_with_cli(&overrides);

        assert_eq!(settings.problem.topology_file, PathBuf::from("square.txt"));
        assert_eq!(settings.search.max_colors, Some(3));
        assert_eq!(settings.search.max_cube_types, None);
        assert_eq!(settings.search.threads, 2);
        assert!(!settings.search.stop_at_first);
        assert_eq!(settings.output.format, OutputFormat::Json);
    }
}
