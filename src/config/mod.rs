//! Configuration management for the polycube rule search

pub mod settings;

pub use settings::{
    CliOverrides, EncodingConfig, ErrorPolicy, OracleConfig, OracleKind, OutputConfig,
    OutputFormat, ProblemConfig, SearchConfig, Settings, SolverConfig,
};
