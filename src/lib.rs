//! Polycube assembly-rule search
//!
//! Finds the smallest set of cube types, each with six colored and oriented
//! binding patches, that assembles exactly into a target lattice shape. Each
//! (cube types, colors) budget is encoded to SAT, models are decoded into
//! rules, and candidate rules are checked by a validity oracle. Budgets are
//! searched in parallel, cheapest first.

pub mod config;
pub mod error;
pub mod polycube;
pub mod sat;
pub mod search;
pub mod utils;

pub use config::Settings;
pub use polycube::{Rule, Topology};
pub use search::{SearchProblem, SearchReport};

use anyhow::Result;

/// Main entry point: search the problem named in `settings` for its cheapest rule
pub fn find_minimal_rule(settings: Settings) -> Result<SearchReport> {
    let problem = SearchProblem::new(settings)?;
    problem.solve()
}
