//! Result of a whole search

use super::budget::Budget;
use super::outcome::{BudgetOutcome, BudgetReport};
use crate::polycube::Rule;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The cheapest rule the search found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundRule {
    pub budget: Budget,
    pub rule: Rule,
    /// Every cheaper budget was ruled out
    pub proven_minimal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub dimensions: usize,
    pub torsion: bool,
    pub positions: usize,
    pub bindings: usize,
    pub best: Option<FoundRule>,
    /// Reported budgets in search order
    pub budgets: Vec<BudgetReport>,
    pub elapsed_seconds: f64,
}

impl SearchReport {
    pub fn is_solved(&self) -> bool {
        self.best.is_some()
    }

    pub fn rule(&self) -> Option<&Rule> {
        self.best.as_ref().map(|found| &found.rule)
    }

    pub fn outcome(&self, budget: Budget) -> Option<&BudgetOutcome> {
        self.budgets
            .iter()
            .find(|r| r.budget == budget)
            .map(|r| &r.outcome)
    }

    /// Number of budgets with each status symbol, in a fixed order
    pub fn tally(&self) -> Vec<(char, usize)> {
        let symbols = ['✓', '×', '?', '⌛', '!', '-'];
        symbols
            .iter()
            .map(|&symbol| {
                let count = self
                    .budgets
                    .iter()
                    .filter(|r| r.outcome.symbol() == symbol)
                    .count();
                (symbol, count)
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json().context("Failed to serialize search report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid report: {}", path.display()))
    }
}
