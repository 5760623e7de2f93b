//! Per-budget outcomes and the rule deciding when an answer is final

use super::budget::Budget;
use crate::config::ErrorPolicy;
use crate::polycube::Rule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BudgetOutcome {
    /// A rule the oracle accepted
    Solved { rule: Rule },
    /// No rule of this size realizes the topology
    Unsatisfiable,
    /// Candidates existed but every one tried was rejected
    Exhausted,
    /// The solver ran out of time
    Timeout,
    Error { message: String },
    /// Not attempted because a cheaper budget already has a rule
    Skipped,
}

impl BudgetOutcome {
    /// Whether this budget can no longer yield a cheaper answer
    pub fn is_ruled_out(&self, policy: ErrorPolicy) -> bool {
        match self {
            BudgetOutcome::Unsatisfiable | BudgetOutcome::Exhausted => true,
            BudgetOutcome::Error { .. } => policy == ErrorPolicy::RuleOut,
            BudgetOutcome::Solved { .. } | BudgetOutcome::Timeout | BudgetOutcome::Skipped => false,
        }
    }

    pub fn rule(&self) -> Option<&Rule> {
        match self {
            BudgetOutcome::Solved { rule } => Some(rule),
            _ => None,
        }
    }

    /// One-character status for tables
    pub fn symbol(&self) -> char {
        match self {
            BudgetOutcome::Solved { .. } => '✓',
            BudgetOutcome::Unsatisfiable => '×',
            BudgetOutcome::Exhausted => '?',
            BudgetOutcome::Timeout => '⌛',
            BudgetOutcome::Error { .. } => '!',
            BudgetOutcome::Skipped => '-',
        }
    }
}

/// Everything recorded about one budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub budget: Budget,
    pub outcome: BudgetOutcome,
    /// Candidate rules sent to the oracle
    pub attempts: usize,
    pub elapsed_seconds: f64,
    pub variables: usize,
    pub clauses: usize,
}

impl BudgetReport {
    pub fn new(budget: Budget, outcome: BudgetOutcome) -> Self {
        Self {
            budget,
            outcome,
            attempts: 0,
            elapsed_seconds: 0.0,
            variables: 0,
            clauses: 0,
        }
    }
}

/// Outcomes recorded so far; a budget with no entry is still pending
#[derive(Debug, Clone, Default)]
pub struct ResultsTable {
    reports: HashMap<Budget, BudgetReport>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a report. The first report for a budget wins.
    pub fn record(&mut self, report: BudgetReport) -> bool {
        if self.reports.contains_key(&report.budget) {
            return false;
        }
        self.reports.insert(report.budget, report);
        true
    }

    pub fn get(&self, budget: &Budget) -> Option<&BudgetReport> {
        self.reports.get(budget)
    }

    pub fn outcome(&self, budget: &Budget) -> Option<&BudgetOutcome> {
        self.reports.get(budget).map(|r| &r.outcome)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Reports in the given order, skipping budgets with none
    pub fn in_order(&self, order: &[Budget]) -> Vec<BudgetReport> {
        order.iter().filter_map(|b| self.reports.get(b).cloned()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Every budget before this solved one is ruled out
    Final(Budget),
    /// Some budget before the cheapest solved one is unresolved
    Open {
        best: Option<Budget>,
        blocking: Budget,
    },
    /// Every budget is ruled out
    NoRule,
}

/// Decide from the recorded outcomes, walking budgets in search order.
pub fn decide(order: &[Budget], table: &ResultsTable, policy: ErrorPolicy) -> Decision {
    let best = order
        .iter()
        .find(|b| matches!(table.outcome(b), Some(BudgetOutcome::Solved { .. })))
        .copied();

    for budget in order {
        match table.outcome(budget) {
            Some(BudgetOutcome::Solved { .. }) => return Decision::Final(*budget),
            Some(outcome) if outcome.is_ruled_out(policy) => continue,
            _ => {
                return Decision::Open {
                    best,
                    blocking: *budget,
                }
            }
        }
    }
    Decision::NoRule
}
