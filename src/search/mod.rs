//! Search over rule budgets for the cheapest valid rule

pub mod budget;
pub mod oracle;
pub mod outcome;
pub mod problem;
pub mod report;
pub mod worker;

pub use budget::{Budget, BudgetRange};
pub use oracle::{AcceptAll, ExternalOracle, OracleVerdict, ValidityOracle};
pub use outcome::{decide, BudgetOutcome, BudgetReport, Decision, ResultsTable};
pub use problem::SearchProblem;
pub use report::{FoundRule, SearchReport};
pub use worker::{BudgetWorker, WorkerLimits};
