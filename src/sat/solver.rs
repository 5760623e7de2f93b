//! SAT solver integration using CaDiCaL

use super::constraints::Clause;
use crate::error::SolveError;
use anyhow::Result;
use cadical::{Solver, Timeout};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// SAT solver wrapper for CaDiCaL
pub struct SatSolver {
    solver: Solver,
    variable_count: usize,
    clause_count: usize,
    timeout: Option<Duration>,
    last_result: Option<SolverResultType>,
    total_solve_time: Duration,
}

/// Result of SAT solving
#[derive(Debug, Clone)]
pub struct SolverSolution {
    pub assignment: HashMap<i32, bool>,
    pub solve_time: Duration,
}

impl SolverSolution {
    pub fn value(&self, var: i32) -> bool {
        self.assignment.get(&var).copied().unwrap_or(false)
    }

    /// Positive literals, sorted
    pub fn true_variables(&self) -> Vec<i32> {
        let mut vars: Vec<i32> = self
            .assignment
            .iter()
            .filter(|(_, &v)| v)
            .map(|(&k, _)| k)
            .collect();
        vars.sort_unstable();
        vars
    }
}

/// Outcome of one solver call
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    Satisfiable(SolverSolution),
    Unsatisfiable,
    /// The time limit ran out before an answer
    Timeout,
}

/// Models found by [`SatSolver::solve_multiple`] and why the run stopped
#[derive(Debug, Clone)]
pub struct SolutionBatch {
    pub solutions: Vec<SolverSolution>,
    /// No further model exists under the blocking clauses added so far
    pub exhausted: bool,
    pub timed_out: bool,
}

/// Statistics about the solving process
#[derive(Debug, Clone)]
pub struct SolverStatistics {
    pub variable_count: usize,
    pub clause_count: usize,
    pub solve_time: Duration,
    pub result: SolverResultType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverResultType {
    Satisfiable,
    Unsatisfiable,
    Timeout,
    NotRun,
}

impl Default for SatSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SatSolver {
    /// Create a new SAT solver instance
    pub fn new() -> Self {
        Self {
            solver: Solver::new(),
            variable_count: 0,
            clause_count: 0,
            timeout: None,
            last_result: None,
            total_solve_time: Duration::ZERO,
        }
    }

    /// Limit each subsequent solve call to `timeout` of wall time
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
        self.solver
            .set_callbacks(Some(Timeout::new(timeout.as_secs_f32())));
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Add clauses to the solver
    pub fn add_clauses(&mut self, clauses: &[Clause]) -> Result<()> {
        for clause in clauses {
            self.add_clause(clause)?;
        }
        Ok(())
    }

    /// Add a single clause to the solver
    pub fn add_clause(&mut self, clause: &Clause) -> Result<()> {
        if clause.is_empty() {
            return Err(SolveError::EmptyClause.into());
        }

        for &literal in &clause.literals {
            if literal == 0 {
                return Err(SolveError::ZeroLiteral.into());
            }
            let var = literal.unsigned_abs() as usize;
            if var > self.variable_count {
                self.variable_count = var;
            }
        }

        self.solver.add_clause(clause.literals.iter().copied());

        self.clause_count += 1;
        Ok(())
    }

    /// Solve the current formula
    pub fn solve(&mut self) -> Result<SolveOutcome> {
        let start_time = Instant::now();
        let result = self.solver.solve();
        let solve_time = start_time.elapsed();
        self.total_solve_time += solve_time;

        let outcome = match result {
            Some(true) => {
                let assignment = self.extract_assignment()?;
                SolveOutcome::Satisfiable(SolverSolution {
                    assignment,
                    solve_time,
                })
            }
            Some(false) => SolveOutcome::Unsatisfiable,
            None => SolveOutcome::Timeout,
        };

        self.last_result = Some(match outcome {
            SolveOutcome::Satisfiable(_) => SolverResultType::Satisfiable,
            SolveOutcome::Unsatisfiable => SolverResultType::Unsatisfiable,
            SolveOutcome::Timeout => SolverResultType::Timeout,
        });
        Ok(outcome)
    }

    /// Draw up to `max_solutions` distinct models. After each model the clause
    /// produced by `blocking` is added, so the next call must differ from it.
    pub fn solve_multiple<F>(&mut self, max_solutions: usize, blocking: F) -> Result<SolutionBatch>
    where
        F: Fn(&SolverSolution) -> Clause,
    {
        let mut batch = SolutionBatch {
            solutions: Vec::new(),
            exhausted: false,
            timed_out: false,
        };

        while batch.solutions.len() < max_solutions {
            match self.solve()? {
                SolveOutcome::Satisfiable(solution) => {
                    self.add_clause(&blocking(&solution))?;
                    batch.solutions.push(solution);
                }
                SolveOutcome::Unsatisfiable => {
                    batch.exhausted = true;
                    break;
                }
                SolveOutcome::Timeout => {
                    batch.timed_out = true;
                    break;
                }
            }
        }

        Ok(batch)
    }

    /// Extract variable assignment from the solver
    fn extract_assignment(&self) -> Result<HashMap<i32, bool>> {
        let mut assignment = HashMap::with_capacity(self.variable_count);

        for var in 1..=self.variable_count as i32 {
            if let Some(value) = self.solver.value(var) {
                assignment.insert(var, value);
            }
        }

        Ok(assignment)
    }

    /// Clause excluding every model that agrees with `solution` on `scope`
    pub fn blocking_clause(solution: &SolverSolution, scope: impl IntoIterator<Item = i32>) -> Clause {
        Clause::new(
            scope
                .into_iter()
                .map(|var| if solution.value(var) { -var } else { var })
                .collect(),
        )
    }

    /// Get solver statistics
    pub fn statistics(&self) -> SolverStatistics {
        SolverStatistics {
            variable_count: self.variable_count,
            clause_count: self.clause_count,
            solve_time: self.total_solve_time,
            result: self.last_result.unwrap_or(SolverResultType::NotRun),
        }
    }

    /// Get the number of variables
    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    /// Get the number of clauses
    pub fn clause_count(&self) -> usize {
        self.clause_count
    }
}

impl std::fmt::Display for SolverStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SAT Solver Statistics:")?;
        writeln!(f, "  Variables: {}", self.variable_count)?;
        writeln!(f, "  Clauses: {}", self.clause_count)?;
        writeln!(f, "  Solve time: {:.3}s", self.solve_time.as_secs_f64())?;
        writeln!(f, "  Result: {:?}", self.result)?;
        Ok(())
    }
}

impl std::fmt::Display for SolverSolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SAT Solution:")?;
        writeln!(f, "  Solve time: {:.3}s", self.solve_time.as_secs_f64())?;
        writeln!(f, "  Variables assigned: {}", self.assignment.len())?;

        let mut vars: Vec<_> = self.assignment.keys().collect();
        vars.sort();

        write!(f, "  Sample assignments: ")?;
        for (i, &var) in vars.iter().take(10).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let value = self.assignment[var];
            write!(f, "{}={}", var, if value { "T" } else { "F" })?;
        }
        if vars.len() > 10 {
            write!(f, ", ...")?;
        }
        writeln!(f)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_creation() {
        let solver = SatSolver::new();
        assert_eq!(solver.variable_count(), 0);
        assert_eq!(solver.clause_count(), 0);
        assert_eq!(solver.statistics().result, SolverResultType::NotRun);
    }

    #[test]
    fn test_simple_satisfiable() {
        let mut solver = SatSolver::new();

        // x1 ∨ x2, ¬x1 ∨ x2
        solver.add_clause(&Clause::new(vec![1, 2])).unwrap();
        solver.add_clause(&Clause::new(vec![-1, 2])).unwrap();

        match solver.solve().unwrap() {
            SolveOutcome::Satisfiable(solution) => {
                assert!(solution.value(2));
            }
            other => panic!("expected a model, got {:?}", other),
        }
        assert_eq!(solver.statistics().result, SolverResultType::Satisfiable);
    }

    #[test]
    fn test_unsatisfiable() {
        let mut solver = SatSolver::new();

        solver.add_clause(&Clause::unit(1)).unwrap();
        solver.add_clause(&Clause::unit(-1)).unwrap();

        assert!(matches!(solver.solve().unwrap(), SolveOutcome::Unsatisfiable));
    }

    #[test]
    fn test_multiple_solutions_are_distinct() {
        let mut solver = SatSolver::new();
        solver.add_clause(&Clause::new(vec![1, 2])).unwrap();

        let batch = solver
            .solve_multiple(10, |s| SatSolver::blocking_clause(s, [1, 2]))
            .unwrap();

        // x1 ∨ x2 has exactly three models over {x1, x2}
        assert_eq!(batch.solutions.len(), 3);
        assert!(batch.exhausted);
        assert!(!batch.timed_out);

        let mut seen: Vec<(bool, bool)> = batch
            .solutions
            .iter()
            .map(|s| (s.value(1), s.value(2)))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&(false, false)));
    }

    #[test]
    fn test_blocking_clause_scope() {
        let mut assignment = HashMap::new();
        assignment.insert(1, true);
        assignment.insert(2, false);
        assignment.insert(3, true);
        let solution = SolverSolution {
            assignment,
            solve_time: Duration::ZERO,
        };
        assert_eq!(solution.true_variables(), vec![1, 3]);

        let clause = SatSolver::blocking_clause(&solution, [1, 2]);
        assert_eq!(clause.literals, vec![-1, 2]);

        let clause = SatSolver::blocking_clause(&solution, solution.true_variables());
        assert_eq!(clause.literals, vec![-1, -3]);
    }

    #[test]
    fn test_timeout_is_configurable() {
        let mut solver = SatSolver::new();
        solver.set_timeout(Duration::from_secs(10));
        assert_eq!(solver.timeout(), Some(Duration::from_secs(10)));

        solver.add_clause(&Clause::new(vec![1, -2])).unwrap();
        assert!(matches!(solver.solve().unwrap(), SolveOutcome::Satisfiable(_)));
    }

    #[test]
    fn test_empty_clause_error() {
        let mut solver = SatSolver::new();
        assert!(solver.add_clause(&Clause::new(vec![])).is_err());
        assert!(solver.add_clause(&Clause::new(vec![1, 0])).is_err());
    }

    #[test]
    fn test_variable_count_tracking() {
        let mut solver = SatSolver::new();

        solver.add_clause(&Clause::new(vec![1, -5, 3])).unwrap();
        assert_eq!(solver.variable_count(), 5);

        solver.add_clause(&Clause::new(vec![2, -7])).unwrap();
        assert_eq!(solver.variable_count(), 7);
    }
}
