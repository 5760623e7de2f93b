//! Runs the full solve/validate/retry loop for one budget

use super::budget::Budget;
use super::oracle::ValidityOracle;
use super::outcome::{BudgetOutcome, BudgetReport};
use crate::error::SolveError;
use crate::polycube::{RotationGroup, Topology};
use crate::sat::{EncodingOptions, SatEncoder, SatSolver};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Limits on one budget's run
#[derive(Debug, Clone)]
pub struct WorkerLimits {
    /// Candidate rules sent to the oracle before giving up
    pub max_retries: usize,
    pub samples_per_round: usize,
    /// Wall time for the whole budget
    pub timeout: Duration,
    pub simplify: bool,
    /// Directory to write each budget's CNF to
    pub cnf_directory: Option<PathBuf>,
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self {
            max_retries: 100,
            samples_per_round: 1,
            timeout: Duration::from_secs(300),
            simplify: false,
            cnf_directory: None,
        }
    }
}

/// Everything needed to solve any budget of one problem. Cheap to clone and
/// safe to move into pool jobs.
#[derive(Clone)]
pub struct BudgetWorker {
    topology: Arc<Topology>,
    rotations: Arc<RotationGroup>,
    options: EncodingOptions,
    oracle: Arc<dyn ValidityOracle>,
    limits: WorkerLimits,
}

impl BudgetWorker {
    pub fn new(
        topology: Arc<Topology>,
        rotations: Arc<RotationGroup>,
        options: EncodingOptions,
        oracle: Arc<dyn ValidityOracle>,
        limits: WorkerLimits,
    ) -> Self {
        Self {
            topology,
            rotations,
            options,
            oracle,
            limits,
        }
    }

    pub fn limits(&self) -> &WorkerLimits {
        &self.limits
    }

    /// Solve one budget. Failures become an error outcome.
    pub fn run(&self, budget: Budget) -> BudgetReport {
        let start = Instant::now();
        let mut report = BudgetReport::new(budget, BudgetOutcome::Timeout);

        if let Err(e) = self.try_run(budget, start, &mut report) {
            error!("Budget {} failed: {:#}", budget, e);
            report.outcome = BudgetOutcome::Error {
                message: format!("{:#}", e),
            };
        }
        report.elapsed_seconds = start.elapsed().as_secs_f64();

        info!(
            "Budget {}: {} after {} candidate(s) in {:.2}s",
            budget,
            report.outcome.symbol(),
            report.attempts,
            report.elapsed_seconds
        );
        report
    }

    fn try_run(&self, budget: Budget, start: Instant, report: &mut BudgetReport) -> Result<()> {
        let mut encoder = SatEncoder::new(
            Arc::clone(&self.topology),
            Arc::clone(&self.rotations),
            budget.cube_types,
            budget.colors,
            self.options,
        )?;
        let cnf = encoder.encode()?;
        report.variables = cnf.variable_count;
        report.clauses = cnf.clauses.len();
        debug!(
            "Budget {}: {} variables, {} clauses",
            budget, report.variables, report.clauses
        );

        if let Some(ref dir) = self.limits.cnf_directory {
            let path = dir.join(format!("rule_{}_{}.cnf", budget.cube_types, budget.colors));
            cnf.write_dimacs(&path)?;
        }

        let mut solver = SatSolver::new();
        solver
            .add_clauses(&cnf.clauses)
            .context("Failed to add clauses to SAT solver")?;
        drop(cnf);

        let deadline = start + self.limits.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                report.outcome = BudgetOutcome::Timeout;
                return Ok(());
            }
            solver.set_timeout(remaining);

            let wanted = self
                .limits
                .samples_per_round
                .min(self.limits.max_retries - report.attempts);
            let batch = solver.solve_multiple(wanted, |s| encoder.blocking_clause(s))?;

            for solution in &batch.solutions {
                report.attempts += 1;
                let mut rule = encoder.decode(solution)?;
                if self.limits.simplify {
                    rule = rule.simplify();
                }

                let verdict = match self.oracle.validate(&rule, &self.topology) {
                    Ok(verdict) => verdict,
                    Err(e) if is_oracle_timeout(&e) => {
                        warn!("Budget {}: {:#}", budget, e);
                        report.outcome = BudgetOutcome::Timeout;
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                };
                if verdict.is_valid() {
                    report.outcome = BudgetOutcome::Solved { rule };
                    return Ok(());
                }
                debug!("Budget {}: candidate {} rejected ({:?})", budget, rule, verdict);
            }

            if batch.exhausted {
                // Unsatisfiable only if the oracle never rejected anything
                report.outcome = if report.attempts == 0 {
                    BudgetOutcome::Unsatisfiable
                } else {
                    BudgetOutcome::Exhausted
                };
                return Ok(());
            }
            if batch.timed_out {
                report.outcome = BudgetOutcome::Timeout;
                return Ok(());
            }
            if report.attempts >= self.limits.max_retries {
                report.outcome = BudgetOutcome::Exhausted;
                return Ok(());
            }
        }
    }
}

fn is_oracle_timeout(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<SolveError>(),
        Some(SolveError::OracleTimeout { .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polycube::{Binding, Rule, Vec3};
    use crate::config::ErrorPolicy;
    use crate::search::oracle::{AcceptAll, ExternalOracle, OracleVerdict};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct Rejecting {
        calls: AtomicUsize,
    }

    impl ValidityOracle for Rejecting {
        fn name(&self) -> &str {
            "rejecting"
        }

        fn validate(&self, _rule: &Rule, _topology: &Topology) -> Result<OracleVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(OracleVerdict::NonDeterministic)
        }
    }

    struct Failing;

    impl ValidityOracle for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn validate(&self, _rule: &Rule, _topology: &Topology) -> Result<OracleVerdict> {
            anyhow::bail!("simulator crashed")
        }
    }

    fn dimer() -> Arc<Topology> {
        Arc::new(Topology::new(vec![Binding::new(0, 0, 1, 1)]).unwrap())
    }

    fn square() -> Arc<Topology> {
        let coords = [
            Vec3::new(0, 0, 0),
            Vec3::new(1, 0, 0),
            Vec3::new(0, 1, 0),
            Vec3::new(1, 1, 0),
        ];
        Arc::new(Topology::from_coordinates(&coords).unwrap())
    }

    fn worker(
        topology: Arc<Topology>,
        dimensions: usize,
        oracle: Arc<dyn ValidityOracle>,
        limits: WorkerLimits,
    ) -> BudgetWorker {
        let options = EncodingOptions {
            dimensions,
            ..EncodingOptions::default()
        };
        let rotations = Arc::new(RotationGroup::new(dimensions).unwrap());
        BudgetWorker::new(topology, rotations, options, oracle, limits)
    }

    #[test]
    fn test_unsatisfiable_budget() {
        let w = worker(dimer(), 3, Arc::new(AcceptAll), WorkerLimits::default());
        let report = w.run(Budget::new(1, 1));
        assert_eq!(report.outcome, BudgetOutcome::Unsatisfiable);
        assert_eq!(report.attempts, 0);
        assert!(report.clauses > 0);
    }

    #[test]
    fn test_solved_budget() {
        let w = worker(dimer(), 3, Arc::new(AcceptAll), WorkerLimits::default());
        let report = w.run(Budget::new(2, 1));
        assert_eq!(report.attempts, 1);
        let rule = report.outcome.rule().unwrap();
        assert_eq!(rule.len(), 2);
        assert_eq!(rule.color_count(), 1);
    }

    #[test]
    fn test_rejected_candidates_are_not_unsatisfiable() {
        let oracle = Arc::new(Rejecting {
            calls: AtomicUsize::new(0),
        });
        let limits = WorkerLimits {
            max_retries: 3,
            samples_per_round: 2,
            ..WorkerLimits::default()
        };
        let w = worker(square(), 2, oracle.clone(), limits);
        let report = w.run(Budget::new(1, 1));
        assert_eq!(report.outcome, BudgetOutcome::Exhausted);
        assert!(report.attempts >= 1 && report.attempts <= 3);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), report.attempts);
    }

    #[test]
    fn test_oracle_failure_is_an_error_outcome() {
        let w = worker(dimer(), 3, Arc::new(Failing), WorkerLimits::default());
        match w.run(Budget::new(2, 1)).outcome {
            BudgetOutcome::Error { message } => assert!(message.contains("simulator crashed")),
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[test]
    fn test_cnf_is_saved() {
        let dir = tempdir().unwrap();
        let limits = WorkerLimits {
            cnf_directory: Some(dir.path().to_path_buf()),
            ..WorkerLimits::default()
        };
        let w = worker(dimer(), 3, Arc::new(AcceptAll), limits);
        let report = w.run(Budget::new(2, 1));
        let text = std::fs::read_to_string(dir.path().join("rule_2_1.cnf")).unwrap();
        assert!(text.starts_with(&format!("p cnf {} {}", report.variables, report.clauses)));
    }

    #[cfg(unix)]
    fn shell_oracle(script: &str, timeout: Duration) -> Arc<dyn ValidityOracle> {
        Arc::new(ExternalOracle::new(
            PathBuf::from("sh"),
            vec!["-c".to_string(), script.to_string(), "oracle".to_string()],
            timeout,
        ))
    }

    #[cfg(unix)]
    #[test]
    fn test_oracle_timeout_is_a_timeout_outcome() {
        let oracle = shell_oracle("sleep 5", Duration::from_millis(200));
        let w = worker(dimer(), 3, oracle, WorkerLimits::default());
        let report = w.run(Budget::new(2, 1));
        assert_eq!(report.outcome, BudgetOutcome::Timeout);
        assert!(!report.outcome.is_ruled_out(ErrorPolicy::RuleOut));
        assert!(!report.outcome.is_ruled_out(ErrorPolicy::Block));
        assert!(report.elapsed_seconds < 4.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_verbose_oracle_accepts() {
        // Output well past a pipe buffer, read only after the input is drained
        let oracle = shell_oracle(
            "cat >/dev/null; head -c 200000 /dev/zero; exit 0",
            Duration::from_secs(10),
        );
        let w = worker(dimer(), 3, oracle, WorkerLimits::default());
        let report = w.run(Budget::new(2, 1));
        assert!(
            matches!(report.outcome, BudgetOutcome::Solved { .. }),
            "got {:?}",
            report.outcome
        );
        assert_eq!(report.attempts, 1);
    }
}
