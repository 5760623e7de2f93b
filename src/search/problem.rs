//! The minimal-rule search over all budgets of one problem

use super::budget::{Budget, BudgetRange};
use super::oracle::{self, ValidityOracle};
use super::outcome::{decide, BudgetOutcome, BudgetReport, Decision, ResultsTable};
use super::report::{FoundRule, SearchReport};
use super::worker::{BudgetWorker, WorkerLimits};
use crate::config::{ErrorPolicy, Settings};
use crate::polycube::{load_problem, RotationGroup, Rule, Topology};
use crate::sat::encoder::ComplexityEstimate;
use crate::sat::{Cnf, EncodingOptions, SatEncoder};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

/// A topology plus everything that decides how its rules are searched
pub struct SearchProblem {
    settings: Settings,
    topology: Arc<Topology>,
    dimensions: usize,
    torsion: bool,
    oracle: Arc<dyn ValidityOracle>,
}

/// State shared between the pool jobs and the collecting thread
struct SearchState {
    order: Vec<Budget>,
    table: Mutex<ResultsTable>,
    final_budget: OnceLock<Budget>,
    /// Jobs with a larger index than this skip their budget
    cutoff: AtomicUsize,
}

impl SearchState {
    fn new(order: Vec<Budget>) -> Self {
        Self {
            order,
            table: Mutex::new(ResultsTable::new()),
            final_budget: OnceLock::new(),
            cutoff: AtomicUsize::new(usize::MAX),
        }
    }

    fn table(&self) -> MutexGuard<'_, ResultsTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, report: BudgetReport) {
        self.table().record(report);
    }

    fn is_cut(&self, index: usize) -> bool {
        index > self.cutoff.load(Ordering::Acquire)
    }

    /// Budgets after `budget` can no longer produce a cheaper rule
    fn cut_after(&self, budget: Budget) {
        if let Some(index) = self.order.iter().position(|b| *b == budget) {
            self.cutoff.fetch_min(index, Ordering::AcqRel);
        }
    }

    fn decide(&self, policy: ErrorPolicy) -> Decision {
        decide(&self.order, &self.table(), policy)
    }

    fn finalize(&self, budget: Budget) -> bool {
        self.final_budget.set(budget).is_ok()
    }

    fn final_budget(&self) -> Option<Budget> {
        self.final_budget.get().copied()
    }

    fn snapshot(&self) -> ResultsTable {
        self.table().clone()
    }
}

impl SearchProblem {
    /// Load the problem file named in the settings
    pub fn new(settings: Settings) -> Result<Self> {
        let problem = load_problem(&settings.problem.topology_file)
            .context("Failed to load topology file")?;
        let topology = problem.topology()?;
        let dimensions = settings.problem.dimensions.unwrap_or(problem.dimensions);
        let torsion = settings.problem.torsion.unwrap_or(problem.torsion);

        let mut settings = settings;
        // The problem file may ask for an exhaustive search; it cannot undo one
        if settings.search.stop_at_first {
            if let Some(stop) = problem.stop_at_first {
                settings.search.stop_at_first = stop;
            }
        }

        let oracle = oracle::from_config(&settings.oracle, dimensions, torsion)?;
        Ok(Self::with_topology(settings, topology, dimensions, torsion, oracle))
    }

    /// Create a problem with an explicit topology and oracle
    pub fn with_topology(
        settings: Settings,
        topology: Topology,
        dimensions: usize,
        torsion: bool,
        oracle: Arc<dyn ValidityOracle>,
    ) -> Self {
        Self {
            settings,
            topology: Arc::new(topology),
            dimensions,
            torsion,
            oracle,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn torsion(&self) -> bool {
        self.torsion
    }

    pub fn encoding_options(&self) -> EncodingOptions {
        let encoding = &self.settings.encoding;
        EncodingOptions {
            dimensions: self.dimensions,
            torsion: self.torsion,
            symmetry_breaking: encoding.symmetry_breaking,
            fix_empty_patches: encoding.fix_empty_patches,
            require_all_species: encoding.require_all_species,
        }
    }

    pub fn budget_range(&self) -> BudgetRange {
        BudgetRange::new(&self.settings.search, &self.topology)
    }

    /// Every budget, in the order they are dispatched
    pub fn budgets(&self) -> Vec<Budget> {
        self.budget_range().enumerate()
    }

    fn worker(&self, rotations: Arc<RotationGroup>) -> BudgetWorker {
        let search = &self.settings.search;
        let output = &self.settings.output;
        let limits = WorkerLimits {
            max_retries: search.max_retries,
            samples_per_round: search.samples_per_round,
            timeout: Duration::from_secs(self.settings.solver.timeout_seconds),
            simplify: self.settings.encoding.simplify,
            cnf_directory: output
                .save_cnf
                .then(|| output.output_directory.join("cnf")),
        };
        BudgetWorker::new(
            Arc::clone(&self.topology),
            rotations,
            self.encoding_options(),
            Arc::clone(&self.oracle),
            limits,
        )
    }

    /// Search every budget in parallel for the cheapest valid rule
    pub fn solve(&self) -> Result<SearchReport> {
        let start = Instant::now();
        let order = self.budgets();
        if order.is_empty() {
            anyhow::bail!("No budgets to search; check the cube type and color bounds");
        }

        info!(
            "Searching {} budgets for a {}-position, {}-binding topology ({}D, torsion {})",
            order.len(),
            self.topology.position_count(),
            self.topology.binding_count(),
            self.dimensions,
            if self.torsion { "on" } else { "off" }
        );

        let rotations = Arc::new(RotationGroup::new(self.dimensions)?);
        let worker = self.worker(rotations);
        let state = Arc::new(SearchState::new(order.clone()));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.search.threads)
            .build()
            .context("Failed to build worker pool")?;

        let (sender, receiver) = mpsc::channel::<Budget>();
        for (index, &budget) in order.iter().enumerate() {
            let worker = worker.clone();
            let state = Arc::clone(&state);
            let sender = sender.clone();
            pool.spawn_fifo(move || {
                let report = if state.is_cut(index) {
                    debug!("Skipping budget {}", budget);
                    BudgetReport::new(budget, BudgetOutcome::Skipped)
                } else {
                    worker.run(budget)
                };
                state.record(report);
                // The collector may already have stopped listening
                let _ = sender.send(budget);
            });
        }
        drop(sender);

        let policy = self.settings.search.error_policy;
        let stop_at_first = self.settings.search.stop_at_first;
        for budget in receiver.iter() {
            match state.decide(policy) {
                Decision::Final(best) => {
                    if state.finalize(best) {
                        info!("Budget {} is minimal", best);
                    }
                    if stop_at_first {
                        state.cut_after(best);
                        break;
                    }
                }
                Decision::Open {
                    best: Some(best),
                    blocking,
                } => {
                    debug!(
                        "Budget {} reported; best so far {}, waiting on {}",
                        budget, best, blocking
                    );
                    if stop_at_first {
                        state.cut_after(best);
                    }
                }
                Decision::Open { best: None, .. } | Decision::NoRule => {
                    debug!("Budget {} reported", budget);
                }
            }
        }

        let table = state.snapshot();
        let best = match state.final_budget() {
            Some(budget) => Some((budget, true)),
            None => match decide(&order, &table, policy) {
                Decision::Final(budget) => Some((budget, true)),
                Decision::Open { best, blocking } => {
                    if let Some(best) = best {
                        warn!(
                            "Rule for {} is not proven minimal: budget {} is unresolved",
                            best, blocking
                        );
                    }
                    best.map(|budget| (budget, false))
                }
                Decision::NoRule => None,
            },
        };

        let best = best.and_then(|(budget, proven_minimal)| {
            table
                .outcome(&budget)
                .and_then(BudgetOutcome::rule)
                .map(|rule| FoundRule {
                    budget,
                    rule: rule.clone(),
                    proven_minimal,
                })
        });

        match best {
            Some(ref found) => info!("Found rule {} at budget {}", found.rule, found.budget),
            None => info!("No rule found in range"),
        }

        Ok(SearchReport {
            dimensions: self.dimensions,
            torsion: self.torsion,
            positions: self.topology.position_count(),
            bindings: self.topology.binding_count(),
            best,
            budgets: table.in_order(&order),
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Run a single budget on the calling thread
    pub fn solve_budget(&self, budget: Budget) -> Result<BudgetReport> {
        let rotations = Arc::new(RotationGroup::new(self.dimensions)?);
        Ok(self.worker(rotations).run(budget))
    }

    /// The CNF of one budget
    pub fn encode_budget(&self, budget: Budget) -> Result<Cnf> {
        let rotations = Arc::new(RotationGroup::new(self.dimensions)?);
        let mut encoder = SatEncoder::new(
            Arc::clone(&self.topology),
            rotations,
            budget.cube_types,
            budget.colors,
            self.encoding_options(),
        )?;
        encoder.encode()
    }

    /// The fully addressable rule: one cube type per position and one color
    /// per binding. It always exists and bounds the search from above.
    pub fn baseline(&self) -> Result<Rule> {
        Rule::fully_addressable(&self.topology).context("Topology has no lattice embedding")
    }

    /// Size estimate of every budget's encoding
    pub fn estimate_complexity(&self) -> Vec<ComplexityEstimate> {
        let rotation_count = RotationGroup::expected_order(self.dimensions);
        self.budgets()
            .into_iter()
            .map(|b| {
                SatEncoder::estimate_complexity(
                    &self.topology,
                    rotation_count,
                    b.cube_types,
                    b.colors,
                    self.torsion,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polycube::{Binding, Vec3};
    use crate::search::oracle::{AcceptAll, OracleVerdict};
    use tempfile::tempdir;

    fn dimer() -> Topology {
        Topology::new(vec![Binding::new(0, 0, 1, 1)]).unwrap()
    }

    fn square() -> Topology {
        let coords = [
            Vec3::new(0, 0, 0),
            Vec3::new(1, 0, 0),
            Vec3::new(0, 1, 0),
            Vec3::new(1, 1, 0),
        ];
        Topology::from_coordinates(&coords).unwrap()
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.search.threads = 2;
        settings.solver.timeout_seconds = 60;
        settings
    }

    /// Fails on single-type rules, accepts everything else
    struct NoSingleType;

    impl ValidityOracle for NoSingleType {
        fn name(&self) -> &str {
            "no_single_type"
        }

        fn validate(&self, rule: &Rule, _topology: &Topology) -> Result<OracleVerdict> {
            if rule.len() == 1 {
                anyhow::bail!("assembly check crashed");
            }
            Ok(OracleVerdict::Valid)
        }
    }

    struct RejectAll;

    impl ValidityOracle for RejectAll {
        fn name(&self) -> &str {
            "reject_all"
        }

        fn validate(&self, _rule: &Rule, _topology: &Topology) -> Result<OracleVerdict> {
            Ok(OracleVerdict::Unbounded)
        }
    }

    #[test]
    fn test_dimer_needs_two_cube_types() {
        let problem = SearchProblem::with_topology(settings(), dimer(), 3, true, Arc::new(AcceptAll));
        assert_eq!(problem.budgets(), vec![Budget::new(1, 1), Budget::new(2, 1)]);

        let report = problem.solve().unwrap();
        let found = report.best.as_ref().unwrap();
        assert_eq!(found.budget, Budget::new(2, 1));
        assert!(found.proven_minimal);
        assert_eq!(found.rule.len(), 2);
        assert_eq!(report.outcome(Budget::new(1, 1)), Some(&BudgetOutcome::Unsatisfiable));
    }

    #[test]
    fn test_dimer_with_free_faces_needs_one_cube_type() {
        let mut settings = settings();
        settings.encoding.fix_empty_patches = false;
        let problem = SearchProblem::with_topology(settings, dimer(), 3, true, Arc::new(AcceptAll));

        let report = problem.solve().unwrap();
        let found = report.best.as_ref().unwrap();
        assert_eq!(found.budget, Budget::new(1, 1));
        assert!(found.proven_minimal);
        assert_eq!(found.rule.len(), 1);
        assert_eq!(found.rule.color_count(), 1);
        let cube = &found.rule.cube_types[0];
        assert!(cube.patches.iter().any(|p| p.color == 1));
        assert!(cube.patches.iter().any(|p| p.color == -1));
    }

    #[test]
    fn test_square_in_plane_needs_one_cube_type() {
        let problem =
            SearchProblem::with_topology(settings(), square(), 2, true, Arc::new(AcceptAll));
        let report = problem.solve().unwrap();
        let found = report.best.unwrap();
        assert_eq!(found.budget, Budget::new(1, 1));
        assert!(found.proven_minimal);
        assert_eq!(found.rule.cube_types[0].active_patch_count(), 2);
    }

    #[test]
    fn test_exhaustive_search_reports_every_budget() {
        let mut settings = settings();
        settings.search.stop_at_first = false;
        let problem =
            SearchProblem::with_topology(settings, square(), 2, true, Arc::new(AcceptAll));
        let report = problem.solve().unwrap();
        assert_eq!(report.budgets.len(), problem.budgets().len());
        assert!(report
            .budgets
            .iter()
            .all(|r| r.outcome != BudgetOutcome::Skipped));
        assert_eq!(report.best.unwrap().budget, Budget::new(1, 1));
    }

    #[test]
    fn test_rejected_candidates_leave_no_rule() {
        let mut settings = settings();
        settings.search.max_retries = 5;
        let problem = SearchProblem::with_topology(settings, dimer(), 3, true, Arc::new(RejectAll));
        let report = problem.solve().unwrap();
        assert!(report.best.is_none());
        assert_eq!(report.outcome(Budget::new(1, 1)), Some(&BudgetOutcome::Unsatisfiable));
        assert_eq!(report.outcome(Budget::new(2, 1)), Some(&BudgetOutcome::Exhausted));
    }

    #[test]
    fn test_error_policy_controls_minimality() {
        let mut blocking = settings();
        blocking.search.max_cube_types = Some(2);
        blocking.search.max_colors = Some(1);
        let problem =
            SearchProblem::with_topology(blocking.clone(), square(), 2, true, Arc::new(NoSingleType));
        let report = problem.solve().unwrap();
        assert!(matches!(
            report.outcome(Budget::new(1, 1)),
            Some(BudgetOutcome::Error { .. })
        ));
        let found = report.best.unwrap();
        assert_eq!(found.budget, Budget::new(2, 1));
        assert!(!found.proven_minimal);

        let mut rule_out = blocking;
        rule_out.search.error_policy = ErrorPolicy::RuleOut;
        let problem =
            SearchProblem::with_topology(rule_out, square(), 2, true, Arc::new(NoSingleType));
        let found = problem.solve().unwrap().best.unwrap();
        assert_eq!(found.budget, Budget::new(2, 1));
        assert!(found.proven_minimal);
    }

    #[test]
    fn test_empty_budget_range_is_an_error() {
        let mut settings = settings();
        settings.search.min_cube_types = 5;
        let problem = SearchProblem::with_topology(settings, dimer(), 3, true, Arc::new(AcceptAll));
        assert!(problem.budgets().is_empty());
        assert!(problem.solve().is_err());
    }

    #[test]
    fn test_new_reads_problem_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dimer.json");
        std::fs::write(&path, r#"{"bindings": [[0,0,1,1]], "nDim": 3, "torsion": false, "stopAtFirst": false}"#)
            .unwrap();

        let mut settings = settings();
        settings.problem.topology_file = path;
        let problem = SearchProblem::new(settings).unwrap();
        assert_eq!(problem.dimensions(), 3);
        assert!(!problem.torsion());
        assert!(!problem.settings().search.stop_at_first);
        assert_eq!(problem.topology().binding_count(), 1);
    }

    #[test]
    fn test_single_budget_and_encoding() {
        let problem = SearchProblem::with_topology(settings(), dimer(), 3, true, Arc::new(AcceptAll));
        let report = problem.solve_budget(Budget::new(2, 1)).unwrap();
        assert!(report.outcome.rule().is_some());

        let cnf = problem.encode_budget(Budget::new(2, 1)).unwrap();
        assert_eq!(cnf.variable_count, report.variables);
        assert_eq!(cnf.clauses.len(), report.clauses);
    }

    #[test]
    fn test_baseline_and_estimates() {
        let problem = SearchProblem::with_topology(settings(), square(), 2, true, Arc::new(AcceptAll));
        let baseline = problem.baseline().unwrap();
        assert_eq!(baseline.len(), 4);
        assert_eq!(baseline.color_count(), 4);

        let estimates = problem.estimate_complexity();
        assert_eq!(estimates.len(), problem.budgets().len());
        assert!(estimates.iter().all(|e| e.estimated_clauses > 0));
    }
}
