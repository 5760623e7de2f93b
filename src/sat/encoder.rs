//! SAT encoder for one (species, colors) budget

use super::constraints::{Clause, ConstraintGenerator, EncodingOptions};
use super::decoder::{Placement, SolutionDecoder};
use super::solver::{SatSolver, SolverSolution};
use super::variables::VariableType;
use crate::polycube::vector::{are_opposing, orientation_vector, ORIENTATION_COUNT};
use crate::polycube::{RotationGroup, Rule, Topology};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

/// A complete CNF formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cnf {
    pub variable_count: usize,
    pub clauses: Vec<Clause>,
}

impl Cnf {
    /// DIMACS text: a `p cnf` header followed by one zero-terminated clause per line
    pub fn to_dimacs(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "p cnf {} {}", self.variable_count, self.clauses.len());
        for clause in &self.clauses {
            for lit in &clause.literals {
                let _ = write!(out, "{} ", lit);
            }
            out.push_str("0\n");
        }
        out
    }

    pub fn write_dimacs<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, self.to_dimacs())
            .with_context(|| format!("Failed to write CNF file: {}", path.display()))
    }

    /// Parse DIMACS text. Comment lines are skipped and clauses may span lines.
    pub fn parse_dimacs(text: &str) -> Result<Cnf> {
        let mut header: Option<(usize, usize)> = None;
        let mut clauses = Vec::new();
        let mut current = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('c') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("p cnf") {
                let numbers: Vec<usize> = rest
                    .split_whitespace()
                    .map(str::parse)
                    .collect::<std::result::Result<_, _>>()
                    .context("Invalid DIMACS header")?;
                match numbers.as_slice() {
                    [vars, clauses] => header = Some((*vars, *clauses)),
                    _ => anyhow::bail!("DIMACS header needs two numbers: '{}'", line),
                }
                continue;
            }
            for token in line.split_whitespace() {
                let lit: i32 = token
                    .parse()
                    .with_context(|| format!("Invalid literal '{}'", token))?;
                if lit == 0 {
                    clauses.push(Clause::new(std::mem::take(&mut current)));
                } else {
                    current.push(lit);
                }
            }
        }
        if !current.is_empty() {
            clauses.push(Clause::new(current));
        }

        let (variable_count, expected) = header.context("Missing DIMACS header")?;
        if expected != clauses.len() {
            anyhow::bail!("Header declares {} clauses, found {}", expected, clauses.len());
        }
        Ok(Cnf {
            variable_count,
            clauses,
        })
    }
}

/// Encodes the rule search for one budget and interprets its models
pub struct SatEncoder {
    constraint_generator: ConstraintGenerator,
    clause_count: usize,
    encoded: bool,
}

impl SatEncoder {
    pub fn new(
        topology: Arc<Topology>,
        rotations: Arc<RotationGroup>,
        species: usize,
        colors: usize,
        options: EncodingOptions,
    ) -> Result<Self> {
        let constraint_generator =
            ConstraintGenerator::new(topology, rotations, species, colors, options)?;
        Ok(Self {
            constraint_generator,
            clause_count: 0,
            encoded: false,
        })
    }

    /// Build the CNF. May only be called once per encoder.
    pub fn encode(&mut self) -> Result<Cnf> {
        if self.encoded {
            anyhow::bail!("Encoder has already produced its formula");
        }
        let clauses = self
            .constraint_generator
            .generate_all_constraints()
            .context("Failed to generate SAT constraints")?;
        self.encoded = true;
        self.clause_count = clauses.len();

        Ok(Cnf {
            variable_count: self.constraint_generator.variable_manager().variable_count(),
            clauses,
        })
    }

    /// Encode and load the formula into a fresh solver
    pub fn build_solver(&mut self) -> Result<SatSolver> {
        let cnf = self.encode()?;
        let mut solver = SatSolver::new();
        solver
            .add_clauses(&cnf.clauses)
            .context("Failed to add clauses to SAT solver")?;
        Ok(solver)
    }

    /// Clause ruling out the species coloring and orientation of `solution`.
    /// Other models that decode to the same rule stay possible only through
    /// different placements.
    pub fn blocking_clause(&self, solution: &SolverSolution) -> Clause {
        let vm = self.constraint_generator.variable_manager();
        let literals = vm
            .iter()
            .filter(|(id, var)| {
                matches!(
                    var,
                    VariableType::SpeciesColor { .. } | VariableType::SpeciesOrientation { .. }
                ) && solution.value(*id)
            })
            .map(|(id, _)| -id)
            .collect();
        Clause::new(literals)
    }

    pub fn decoder(&self) -> SolutionDecoder<'_> {
        SolutionDecoder::new(
            self.constraint_generator.variable_manager(),
            self.constraint_generator.options().torsion,
        )
    }

    pub fn decode(&self, solution: &SolverSolution) -> Result<Rule> {
        self.decoder().decode(solution)
    }

    /// Check that a model realizes every binding of the topology: bound
    /// position patches carry paired colors and, with torsion, face each other
    /// with aligned markers. Returns a description of the first violation.
    pub fn verify_model(&self, solution: &SolverSolution) -> Result<()> {
        let decoder = self.decoder();
        let placements: Vec<Placement> = decoder.placements(solution)?;
        let raw = decoder.raw_colors(solution)?;
        let orientations = decoder.orientations(solution)?;
        let partners = decoder.color_pairs(solution);
        let rotations = self.constraint_generator.rotations();
        let torsion = self.constraint_generator.options().torsion;

        // Color and orientation shown at (position, patch)
        let shown = |l: usize, p: usize| -> (usize, u8) {
            let placement = placements[l];
            let p_rot = rotations.rotate_patch(p, placement.rotation);
            let o = (0..ORIENTATION_COUNT as u8)
                .find(|&o| {
                    rotations.rotate_orientation(p, placement.rotation, o)
                        == orientations[placement.species][p_rot]
                })
                .unwrap_or(0);
            (raw[placement.species][p_rot], o)
        };

        for (i, b) in self.constraint_generator.topology().bindings().iter().enumerate() {
            let (c1, o1) = shown(b.position_a, b.patch_a);
            let (c2, o2) = shown(b.position_b, b.patch_b);
            if partners.get(&c1) != Some(&c2) {
                anyhow::bail!("Binding {} joins unpaired raw colors {} and {}", i, c1, c2);
            }
            if torsion
                && !(are_opposing(b.patch_a, b.patch_b)
                    && orientation_vector(b.patch_a, o1) == orientation_vector(b.patch_b, o2))
            {
                anyhow::bail!("Binding {} has misaligned orientations {} and {}", i, o1, o2);
            }
        }
        Ok(())
    }

    /// Get encoding statistics
    pub fn statistics(&self) -> EncodingStatistics {
        let constraint_stats = self.constraint_generator.statistics();
        EncodingStatistics {
            species: constraint_stats.species,
            colors: constraint_stats.colors,
            positions: constraint_stats.positions,
            rotations: constraint_stats.rotations,
            total_variables: constraint_stats.total_variables,
            naming_variables: constraint_stats.naming_variables,
            total_clauses: self.clause_count,
        }
    }

    /// Rough size of the encoding without building it
    pub fn estimate_complexity(
        topology: &Topology,
        rotation_count: usize,
        species: usize,
        colors: usize,
        torsion: bool,
    ) -> ComplexityEstimate {
        let raw = 2 * (colors + 1);
        let positions = topology.position_count();
        let orientations = if torsion { ORIENTATION_COUNT } else { 0 };

        let naming = raw * (raw + 1) / 2 + species * 6 * (raw + orientations);
        let structural = positions * 6 * (raw + orientations) + positions * species * rotation_count;
        let estimated_variables = naming + structural;

        // Placement linking dominates: two clauses per (l, s, r, p, value)
        let estimated_clauses = positions * species * rotation_count * 6 * (raw + orientations) * 2
            + topology.binding_count() * (raw * raw + orientations * orientations)
            + positions * 6 * (raw * raw + orientations * orientations) / 2;

        let complexity_level = if estimated_clauses < 100_000 {
            ComplexityLevel::Low
        } else if estimated_clauses < 1_000_000 {
            ComplexityLevel::Medium
        } else if estimated_clauses < 10_000_000 {
            ComplexityLevel::High
        } else {
            ComplexityLevel::VeryHigh
        };

        ComplexityEstimate {
            complexity_level,
            species,
            colors,
            estimated_variables,
            estimated_clauses,
        }
    }
}

/// Statistics about the SAT encoding
#[derive(Debug, Clone)]
pub struct EncodingStatistics {
    pub species: usize,
    pub colors: usize,
    pub positions: usize,
    pub rotations: usize,
    pub total_variables: usize,
    pub naming_variables: usize,
    pub total_clauses: usize,
}

/// Complexity estimate for one budget
#[derive(Debug, Clone)]
pub struct ComplexityEstimate {
    pub complexity_level: ComplexityLevel,
    pub species: usize,
    pub colors: usize,
    pub estimated_variables: usize,
    pub estimated_clauses: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl std::fmt::Display for EncodingStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SAT Encoding Statistics:")?;
        writeln!(f, "  Budget: {} species, {} colors", self.species, self.colors)?;
        writeln!(f, "  Positions: {}", self.positions)?;
        writeln!(f, "  Rotations: {}", self.rotations)?;
        writeln!(f, "  Total variables: {}", self.total_variables)?;
        writeln!(f, "  Naming variables: {}", self.naming_variables)?;
        writeln!(f, "  Total clauses: {}", self.total_clauses)?;
        Ok(())
    }
}

impl std::fmt::Display for ComplexityEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Budget ({} species, {} colors): {:?}",
            self.species, self.colors, self.complexity_level
        )?;
        writeln!(f, "  Estimated variables: {}", self.estimated_variables)?;
        writeln!(f, "  Estimated clauses: {}", self.estimated_clauses)?;

        let recommendation = match self.complexity_level {
            ComplexityLevel::Low => "Should solve quickly",
            ComplexityLevel::Medium => "May take some time to solve",
            ComplexityLevel::High => "Likely to be slow, consider a longer timeout",
            ComplexityLevel::VeryHigh => "Very large encoding, consider narrowing the budget range",
        };
        writeln!(f, "  Recommendation: {}", recommendation)?;
        Ok(())
    }
}
