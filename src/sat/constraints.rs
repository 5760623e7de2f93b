//! Constraint generation for polycube rule synthesis
//!
//! The encoding follows the usual patchy-particle formulation: species
//! patches get colors and orientations (C, O), every position is filled by one
//! rotated species (P), position patches inherit colors and orientations from
//! the placed species (F, A), and every binding of the topology must join
//! complementary colors (B) with matching orientations (D).

use super::variables::{EncodingShape, VariableManager};
use crate::polycube::vector::{
    are_opposing, orientation_vector, FLAT_ORIENTATIONS, ORIENTATION_COUNT, PATCH_COUNT,
};
use crate::error::SolveError;
use crate::polycube::{RotationGroup, Topology};
use anyhow::Result;
use std::sync::Arc;

/// Raw color of inert patches. Raw color 0 is its partner and is never used
/// on a species.
pub const INERT_COLOR: usize = 1;

/// Represents a SAT clause (disjunction of literals)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    pub literals: Vec<i32>, // Positive for variable, negative for negation
}

impl Clause {
    /// Create a new clause from literals
    pub fn new(literals: Vec<i32>) -> Self {
        Self { literals }
    }

    /// Create a unit clause (single literal)
    pub fn unit(literal: i32) -> Self {
        Self {
            literals: vec![literal],
        }
    }

    /// Create a binary clause (two literals)
    pub fn binary(lit1: i32, lit2: i32) -> Self {
        Self {
            literals: vec![lit1, lit2],
        }
    }

    pub fn ternary(lit1: i32, lit2: i32, lit3: i32) -> Self {
        Self {
            literals: vec![lit1, lit2, lit3],
        }
    }

    /// Check if clause is empty (unsatisfiable)
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Check if clause is unit
    pub fn is_unit(&self) -> bool {
        self.literals.len() == 1
    }
}

/// "Exactly one of `vars` is true": one sorted at-least-one clause plus a
/// pairwise at-most-one clause for every pair.
pub fn exactly_one(vars: &[i32]) -> Vec<Clause> {
    let mut sorted = vars.to_vec();
    sorted.sort_unstable();

    let mut clauses = Vec::with_capacity(1 + sorted.len() * (sorted.len().saturating_sub(1)) / 2);
    clauses.push(Clause::new(sorted.clone()));
    for (i, &v1) in sorted.iter().enumerate() {
        for &v2 in &sorted[..i] {
            clauses.push(Clause::binary(-v1, -v2));
        }
    }
    clauses
}

/// Switches that shape one encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingOptions {
    pub dimensions: usize,
    pub torsion: bool,
    /// Pin color pairs to (2k, 2k+1) and inert patches to orientation 0
    pub symmetry_breaking: bool,
    /// Patches with no binding in the topology must be inert
    pub fix_empty_patches: bool,
    /// Every species must be placed somewhere, so a budget of `t` cube types
    /// means exactly `t` are used. Off gives the looser "at most `t`" encoding.
    pub require_all_species: bool,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            dimensions: 3,
            torsion: true,
            symmetry_breaking: true,
            fix_empty_patches: true,
            require_all_species: true,
        }
    }
}

/// Generates SAT constraints for one (species, colors) budget
pub struct ConstraintGenerator {
    variable_manager: VariableManager,
    topology: Arc<Topology>,
    rotations: Arc<RotationGroup>,
    species: usize,
    colors: usize,
    options: EncodingOptions,
    naming_variables: usize,
}

impl ConstraintGenerator {
    /// Create a new constraint generator
    pub fn new(
        topology: Arc<Topology>,
        rotations: Arc<RotationGroup>,
        species: usize,
        colors: usize,
        options: EncodingOptions,
    ) -> Result<Self> {
        if species == 0 || colors == 0 {
            return Err(SolveError::InvalidBudget {
                cube_types: species,
                colors,
            }
            .into());
        }
        if rotations.len() != RotationGroup::expected_order(options.dimensions) {
            return Err(SolveError::DimensionMismatch {
                group: rotations.dimensions(),
                encoding: options.dimensions,
            }
            .into());
        }

        let shape = EncodingShape {
            species,
            raw_colors: 2 * (colors + 1),
            positions: topology.position_count(),
            rotations: rotations.len(),
            patches: PATCH_COUNT,
            orientations: ORIENTATION_COUNT,
        };

        Ok(Self {
            variable_manager: VariableManager::new(shape),
            topology,
            rotations,
            species,
            colors,
            options,
            naming_variables: 0,
        })
    }

    fn raw_colors(&self) -> usize {
        2 * (self.colors + 1)
    }

    fn positions(&self) -> usize {
        self.topology.position_count()
    }

    /// Generate every clause of the encoding
    pub fn generate_all_constraints(&mut self) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();

        // B, C and O get the lowest IDs so a model's naming part is a prefix
        self.allocate_naming_variables()?;

        clauses.extend(self.generate_color_pairing()?);
        clauses.extend(self.generate_species_uniqueness()?);
        clauses.extend(self.generate_position_uniqueness()?);
        clauses.extend(self.generate_binding_constraints()?);
        if self.options.torsion {
            clauses.extend(self.generate_orientation_table()?);
        }
        clauses.extend(self.generate_placement_constraints()?);
        clauses.extend(self.generate_usage_constraints()?);
        if self.options.symmetry_breaking {
            clauses.extend(self.generate_symmetry_breaking_constraints()?);
        }
        if self.options.fix_empty_patches {
            clauses.extend(self.generate_empty_patch_constraints()?);
        }
        if self.options.dimensions < 3 {
            clauses.extend(self.generate_planar_constraints()?);
        }

        log::trace!(
            "Generated {} clauses over {} variables ({} naming)",
            clauses.len(),
            self.variable_manager.variable_count(),
            self.naming_variables
        );
        Ok(clauses)
    }

    fn allocate_naming_variables(&mut self) -> Result<()> {
        let n_c = self.raw_colors();
        for c1 in 0..n_c {
            for c2 in c1..n_c {
                self.variable_manager.bind(c1, c2)?;
            }
        }
        for s in 0..self.species {
            for p in 0..PATCH_COUNT {
                for c in 0..n_c {
                    self.variable_manager.species_color(s, p, c)?;
                }
            }
        }
        if self.options.torsion {
            for s in 0..self.species {
                for p in 0..PATCH_COUNT {
                    for o in 0..ORIENTATION_COUNT {
                        self.variable_manager.species_orientation(s, p, o)?;
                    }
                }
            }
        }
        self.naming_variables = self.variable_manager.variable_count();
        Ok(())
    }

    /// Each raw color has exactly one partner
    fn generate_color_pairing(&mut self) -> Result<Vec<Clause>> {
        let n_c = self.raw_colors();
        let mut clauses = Vec::new();
        for c1 in 0..n_c {
            let row = (0..n_c)
                .map(|c2| self.variable_manager.bind(c1, c2))
                .collect::<Result<Vec<_>>>()?;
            clauses.extend(exactly_one(&row));
        }
        Ok(clauses)
    }

    /// Each species patch has exactly one color and, with torsion, one orientation
    fn generate_species_uniqueness(&mut self) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        for s in 0..self.species {
            for p in 0..PATCH_COUNT {
                let colors = (0..self.raw_colors())
                    .map(|c| self.variable_manager.species_color(s, p, c))
                    .collect::<Result<Vec<_>>>()?;
                clauses.extend(exactly_one(&colors));

                if self.options.torsion {
                    let orientations = (0..ORIENTATION_COUNT)
                        .map(|o| self.variable_manager.species_orientation(s, p, o))
                        .collect::<Result<Vec<_>>>()?;
                    clauses.extend(exactly_one(&orientations));
                }
            }
        }
        Ok(clauses)
    }

    /// Each position patch shows exactly one color and, with torsion, one orientation
    fn generate_position_uniqueness(&mut self) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        for l in 0..self.positions() {
            for p in 0..PATCH_COUNT {
                let colors = (0..self.raw_colors())
                    .map(|c| self.variable_manager.position_color(l, p, c))
                    .collect::<Result<Vec<_>>>()?;
                clauses.extend(exactly_one(&colors));

                if self.options.torsion {
                    let orientations = (0..ORIENTATION_COUNT)
                        .map(|o| self.variable_manager.position_orientation(l, p, o))
                        .collect::<Result<Vec<_>>>()?;
                    clauses.extend(exactly_one(&orientations));
                }
            }
        }
        Ok(clauses)
    }

    /// Bound patches carry complementary colors and compatible orientations
    fn generate_binding_constraints(&mut self) -> Result<Vec<Clause>> {
        let n_c = self.raw_colors();
        let bindings = self.topology.bindings().to_vec();
        let mut clauses = Vec::new();

        for b in &bindings {
            for c1 in 0..n_c {
                for c2 in 0..n_c {
                    let f1 = self.variable_manager.position_color(b.position_a, b.patch_a, c1)?;
                    let f2 = self.variable_manager.position_color(b.position_b, b.patch_b, c2)?;
                    let bind = self.variable_manager.bind(c1, c2)?;
                    clauses.push(Clause::ternary(-f1, -f2, bind));
                }
            }

            if self.options.torsion {
                for o1 in 0..ORIENTATION_COUNT {
                    for o2 in 0..ORIENTATION_COUNT {
                        let a1 = self
                            .variable_manager
                            .position_orientation(b.position_a, b.patch_a, o1)?;
                        let a2 = self
                            .variable_manager
                            .position_orientation(b.position_b, b.patch_b, o2)?;
                        let d = self
                            .variable_manager
                            .orientation_match(b.patch_a, o1, b.patch_b, o2)?;
                        clauses.push(Clause::ternary(-a1, -a2, d));
                    }
                }
            }
        }
        Ok(clauses)
    }

    /// Fix D: two patches bind only when they face each other and their
    /// orientation markers point the same way
    fn generate_orientation_table(&mut self) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        for p1 in 0..PATCH_COUNT {
            for p2 in p1..PATCH_COUNT {
                for o1 in 0..ORIENTATION_COUNT {
                    for o2 in 0..ORIENTATION_COUNT {
                        let d = self.variable_manager.orientation_match(p1, o1, p2, o2)?;
                        let aligned = are_opposing(p1, p2)
                            && orientation_vector(p1, o1 as u8) == orientation_vector(p2, o2 as u8);
                        clauses.push(Clause::unit(if aligned { d } else { -d }));
                    }
                }
            }
        }
        Ok(clauses)
    }

    /// One placement per position, and a placement copies the rotated
    /// species onto the position
    fn generate_placement_constraints(&mut self) -> Result<Vec<Clause>> {
        let n_c = self.raw_colors();
        let n_r = self.rotations.len();
        let rotations = Arc::clone(&self.rotations);
        let mut clauses = Vec::new();

        for l in 0..self.positions() {
            let mut placements = Vec::with_capacity(self.species * n_r);
            for s in 0..self.species {
                for r in 0..n_r {
                    placements.push(self.variable_manager.placement(l, s, r)?);
                }
            }
            clauses.extend(exactly_one(&placements));
        }

        for l in 0..self.positions() {
            for s in 0..self.species {
                for r in 0..n_r {
                    let placed = self.variable_manager.placement(l, s, r)?;
                    for p in 0..PATCH_COUNT {
                        let p_rot = rotations.rotate_patch(p, r);
                        for c in 0..n_c {
                            let f = self.variable_manager.position_color(l, p, c)?;
                            let color = self.variable_manager.species_color(s, p_rot, c)?;
                            clauses.push(Clause::ternary(-placed, -f, color));
                            clauses.push(Clause::ternary(-placed, f, -color));
                        }

                        if self.options.torsion {
                            for o in 0..ORIENTATION_COUNT {
                                let o_rot = rotations.rotate_orientation(p, r, o as u8) as usize;
                                let a = self.variable_manager.position_orientation(l, p, o)?;
                                let orient =
                                    self.variable_manager.species_orientation(s, p_rot, o_rot)?;
                                clauses.push(Clause::ternary(-placed, -a, orient));
                                clauses.push(Clause::ternary(-placed, a, -orient));
                            }
                        }
                    }
                }
            }
        }
        Ok(clauses)
    }

    /// Pin the inert pair, forbid raw color 0 and self-complementary colors,
    /// require every other raw color on some species patch, and optionally
    /// every species at some position
    fn generate_usage_constraints(&mut self) -> Result<Vec<Clause>> {
        let n_c = self.raw_colors();
        let mut clauses = vec![Clause::unit(self.variable_manager.bind(0, INERT_COLOR)?)];

        for c in 0..n_c {
            clauses.push(Clause::unit(-self.variable_manager.bind(c, c)?));
        }

        for s in 0..self.species {
            for p in 0..PATCH_COUNT {
                clauses.push(Clause::unit(-self.variable_manager.species_color(s, p, 0)?));
            }
        }

        for c in 1..n_c {
            let mut users = Vec::with_capacity(self.species * PATCH_COUNT);
            for s in 0..self.species {
                for p in 0..PATCH_COUNT {
                    users.push(self.variable_manager.species_color(s, p, c)?);
                }
            }
            clauses.push(Clause::new(users));
        }

        if self.options.require_all_species {
            let n_r = self.rotations.len();
            for s in 0..self.species {
                let mut placements = Vec::with_capacity(self.positions() * n_r);
                for l in 0..self.positions() {
                    for r in 0..n_r {
                        placements.push(self.variable_manager.placement(l, s, r)?);
                    }
                }
                clauses.push(Clause::new(placements));
            }
        }
        Ok(clauses)
    }

    fn generate_symmetry_breaking_constraints(&mut self) -> Result<Vec<Clause>> {
        let n_c = self.raw_colors();
        let mut clauses = Vec::new();

        for c in (2..n_c - 1).step_by(2) {
            clauses.push(Clause::unit(self.variable_manager.bind(c, c + 1)?));
        }

        // Inert patches all point the same way
        if self.options.torsion && self.options.dimensions >= 3 {
            for s in 0..self.species {
                for p in 0..PATCH_COUNT {
                    let inert = self.variable_manager.species_color(s, p, INERT_COLOR)?;
                    let up = self.variable_manager.species_orientation(s, p, 0)?;
                    clauses.push(Clause::binary(-inert, up));
                }
            }
        }
        Ok(clauses)
    }

    fn generate_empty_patch_constraints(&mut self) -> Result<Vec<Clause>> {
        let empty = self.topology.empty_patches();
        let mut clauses = Vec::with_capacity(empty.len());
        for (l, p) in empty {
            clauses.push(Clause::unit(
                self.variable_manager.position_color(l, p, INERT_COLOR)?,
            ));
        }
        Ok(clauses)
    }

    /// Planar problems: out-of-plane patches are inert and, with torsion,
    /// every patch keeps its flat orientation
    fn generate_planar_constraints(&mut self) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        for s in 0..self.species {
            for p in 0..PATCH_COUNT {
                if p > 3 {
                    clauses.push(Clause::unit(
                        self.variable_manager.species_color(s, p, INERT_COLOR)?,
                    ));
                }
                if self.options.torsion {
                    let flat = FLAT_ORIENTATIONS[p] as usize;
                    clauses.push(Clause::unit(
                        self.variable_manager.species_orientation(s, p, flat)?,
                    ));
                }
            }
        }
        Ok(clauses)
    }

    /// Get the variable manager (for external access)
    pub fn variable_manager(&self) -> &VariableManager {
        &self.variable_manager
    }

    /// Number of B, C and O variables; they occupy IDs `1..=naming_variables`
    pub fn naming_variable_count(&self) -> usize {
        self.naming_variables
    }

    pub fn options(&self) -> &EncodingOptions {
        &self.options
    }

    pub fn species(&self) -> usize {
        self.species
    }

    pub fn colors(&self) -> usize {
        self.colors
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn rotations(&self) -> &RotationGroup {
        &self.rotations
    }

    /// Get constraint generation statistics
    pub fn statistics(&self) -> ConstraintStatistics {
        ConstraintStatistics {
            species: self.species,
            colors: self.colors,
            positions: self.positions(),
            rotations: self.rotations.len(),
            total_variables: self.variable_manager.variable_count(),
            naming_variables: self.naming_variables,
        }
    }
}

/// Statistics about constraint generation
#[derive(Debug, Clone)]
pub struct ConstraintStatistics {
    pub species: usize,
    pub colors: usize,
    pub positions: usize,
    pub rotations: usize,
    pub total_variables: usize,
    pub naming_variables: usize,
}

impl std::fmt::Display for ConstraintStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Constraint Generation Statistics:")?;
        writeln!(f, "  Budget: {} species, {} colors", self.species, self.colors)?;
        writeln!(f, "  Positions: {}", self.positions)?;
        writeln!(f, "  Rotations: {}", self.rotations)?;
        writeln!(f, "  Total variables: {}", self.total_variables)?;
        writeln!(f, "  Naming variables: {}", self.naming_variables)?;
        Ok(())
    }
}
