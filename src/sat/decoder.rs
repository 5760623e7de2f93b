//! Reading rules back out of satisfying assignments

use super::constraints::INERT_COLOR;
use super::solver::SolverSolution;
use super::variables::{VariableManager, VariableType};
use crate::polycube::vector::{FLAT_ORIENTATIONS, ORIENTATION_COUNT, PATCH_COUNT};
use crate::polycube::{CubeType, Patch, Rule};
use anyhow::Result;
use std::collections::HashMap;

/// Where one position's species and rotation came from in a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub position: usize,
    pub species: usize,
    pub rotation: usize,
}

/// Decodes models of one encoding
pub struct SolutionDecoder<'a> {
    variables: &'a VariableManager,
    torsion: bool,
    drop_inert_species: bool,
}

impl<'a> SolutionDecoder<'a> {
    pub fn new(variables: &'a VariableManager, torsion: bool) -> Self {
        Self {
            variables,
            torsion,
            drop_inert_species: false,
        }
    }

    /// Leave species with no active patch out of decoded rules
    pub fn drop_inert_species(mut self, drop: bool) -> Self {
        self.drop_inert_species = drop;
        self
    }

    fn is_true(&self, solution: &SolverSolution, var: VariableType) -> bool {
        self.variables
            .lookup(var)
            .is_some_and(|id| solution.value(id))
    }

    /// Raw color of every species patch
    pub fn raw_colors(&self, solution: &SolverSolution) -> Result<Vec<[usize; PATCH_COUNT]>> {
        let shape = self.variables.shape();
        let mut species = Vec::with_capacity(shape.species);
        for s in 0..shape.species {
            let mut colors = [0usize; PATCH_COUNT];
            for (p, slot) in colors.iter_mut().enumerate() {
                *slot = (0..shape.raw_colors)
                    .find(|&c| self.is_true(solution, VariableType::SpeciesColor { s, p, c }))
                    .ok_or_else(|| anyhow::anyhow!("Species {} patch {} has no color", s, p))?;
            }
            species.push(colors);
        }
        Ok(species)
    }

    /// Orientation of every species patch; the flat layout when the
    /// encoding has no orientation variables
    pub fn orientations(&self, solution: &SolverSolution) -> Result<Vec<[u8; PATCH_COUNT]>> {
        let shape = self.variables.shape();
        let mut species = Vec::with_capacity(shape.species);
        for s in 0..shape.species {
            let mut orientations = FLAT_ORIENTATIONS;
            if self.torsion {
                for (p, slot) in orientations.iter_mut().enumerate() {
                    *slot = (0..ORIENTATION_COUNT)
                        .find(|&o| {
                            self.is_true(solution, VariableType::SpeciesOrientation { s, p, o })
                        })
                        .ok_or_else(|| {
                            anyhow::anyhow!("Species {} patch {} has no orientation", s, p)
                        })? as u8;
                }
            }
            species.push(orientations);
        }
        Ok(species)
    }

    /// Partner of every raw color under the model's pairing
    pub fn color_pairs(&self, solution: &SolverSolution) -> HashMap<usize, usize> {
        let mut partners = HashMap::new();
        for (id, var) in self.variables.iter() {
            if let VariableType::Bind { c1, c2 } = *var {
                if solution.value(id) {
                    partners.insert(c1, c2);
                    partners.insert(c2, c1);
                }
            }
        }
        partners
    }

    /// True naming variables as `B(2,3)`, `C(0,1,4)` strings, plus the
    /// placements when `with_placements` is set
    pub fn named_solution(&self, solution: &SolverSolution, with_placements: bool) -> Vec<String> {
        self.variables
            .iter()
            .filter(|(id, var)| {
                let wanted = matches!(var.family(), 'B' | 'C' | 'O')
                    || (with_placements && var.family() == 'P');
                wanted && solution.value(*id)
            })
            .map(|(_, var)| var.to_string())
            .collect()
    }

    /// Species and rotation placed at each position
    pub fn placements(&self, solution: &SolverSolution) -> Result<Vec<Placement>> {
        let shape = self.variables.shape();
        (0..shape.positions)
            .map(|l| {
                (0..shape.species)
                    .flat_map(|s| (0..shape.rotations).map(move |r| (s, r)))
                    .find(|&(s, r)| self.is_true(solution, VariableType::Placement { l, s, r }))
                    .map(|(species, rotation)| Placement {
                        position: l,
                        species,
                        rotation,
                    })
                    .ok_or_else(|| anyhow::anyhow!("Position {} has no placement", l))
            })
            .collect()
    }

    /// Decode a model into a rule.
    ///
    /// Species are ordered by descending number of active patches (stable on
    /// ties). Each complementary pair gets the next free id in order of first
    /// appearance, and the member seen first is the positive one.
    pub fn decode(&self, solution: &SolverSolution) -> Result<Rule> {
        let raw = self.raw_colors(solution)?;
        let orientations = self.orientations(solution)?;
        let partners = self.color_pairs(solution);

        let is_inert = |c: usize| c <= INERT_COLOR;
        let active = |colors: &[usize; PATCH_COUNT]| colors.iter().filter(|&&c| !is_inert(c)).count();

        let mut order: Vec<usize> = (0..raw.len()).collect();
        order.sort_by_key(|&s| std::cmp::Reverse(active(&raw[s])));

        let mut ids: HashMap<usize, i32> = HashMap::new();
        let mut next_id = 1;
        let mut cube_types = Vec::with_capacity(raw.len());

        for s in order {
            if self.drop_inert_species && active(&raw[s]) == 0 {
                continue;
            }
            let mut patches = [Patch::default(); PATCH_COUNT];
            for (p, patch) in patches.iter_mut().enumerate() {
                let c = raw[s][p];
                let color = if is_inert(c) {
                    0
                } else if let Some(&id) = ids.get(&c) {
                    id
                } else {
                    let partner = *partners
                        .get(&c)
                        .ok_or_else(|| anyhow::anyhow!("Raw color {} has no partner", c))?;
                    ids.insert(c, next_id);
                    ids.insert(partner, -next_id);
                    next_id += 1;
                    next_id - 1
                };
                *patch = Patch::new(color, orientations[s][p]);
            }
            cube_types.push(CubeType::new(patches));
        }

        Ok(Rule::new(cube_types))
    }
}
