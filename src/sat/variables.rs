//! Variable management for SAT encoding

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;

/// Types of variables used in the SAT encoding.
///
/// Colors here are raw color codes `0..2 * (colors + 1)`: codes 0 and 1 are
/// the inert pair, and codes `2k`, `2k + 1` start out as the k-th pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableType {
    /// Raw colors `c1 <= c2` are complementary
    Bind { c1: usize, c2: usize },
    /// Species `s` has raw color `c` on patch `p`
    SpeciesColor { s: usize, p: usize, c: usize },
    /// Species `s` has orientation `o` on patch `p`
    SpeciesOrientation { s: usize, p: usize, o: usize },
    /// Position `l` shows raw color `c` on patch `p`
    PositionColor { l: usize, p: usize, c: usize },
    /// Position `l` shows orientation `o` on patch `p`
    PositionOrientation { l: usize, p: usize, o: usize },
    /// Position `l` holds species `s` under rotation `r`
    Placement { l: usize, s: usize, r: usize },
    /// Patch `p1` at orientation `o1` can bind patch `p2` at orientation `o2`,
    /// with `p1 <= p2`
    OrientationMatch { p1: usize, o1: usize, p2: usize, o2: usize },
}

impl VariableType {
    /// Single-letter family name
    pub fn family(&self) -> char {
        match self {
            VariableType::Bind { .. } => 'B',
            VariableType::SpeciesColor { .. } => 'C',
            VariableType::SpeciesOrientation { .. } => 'O',
            VariableType::PositionColor { .. } => 'F',
            VariableType::PositionOrientation { .. } => 'A',
            VariableType::Placement { .. } => 'P',
            VariableType::OrientationMatch { .. } => 'D',
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            VariableType::Bind { c1, c2 } => write!(f, "B({},{})", c1, c2),
            VariableType::SpeciesColor { s, p, c } => write!(f, "C({},{},{})", s, p, c),
            VariableType::SpeciesOrientation { s, p, o } => write!(f, "O({},{},{})", s, p, o),
            VariableType::PositionColor { l, p, c } => write!(f, "F({},{},{})", l, p, c),
            VariableType::PositionOrientation { l, p, o } => write!(f, "A({},{},{})", l, p, o),
            VariableType::Placement { l, s, r } => write!(f, "P({},{},{})", l, s, r),
            VariableType::OrientationMatch { p1, o1, p2, o2 } => {
                write!(f, "D({},{},{},{})", p1, o1, p2, o2)
            }
        }
    }
}

/// Ranges every variable index must fall in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingShape {
    pub species: usize,
    pub raw_colors: usize,
    pub positions: usize,
    pub rotations: usize,
    pub patches: usize,
    pub orientations: usize,
}

/// Manages SAT variables and their mapping to integers
#[derive(Debug)]
pub struct VariableManager {
    /// Map from variable type to SAT variable ID (positive integer)
    variable_map: HashMap<VariableType, i32>,
    /// Reverse lookup, indexed by `id - 1`
    names: Vec<VariableType>,
    /// Next available variable ID
    next_id: i32,
    shape: EncodingShape,
}

impl VariableManager {
    pub fn new(shape: EncodingShape) -> Self {
        Self {
            variable_map: HashMap::new(),
            names: Vec::new(),
            next_id: 1, // SAT variables start from 1
            shape,
        }
    }

    /// Get or create a variable ID for the given variable type. Symmetric
    /// families are normalized first, so `B(3,2)` and `B(2,3)` share an ID.
    pub fn get_variable(&mut self, var_type: VariableType) -> Result<i32> {
        let var_type = Self::normalize(var_type);
        if let Some(&id) = self.variable_map.get(&var_type) {
            return Ok(id);
        }

        self.validate_variable(&var_type)?;

        let id = self.next_id;
        self.next_id += 1;
        self.variable_map.insert(var_type, id);
        self.names.push(var_type);
        Ok(id)
    }

    /// Look up an existing variable without creating it
    pub fn lookup(&self, var_type: VariableType) -> Option<i32> {
        self.variable_map.get(&Self::normalize(var_type)).copied()
    }

    /// Variable type behind an ID
    pub fn name_of(&self, id: i32) -> Option<&VariableType> {
        if id < 1 {
            return None;
        }
        self.names.get(id as usize - 1)
    }

    pub fn bind(&mut self, c1: usize, c2: usize) -> Result<i32> {
        self.get_variable(VariableType::Bind { c1, c2 })
    }

    pub fn species_color(&mut self, s: usize, p: usize, c: usize) -> Result<i32> {
        self.get_variable(VariableType::SpeciesColor { s, p, c })
    }

    pub fn species_orientation(&mut self, s: usize, p: usize, o: usize) -> Result<i32> {
        self.get_variable(VariableType::SpeciesOrientation { s, p, o })
    }

    pub fn position_color(&mut self, l: usize, p: usize, c: usize) -> Result<i32> {
        self.get_variable(VariableType::PositionColor { l, p, c })
    }

    pub fn position_orientation(&mut self, l: usize, p: usize, o: usize) -> Result<i32> {
        self.get_variable(VariableType::PositionOrientation { l, p, o })
    }

    pub fn placement(&mut self, l: usize, s: usize, r: usize) -> Result<i32> {
        self.get_variable(VariableType::Placement { l, s, r })
    }

    pub fn orientation_match(&mut self, p1: usize, o1: usize, p2: usize, o2: usize) -> Result<i32> {
        self.get_variable(VariableType::OrientationMatch { p1, o1, p2, o2 })
    }

    /// Get the total number of variables created
    pub fn variable_count(&self) -> usize {
        (self.next_id - 1) as usize
    }

    pub fn shape(&self) -> &EncodingShape {
        &self.shape
    }

    /// Iterate `(id, variable)` pairs in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (i32, &VariableType)> {
        self.names.iter().enumerate().map(|(i, v)| (i as i32 + 1, v))
    }

    fn normalize(var_type: VariableType) -> VariableType {
        match var_type {
            VariableType::Bind { c1, c2 } if c1 > c2 => VariableType::Bind { c1: c2, c2: c1 },
            VariableType::OrientationMatch { p1, o1, p2, o2 } if p1 > p2 => {
                VariableType::OrientationMatch {
                    p1: p2,
                    o1: o2,
                    p2: p1,
                    o2: o1,
                }
            }
            other => other,
        }
    }

    /// Validate that a variable type is within bounds
    fn validate_variable(&self, var_type: &VariableType) -> Result<()> {
        let shape = &self.shape;
        let check = |name: &str, value: usize, bound: usize| -> Result<()> {
            if value >= bound {
                anyhow::bail!("{} index {} out of bounds ({}) in {}", name, value, bound, var_type);
            }
            Ok(())
        };

        match *var_type {
            VariableType::Bind { c1, c2 } => {
                check("color", c1, shape.raw_colors)?;
                check("color", c2, shape.raw_colors)?;
            }
            VariableType::SpeciesColor { s, p, c } => {
                check("species", s, shape.species)?;
                check("patch", p, shape.patches)?;
                check("color", c, shape.raw_colors)?;
            }
            VariableType::SpeciesOrientation { s, p, o } => {
                check("species", s, shape.species)?;
                check("patch", p, shape.patches)?;
                check("orientation", o, shape.orientations)?;
            }
            VariableType::PositionColor { l, p, c } => {
                check("position", l, shape.positions)?;
                check("patch", p, shape.patches)?;
                check("color", c, shape.raw_colors)?;
            }
            VariableType::PositionOrientation { l, p, o } => {
                check("position", l, shape.positions)?;
                check("patch", p, shape.patches)?;
                check("orientation", o, shape.orientations)?;
            }
            VariableType::Placement { l, s, r } => {
                check("position", l, shape.positions)?;
                check("species", s, shape.species)?;
                check("rotation", r, shape.rotations)?;
            }
            VariableType::OrientationMatch { p1, o1, p2, o2 } => {
                check("patch", p1, shape.patches)?;
                check("patch", p2, shape.patches)?;
                check("orientation", o1, shape.orientations)?;
                check("orientation", o2, shape.orientations)?;
            }
        }
        Ok(())
    }

    /// Get statistics about variable usage
    pub fn statistics(&self) -> VariableStatistics {
        let mut per_family: Vec<(char, usize)> = Vec::new();
        for var_type in &self.names {
            let family = var_type.family();
            match per_family.iter_mut().find(|(f, _)| *f == family) {
                Some((_, count)) => *count += 1,
                None => per_family.push((family, 1)),
            }
        }

        VariableStatistics {
            total_variables: self.variable_count(),
            per_family,
        }
    }
}

/// Statistics about variable usage
#[derive(Debug, Clone)]
pub struct VariableStatistics {
    pub total_variables: usize,
    /// Count per family letter, in allocation order
    pub per_family: Vec<(char, usize)>,
}

impl VariableStatistics {
    pub fn family(&self, family: char) -> usize {
        self.per_family
            .iter()
            .find(|(f, _)| *f == family)
            .map_or(0, |(_, count)| *count)
    }
}

impl fmt::Display for VariableStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Variable Statistics:")?;
        writeln!(f, "  Total variables: {}", self.total_variables)?;
        for (family, count) in &self.per_family {
            writeln!(f, "  {} variables: {}", family, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> EncodingShape {
        EncodingShape {
            species: 2,
            raw_colors: 4,
            positions: 3,
            rotations: 24,
            patches: 6,
            orientations: 4,
        }
    }

    #[test]
    fn test_variable_creation() {
        let mut vm = VariableManager::new(shape());

        let var1 = vm.species_color(0, 0, 0).unwrap();
        let var2 = vm.placement(2, 1, 23).unwrap();

        assert_eq!(var1, 1);
        assert_eq!(var2, 2);

        // Same variable returns same ID
        assert_eq!(vm.species_color(0, 0, 0).unwrap(), var1);
        assert_eq!(vm.variable_count(), 2);
    }

    #[test]
    fn test_symmetric_families_share_ids() {
        let mut vm = VariableManager::new(shape());
        let b = vm.bind(3, 1).unwrap();
        assert_eq!(vm.bind(1, 3).unwrap(), b);
        assert_eq!(vm.name_of(b), Some(&VariableType::Bind { c1: 1, c2: 3 }));

        let d = vm.orientation_match(5, 2, 4, 1).unwrap();
        assert_eq!(vm.orientation_match(4, 1, 5, 2).unwrap(), d);
        assert_ne!(vm.orientation_match(4, 2, 5, 1).unwrap(), d);
    }

    #[test]
    fn test_variable_bounds() {
        let mut vm = VariableManager::new(shape());

        assert!(vm.species_color(1, 5, 3).is_ok());
        assert!(vm.species_color(2, 0, 0).is_err());
        assert!(vm.species_color(0, 6, 0).is_err());
        assert!(vm.position_color(0, 0, 4).is_err());
        assert!(vm.placement(3, 0, 0).is_err());
        assert!(vm.placement(0, 0, 24).is_err());
        assert!(vm.position_orientation(0, 0, 4).is_err());
        // Failed lookups allocate nothing
        assert_eq!(vm.variable_count(), 1);
    }

    #[test]
    fn test_lookup_and_names() {
        let mut vm = VariableManager::new(shape());
        assert_eq!(vm.lookup(VariableType::Bind { c1: 0, c2: 1 }), None);
        let id = vm.bind(0, 1).unwrap();
        assert_eq!(vm.lookup(VariableType::Bind { c1: 1, c2: 0 }), Some(id));
        assert_eq!(vm.name_of(0), None);
        assert_eq!(vm.name_of(2), None);
        assert_eq!(vm.name_of(id).unwrap().to_string(), "B(0,1)");
    }

    #[test]
    fn test_statistics() {
        let mut vm = VariableManager::new(shape());

        vm.bind(0, 1).unwrap();
        vm.species_color(0, 0, 0).unwrap();
        vm.species_color(1, 1, 1).unwrap();

        let stats = vm.statistics();
        assert_eq!(stats.total_variables, 3);
        assert_eq!(stats.family('B'), 1);
        assert_eq!(stats.family('C'), 2);
        assert_eq!(stats.family('P'), 0);
    }
}
