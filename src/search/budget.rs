//! Search budgets and the order they are tried in

use crate::config::SearchConfig;
use crate::polycube::Topology;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Number of cube types and color pairs a rule may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Budget {
    pub cube_types: usize,
    pub colors: usize,
}

impl Budget {
    pub fn new(cube_types: usize, colors: usize) -> Self {
        Self { cube_types, colors }
    }

    pub fn cost(&self) -> usize {
        self.cube_types + self.colors
    }
}

/// Cheaper first; among equal cost, fewer cube types first
impl Ord for Budget {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.cost(), self.cube_types, self.colors).cmp(&(other.cost(), other.cube_types, other.colors))
    }
}

impl PartialOrd for Budget {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.cube_types, self.colors)
    }
}

/// Inclusive bounds on both budget axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetRange {
    pub min_cube_types: usize,
    pub max_cube_types: usize,
    pub min_colors: usize,
    pub max_colors: usize,
}

impl BudgetRange {
    /// Bounds from the search settings. The fully addressable rule (one cube
    /// type per position, one color per binding) always exists, so maxima
    /// default to and are clamped by it.
    pub fn new(search: &SearchConfig, topology: &Topology) -> Self {
        let positions = topology.position_count();
        let bindings = topology.binding_count();
        Self {
            min_cube_types: search.min_cube_types.max(1),
            max_cube_types: search.max_cube_types.map_or(positions, |m| m.min(positions)),
            min_colors: search.min_colors.max(1),
            max_colors: search.max_colors.map_or(bindings, |m| m.min(bindings)),
        }
    }

    pub fn contains(&self, budget: &Budget) -> bool {
        (self.min_cube_types..=self.max_cube_types).contains(&budget.cube_types)
            && (self.min_colors..=self.max_colors).contains(&budget.colors)
    }

    /// Every budget in range, in search order
    pub fn enumerate(&self) -> Vec<Budget> {
        let mut budgets: Vec<Budget> = (self.min_cube_types..=self.max_cube_types)
            .flat_map(|t| (self.min_colors..=self.max_colors).map(move |c| Budget::new(t, c)))
            .collect();
        budgets.sort();
        budgets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(max_t: usize, max_c: usize) -> BudgetRange {
        BudgetRange {
            min_cube_types: 1,
            max_cube_types: max_t,
            min_colors: 1,
            max_colors: max_c,
        }
    }

    #[test]
    fn test_enumeration_order() {
        let budgets = range(3, 2).enumerate();
        let pairs: Vec<(usize, usize)> = budgets.iter().map(|b| (b.cube_types, b.colors)).collect();
        assert_eq!(pairs, vec![(1, 1), (1, 2), (2, 1), (2, 2), (3, 1), (3, 2)]);
    }

    #[test]
    fn test_enumeration_is_cost_monotone() {
        let budgets = range(5, 7).enumerate();
        assert_eq!(budgets.len(), 35);
        for pair in budgets.windows(2) {
            assert!(pair[0].cost() <= pair[1].cost());
            if pair[0].cost() == pair[1].cost() {
                assert!(pair[0].cube_types < pair[1].cube_types);
            }
        }
    }

    #[test]
    fn test_empty_range() {
        let r = BudgetRange {
            min_cube_types: 3,
            max_cube_types: 2,
            min_colors: 1,
            max_colors: 1,
        };
        assert!(r.enumerate().is_empty());
    }

    #[test]
    fn test_defaults_from_topology() {
        use crate::polycube::Binding;
        let topology = Topology::new(vec![Binding::new(0, 0, 1, 1)]).unwrap();
        let search = crate::config::Settings::default().search;
        let r = BudgetRange::new(&search, &topology);
        assert_eq!((r.max_cube_types, r.max_colors), (2, 1));
        assert_eq!(r.enumerate(), vec![Budget::new(1, 1), Budget::new(2, 1)]);
        assert!(r.contains(&Budget::new(2, 1)));
        assert!(!r.contains(&Budget::new(2, 2)));

        let mut search = search;
        search.max_cube_types = Some(10);
        search.max_colors = Some(10);
        let r = BudgetRange::new(&search, &topology);
        assert_eq!((r.max_cube_types, r.max_colors), (2, 1));
    }

    #[test]
    fn test_display() {
        assert_eq!(Budget::new(2, 3).to_string(), "(2, 3)");
    }
}
