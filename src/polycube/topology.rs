//! Target structure: positions joined by patch-to-patch bindings

use super::vector::{are_opposing, opposite_patch, Vec3, PATCH_COUNT, PATCH_DIRECTIONS};
use crate::error::TopologyError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Patch `patch_a` of position `position_a` touches patch `patch_b` of
/// position `position_b`. Serialized as `[a, patch_a, b, patch_b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[usize; 4]", into = "[usize; 4]")]
pub struct Binding {
    pub position_a: usize,
    pub patch_a: usize,
    pub position_b: usize,
    pub patch_b: usize,
}

impl Binding {
    pub fn new(position_a: usize, patch_a: usize, position_b: usize, patch_b: usize) -> Self {
        Self {
            position_a,
            patch_a,
            position_b,
            patch_b,
        }
    }

    pub fn endpoints(&self) -> [(usize, usize); 2] {
        [(self.position_a, self.patch_a), (self.position_b, self.patch_b)]
    }
}

impl From<[usize; 4]> for Binding {
    fn from(v: [usize; 4]) -> Self {
        Binding::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Binding> for [usize; 4] {
    fn from(b: Binding) -> Self {
        [b.position_a, b.patch_a, b.position_b, b.patch_b]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    bindings: Vec<Binding>,
    position_count: usize,
    /// Occupied (position, patch) -> binding index
    occupied: HashMap<(usize, usize), usize>,
}

impl Topology {
    /// Validate a binding list. Positions are numbered from 0 up to the largest
    /// index mentioned, which must stay below twice the binding count; each
    /// (position, patch) may take part in one binding.
    pub fn new(bindings: Vec<Binding>) -> Result<Self, TopologyError> {
        if bindings.is_empty() {
            return Err(TopologyError::Empty);
        }
        let limit = 2 * bindings.len();

        let mut occupied = HashMap::new();
        let mut position_count = 0;
        for (i, binding) in bindings.iter().enumerate() {
            for (position, patch) in binding.endpoints() {
                if patch >= PATCH_COUNT {
                    return Err(TopologyError::PatchOutOfRange { binding: i, patch });
                }
                if position >= limit {
                    return Err(TopologyError::PositionOutOfRange {
                        binding: i,
                        position,
                        limit,
                    });
                }
                if let Some(&first) = occupied.get(&(position, patch)) {
                    return Err(TopologyError::PatchReused {
                        position,
                        patch,
                        first,
                        second: i,
                    });
                }
                occupied.insert((position, patch), i);
                position_count = position_count.max(position + 1);
            }
        }

        Ok(Self {
            bindings,
            position_count,
            occupied,
        })
    }

    /// Build the nearest-neighbour topology of a set of lattice coordinates.
    /// Position `i` is `coordinates[i]`.
    pub fn from_coordinates(coordinates: &[Vec3]) -> Result<Self, TopologyError> {
        let mut lookup = HashMap::new();
        for (i, &c) in coordinates.iter().enumerate() {
            if lookup.insert(c, i).is_some() {
                return Err(TopologyError::DuplicateCoordinate(c.to_string()));
            }
        }

        let mut bindings = Vec::new();
        for (i, &c) in coordinates.iter().enumerate() {
            // Only look along positive axes so each contact is listed once
            for patch in [1, 3, 5] {
                if let Some(&j) = lookup.get(&(c + PATCH_DIRECTIONS[patch])) {
                    bindings.push(Binding::new(i, patch, j, opposite_patch(patch)));
                }
            }
        }

        Self::new(bindings)
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_bound(&self, position: usize, patch: usize) -> bool {
        self.occupied.contains_key(&(position, patch))
    }

    /// The (position, patch) on the other side of a binding.
    pub fn partner(&self, position: usize, patch: usize) -> Option<(usize, usize)> {
        let binding = &self.bindings[*self.occupied.get(&(position, patch))?];
        if (binding.position_a, binding.patch_a) == (position, patch) {
            Some((binding.position_b, binding.patch_b))
        } else {
            Some((binding.position_a, binding.patch_a))
        }
    }

    /// Every (position, patch) not touched by a binding, in index order.
    pub fn empty_patches(&self) -> BTreeSet<(usize, usize)> {
        (0..self.position_count)
            .flat_map(|l| (0..PATCH_COUNT).map(move |p| (l, p)))
            .filter(|key| !self.occupied.contains_key(key))
            .collect()
    }

    /// Whether any binding leaves the xy plane.
    pub fn is_planar(&self) -> bool {
        self.bindings.iter().all(|b| b.patch_a < 4 && b.patch_b < 4)
    }

    /// Lattice coordinates of each position, found by walking bindings from
    /// position 0. Fails if a binding does not join opposite faces, if the walk
    /// reaches a position twice at different places, or if some position is
    /// unreachable.
    pub fn coordinates(&self) -> Result<Vec<Vec3>, TopologyError> {
        for (i, b) in self.bindings.iter().enumerate() {
            if !are_opposing(b.patch_a, b.patch_b) || b.patch_a == b.patch_b {
                return Err(TopologyError::NotOpposing {
                    binding: i,
                    patch_a: b.patch_a,
                    patch_b: b.patch_b,
                });
            }
        }

        let mut coordinates: Vec<Option<Vec3>> = vec![None; self.position_count];
        let mut components = 0;

        for start in 0..self.position_count {
            if coordinates[start].is_some() {
                continue;
            }
            components += 1;
            coordinates[start] = Some(Vec3::ZERO);
            let mut queue = VecDeque::from([start]);

            while let Some(position) = queue.pop_front() {
                let here = coordinates[position].unwrap_or_default();
                for patch in 0..PATCH_COUNT {
                    let Some((neighbour, _)) = self.partner(position, patch) else {
                        continue;
                    };
                    let there = here + PATCH_DIRECTIONS[patch];
                    match coordinates[neighbour] {
                        Some(existing) if existing != there => {
                            return Err(TopologyError::NonEuclidean {
                                position: neighbour,
                            });
                        }
                        Some(_) => {}
                        None => {
                            coordinates[neighbour] = Some(there);
                            queue.push_back(neighbour);
                        }
                    }
                }
            }
        }

        if components > 1 {
            return Err(TopologyError::Disconnected(components));
        }

        Ok(coordinates.into_iter().flatten().collect())
    }
}
