//! Assembly rules: cube types with six colored, oriented patches
//!
//! Two text forms are supported. The decimal form lists each cube type as six
//! `color:orientation` faces separated by `|`, with cube types joined by `_`;
//! an inert face is written empty. The hex form packs every face into one byte
//! (sign bit, five color bits, two orientation bits) written as two hex digits.

use super::topology::Topology;
use super::vector::{
    orientation_from_vector, Vec3, PATCH_COUNT, PATCH_DIRECTIONS, PATCH_UP,
    X_AXIS, Y_AXIS, Z_AXIS,
};
use crate::error::{RuleFormatError, TopologyError};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Largest color magnitude the hex form can carry.
pub const MAX_HEX_COLOR: i32 = 31;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Patch {
    /// 0 is inert; `c` binds only to `-c`.
    pub color: i32,
    pub orientation: u8,
}

impl Patch {
    pub fn new(color: i32, orientation: u8) -> Self {
        Self { color, orientation }
    }

    pub fn is_inert(&self) -> bool {
        self.color == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeType {
    pub patches: [Patch; PATCH_COUNT],
}

impl CubeType {
    pub fn new(patches: [Patch; PATCH_COUNT]) -> Self {
        Self { patches }
    }

    pub fn active_patch_count(&self) -> usize {
        self.patches.iter().filter(|p| !p.is_inert()).count()
    }

    pub fn is_inert(&self) -> bool {
        self.active_patch_count() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub cube_types: Vec<CubeType>,
}

impl Rule {
    pub fn new(cube_types: Vec<CubeType>) -> Self {
        Self { cube_types }
    }

    pub fn len(&self) -> usize {
        self.cube_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cube_types.is_empty()
    }

    /// Number of distinct complementary color pairs in use.
    pub fn color_count(&self) -> usize {
        self.patches()
            .filter(|p| !p.is_inert())
            .map(|p| p.color.abs())
            .unique()
            .count()
    }

    pub fn patches(&self) -> impl Iterator<Item = &Patch> {
        self.cube_types.iter().flat_map(|c| c.patches.iter())
    }

    /// The form the decimal round trip preserves: inert faces carry no
    /// orientation.
    pub fn canonical(&self) -> Rule {
        let mut rule = self.clone();
        for patch in rule.cube_types.iter_mut().flat_map(|c| c.patches.iter_mut()) {
            if patch.is_inert() {
                patch.orientation = 0;
            }
        }
        rule
    }

    pub fn to_dec(&self) -> String {
        self.cube_types
            .iter()
            .map(|cube| {
                cube.patches
                    .iter()
                    .map(|p| {
                        if p.is_inert() {
                            String::new()
                        } else {
                            format!("{}:{}", p.color, p.orientation)
                        }
                    })
                    .join("|")
            })
            .join("_")
    }

    pub fn parse_dec(text: &str) -> Result<Rule, RuleFormatError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Rule::default());
        }

        let mut cube_types = Vec::new();
        for (species, cube) in text.split('_').enumerate() {
            let faces: Vec<&str> = cube.split('|').collect();
            if faces.len() != PATCH_COUNT {
                return Err(RuleFormatError::WrongFaceCount {
                    species,
                    found: faces.len(),
                });
            }
            let mut patches = [Patch::default(); PATCH_COUNT];
            for (patch, face) in patches.iter_mut().zip(faces) {
                *patch = parse_dec_face(face)?;
            }
            cube_types.push(CubeType::new(patches));
        }
        Ok(Rule::new(cube_types))
    }

    pub fn to_hex(&self) -> Result<String, RuleFormatError> {
        let mut out = String::with_capacity(self.len() * PATCH_COUNT * 2);
        for patch in self.patches() {
            if patch.color.abs() > MAX_HEX_COLOR {
                return Err(RuleFormatError::ColorOutOfRange(patch.color));
            }
            if patch.orientation > 3 {
                return Err(RuleFormatError::OrientationOutOfRange(patch.orientation));
            }
            let sign = u8::from(patch.color < 0) << 7;
            let byte = sign | ((patch.color.unsigned_abs() as u8) << 2) | patch.orientation;
            out.push_str(&format!("{:02x}", byte));
        }
        Ok(out)
    }

    pub fn parse_hex(text: &str) -> Result<Rule, RuleFormatError> {
        let text = text.trim();
        if text.len() % (PATCH_COUNT * 2) != 0 {
            return Err(RuleFormatError::HexLength(text.len()));
        }
        if !text.is_ascii() {
            return Err(RuleFormatError::HexDigits(text.to_string()));
        }

        let mut cube_types = Vec::new();
        for chunk in text.as_bytes().chunks(PATCH_COUNT * 2) {
            let mut patches = [Patch::default(); PATCH_COUNT];
            for (patch, pair) in patches.iter_mut().zip(chunk.chunks(2)) {
                let digits = std::str::from_utf8(pair)
                    .map_err(|_| RuleFormatError::HexDigits(text.to_string()))?;
                let byte = u8::from_str_radix(digits, 16)
                    .map_err(|_| RuleFormatError::HexDigits(digits.to_string()))?;
                let magnitude = i32::from((byte >> 2) & 0x1f);
                let color = if byte & 0x80 != 0 { -magnitude } else { magnitude };
                *patch = Patch::new(color, byte & 0x3);
            }
            cube_types.push(CubeType::new(patches));
        }
        Ok(Rule::new(cube_types))
    }

    /// Drop what cannot matter for assembly: colors whose complement never
    /// appears become inert, inert faces lose their orientation, cube types
    /// with no active patch are removed (the first one is always kept), and
    /// the remaining colors are renumbered from 1 in order of appearance.
    pub fn simplify(&self) -> Rule {
        let present: HashSet<i32> = self.patches().map(|p| p.color).collect();

        let mut cube_types: Vec<CubeType> = Vec::new();
        for (i, cube) in self.cube_types.iter().enumerate() {
            let mut cube = cube.clone();
            for patch in cube.patches.iter_mut() {
                if !present.contains(&-patch.color) {
                    patch.color = 0;
                }
                if patch.is_inert() {
                    patch.orientation = 0;
                }
            }
            if !cube.is_inert() || i == 0 {
                cube_types.push(cube);
            }
        }

        let mut renumber: HashMap<i32, i32> = HashMap::new();
        for patch in cube_types.iter_mut().flat_map(|c| c.patches.iter_mut()) {
            if patch.is_inert() {
                continue;
            }
            let next = renumber.len() as i32 + 1;
            let id = *renumber.entry(patch.color.abs()).or_insert(next);
            patch.color = id * patch.color.signum();
        }

        Rule::new(cube_types)
    }

    /// A rule with one cube type per position and one color per binding. It
    /// always assembles the target when the topology is a connected lattice
    /// shape, which makes it the upper bound of the search.
    pub fn fully_addressable(topology: &Topology) -> Result<Rule, TopologyError> {
        let coordinates = topology.coordinates()?;

        // Align orientation markers to the axis with the fewest contacts
        let mut per_axis = [0usize; 3];
        for binding in topology.bindings() {
            per_axis[binding.patch_a / 2] += 1;
        }
        let axes = [X_AXIS, Y_AXIS, Z_AXIS];
        let min_axis = axes[(0..3).min_by_key(|&a| per_axis[a]).unwrap_or(0)];

        let default_marker = |patch: usize| -> Vec3 {
            if PATCH_DIRECTIONS[patch].abs() == min_axis {
                PATCH_UP[patch]
            } else {
                min_axis
            }
        };

        let mut markers: Vec<[Vec3; PATCH_COUNT]> =
            vec![std::array::from_fn(default_marker); coordinates.len()];
        let mut colors = vec![[0i32; PATCH_COUNT]; coordinates.len()];

        for (i, binding) in topology.bindings().iter().enumerate() {
            let color = i as i32 + 1;
            colors[binding.position_a][binding.patch_a] = color;
            colors[binding.position_b][binding.patch_b] = -color;
            markers[binding.position_b][binding.patch_b] =
                markers[binding.position_a][binding.patch_a];
        }

        let mut cube_types = Vec::with_capacity(coordinates.len());
        for (position, marker) in markers.iter().enumerate() {
            let mut patches = [Patch::default(); PATCH_COUNT];
            for (patch, slot) in patches.iter_mut().enumerate() {
                let orientation = orientation_from_vector(patch, marker[patch]).unwrap_or(0);
                *slot = Patch::new(colors[position][patch], orientation);
            }
            cube_types.push(CubeType::new(patches));
        }
        Ok(Rule::new(cube_types))
    }
}

fn parse_dec_face(face: &str) -> Result<Patch, RuleFormatError> {
    let face = face.trim();
    if face.is_empty() {
        return Ok(Patch::default());
    }
    let invalid = |reason: &str| RuleFormatError::InvalidFace {
        face: face.to_string(),
        reason: reason.to_string(),
    };

    let (color, orientation) = match face.split_once(':') {
        Some((c, o)) => (c, Some(o)),
        None => (face, None),
    };
    let color: i32 = color.trim().parse().map_err(|_| invalid("color is not an integer"))?;
    let orientation: u8 = match orientation {
        Some(o) => o.trim().parse().map_err(|_| invalid("orientation is not an integer"))?,
        None => 0,
    };
    if orientation > 3 {
        return Err(invalid("orientation must be in 0..4"));
    }
    Ok(Patch::new(color, orientation))
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dec())
    }
}

impl FromStr for Rule {
    type Err = RuleFormatError;

    /// Accepts either text form; anything containing `|` is read as decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('|') {
            Rule::parse_dec(s)
        } else {
            Rule::parse_hex(s)
        }
    }
}

pub const PATCH_LABELS: [&str; PATCH_COUNT] = ["-x", "+x", "-y", "+y", "-z", "+z"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polycube::topology::Binding;
    use proptest::prelude::*;

    fn dimer_rule() -> Rule {
        let mut patches = [Patch::default(); PATCH_COUNT];
        patches[0] = Patch::new(1, 0);
        patches[1] = Patch::new(-1, 2);
        Rule::new(vec![CubeType::new(patches)])
    }

    #[test]
    fn test_dec_format() {
        let rule = dimer_rule();
        assert_eq!(rule.to_dec(), "1:0|-1:2||||");
        assert_eq!(Rule::parse_dec("1:0|-1:2||||").unwrap(), rule);
        assert_eq!("1:0|-1:2||||".parse::<Rule>().unwrap(), rule);
    }

    #[test]
    fn test_dec_empty_face_is_inert() {
        let rule = Rule::parse_dec("|||||_2:1|||||").unwrap();
        assert_eq!(rule.len(), 2);
        assert!(rule.cube_types[0].is_inert());
        assert_eq!(rule.cube_types[1].patches[0], Patch::new(2, 1));
    }

    #[test]
    fn test_dec_errors() {
        assert!(matches!(
            Rule::parse_dec("1:0|2:0"),
            Err(RuleFormatError::WrongFaceCount { found: 2, .. })
        ));
        assert!(matches!(
            Rule::parse_dec("x:0|||||"),
            Err(RuleFormatError::InvalidFace { .. })
        ));
        assert!(matches!(
            Rule::parse_dec("1:7|||||"),
            Err(RuleFormatError::InvalidFace { .. })
        ));
    }

    #[test]
    fn test_hex_format() {
        let rule = dimer_rule();
        // +1 orientation 0 -> 0b0_00001_00, -1 orientation 2 -> 0b1_00001_10
        assert_eq!(rule.to_hex().unwrap(), "048600000000");
        assert_eq!(Rule::parse_hex("048600000000").unwrap(), rule);
    }

    #[test]
    fn test_hex_errors() {
        assert_eq!(Rule::parse_hex("0486"), Err(RuleFormatError::HexLength(4)));
        assert!(matches!(
            Rule::parse_hex("zz0000000000"),
            Err(RuleFormatError::HexDigits(_))
        ));
        let mut patches = [Patch::default(); PATCH_COUNT];
        patches[0] = Patch::new(32, 0);
        assert_eq!(
            Rule::new(vec![CubeType::new(patches)]).to_hex(),
            Err(RuleFormatError::ColorOutOfRange(32))
        );
    }

    #[test]
    fn test_simplify() {
        // Color 3 has no complement and cube type 2 only carries it
        let rule = Rule::parse_dec("1:0|-1:0|5:1|||_3:2|||||_|||||-5:3_2:1|||||").unwrap();
        let simple = rule.simplify();
        assert_eq!(simple.to_dec(), "1:0|-1:0|2:1|||_|||||-2:3");
        assert_eq!(simple.color_count(), 2);
    }

    #[test]
    fn test_simplify_keeps_first_inert_type() {
        let rule = Rule::parse_dec("4:1|||||_-4:0|||||").unwrap().simplify();
        assert_eq!(rule.to_dec(), "1:1|||||_-1:0|||||");
        let rule = Rule::parse_dec("7:1|||||").unwrap().simplify();
        assert_eq!(rule.len(), 1);
        assert!(rule.cube_types[0].is_inert());
    }

    #[test]
    fn test_fully_addressable_dimer() {
        let topology = Topology::new(vec![Binding::new(0, 0, 1, 1)]).unwrap();
        let rule = Rule::fully_addressable(&topology).unwrap();
        assert_eq!(rule.len(), 2);
        assert_eq!(rule.color_count(), 1);
        assert_eq!(rule.cube_types[0].patches[0].color, 1);
        assert_eq!(rule.cube_types[1].patches[1].color, -1);
        // Contact along x: markers are aligned to y, so both sides agree
        let a = rule.cube_types[0].patches[0].orientation;
        let b = rule.cube_types[1].patches[1].orientation;
        assert_eq!(
            crate::polycube::vector::orientation_vector(0, a),
            crate::polycube::vector::orientation_vector(1, b)
        );
    }

    #[test]
    fn test_fully_addressable_square() {
        let coords = [
            Vec3::new(0, 0, 0),
            Vec3::new(1, 0, 0),
            Vec3::new(0, 1, 0),
            Vec3::new(1, 1, 0),
        ];
        let topology = Topology::from_coordinates(&coords).unwrap();
        let rule = Rule::fully_addressable(&topology).unwrap();
        assert_eq!(rule.len(), 4);
        assert_eq!(rule.color_count(), 4);
        for cube in &rule.cube_types {
            assert_eq!(cube.active_patch_count(), 2);
        }
    }

    fn arb_patch() -> impl Strategy<Value = Patch> {
        (-MAX_HEX_COLOR..=MAX_HEX_COLOR, 0u8..4).prop_map(|(c, o)| Patch::new(c, o))
    }

    fn arb_rule() -> impl Strategy<Value = Rule> {
        prop::collection::vec(prop::array::uniform6(arb_patch()), 1..5)
            .prop_map(|types| Rule::new(types.into_iter().map(CubeType::new).collect()))
    }

    proptest! {
        #[test]
        fn prop_hex_round_trip(rule in arb_rule()) {
            let hex = rule.to_hex().unwrap();
            prop_assert_eq!(Rule::parse_hex(&hex).unwrap(), rule);
        }

        #[test]
        fn prop_dec_round_trip_is_canonical(rule in arb_rule()) {
            prop_assert_eq!(Rule::parse_dec(&rule.to_dec()).unwrap(), rule.canonical());
        }

        #[test]
        fn prop_simplify_is_idempotent(rule in arb_rule()) {
            let once = rule.simplify();
            prop_assert_eq!(once.simplify(), once);
        }
    }
}
