//! Loading and saving problem descriptions
//!
//! A problem file is JSON of the form
//! `{"bindings": [[0,0,1,1], ...], "nDim": 3, "torsion": true}`.
//! A coordinate file lists one `(x,y,z)` per line; its topology is the set of
//! nearest-neighbour contacts.

use super::topology::{Binding, Topology};
use super::vector::Vec3;
use crate::error::TopologyError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSpec {
    pub bindings: Vec<Binding>,
    #[serde(rename = "nDim", default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_torsion")]
    pub torsion: bool,
    #[serde(rename = "stopAtFirst", default, skip_serializing_if = "Option::is_none")]
    pub stop_at_first: Option<bool>,
}

fn default_dimensions() -> usize {
    3
}

fn default_torsion() -> bool {
    true
}

impl ProblemSpec {
    pub fn new(topology: &Topology, dimensions: usize, torsion: bool) -> Self {
        Self {
            bindings: topology.bindings().to_vec(),
            dimensions,
            torsion,
            stop_at_first: None,
        }
    }

    pub fn topology(&self) -> Result<Topology> {
        Topology::new(self.bindings.clone()).context("Invalid topology")
    }

    /// Check the lattice dimension before any rotation group is built for it
    pub fn check_dimensions(&self) -> Result<(), TopologyError> {
        if (1..=3).contains(&self.dimensions) {
            Ok(())
        } else {
            Err(TopologyError::UnsupportedDimensions(self.dimensions))
        }
    }
}

/// Load a problem from a JSON problem file, or from a coordinate file
/// (`.txt` / `.coords`), in which case the dimensionality is inferred and
/// torsion defaults to on.
pub fn load_problem<P: AsRef<Path>>(path: P) -> Result<ProblemSpec> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read problem file: {}", path.display()))?;

    let is_coordinates = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt") | Some("coords")
    );

    if is_coordinates {
        let coordinates = parse_coordinates(&content)
            .with_context(|| format!("Failed to parse coordinates: {}", path.display()))?;
        let topology = Topology::from_coordinates(&coordinates)
            .with_context(|| format!("Invalid shape in {}", path.display()))?;
        let dimensions = if topology.is_planar() { 2 } else { 3 };
        Ok(ProblemSpec::new(&topology, dimensions, true))
    } else {
        let spec: ProblemSpec = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse problem file: {}", path.display()))?;
        spec.check_dimensions()
            .with_context(|| format!("Invalid problem file: {}", path.display()))?;
        Ok(spec)
    }
}

pub fn save_problem<P: AsRef<Path>>(spec: &ProblemSpec, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(spec).context("Failed to serialize problem")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write problem file: {}", path.display()))
}

/// Parse one `(x,y,z)` coordinate per line. Blank lines and `#` comments are
/// skipped; the parentheses are optional.
pub fn parse_coordinates(content: &str) -> Result<Vec<Vec3>> {
    let mut coordinates = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values: Vec<i32> = line
            .trim_matches(|c| c == '(' || c == ')')
            .split(',')
            .map(|v| v.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .with_context(|| format!("Line {}: invalid coordinate '{}'", line_no + 1, line))?;

        match values.as_slice() {
            [x, y] => coordinates.push(Vec3::new(*x, *y, 0)),
            [x, y, z] => coordinates.push(Vec3::new(*x, *y, *z)),
            _ => anyhow::bail!(
                "Line {}: expected 2 or 3 components, found {}",
                line_no + 1,
                values.len()
            ),
        }
    }

    if coordinates.is_empty() {
        anyhow::bail!("Coordinate file contains no positions");
    }
    Ok(coordinates)
}

/// Write a few small problems to start from
pub fn create_example_problems<P: AsRef<Path>>(output_dir: P) -> Result<()> {
    let dir = output_dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let dimer = ProblemSpec {
        bindings: vec![Binding::new(0, 0, 1, 1)],
        dimensions: 3,
        torsion: true,
        stop_at_first: None,
    };
    save_problem(&dimer, dir.join("dimer.json"))?;

    std::fs::write(dir.join("square.txt"), "(0,0,0)\n(1,0,0)\n(0,1,0)\n(1,1,0)\n")
        .context("Failed to write square.txt")?;

    std::fs::write(
        dir.join("l_tromino.txt"),
        "(0,0,0)\n(1,0,0)\n(0,1,0)\n",
    )
    .context("Failed to write l_tromino.txt")?;

    std::fs::write(
        dir.join("cube.txt"),
        "(0,0,0)\n(1,0,0)\n(0,1,0)\n(1,1,0)\n(0,0,1)\n(1,0,1)\n(0,1,1)\n(1,1,1)\n",
    )
    .context("Failed to write cube.txt")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_coordinates() {
        let coords = parse_coordinates("(0,0,0)\n# comment\n\n1, 0, 0\n(0,1)\n").unwrap();
        assert_eq!(
            coords,
            vec![Vec3::new(0, 0, 0), Vec3::new(1, 0, 0), Vec3::new(0, 1, 0)]
        );
        assert!(parse_coordinates("(0,0,0,0)").is_err());
        assert!(parse_coordinates("(a,0,0)").is_err());
        assert!(parse_coordinates("\n").is_err());
    }

    #[test]
    fn test_problem_json() {
        let spec: ProblemSpec =
            serde_json::from_str(r#"{"bindings": [[0,0,1,1]], "nDim": 2, "torsion": false}"#)
                .unwrap();
        assert_eq!(spec.dimensions, 2);
        assert!(!spec.torsion);
        assert_eq!(spec.topology().unwrap().position_count(), 2);

        let spec: ProblemSpec = serde_json::from_str(r#"{"bindings": [[0,0,1,1]]}"#).unwrap();
        assert_eq!(spec.dimensions, 3);
        assert!(spec.torsion);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dimer.json");
        let topology = Topology::new(vec![Binding::new(0, 0, 1, 1)]).unwrap();
        let spec = ProblemSpec::new(&topology, 3, false);
        save_problem(&spec, &path).unwrap();
        assert_eq!(load_problem(&path).unwrap(), spec);
    }

    #[test]
    fn test_unsupported_dimensions_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"bindings": [[0,0,1,1]], "nDim": 7}"#).unwrap();
        let err = load_problem(&path).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TopologyError>(),
            Some(&TopologyError::UnsupportedDimensions(7))
        );
    }

    #[test]
    fn test_load_coordinate_file() {
        let dir = tempdir().unwrap();
        create_example_problems(dir.path()).unwrap();

        let square = load_problem(dir.path().join("square.txt")).unwrap();
        assert_eq!(square.dimensions, 2);
        assert_eq!(square.bindings.len(), 4);

        let cube = load_problem(dir.path().join("cube.txt")).unwrap();
        assert_eq!(cube.dimensions, 3);
        assert_eq!(cube.bindings.len(), 12);

        let dimer = load_problem(dir.path().join("dimer.json")).unwrap();
        assert_eq!(dimer.bindings, vec![Binding::new(0, 0, 1, 1)]);
    }
}
