//! Polycube geometry: patches, rotations, target topologies and rules

pub mod io;
pub mod rotation;
pub mod rule;
pub mod topology;
pub mod vector;

pub use io::{load_problem, ProblemSpec};
pub use rotation::{Rotation, RotationGroup};
pub use rule::{CubeType, Patch, Rule};
pub use topology::{Binding, Topology};
pub use vector::Vec3;
