//! Domain error types

use thiserror::Error;

/// A topology that cannot be encoded. These are precondition failures: they are
/// reported before any search starts and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("topology has no bindings")]
    Empty,

    #[error("patch index {patch} out of range (0..6) in binding {binding}")]
    PatchOutOfRange { binding: usize, patch: usize },

    #[error("patch {patch} of position {position} is used by bindings {first} and {second}")]
    PatchReused {
        position: usize,
        patch: usize,
        first: usize,
        second: usize,
    },

    #[error("binding {binding} joins patch {patch_a} to patch {patch_b}, which do not face each other")]
    NotOpposing {
        binding: usize,
        patch_a: usize,
        patch_b: usize,
    },

    #[error("bindings place position {position} at two different coordinates")]
    NonEuclidean { position: usize },

    #[error("topology has {0} disconnected components")]
    Disconnected(usize),

    #[error("coordinate {0} appears more than once")]
    DuplicateCoordinate(String),

    #[error("position {position} in binding {binding} is beyond {limit}, twice the binding count")]
    PositionOutOfRange {
        binding: usize,
        position: usize,
        limit: usize,
    },

    #[error("lattice dimension {0} is not supported (1, 2 or 3)")]
    UnsupportedDimensions(usize),
}

/// Failures parsing or writing one of the rule text formats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleFormatError {
    #[error("invalid face '{face}': {reason}")]
    InvalidFace { face: String, reason: String },

    #[error("species {species} has {found} faces, expected 6")]
    WrongFaceCount { species: usize, found: usize },

    #[error("hex rule length {0} is not a multiple of 12")]
    HexLength(usize),

    #[error("invalid hex digits '{0}'")]
    HexDigits(String),

    #[error("color {0} does not fit in 5 bits")]
    ColorOutOfRange(i32),

    #[error("orientation {0} out of range (0..4)")]
    OrientationOutOfRange(u8),
}

/// The rotation closure did not reach the group order. This is an internal
/// invariant violation, not something a caller can trigger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rotation closure in {dimensions}D produced {found} rotations, expected {expected}")]
pub struct RotationGroupError {
    pub dimensions: usize,
    pub found: usize,
    pub expected: usize,
}

/// Failures inside one budget's encode/solve/validate run. They end that
/// budget with an error outcome rather than aborting the search.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    RotationGroup(#[from] RotationGroupError),

    #[error("budget ({cube_types}, {colors}) needs at least one cube type and one color")]
    InvalidBudget { cube_types: usize, colors: usize },

    #[error("rotation group is for {group}D but the encoding is {encoding}D")]
    DimensionMismatch { group: usize, encoding: usize },

    #[error("cannot add an empty clause")]
    EmptyClause,

    #[error("literal 0 is not a valid SAT literal")]
    ZeroLiteral,

    /// The oracle ran past its bound without a verdict. Recorded as a budget
    /// timeout, never as a rejection.
    #[error("oracle {command} timed out after {seconds:.1}s on {rule}")]
    OracleTimeout {
        command: String,
        seconds: f64,
        rule: String,
    },
}
