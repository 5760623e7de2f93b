//! SAT encoding of the rule search

pub mod constraints;
pub mod decoder;
pub mod encoder;
pub mod solver;
pub mod variables;

pub use constraints::{exactly_one, Clause, ConstraintGenerator, EncodingOptions};
pub use decoder::{Placement, SolutionDecoder};
pub use encoder::{Cnf, SatEncoder};
pub use solver::{SatSolver, SolutionBatch, SolveOutcome, SolverSolution};
pub use variables::{VariableManager, VariableType};
