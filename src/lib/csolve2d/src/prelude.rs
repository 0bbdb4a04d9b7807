//! Common re-exports for binary crates driving the solver.

pub use crate::config::Config;
pub use crate::error::{SolverError, SolverResult};
pub use crate::flux::SchemeName;
pub use crate::geometry::Geometry;
pub use crate::ib::{ImmersedBoundary, NoImmersedBoundary};
pub use crate::integrator::TimeStepAccuracy;
pub use crate::mesh::Mesh;
pub use crate::reconstruct::Interpolant;
pub use crate::solver::Solver;
pub use crate::state::{FreeStream, PrimitiveState};
pub use crate::timestep::TimeSteppingMethod;
