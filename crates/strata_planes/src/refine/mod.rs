//! Plane refinement passes.
//!
//! Two refiners share the canonical [`PlaneState`](crate::state::PlaneState):
//! the pairwise Kernighan–Lin partition refiner and the continuous relaxation
//! refiner. Both guard against regressions by comparing design spread and
//! restoring a cloned snapshot.

pub mod cost;
mod partition;
mod relax;
pub mod solver;
mod swap;

pub use cost::{design_spread, net_spread, taper};
pub use partition::{PartitionRefiner, PartitionReport};
pub use relax::{renormalize, NetOutcome, RelaxationRefiner, RelaxationReport};
pub use solver::{
    ConstrainedSolver, EqualityConstraint, Objective, ProjectedGradient, SolverFailure,
};
pub use swap::{is_valid_swap, plan_swap, SwapPlan};
