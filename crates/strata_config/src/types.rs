//! Configuration types deserialized from `strata.toml`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The top-level optimizer configuration parsed from `strata.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Plane geometry and the edge-weight taper.
    pub planes: PlaneConfig,
    /// Net graph construction limits.
    pub graph: GraphConfig,
    /// Kernighan–Lin partition refiner settings.
    pub partition: PartitionConfig,
    /// Continuous relaxation refiner settings.
    pub relaxation: RelaxationConfig,
    /// Pass ordering and external tools.
    pub flow: FlowConfig,
    /// Packing-record naming conventions used by physical realization.
    pub realization: RealizationConfig,
}

/// Plane geometry shared by every pass.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaneConfig {
    /// Number of plane slots per site (`MAX_PLANE`).
    pub max_plane: u8,
    /// Distance beyond which an edge no longer pays the proximity term (`MAX_DISTANCE`).
    pub max_distance: u32,
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            max_plane: 8,
            max_distance: 10,
        }
    }
}

/// Limits on per-net graph size.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Nets touching more distinct coordinates than this are not optimized (`MAX_NODES`).
    pub max_nodes: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { max_nodes: 64 }
    }
}

/// How the refiners guard against regressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackPolicy {
    /// Compare total design spread once per full iteration.
    #[default]
    Design,
    /// Additionally roll back any single net whose refinement raised design spread.
    Net,
}

/// Settings for the pairwise partition refiner.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartitionConfig {
    /// Passes per (net, plane pair) before giving up on further gain.
    pub max_passes: u32,
    /// Upper bound on full design iterations.
    pub max_iterations: u32,
    /// Regression guard granularity.
    pub rollback: RollbackPolicy,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_passes: 4,
            max_iterations: 16,
            rollback: RollbackPolicy::Design,
        }
    }
}

/// Settings for the continuous relaxation refiner.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelaxationConfig {
    /// Number of relax-and-renormalize rounds over all nets.
    pub iterations: u32,
    /// Iteration cap handed to the solver.
    pub max_solver_iterations: u32,
    /// Gradient-norm convergence threshold handed to the solver.
    pub tolerance: f64,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        Self {
            iterations: 2,
            max_solver_iterations: 500,
            tolerance: 1e-6,
        }
    }
}

/// A refinement pass that can appear in [`FlowConfig::passes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    /// Kernighan–Lin pairwise partition refinement.
    Partition,
    /// Continuous relaxation with renormalization.
    Relaxation,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKind::Partition => write!(f, "partition"),
            PassKind::Relaxation => write!(f, "relaxation"),
        }
    }
}

/// Pass ordering and external tool selection.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowConfig {
    /// Refinement passes, run in order between graph construction and realization.
    pub passes: Vec<PassKind>,
    /// External Steiner-tree program and its arguments. The in-process
    /// rectilinear tree builder is used when absent.
    pub steiner_command: Option<Vec<String>>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            passes: vec![PassKind::Partition, PassKind::Relaxation],
            steiner_command: None,
        }
    }
}

/// Naming conventions of the packing record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealizationConfig {
    /// Block type that occupies one plane slot (instances are `plane_block[p]`).
    pub plane_block: String,
    /// Input port through which a plane element continues the chain of plane `p - 1`.
    pub chain_port: String,
    /// Cluster block types whose sites are optimizable.
    pub clb_types: Vec<String>,
}

impl Default for RealizationConfig {
    fn default() -> Self {
        Self {
            plane_block: "ble".to_string(),
            chain_port: "cin".to_string(),
            clb_types: vec!["clb".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuning() {
        let config = OptimizerConfig::default();
        assert_eq!(config.planes.max_plane, 8);
        assert_eq!(config.planes.max_distance, 10);
        assert_eq!(config.graph.max_nodes, 64);
        assert_eq!(config.relaxation.iterations, 2);
        assert_eq!(config.partition.rollback, RollbackPolicy::Design);
        assert_eq!(
            config.flow.passes,
            vec![PassKind::Partition, PassKind::Relaxation]
        );
    }

    #[test]
    fn pass_kind_display() {
        assert_eq!(PassKind::Partition.to_string(), "partition");
        assert_eq!(PassKind::Relaxation.to_string(), "relaxation");
    }
}
