//! Edge weights and spread.
//!
//! The partition refiner weighs edges with [`taper`], which rewards keeping
//! nearby nodes on the same plane. Spread, the sum of plane differences over
//! every net edge, is the design-level quality figure the regression guards
//! compare.

use crate::graph::{GraphEdge, NetGraph};
use crate::ids::NetId;
use crate::state::PlaneState;
use strata_common::Arena;

/// Edge weight: `max(0, max_distance - distance) + plane_diff`.
pub fn taper(distance: u32, plane_diff: u32, max_distance: u32) -> i64 {
    i64::from(max_distance.saturating_sub(distance)) + i64::from(plane_diff)
}

/// Absolute plane difference across an edge under the current state.
pub fn plane_diff(state: &PlaneState, edge: &GraphEdge) -> u32 {
    u32::from(state.plane(edge.u).abs_diff(state.plane(edge.v)))
}

/// Taper weight of an edge under the current state.
pub fn edge_weight(state: &PlaneState, edge: &GraphEdge, max_distance: u32) -> i64 {
    taper(edge.distance, plane_diff(state, edge), max_distance)
}

/// Sum of plane differences over one net.
pub fn net_spread(graph: &NetGraph, state: &PlaneState) -> u64 {
    graph
        .edges()
        .iter()
        .map(|e| u64::from(plane_diff(state, e)))
        .sum()
}

/// Sum of plane differences over every net.
pub fn design_spread(graphs: &Arena<NetId, NetGraph>, state: &PlaneState) -> u64 {
    graphs.values().map(|g| net_spread(g, state)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taper_values() {
        assert_eq!(taper(0, 1, 10), 11);
        assert_eq!(taper(3, 2, 10), 9);
        assert_eq!(taper(25, 4, 10), 4);
    }
}
