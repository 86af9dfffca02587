//! Pairwise Kernighan–Lin partition refinement.
//!
//! For every optimizable net and every unordered plane pair, the nodes of the
//! net on those two planes form a bipartition. Classic KL passes select
//! swap pairs greedily by gain, update D-values, and commit the best positive
//! prefix of the gain sequence as whole-object relocations. A design-level
//! guard compares spread across full iterations and restores the iteration's
//! snapshot on regression.

use super::cost::{design_spread, edge_weight};
use super::swap::{is_valid_swap, plan_swap, SwapPlan};
use crate::error::PlaneResult;
use crate::graph::NetGraph;
use crate::ids::{NetId, NodeId};
use crate::state::{Coord, Plane, PlaneState};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strata_common::Arena;
use strata_config::{PartitionConfig, RollbackPolicy};
use strata_diagnostics::diagnostic::{PARTITION_ITERATION, ROLLBACK};
use strata_diagnostics::{Diagnostic, DiagnosticSink, Locus};

/// Outcome of a partition refinement run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionReport {
    /// Full design iterations executed.
    pub iterations: u32,
    /// Swaps committed and kept.
    pub swaps: usize,
    /// Whether the last iteration was rolled back.
    pub rolled_back: bool,
    /// Spread before refinement.
    pub initial_spread: u64,
    /// Spread after refinement.
    pub final_spread: u64,
}

/// The partition refiner.
#[derive(Debug, Clone, Copy)]
pub struct PartitionRefiner<'a> {
    config: &'a PartitionConfig,
    max_distance: u32,
}

impl<'a> PartitionRefiner<'a> {
    /// Creates a refiner with the given settings and taper distance.
    pub fn new(config: &'a PartitionConfig, max_distance: u32) -> Self {
        Self {
            config,
            max_distance,
        }
    }

    /// Refines every optimizable net until spread stops decreasing.
    pub fn refine(
        &self,
        graphs: &Arena<NetId, NetGraph>,
        state: &mut PlaneState,
        sink: &DiagnosticSink,
    ) -> PlaneResult<PartitionReport> {
        let mut spread = design_spread(graphs, state);
        let mut report = PartitionReport {
            initial_spread: spread,
            final_spread: spread,
            ..PartitionReport::default()
        };

        for iteration in 1..=self.config.max_iterations {
            let snapshot = state.clone();
            let mut swaps = 0;
            for graph in graphs.values().filter(|g| g.is_optimizable()) {
                swaps += self.refine_net_guarded(graphs, graph, state, sink)?;
            }
            let after = design_spread(graphs, state);
            report.iterations = iteration;
            sink.emit(Diagnostic::note(
                PARTITION_ITERATION,
                format!(
                    "partition iteration {iteration}: {swaps} swaps, spread {spread} -> {after}"
                ),
                Locus::Design,
            ));

            if after > spread {
                *state = snapshot;
                report.rolled_back = true;
                sink.emit(Diagnostic::warning(
                    ROLLBACK,
                    format!(
                        "partition iteration {iteration} raised spread from {spread} to {after}; restored"
                    ),
                    Locus::Design,
                ));
                break;
            }
            report.swaps += swaps;
            if after == spread {
                break;
            }
            spread = after;
        }
        report.final_spread = design_spread(graphs, state);
        Ok(report)
    }

    /// Refines one net, restoring it under [`RollbackPolicy::Net`] if design
    /// spread rose.
    fn refine_net_guarded(
        &self,
        graphs: &Arena<NetId, NetGraph>,
        graph: &NetGraph,
        state: &mut PlaneState,
        sink: &DiagnosticSink,
    ) -> PlaneResult<usize> {
        if self.config.rollback != RollbackPolicy::Net {
            return self.refine_net(graph, state);
        }
        let snapshot = state.clone();
        let before = design_spread(graphs, state);
        let swaps = self.refine_net(graph, state)?;
        let after = design_spread(graphs, state);
        if after > before {
            *state = snapshot;
            sink.emit(Diagnostic::warning(
                ROLLBACK,
                format!(
                    "net '{}' raised spread from {before} to {after}; restored",
                    graph.name()
                ),
                Locus::Net(graph.name().to_string()),
            ));
            return Ok(0);
        }
        Ok(swaps)
    }

    /// Runs up to `max_passes` KL passes for every plane pair of one net.
    pub fn refine_net(&self, graph: &NetGraph, state: &mut PlaneState) -> PlaneResult<usize> {
        let mut committed = 0;
        let max_plane = state.max_plane();
        for i in 0..max_plane {
            for j in i + 1..max_plane {
                for _ in 0..self.config.max_passes {
                    let n = self.pass(graph, state, i, j)?;
                    if n == 0 {
                        break;
                    }
                    committed += n;
                }
            }
        }
        Ok(committed)
    }

    /// One KL pass over the bipartition of planes `i` and `j`. Returns the
    /// number of committed swaps.
    fn pass(
        &self,
        graph: &NetGraph,
        state: &mut PlaneState,
        i: Plane,
        j: Plane,
    ) -> PlaneResult<usize> {
        let side: HashMap<NodeId, bool> = graph
            .nodes()
            .iter()
            .filter_map(|&n| match state.plane(n) {
                p if p == i => Some((n, true)),
                p if p == j => Some((n, false)),
                _ => None,
            })
            .collect();
        if side.len() < 2 {
            return Ok(0);
        }

        let mut weights: HashMap<(NodeId, NodeId), i64> = HashMap::new();
        let mut d: BTreeMap<NodeId, i64> = side.keys().map(|&n| (n, 0)).collect();
        let mut cut = 0;
        for e in graph.edges() {
            let (Some(&su), Some(&sv)) = (side.get(&e.u), side.get(&e.v)) else {
                continue;
            };
            let w = edge_weight(state, e, self.max_distance);
            *weights.entry((e.u.min(e.v), e.u.max(e.v))).or_default() += w;
            let signed = if su != sv {
                cut += w;
                w
            } else {
                -w
            };
            for n in [e.u, e.v] {
                if let Some(dn) = d.get_mut(&n) {
                    *dn += signed;
                }
            }
        }
        if cut == 0 {
            return Ok(0);
        }
        let c = |x: NodeId, y: NodeId| {
            weights
                .get(&(x.min(y), x.max(y)))
                .copied()
                .unwrap_or(0)
        };

        let candidates = |on_i: bool| -> Vec<NodeId> {
            d.keys()
                .copied()
                .filter(|n| side[n] == on_i && !graph.is_fixed(*n))
                .collect()
        };
        let mut free_a = candidates(true);
        let mut free_b = candidates(false);
        let mut touched: BTreeSet<Coord> = BTreeSet::new();
        let mut sequence: Vec<(i64, SwapPlan)> = Vec::new();

        loop {
            let mut pairs: Vec<(i64, NodeId, NodeId)> = Vec::new();
            for &a in &free_a {
                for &b in &free_b {
                    pairs.push((d[&a] + d[&b] - 2 * c(a, b), a, b));
                }
            }
            pairs.sort_by(|x, y| y.0.cmp(&x.0).then((x.1, x.2).cmp(&(y.1, y.2))));

            let chosen = pairs.into_iter().find_map(|(gain, a, b)| {
                if !is_valid_swap(state, a, b) {
                    return None;
                }
                let plan = plan_swap(state, a, b)?;
                if plan.sites().any(|s| touched.contains(&s)) {
                    return None;
                }
                Some((gain, a, b, plan))
            });
            let Some((gain, a, b, plan)) = chosen else {
                break;
            };

            touched.extend(plan.sites());
            free_a.retain(|&x| x != a);
            free_b.retain(|&y| y != b);
            for &x in &free_a {
                if let Some(dx) = d.get_mut(&x) {
                    *dx += 2 * c(x, a) - 2 * c(x, b);
                }
            }
            for &y in &free_b {
                if let Some(dy) = d.get_mut(&y) {
                    *dy += 2 * c(y, b) - 2 * c(y, a);
                }
            }
            sequence.push((gain, plan));
        }

        let mut best = (0, 0);
        let mut running = 0;
        for (k, (gain, _)) in sequence.iter().enumerate() {
            running += gain;
            if running > best.1 {
                best = (k + 1, running);
            }
        }
        for (_, plan) in &sequence[..best.0] {
            plan.apply(state)?;
        }
        Ok(best.0)
    }
}
