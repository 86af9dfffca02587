//! Continuous relaxation with renormalization.
//!
//! Each optimizable net becomes a least-squares problem: one real variable per
//! movable object the net touches, pinned variables for fixed nodes, and the
//! sum of squared plane differences over the net's edges as objective. The
//! solved object positions only give an order; every touched site is then
//! re-packed into integral plane slots.

use super::cost::design_spread;
use super::solver::{ConstrainedSolver, EqualityConstraint, Objective};
use crate::error::{PlaneError, PlaneResult};
use crate::graph::NetGraph;
use crate::ids::{NetId, NodeId};
use crate::state::{Coord, NodeRole, ObjectMove, Plane, PlaneState, SiteKind};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strata_common::Arena;
use strata_config::RelaxationConfig;
use strata_diagnostics::diagnostic::{RELAX_ITERATION, RENORMALIZE_SKIPPED, ROLLBACK};
use strata_diagnostics::{Diagnostic, DiagnosticSink, Locus};

/// Outcome of a relaxation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaxationReport {
    /// Iterations executed.
    pub iterations: u32,
    /// Nets handed to the solver.
    pub solved_nets: usize,
    /// Sites whose renormalization was skipped.
    pub skipped_sites: usize,
    /// Whether the last iteration was rolled back.
    pub rolled_back: bool,
    /// Spread before relaxation.
    pub initial_spread: u64,
    /// Spread after relaxation.
    pub final_spread: u64,
}

/// Squared plane difference over edges between `(variable, offset)` endpoints.
struct SpreadObjective {
    edges: Vec<((usize, f64), (usize, f64))>,
}

impl Objective for SpreadObjective {
    fn value(&self, x: &[f64]) -> f64 {
        self.edges
            .iter()
            .map(|&((iu, ou), (iv, ov))| ((x[iu] + ou) - (x[iv] + ov)).powi(2))
            .sum()
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        for &((iu, ou), (iv, ov)) in &self.edges {
            let d = 2.0 * ((x[iu] + ou) - (x[iv] + ov));
            grad[iu] += d;
            grad[iv] -= d;
        }
    }
}

/// The relaxation refiner.
pub struct RelaxationRefiner<'a> {
    config: &'a RelaxationConfig,
    solver: &'a dyn ConstrainedSolver,
}

impl<'a> RelaxationRefiner<'a> {
    /// Creates a refiner backed by `solver`.
    pub fn new(config: &'a RelaxationConfig, solver: &'a dyn ConstrainedSolver) -> Self {
        Self { config, solver }
    }

    /// Runs the configured number of relax-and-renormalize rounds.
    pub fn refine(
        &self,
        graphs: &Arena<NetId, NetGraph>,
        state: &mut PlaneState,
        sink: &DiagnosticSink,
    ) -> PlaneResult<RelaxationReport> {
        let mut spread = design_spread(graphs, state);
        let mut report = RelaxationReport {
            initial_spread: spread,
            ..RelaxationReport::default()
        };

        for iteration in 1..=self.config.iterations {
            let snapshot = state.clone();
            for graph in graphs.values().filter(|g| g.is_optimizable()) {
                let outcome = self.relax_net(graph, state, sink)?;
                report.solved_nets += usize::from(outcome.solved);
                report.skipped_sites += outcome.skipped_sites;
            }
            let after = design_spread(graphs, state);
            report.iterations = iteration;
            sink.emit(Diagnostic::note(
                RELAX_ITERATION,
                format!("relaxation iteration {iteration}: spread {spread} -> {after}"),
                Locus::Design,
            ));
            if after > spread {
                *state = snapshot;
                report.rolled_back = true;
                sink.emit(Diagnostic::warning(
                    ROLLBACK,
                    format!(
                        "relaxation iteration {iteration} raised spread from {spread} to {after}; restored"
                    ),
                    Locus::Design,
                ));
                break;
            }
            spread = after;
        }
        report.final_spread = design_spread(graphs, state);
        Ok(report)
    }

    /// Relaxes one net and renormalizes the sites it touches.
    pub fn relax_net(
        &self,
        graph: &NetGraph,
        state: &mut PlaneState,
        sink: &DiagnosticSink,
    ) -> PlaneResult<NetOutcome> {
        let mut outcome = NetOutcome::default();
        let problem = Problem::build(graph, state);
        if problem.objects.is_empty() {
            return Ok(outcome);
        }

        let solution = self
            .solver
            .minimize(&problem.objective, &problem.initial, &problem.pins)
            .map_err(|e| PlaneError::Solver {
                net: graph.name().to_string(),
                message: e.to_string(),
            })?;
        if solution.len() != problem.initial.len() {
            return Err(PlaneError::Solver {
                net: graph.name().to_string(),
                message: format!(
                    "returned {} values for {} variables",
                    solution.len(),
                    problem.initial.len()
                ),
            });
        }
        outcome.solved = true;

        let mut per_site: BTreeMap<Coord, BTreeMap<usize, f64>> = BTreeMap::new();
        for (&(coord, object), &index) in &problem.objects {
            per_site
                .entry(coord)
                .or_default()
                .insert(object, solution[index]);
        }
        for (coord, solved) in per_site {
            if !renormalize(state, coord, &solved)? {
                outcome.skipped_sites += 1;
                sink.emit(
                    Diagnostic::warning(
                        RENORMALIZE_SKIPPED,
                        format!(
                            "site ({}, {}) could not be re-packed after relaxing net '{}'",
                            coord.x,
                            coord.y,
                            graph.name()
                        ),
                        coord.locus(),
                    )
                    .with_note("a chain does not fit between the fixed planes; site left unchanged"),
                );
            }
        }
        Ok(outcome)
    }
}

/// What relaxing one net did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetOutcome {
    /// The solver was invoked.
    pub solved: bool,
    /// Touched sites left unchanged because re-packing failed.
    pub skipped_sites: usize,
}

/// The least-squares problem of one net.
struct Problem {
    objective: SpreadObjective,
    initial: Vec<f64>,
    pins: Vec<EqualityConstraint>,
    objects: BTreeMap<(Coord, usize), usize>,
}

impl Problem {
    fn build(graph: &NetGraph, state: &PlaneState) -> Self {
        let mut initial = Vec::new();
        let mut pins = Vec::new();
        let mut objects = BTreeMap::new();
        let mut endpoint: HashMap<NodeId, (usize, f64)> = HashMap::new();

        for &n in graph.nodes() {
            let node = state.node(n);
            let movable = state
                .site(node.coord)
                .filter(|s| s.kind == SiteKind::Clb)
                .and_then(|site| match state.role(n) {
                    NodeRole::Start { object } => Some((site, object, 0.0)),
                    NodeRole::Follower { object, offset } => {
                        Some((site, object, f64::from(offset)))
                    }
                    NodeRole::Fixed => None,
                });
            let slot = match movable {
                Some((site, object, offset)) => {
                    let index = *objects.entry((node.coord, object)).or_insert_with(|| {
                        initial.push(f64::from(site.objects()[object].start));
                        initial.len() - 1
                    });
                    (index, offset)
                }
                None => {
                    let value = f64::from(node.plane);
                    initial.push(value);
                    pins.push(EqualityConstraint {
                        index: initial.len() - 1,
                        value,
                    });
                    (initial.len() - 1, 0.0)
                }
            };
            endpoint.insert(n, slot);
        }

        let edges = graph
            .edges()
            .iter()
            .filter_map(|e| Some((*endpoint.get(&e.u)?, *endpoint.get(&e.v)?)))
            .collect();
        Self {
            objective: SpreadObjective { edges },
            initial,
            pins,
            objects,
        }
    }
}

/// Re-packs a site's objects in the order of their solved starts.
///
/// Objects without a solved value keep their current start as sort key; ties
/// fall back to the current start. Walking that order, each object takes the
/// free start nearest its rounded solved value (the lower one on a tie) among
/// those that avoid fixed planes and still leave room for the objects after
/// it. Returns `false`, leaving the site untouched, when no such start exists
/// for some object.
pub fn renormalize(
    state: &mut PlaneState,
    coord: Coord,
    solved: &BTreeMap<usize, f64>,
) -> PlaneResult<bool> {
    let site = state.site(coord).ok_or(PlaneError::UnknownSite {
        x: coord.x,
        y: coord.y,
    })?;
    let fixed = state.fixed_planes(coord);
    let max_plane = u16::from(state.max_plane());
    let objects = site.objects();

    let key = |i: usize| {
        solved
            .get(&i)
            .copied()
            .unwrap_or_else(|| f64::from(objects[i].start))
    };
    let mut order: Vec<usize> = (0..objects.len()).collect();
    order.sort_by(|&a, &b| {
        key(a)
            .total_cmp(&key(b))
            .then(objects[a].start.cmp(&objects[b].start))
    });
    let lens: Vec<u16> = order
        .iter()
        .map(|&i| u16::from(objects[i].len()))
        .collect();

    let mut moves = Vec::with_capacity(order.len());
    let mut next = 0u16;
    for (rank, &index) in order.iter().enumerate() {
        let len = lens[rank];
        let target = key(index)
            .round()
            .clamp(0.0, f64::from(max_plane.saturating_sub(1))) as u16;
        let mut best: Option<u16> = None;
        let mut start = next;
        while start + len <= max_plane {
            if is_free(start, len, &fixed)
                && packs(start + len, &lens[rank + 1..], &fixed, max_plane)
                && best.map_or(true, |b| start.abs_diff(target) < b.abs_diff(target))
            {
                best = Some(start);
            }
            start += 1;
        }
        let Some(start) = best else {
            return Ok(false);
        };
        let new_start = start as Plane;
        if new_start != objects[index].start {
            moves.push(ObjectMove {
                object: index,
                new_start,
            });
        }
        next = start + len;
    }
    state.apply_moves(coord, &moves)?;
    Ok(true)
}

fn is_free(start: u16, len: u16, fixed: &BTreeSet<Plane>) -> bool {
    !(start..start + len).any(|p| fixed.contains(&(p as Plane)))
}

/// Whether `lens` fit in order from `from` upward, each at its lowest free start.
fn packs(from: u16, lens: &[u16], fixed: &BTreeSet<Plane>, max_plane: u16) -> bool {
    let mut next = from;
    for &len in lens {
        loop {
            if next + len > max_plane {
                return false;
            }
            if is_free(next, len, fixed) {
                break;
            }
            next += 1;
        }
        next += len;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::conn;
    use crate::graph::{build_net_graph, build_net_graphs, NetStatus, RectilinearMst};
    use crate::records::NetTable;
    use crate::refine::cost::net_spread;
    use crate::refine::solver::{ProjectedGradient, SolverFailure};

    fn relax_config() -> RelaxationConfig {
        RelaxationConfig::default()
    }

    #[test]
    fn all_fixed_star_changes_nothing() {
        let mut state = PlaneState::new(8);
        let sink = DiagnosticSink::new();
        let connections: Vec<_> = (0..4).map(|p| conn((0, 0, 0), (5, 0, p))).collect();
        let graph =
            build_net_graph("star", &connections, &mut state, 64, &RectilinearMst, &sink).unwrap();
        assert_eq!(graph.status(), NetStatus::Optimizable);
        let before: Vec<Plane> = graph.nodes().iter().map(|&n| state.plane(n)).collect();
        let spread = net_spread(&graph, &state);

        let config = relax_config();
        let solver = ProjectedGradient::default();
        let outcome = RelaxationRefiner::new(&config, &solver)
            .relax_net(&graph, &mut state, &sink)
            .unwrap();
        assert!(!outcome.solved);
        let after: Vec<Plane> = graph.nodes().iter().map(|&n| state.plane(n)).collect();
        assert_eq!(before, after);
        assert_eq!(net_spread(&graph, &state), spread);
    }

    #[test]
    fn renormalize_packs_in_solved_order() {
        let site = Coord::new(0, 0);
        let mut state = PlaneState::new(8);
        state
            .add_site(site, SiteKind::Clb, &[(1, 1), (3, 5), (7, 7)])
            .unwrap();
        for p in [1, 3, 7] {
            state.node_for(site, p).unwrap();
        }
        let solved = BTreeMap::from([(0, 6.0), (1, 0.5), (2, 2.0)]);
        assert!(renormalize(&mut state, site, &solved).unwrap());
        let objects = state.site(site).unwrap().objects();
        let ranges: Vec<_> = objects.iter().map(|o| (o.start, o.end)).collect();
        // The chain rounds up to 1, the single aimed at 2 queues behind it.
        assert_eq!(ranges, vec![(1, 3), (4, 4), (6, 6)]);
        assert_eq!(state.plane(state.lookup(site, 1).unwrap()), 6);
        assert_eq!(state.plane(state.lookup(site, 7).unwrap()), 4);
    }

    #[test]
    fn renormalize_keeps_objects_near_their_solved_planes() {
        let site = Coord::new(0, 0);
        let mut state = PlaneState::new(8);
        state
            .add_site(site, SiteKind::Clb, &[(2, 2), (5, 5)])
            .unwrap();
        for p in [2, 5] {
            state.node_for(site, p).unwrap();
        }
        let solved = BTreeMap::from([(0, 2.1), (1, 1.9)]);
        assert!(renormalize(&mut state, site, &solved).unwrap());
        assert_eq!(state.plane(state.lookup(site, 5).unwrap()), 2);
        assert_eq!(state.plane(state.lookup(site, 2).unwrap()), 3);
    }

    #[test]
    fn renormalize_leaves_room_for_later_objects() {
        let site = Coord::new(0, 0);
        let mut state = PlaneState::new(4);
        state
            .add_site(site, SiteKind::Clb, &[(0, 0), (1, 2)])
            .unwrap();
        for p in [0, 1] {
            state.node_for(site, p).unwrap();
        }
        // The single wants plane 3 but the chain after it needs two planes.
        let solved = BTreeMap::from([(0, 3.0), (1, 3.5)]);
        assert!(renormalize(&mut state, site, &solved).unwrap());
        let ranges: Vec<_> = state
            .site(site)
            .unwrap()
            .objects()
            .iter()
            .map(|o| (o.start, o.end))
            .collect();
        assert_eq!(ranges, vec![(1, 1), (2, 3)]);
    }

    #[test]
    fn renormalize_skips_fixed_planes() {
        let site = Coord::new(0, 0);
        let mut state = PlaneState::new(8);
        state
            .add_site(site, SiteKind::Clb, &[(3, 3), (5, 6)])
            .unwrap();
        // Plane 1 holds a node outside every object.
        for p in [1, 3, 5] {
            state.node_for(site, p).unwrap();
        }
        let solved = BTreeMap::from([(0, 0.0), (1, 1.0)]);
        assert!(renormalize(&mut state, site, &solved).unwrap());
        let ranges: Vec<_> = state
            .site(site)
            .unwrap()
            .objects()
            .iter()
            .map(|o| (o.start, o.end))
            .collect();
        assert_eq!(ranges, vec![(0, 0), (2, 3)]);
        assert_eq!(state.plane(state.lookup(site, 1).unwrap()), 1);
    }

    #[test]
    fn renormalize_fails_when_chain_cannot_fit() {
        let site = Coord::new(0, 0);
        let mut state = PlaneState::new(4);
        state.add_site(site, SiteKind::Clb, &[(0, 0), (2, 3)]).unwrap();
        for p in [0, 1, 2] {
            state.node_for(site, p).unwrap();
        }
        // Chain solved first needs planes 0..=1 but plane 1 is fixed; then 2..=3,
        // leaving no slot for the single.
        let solved = BTreeMap::from([(0, 3.0), (1, 0.0)]);
        assert!(!renormalize(&mut state, site, &solved).unwrap());
        let objects = state.site(site).unwrap().objects();
        assert_eq!((objects[0].start, objects[1].start), (0, 2));
    }

    #[test]
    fn relaxation_pulls_objects_toward_neighbour() {
        let a = Coord::new(0, 0);
        let mut state = PlaneState::new(8);
        state.add_site(a, SiteKind::Clb, &[(6, 6)]).unwrap();
        let sink = DiagnosticSink::new();
        let mut nets = NetTable::new();
        nets.insert("n".into(), vec![conn((4, 0, 0), (0, 0, 6))]);
        let graphs = build_net_graphs(&nets, &mut state, 64, &RectilinearMst, &sink).unwrap();
        assert_eq!(design_spread(&graphs, &state), 6);

        let config = relax_config();
        let solver = ProjectedGradient::default();
        let report = RelaxationRefiner::new(&config, &solver)
            .refine(&graphs, &mut state, &sink)
            .unwrap();
        assert_eq!(report.final_spread, 0);
        assert_eq!(report.iterations, 2);
        assert_eq!(state.site(a).unwrap().objects()[0].start, 0);
        assert_eq!(sink.count_code(203), 2);
    }

    #[test]
    fn solver_failure_names_net() {
        struct Broken;
        impl ConstrainedSolver for Broken {
            fn minimize(
                &self,
                _: &dyn Objective,
                _: &[f64],
                _: &[EqualityConstraint],
            ) -> Result<Vec<f64>, SolverFailure> {
                Err(SolverFailure::NonFinite { iteration: 0 })
            }
        }
        let mut state = PlaneState::new(8);
        state
            .add_site(Coord::new(0, 0), SiteKind::Clb, &[(1, 1)])
            .unwrap();
        let sink = DiagnosticSink::new();
        let graph = build_net_graph(
            "sum",
            &[conn((3, 0, 0), (0, 0, 1))],
            &mut state,
            64,
            &RectilinearMst,
            &sink,
        )
        .unwrap();
        let config = relax_config();
        let err = RelaxationRefiner::new(&config, &Broken)
            .relax_net(&graph, &mut state, &sink)
            .unwrap_err();
        assert!(matches!(err, PlaneError::Solver { ref net, .. } if net == "sum"));
    }
}
