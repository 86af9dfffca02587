//! Per-net graph construction.
//!
//! Each net is reduced to its distinct site coordinates, a Steiner topology is
//! requested over them, and the topology is expanded so that every terminal
//! fans out to every plane variant the net uses at that coordinate. Graphs
//! hold [`NodeId`]s into the shared [`PlaneState`], never plane values, so a
//! relabeling is seen by every net at once.

mod steiner;

pub use steiner::{
    parse_tree, RectilinearMst, SteinerCommand, SteinerFailure, SteinerOracle, SteinerTree,
};

use crate::error::{PlaneError, PlaneResult};
use crate::ids::{NetId, NodeId};
use crate::records::{NetConnection, NetTable};
use crate::state::{Coord, NodeRole, Plane, PlaneState};
use std::collections::{BTreeMap, BTreeSet};
use strata_common::Arena;
use strata_diagnostics::diagnostic::NET_TOO_LARGE;
use strata_diagnostics::{Diagnostic, DiagnosticSink, Locus};

/// An edge between two canonical nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphEdge {
    /// One endpoint.
    pub u: NodeId,
    /// Other endpoint.
    pub v: NodeId,
    /// Manhattan distance between the endpoints' sites.
    pub distance: u32,
}

impl GraphEdge {
    /// Returns the opposite endpoint, or `None` if `n` is not on this edge.
    pub fn other(&self, n: NodeId) -> Option<NodeId> {
        if n == self.u {
            Some(self.v)
        } else if n == self.v {
            Some(self.u)
        } else {
            None
        }
    }
}

/// Whether the refiners look at a net.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetStatus {
    /// Spans several sites and is refined.
    Optimizable,
    /// Touches a single site. Counted in spread, never refined.
    Local,
    /// Exceeded the coordinate ceiling; has no edges.
    Skipped,
}

/// The immutable graph of one net.
#[derive(Debug, Clone)]
pub struct NetGraph {
    name: String,
    status: NetStatus,
    wirelength: u32,
    nodes: Vec<NodeId>,
    edges: Vec<GraphEdge>,
    fixed: BTreeSet<NodeId>,
}

impl NetGraph {
    /// Net name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Refinement status.
    pub fn status(&self) -> NetStatus {
        self.status
    }

    /// Returns `true` if the refiners should visit this net.
    pub fn is_optimizable(&self) -> bool {
        self.status == NetStatus::Optimizable
    }

    /// Steiner wirelength estimate (zero for local and skipped nets).
    pub fn wirelength(&self) -> u32 {
        self.wirelength
    }

    /// Nodes of the net, sorted by ID.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Edges of the net.
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Returns `true` if the node cannot be a swap representative.
    pub fn is_fixed(&self, node: NodeId) -> bool {
        self.fixed.contains(&node)
    }

    /// Nodes currently on `plane`.
    pub fn partition(&self, state: &PlaneState, plane: Plane) -> Vec<NodeId> {
        self.nodes
            .iter()
            .copied()
            .filter(|&n| state.plane(n) == plane)
            .collect()
    }
}

/// Builds the graphs of every net in name order.
pub fn build_net_graphs(
    nets: &NetTable,
    state: &mut PlaneState,
    max_nodes: usize,
    oracle: &dyn SteinerOracle,
    sink: &DiagnosticSink,
) -> PlaneResult<Arena<NetId, NetGraph>> {
    let mut graphs = Arena::new();
    for (name, connections) in nets {
        graphs.alloc(build_net_graph(
            name,
            connections,
            state,
            max_nodes,
            oracle,
            sink,
        )?);
    }
    Ok(graphs)
}

/// Builds the graph of a single net, materializing its nodes in `state`.
pub fn build_net_graph(
    name: &str,
    connections: &[NetConnection],
    state: &mut PlaneState,
    max_nodes: usize,
    oracle: &dyn SteinerOracle,
    sink: &DiagnosticSink,
) -> PlaneResult<NetGraph> {
    let mut graph = NetGraph {
        name: name.to_string(),
        status: NetStatus::Local,
        wirelength: 0,
        nodes: Vec::new(),
        edges: Vec::new(),
        fixed: BTreeSet::new(),
    };
    let Some(first) = connections.first() else {
        return Ok(graph);
    };
    let source = first.source();

    let mut variants: BTreeMap<Coord, BTreeMap<Plane, NodeId>> = BTreeMap::new();
    for c in connections {
        for (coord, plane) in [(c.source(), c.plane), (c.sink_coord(), c.sink.plane)] {
            let id = state.node_for(coord, plane)?;
            variants.entry(coord).or_default().insert(plane, id);
        }
    }
    graph.nodes = variants.values().flat_map(|m| m.values().copied()).collect();
    graph.nodes.sort();
    graph.fixed = graph
        .nodes
        .iter()
        .copied()
        .filter(|&n| !matches!(state.role(n), NodeRole::Start { .. }))
        .collect();

    if variants.len() > max_nodes {
        sink.emit(
            Diagnostic::warning(
                NET_TOO_LARGE,
                format!(
                    "net '{name}' touches {} sites, more than the limit of {max_nodes}",
                    variants.len()
                ),
                Locus::Net(name.to_string()),
            )
            .with_note("the net keeps its current plane assignment"),
        );
        graph.status = NetStatus::Skipped;
        return Ok(graph);
    }

    let mut seen = BTreeSet::new();
    let mut push_edge = |edges: &mut Vec<GraphEdge>, u: NodeId, v: NodeId, distance: u32| {
        if u != v && seen.insert((u.min(v), u.max(v))) {
            edges.push(GraphEdge { u, v, distance });
        }
    };

    for c in connections.iter().filter(|c| c.source() == c.sink_coord()) {
        if c.plane != c.sink.plane {
            let at = &variants[&c.source()];
            push_edge(&mut graph.edges, at[&c.plane], at[&c.sink.plane], 0);
        }
    }

    if variants.len() == 1 {
        return Ok(graph);
    }

    let terminals: Vec<Coord> = variants.keys().copied().collect();
    let tree = oracle
        .tree(&terminals)
        .map_err(|e| PlaneError::Steiner {
            net: name.to_string(),
            message: e.to_string(),
        })?;
    graph.wirelength = tree.wirelength;

    let mut adjacency: BTreeMap<Coord, Vec<Coord>> = BTreeMap::new();
    for &(a, b) in tree.edges.iter().filter(|(a, b)| a != b) {
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    // Entries are (point, nearest terminal above it in the walk).
    let mut visited = BTreeSet::new();
    let mut worklist: Vec<(Coord, Option<Coord>)> = vec![(source, None)];
    while let Some((point, parent)) = worklist.pop() {
        if !visited.insert(point) {
            continue;
        }
        let logical_parent = match variants.get(&point) {
            Some(here) => {
                if let Some(parent) = parent {
                    let distance = parent.manhattan(point);
                    for &u in variants[&parent].values() {
                        for &v in here.values() {
                            push_edge(&mut graph.edges, u, v, distance);
                        }
                    }
                }
                Some(point)
            }
            None => parent,
        };
        if let Some(next) = adjacency.get(&point) {
            for &n in next.iter().rev() {
                if !visited.contains(&n) {
                    worklist.push((n, logical_parent));
                }
            }
        }
    }

    if let Some(missing) = terminals.iter().find(|t| !visited.contains(t)) {
        return Err(PlaneError::DisconnectedTerminal {
            net: name.to_string(),
            x: missing.x,
            y: missing.y,
        });
    }

    graph.status = NetStatus::Optimizable;
    Ok(graph)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::records::SinkDescriptor;
    use crate::state::SiteKind;

    pub(crate) fn conn(src: (i32, i32, Plane), sink: (i32, i32, Plane)) -> NetConnection {
        NetConnection {
            plane: src.2,
            source_x: src.0,
            source_y: src.1,
            sink: SinkDescriptor {
                block: format!("e_{}_{}_{}", sink.0, sink.1, sink.2),
                plane: sink.2,
            },
            sink_x: sink.0,
            sink_y: sink.1,
        }
    }

    struct FixedTree(SteinerTree);

    impl SteinerOracle for FixedTree {
        fn tree(&self, _: &[Coord]) -> Result<SteinerTree, SteinerFailure> {
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    impl SteinerOracle for Unreachable {
        fn tree(&self, _: &[Coord]) -> Result<SteinerTree, SteinerFailure> {
            panic!("oracle must not be called");
        }
    }

    fn build(
        connections: &[NetConnection],
        state: &mut PlaneState,
        oracle: &dyn SteinerOracle,
    ) -> PlaneResult<NetGraph> {
        build_net_graph("n", connections, state, 64, oracle, &DiagnosticSink::new())
    }

    #[test]
    fn single_site_two_planes_has_one_zero_length_edge() {
        let mut state = PlaneState::new(8);
        let graph = build(&[conn((1, 1, 0), (1, 1, 1))], &mut state, &Unreachable).unwrap();
        assert_eq!(graph.status(), NetStatus::Local);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].distance, 0);
        assert!(graph.nodes().iter().all(|&n| graph.is_fixed(n)));
    }

    #[test]
    fn terminals_fan_out_to_every_plane_variant() {
        let mut state = PlaneState::new(8);
        let graph = build(
            &[conn((0, 0, 1), (3, 0, 2)), conn((0, 0, 1), (3, 0, 4))],
            &mut state,
            &RectilinearMst,
        )
        .unwrap();
        assert_eq!(graph.status(), NetStatus::Optimizable);
        assert_eq!(graph.wirelength(), 3);
        assert_eq!(graph.edges().len(), 2);
        assert!(graph.edges().iter().all(|e| e.distance == 3));
        assert_eq!(graph.partition(&state, 4).len(), 1);
    }

    #[test]
    fn junctions_pass_the_parent_through() {
        let mut state = PlaneState::new(8);
        let junction = Coord::new(2, 0);
        let tree = SteinerTree {
            wirelength: 4,
            edges: vec![
                (Coord::new(0, 0), junction),
                (junction, Coord::new(2, 2)),
                (junction, Coord::new(4, 0)),
                (junction, junction),
            ],
        };
        let graph = build(
            &[conn((0, 0, 0), (2, 2, 0)), conn((0, 0, 0), (4, 0, 0))],
            &mut state,
            &FixedTree(tree),
        )
        .unwrap();
        let src = state.lookup(Coord::new(0, 0), 0).unwrap();
        assert_eq!(graph.edges().len(), 2);
        let far = state.lookup(Coord::new(4, 0), 0).unwrap();
        for e in graph.edges() {
            assert!(e.other(src).is_some());
        }
        let edge = graph.edges().iter().find(|e| e.other(far).is_some()).unwrap();
        assert_eq!(edge.distance, 4);
    }

    #[test]
    fn disconnected_terminal_is_fatal() {
        let mut state = PlaneState::new(8);
        let tree = SteinerTree {
            wirelength: 1,
            edges: vec![(Coord::new(0, 0), Coord::new(1, 0))],
        };
        let err = build(
            &[conn((0, 0, 0), (1, 0, 0)), conn((0, 0, 0), (5, 5, 0))],
            &mut state,
            &FixedTree(tree),
        )
        .unwrap_err();
        assert!(matches!(err, PlaneError::DisconnectedTerminal { x: 5, y: 5, .. }));
    }

    #[test]
    fn oversized_net_is_skipped_with_warning() {
        let mut state = PlaneState::new(8);
        let sink = DiagnosticSink::new();
        let connections: Vec<_> = (1..4).map(|x| conn((0, 0, 0), (x, 0, 0))).collect();
        let graph =
            build_net_graph("wide", &connections, &mut state, 2, &Unreachable, &sink).unwrap();
        assert_eq!(graph.status(), NetStatus::Skipped);
        assert!(graph.edges().is_empty());
        assert_eq!(sink.count_code(101), 1);
    }

    #[test]
    fn start_nodes_are_not_fixed() {
        let mut state = PlaneState::new(8);
        state
            .add_site(Coord::new(3, 0), SiteKind::Clb, &[(2, 4)])
            .unwrap();
        let graph = build(
            &[conn((0, 0, 0), (3, 0, 2)), conn((0, 0, 0), (3, 0, 3))],
            &mut state,
            &RectilinearMst,
        )
        .unwrap();
        let start = state.lookup(Coord::new(3, 0), 2).unwrap();
        let follower = state.lookup(Coord::new(3, 0), 3).unwrap();
        assert!(!graph.is_fixed(start));
        assert!(graph.is_fixed(follower));
    }

    #[test]
    fn steiner_failure_names_net() {
        struct Failing;
        impl SteinerOracle for Failing {
            fn tree(&self, _: &[Coord]) -> Result<SteinerTree, SteinerFailure> {
                Err(SteinerFailure::Protocol {
                    line: 1,
                    text: String::new(),
                })
            }
        }
        let mut state = PlaneState::new(8);
        let err = build(&[conn((0, 0, 0), (1, 0, 0))], &mut state, &Failing).unwrap_err();
        assert!(matches!(err, PlaneError::Steiner { ref net, .. } if net == "n"));
    }
}
