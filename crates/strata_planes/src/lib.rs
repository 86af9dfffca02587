//! Plane-assignment optimizer for stacked FPGA logic sites.
//!
//! A placed and packed design stacks several interchangeable plane slots at
//! each logic site. This crate reorders which element occupies which plane so
//! that nets spend less distance-weighted plane difference, without touching
//! logical connectivity. Chains keep their internal order and move as a unit.
//!
//! # Pipeline
//!
//! 1. **Load**: read movable objects off the packing and placement records
//! 2. **Graph**: build one Steiner-derived graph per net over shared nodes
//! 3. **Refine**: run the configured passes (Kernighan–Lin partition and/or
//!    continuous relaxation), each guarded by a spread rollback
//! 4. **Realize**: rewrite packing and placement to match the new planes
//!
//! # Usage
//!
//! ```ignore
//! use strata_planes::{Design, Optimizer, ProjectedGradient, RectilinearMst};
//!
//! let solver = ProjectedGradient::from(&config.relaxation);
//! let optimizer = Optimizer::new(&config, &RectilinearMst, &solver);
//! let outcome = optimizer.run(&design, &sink)?;
//! assert!(outcome.report.final_spread <= outcome.report.initial_spread);
//! ```

#![warn(missing_docs)]

pub mod convert;
pub mod error;
pub mod graph;
pub mod ids;
pub mod realize;
pub mod records;
pub mod refine;
pub mod state;

pub use convert::{load_state, locate_clusters};
pub use error::{PlaneError, PlaneResult};
pub use graph::{
    build_net_graphs, GraphEdge, NetGraph, NetStatus, RectilinearMst, SteinerCommand,
    SteinerOracle, SteinerTree,
};
pub use ids::{NetId, NodeId};
pub use realize::{realize, RealizationReport, Realized};
pub use records::{
    NetConnection, NetTable, PackedBlock, PlacedElement, PlacementRecord, SinkDescriptor,
};
pub use refine::{
    design_spread, net_spread, ConstrainedSolver, PartitionRefiner, PartitionReport,
    ProjectedGradient, RelaxationRefiner, RelaxationReport,
};
pub use state::{Coord, Plane, PlaneState, SiteKind};

use strata_common::Arena;
use strata_config::{OptimizerConfig, PassKind};
use strata_diagnostics::diagnostic::REALIZATION;
use strata_diagnostics::{Diagnostic, DiagnosticSink, Locus};

/// A packed and placed design together with its nets.
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    /// Packing tree.
    pub packing: PackedBlock,
    /// Placement record.
    pub placement: PlacementRecord,
    /// Net table.
    pub nets: NetTable,
}

/// How many nets fell into each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounts {
    /// Refined nets.
    pub optimizable: usize,
    /// Single-site nets.
    pub local: usize,
    /// Nets over the coordinate ceiling.
    pub skipped: usize,
}

impl NetCounts {
    /// Tallies the statuses of a set of graphs.
    pub fn of(graphs: &Arena<NetId, NetGraph>) -> Self {
        let mut counts = Self::default();
        for graph in graphs.values() {
            match graph.status() {
                NetStatus::Optimizable => counts.optimizable += 1,
                NetStatus::Local => counts.local += 1,
                NetStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }
}

/// Result of one refinement pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReport {
    /// Partition refiner summary.
    Partition(PartitionReport),
    /// Relaxation refiner summary.
    Relaxation(RelaxationReport),
}

/// Summary of an optimization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizeReport {
    /// Net status counts.
    pub nets: NetCounts,
    /// Spread after loading.
    pub initial_spread: u64,
    /// Spread after the last pass.
    pub final_spread: u64,
    /// Per-pass summaries in execution order.
    pub passes: Vec<PassReport>,
}

/// The refined state of a design, before realization.
#[derive(Debug, Clone)]
pub struct Optimized {
    /// Canonical plane state.
    pub state: PlaneState,
    /// Net graphs over `state`.
    pub graphs: Arena<NetId, NetGraph>,
    /// Summary.
    pub report: OptimizeReport,
}

/// A completed run: rewritten records plus summaries.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Rewritten packing and placement.
    pub realized: Realized,
    /// Optimization summary.
    pub report: OptimizeReport,
}

/// Drives the full pipeline with the given collaborators.
pub struct Optimizer<'a> {
    config: &'a OptimizerConfig,
    steiner: &'a dyn SteinerOracle,
    solver: &'a dyn ConstrainedSolver,
}

impl<'a> Optimizer<'a> {
    /// Creates an optimizer.
    pub fn new(
        config: &'a OptimizerConfig,
        steiner: &'a dyn SteinerOracle,
        solver: &'a dyn ConstrainedSolver,
    ) -> Self {
        Self {
            config,
            steiner,
            solver,
        }
    }

    /// Loads the design and builds its net graphs.
    pub fn prepare(
        &self,
        design: &Design,
        sink: &DiagnosticSink,
    ) -> PlaneResult<(PlaneState, Arena<NetId, NetGraph>)> {
        check_nets(&design.nets, &design.placement)?;
        let mut state = load_state(&design.packing, &design.placement, self.config)?;
        let graphs = build_net_graphs(
            &design.nets,
            &mut state,
            self.config.graph.max_nodes,
            self.steiner,
            sink,
        )?;
        state.verify()?;
        Ok((state, graphs))
    }

    /// Loads the design and runs every configured refinement pass.
    pub fn optimize(&self, design: &Design, sink: &DiagnosticSink) -> PlaneResult<Optimized> {
        let (mut state, graphs) = self.prepare(design, sink)?;
        let initial_spread = design_spread(&graphs, &state);
        let mut report = OptimizeReport {
            nets: NetCounts::of(&graphs),
            initial_spread,
            final_spread: initial_spread,
            passes: Vec::new(),
        };

        for pass in &self.config.flow.passes {
            let pass_report = match pass {
                PassKind::Partition => PassReport::Partition(
                    PartitionRefiner::new(
                        &self.config.partition,
                        self.config.planes.max_distance,
                    )
                    .refine(&graphs, &mut state, sink)?,
                ),
                PassKind::Relaxation => PassReport::Relaxation(
                    RelaxationRefiner::new(&self.config.relaxation, self.solver)
                        .refine(&graphs, &mut state, sink)?,
                ),
            };
            report.passes.push(pass_report);
        }
        state.verify()?;
        report.final_spread = design_spread(&graphs, &state);
        Ok(Optimized {
            state,
            graphs,
            report,
        })
    }

    /// Optimizes the design and realizes the result as new records.
    pub fn run(&self, design: &Design, sink: &DiagnosticSink) -> PlaneResult<Outcome> {
        let optimized = self.optimize(design, sink)?;
        let realized = realize(
            &design.packing,
            &design.placement,
            &optimized.state,
            &self.config.realization,
        )?;
        sink.emit(Diagnostic::note(
            REALIZATION,
            format!(
                "rewrote {} sites with {} plane exchanges; spread {} -> {}",
                realized.report.sites,
                realized.report.exchanges,
                optimized.report.initial_spread,
                optimized.report.final_spread
            ),
            Locus::Design,
        ));
        Ok(Outcome {
            realized,
            report: optimized.report,
        })
    }
}

/// Checks every net against the placement record.
///
/// Endpoints must lie on the placement grid, and each sink descriptor must
/// name a placed element at the sink's coordinate and plane.
pub fn check_nets(nets: &NetTable, placement: &PlacementRecord) -> PlaneResult<()> {
    let inside = |c: Coord| {
        u32::try_from(c.x).is_ok_and(|x| x < placement.width)
            && u32::try_from(c.y).is_ok_and(|y| y < placement.height)
    };
    let by_name = placement.by_name();
    for (name, connections) in nets {
        for connection in connections {
            let ends = [
                (connection.source(), connection.plane),
                (connection.sink_coord(), connection.sink.plane),
            ];
            if let Some(&(coord, plane)) = ends.iter().find(|(c, _)| !inside(*c)) {
                return Err(PlaneError::UnknownCoordinate {
                    net: name.clone(),
                    x: coord.x,
                    y: coord.y,
                    plane,
                });
            }

            let sink = &connection.sink;
            let at = connection.sink_coord();
            let reason = match by_name.get(sink.block.as_str()) {
                None => format!("sink of net '{name}' is not in the placement"),
                Some(e) if e.coord() != at || e.plane != sink.plane => format!(
                    "sink of net '{name}' expected at ({}, {}) plane {} but placed at ({}, {}) plane {}",
                    at.x, at.y, sink.plane, e.x, e.y, e.plane
                ),
                Some(_) => continue,
            };
            return Err(PlaneError::InconsistentPlacement {
                element: sink.block.clone(),
                reason,
            });
        }
    }
    Ok(())
}

/// Picks the Steiner oracle named by the configuration.
pub fn steiner_oracle(config: &OptimizerConfig) -> Box<dyn SteinerOracle> {
    match config
        .flow
        .steiner_command
        .as_deref()
        .and_then(SteinerCommand::from_argv)
    {
        Some(command) => Box::new(command),
        None => Box::new(RectilinearMst),
    }
}
