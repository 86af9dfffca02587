//! Fatal errors of the plane optimizer.
//!
//! Every variant names the net, site, or node it concerns so the command line
//! can point at the offending part of the design. Recoverable policy events
//! (skipped nets, rollbacks) are diagnostics, not errors.

use crate::state::Plane;
use strata_common::InternalError;
use strata_diagnostics::Locus;

/// Result alias for fallible optimizer operations.
pub type PlaneResult<T> = Result<T, PlaneError>;

/// A fatal optimizer error. The run produces no output once one is raised.
#[derive(Debug, thiserror::Error)]
pub enum PlaneError {
    /// A net's Steiner topology does not reach one of its terminals.
    #[error("net '{net}': terminal ({x}, {y}) is not connected by the Steiner tree")]
    DisconnectedTerminal {
        /// Net name.
        net: String,
        /// Terminal column.
        x: i32,
        /// Terminal row.
        y: i32,
    },

    /// A coordinate is referenced but absent from the node tables.
    #[error("net '{net}': coordinate ({x}, {y}) plane {plane} has no node")]
    UnknownCoordinate {
        /// Net name.
        net: String,
        /// Column.
        x: i32,
        /// Row.
        y: i32,
        /// Plane.
        plane: Plane,
    },

    /// A site is referenced but not present in the packing or site table.
    #[error("site ({x}, {y}) is not present in the packing record")]
    UnknownSite {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },

    /// Two movable objects at one site share a plane.
    #[error("site ({x}, {y}): movable objects [{first_start}, {first_end}] and [{second_start}, {second_end}] overlap")]
    OverlappingObjects {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
        /// First object start.
        first_start: Plane,
        /// First object end.
        first_end: Plane,
        /// Second object start.
        second_start: Plane,
        /// Second object end.
        second_end: Plane,
    },

    /// A movable object or element lies outside `0..max_plane`.
    #[error("site ({x}, {y}): plane range [{start}, {end}] exceeds {max_plane} planes")]
    ObjectOutOfRange {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
        /// Range start.
        start: Plane,
        /// Range end.
        end: Plane,
        /// Configured plane count.
        max_plane: Plane,
    },

    /// Physical realization needed a plane sub-block that is not in the packing.
    #[error("site ({x}, {y}): expected sub-block for plane {plane} is missing")]
    MissingSubBlock {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
        /// Plane whose sub-block was expected.
        plane: Plane,
    },

    /// A block instance name is not of the form `type[index]`.
    #[error("block '{name}' has malformed instance name '{instance}'")]
    MalformedInstance {
        /// Block name.
        name: String,
        /// Offending instance string.
        instance: String,
    },

    /// Placement and packing disagree about where an element lives.
    #[error("element '{element}': {reason}")]
    InconsistentPlacement {
        /// Element name.
        element: String,
        /// What disagrees.
        reason: String,
    },

    /// The Steiner-tree service failed.
    #[error("Steiner tree for net '{net}' failed: {message}")]
    Steiner {
        /// Net name.
        net: String,
        /// Failure description.
        message: String,
    },

    /// The nonlinear solver failed or returned a malformed result.
    #[error("solver failed on net '{net}': {message}")]
    Solver {
        /// Net name.
        net: String,
        /// Failure description.
        message: String,
    },

    /// A record could not be encoded.
    #[error("failed to encode {what}: {message}")]
    Encode {
        /// What was being encoded.
        what: &'static str,
        /// Encoder message.
        message: String,
    },

    /// An internal invariant was broken.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl PlaneError {
    /// Returns the part of the design this error concerns.
    pub fn locus(&self) -> Locus {
        match self {
            PlaneError::DisconnectedTerminal { net, .. }
            | PlaneError::UnknownCoordinate { net, .. }
            | PlaneError::Steiner { net, .. }
            | PlaneError::Solver { net, .. } => Locus::Net(net.clone()),
            PlaneError::UnknownSite { x, y }
            | PlaneError::OverlappingObjects { x, y, .. }
            | PlaneError::ObjectOutOfRange { x, y, .. } => Locus::Site { x: *x, y: *y },
            PlaneError::MissingSubBlock { x, y, plane } => Locus::Node {
                x: *x,
                y: *y,
                plane: *plane,
            },
            PlaneError::MalformedInstance { .. }
            | PlaneError::InconsistentPlacement { .. }
            | PlaneError::Encode { .. }
            | PlaneError::Internal(_) => Locus::Design,
        }
    }
}
