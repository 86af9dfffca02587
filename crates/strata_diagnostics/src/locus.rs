//! The part of the design a diagnostic refers to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the design a diagnostic applies.
///
/// Replaces source spans: the optimizer works on nets and stacked sites, so a
/// diagnostic points at a net, a site `(x, y)`, or a node `(x, y, plane)`.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Locus {
    /// The design as a whole.
    Design,
    /// A net, by name.
    Net(String),
    /// A stacked site.
    Site {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// One plane slot at a site.
    Node {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
        /// Plane index.
        plane: u8,
    },
}

impl Locus {
    /// Returns `true` for [`Locus::Design`], which renders no location line.
    pub fn is_design(&self) -> bool {
        matches!(self, Locus::Design)
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locus::Design => write!(f, "design"),
            Locus::Net(name) => write!(f, "net '{name}'"),
            Locus::Site { x, y } => write!(f, "site ({x}, {y})"),
            Locus::Node { x, y, plane } => write!(f, "node ({x}, {y}) plane {plane}"),
        }
    }
}
