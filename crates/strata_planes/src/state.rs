//! Canonical per-run optimizer state.
//!
//! [`PlaneState`] owns every `(x, y, plane)` node exactly once, in an arena,
//! together with the per-site table of movable objects. Net graphs refer to
//! nodes by [`NodeId`] only, so a relabeling applied here is immediately seen
//! by every net that touches the node. Cloning the state is a complete
//! snapshot and is how the refiners roll back.

use crate::error::{PlaneError, PlaneResult};
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strata_common::{Arena, InternalError};
use strata_diagnostics::Locus;

/// A plane index at a site.
pub type Plane = u8;

/// A site coordinate on the device grid.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Coord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Coord {
    /// Creates a coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to `other`.
    pub fn manhattan(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The diagnostic locus of the site at this coordinate.
    pub fn locus(self) -> Locus {
        Locus::Site {
            x: self.x,
            y: self.y,
        }
    }
}

/// Whether a site takes part in plane optimization.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SiteKind {
    /// A logic cluster whose plane slots are interchangeable.
    Clb,
    /// Any other block (IO, memory, ...). Its nodes never move.
    Other,
}

/// A contiguous inclusive plane range relocated as a unit.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MovableObject {
    /// First plane of the range; the only legal swap representative.
    pub start: Plane,
    /// Last plane of the range.
    pub end: Plane,
    /// `start` when the design was loaded.
    pub origin: Plane,
}

impl MovableObject {
    /// Creates an object at its load-time position.
    pub fn new(start: Plane, end: Plane) -> Self {
        Self {
            start,
            end,
            origin: start,
        }
    }

    /// Number of planes covered.
    pub fn len(&self) -> Plane {
        self.end - self.start + 1
    }

    /// Returns `true` for multi-plane chains.
    pub fn is_chain(&self) -> bool {
        self.start != self.end
    }

    /// Returns `true` if `plane` lies inside the range.
    pub fn contains(&self, plane: Plane) -> bool {
        self.start <= plane && plane <= self.end
    }

    /// Returns `true` if the object sits somewhere other than where it was loaded.
    pub fn has_moved(&self) -> bool {
        self.start != self.origin
    }
}

/// One relocation inside a site: object index (in start order) and its new start.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ObjectMove {
    /// Index into [`Site::objects`].
    pub object: usize,
    /// Start plane after the move.
    pub new_start: Plane,
}

/// A stacked site and the movable objects it owns.
#[derive(Clone, Debug)]
pub struct Site {
    /// Grid location.
    pub coord: Coord,
    /// Site class.
    pub kind: SiteKind,
    objects: Vec<MovableObject>,
    nodes: Vec<NodeId>,
}

impl Site {
    /// Movable objects, sorted by start plane.
    pub fn objects(&self) -> &[MovableObject] {
        &self.objects
    }

    /// Every node materialized at this site.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Index of the object covering `plane`.
    pub fn object_at(&self, plane: Plane) -> Option<usize> {
        self.objects.iter().position(|o| o.contains(plane))
    }

    /// Returns `true` for logic clusters that own movable objects.
    pub fn is_optimizable(&self) -> bool {
        self.kind == SiteKind::Clb && !self.objects.is_empty()
    }
}

/// Canonical state of one `(x, y, plane)` node.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// Site coordinate.
    pub coord: Coord,
    /// Current plane.
    pub plane: Plane,
    /// Plane at load time; the node's identity key.
    pub original_plane: Plane,
}

/// How a node relates to the movable objects of its site.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeRole {
    /// Not covered by any object; its plane never changes.
    Fixed,
    /// First plane of an object.
    Start {
        /// Object index at the site.
        object: usize,
    },
    /// Non-start member of a chain; moves with its chain start.
    Follower {
        /// Object index at the site.
        object: usize,
        /// Distance from the chain start.
        offset: Plane,
    },
}

/// The mutable model shared by every pass of one run.
#[derive(Clone, Debug)]
pub struct PlaneState {
    max_plane: Plane,
    nodes: Arena<NodeId, Node>,
    sites: BTreeMap<Coord, Site>,
    by_key: HashMap<(Coord, Plane), NodeId>,
}

impl PlaneState {
    /// Creates an empty state with `max_plane` slots per site.
    pub fn new(max_plane: Plane) -> Self {
        Self {
            max_plane,
            nodes: Arena::new(),
            sites: BTreeMap::new(),
            by_key: HashMap::new(),
        }
    }

    /// Plane slots per site.
    pub fn max_plane(&self) -> Plane {
        self.max_plane
    }

    /// Declares a site and its movable objects as inclusive `(start, end)` ranges.
    ///
    /// Re-declaring a site replaces its kind and objects but keeps its nodes.
    pub fn add_site(
        &mut self,
        coord: Coord,
        kind: SiteKind,
        ranges: &[(Plane, Plane)],
    ) -> PlaneResult<()> {
        let mut objects = Vec::with_capacity(ranges.len());
        for &(start, end) in ranges {
            if start > end || end >= self.max_plane {
                return Err(PlaneError::ObjectOutOfRange {
                    x: coord.x,
                    y: coord.y,
                    start,
                    end,
                    max_plane: self.max_plane,
                });
            }
            objects.push(MovableObject::new(start, end));
        }
        objects.sort_by_key(|o| o.start);
        check_disjoint(coord, &objects)?;

        let site = self.sites.entry(coord).or_insert_with(|| Site {
            coord,
            kind,
            objects: Vec::new(),
            nodes: Vec::new(),
        });
        site.kind = kind;
        site.objects = objects;
        Ok(())
    }

    /// Returns the node for `(coord, plane)`, creating it on first use.
    ///
    /// Nodes at undeclared coordinates get an implicit [`SiteKind::Other`]
    /// site without objects, so they are fixed.
    pub fn node_for(&mut self, coord: Coord, plane: Plane) -> PlaneResult<NodeId> {
        if let Some(&id) = self.by_key.get(&(coord, plane)) {
            return Ok(id);
        }
        if plane >= self.max_plane {
            return Err(PlaneError::ObjectOutOfRange {
                x: coord.x,
                y: coord.y,
                start: plane,
                end: plane,
                max_plane: self.max_plane,
            });
        }
        let id = self.nodes.alloc(Node {
            coord,
            plane,
            original_plane: plane,
        });
        self.by_key.insert((coord, plane), id);
        self.sites
            .entry(coord)
            .or_insert_with(|| Site {
                coord,
                kind: SiteKind::Other,
                objects: Vec::new(),
                nodes: Vec::new(),
            })
            .nodes
            .push(id);
        Ok(id)
    }

    /// Looks up a node by its load-time key.
    pub fn lookup(&self, coord: Coord, original_plane: Plane) -> Option<NodeId> {
        self.by_key.get(&(coord, original_plane)).copied()
    }

    /// Returns the node with the given ID.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Current plane of a node.
    pub fn plane(&self, id: NodeId) -> Plane {
        self.nodes[id].plane
    }

    /// Number of materialized nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Returns the site at `coord`, if declared or touched by a node.
    pub fn site(&self, coord: Coord) -> Option<&Site> {
        self.sites.get(&coord)
    }

    /// Iterates over sites in coordinate order.
    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.sites.values()
    }

    /// Classifies a node against the objects of its site.
    pub fn role(&self, id: NodeId) -> NodeRole {
        let node = &self.nodes[id];
        let Some(site) = self.sites.get(&node.coord) else {
            return NodeRole::Fixed;
        };
        match site.object_at(node.plane) {
            None => NodeRole::Fixed,
            Some(object) => {
                let offset = node.plane - site.objects[object].start;
                if offset == 0 {
                    NodeRole::Start { object }
                } else {
                    NodeRole::Follower { object, offset }
                }
            }
        }
    }

    /// Returns `true` if the node's plane can never change.
    pub fn is_fixed(&self, id: NodeId) -> bool {
        self.role(id) == NodeRole::Fixed
    }

    /// Planes at `coord` held by nodes outside every object.
    pub fn fixed_planes(&self, coord: Coord) -> BTreeSet<Plane> {
        let Some(site) = self.sites.get(&coord) else {
            return BTreeSet::new();
        };
        site.nodes
            .iter()
            .map(|&id| self.nodes[id].plane)
            .filter(|&p| site.object_at(p).is_none())
            .collect()
    }

    /// Relocates objects at one site, all moves computed against the current layout.
    ///
    /// Every node covered by a moved object follows it; the object table is
    /// re-sorted. A layout that overlaps, leaves the plane range, or lands on a
    /// fixed node is rejected before anything is mutated.
    pub fn apply_moves(&mut self, coord: Coord, moves: &[ObjectMove]) -> PlaneResult<()> {
        if moves.is_empty() {
            return Ok(());
        }
        let fixed = self.fixed_planes(coord);
        let max_plane = self.max_plane;
        let site = self
            .sites
            .get_mut(&coord)
            .ok_or(PlaneError::UnknownSite {
                x: coord.x,
                y: coord.y,
            })?;

        let mut relabel: HashMap<Plane, Plane> = HashMap::new();
        let mut objects = site.objects.clone();
        for mv in moves {
            let object = objects.get_mut(mv.object).ok_or_else(|| {
                InternalError::new(format!(
                    "site ({}, {}): move names object {} of {}",
                    coord.x,
                    coord.y,
                    mv.object,
                    site.objects.len()
                ))
            })?;
            let len = object.len();
            if u16::from(mv.new_start) + u16::from(len) > u16::from(max_plane) {
                return Err(PlaneError::ObjectOutOfRange {
                    x: coord.x,
                    y: coord.y,
                    start: mv.new_start,
                    end: mv.new_start.saturating_add(len - 1),
                    max_plane,
                });
            }
            let old = site.objects[mv.object];
            for offset in 0..len {
                relabel.insert(old.start + offset, mv.new_start + offset);
            }
            object.start = mv.new_start;
            object.end = mv.new_start + len - 1;
        }
        objects.sort_by_key(|o| o.start);
        check_disjoint(coord, &objects)?;
        if let Some(&p) = fixed.iter().find(|&&p| objects.iter().any(|o| o.contains(p))) {
            return Err(InternalError::new(format!(
                "site ({}, {}): relocation covers fixed plane {p}",
                coord.x, coord.y
            ))
            .into());
        }

        site.objects = objects;
        for &id in &site.nodes {
            let node = &mut self.nodes[id];
            if let Some(&to) = relabel.get(&node.plane) {
                node.plane = to;
            }
        }
        Ok(())
    }

    /// Checks the state invariants: disjoint in-range objects and one node per slot.
    pub fn verify(&self) -> PlaneResult<()> {
        for site in self.sites.values() {
            check_disjoint(site.coord, &site.objects)?;
            if let Some(o) = site.objects.iter().find(|o| o.end >= self.max_plane) {
                return Err(PlaneError::ObjectOutOfRange {
                    x: site.coord.x,
                    y: site.coord.y,
                    start: o.start,
                    end: o.end,
                    max_plane: self.max_plane,
                });
            }
            let mut seen = BTreeSet::new();
            for &id in &site.nodes {
                let plane = self.nodes[id].plane;
                if !seen.insert(plane) {
                    return Err(InternalError::new(format!(
                        "site ({}, {}): two nodes on plane {plane}",
                        site.coord.x, site.coord.y
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Rejects overlapping neighbours in a start-sorted object list.
fn check_disjoint(coord: Coord, objects: &[MovableObject]) -> PlaneResult<()> {
    for pair in objects.windows(2) {
        if pair[0].end >= pair[1].start {
            return Err(PlaneError::OverlappingObjects {
                x: coord.x,
                y: coord.y,
                first_start: pair[0].start,
                first_end: pair[0].end,
                second_start: pair[1].start,
                second_end: pair[1].end,
            });
        }
    }
    Ok(())
}
