//! Swap legality and swap plans.
//!
//! A swap between two nodes is realized as whole-object relocations. At one
//! site the two objects exchange places and everything between them shifts
//! by the length difference. Across sites each node's object is exchanged
//! with whatever occupies the other node's plane at its own site, an empty
//! slot acting as a length-1 object.

use crate::error::PlaneResult;
use crate::ids::NodeId;
use crate::state::{Coord, NodeRole, ObjectMove, Plane, PlaneState, Site};
use std::collections::BTreeSet;

/// Per-site relocations that carry out one swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    sites: Vec<(Coord, Vec<ObjectMove>)>,
}

impl SwapPlan {
    /// Sites the plan relocates objects at.
    pub fn sites(&self) -> impl Iterator<Item = Coord> + '_ {
        self.sites.iter().map(|(c, _)| *c)
    }

    /// Moves planned at `coord`.
    pub fn moves(&self, coord: Coord) -> Option<&[ObjectMove]> {
        self.sites
            .iter()
            .find(|(c, _)| *c == coord)
            .map(|(_, m)| m.as_slice())
    }

    /// Applies every relocation to the canonical state.
    pub fn apply(&self, state: &mut PlaneState) -> PlaneResult<()> {
        for (coord, moves) in &self.sites {
            state.apply_moves(*coord, moves)?;
        }
        Ok(())
    }
}

/// Object index of a node that may represent its object in a swap.
fn swap_representative(state: &PlaneState, node: NodeId) -> Option<usize> {
    let site = state.site(state.node(node).coord)?;
    if !site.is_optimizable() {
        return None;
    }
    match state.role(node) {
        NodeRole::Start { object } => Some(object),
        NodeRole::Fixed | NodeRole::Follower { .. } => None,
    }
}

/// Returns `true` if `a` and `b` may be exchanged.
///
/// Both nodes must be the start of a movable object at a logic-cluster site,
/// and they must not be the same node or belong to the same object.
pub fn is_valid_swap(state: &PlaneState, a: NodeId, b: NodeId) -> bool {
    if a == b {
        return false;
    }
    let (Some(oa), Some(ob)) = (swap_representative(state, a), swap_representative(state, b))
    else {
        return false;
    };
    !(state.node(a).coord == state.node(b).coord && oa == ob)
}

/// Builds the relocations swapping `a` and `b`, or `None` if the swap is
/// illegal or would disturb a fixed node.
pub fn plan_swap(state: &PlaneState, a: NodeId, b: NodeId) -> Option<SwapPlan> {
    if !is_valid_swap(state, a, b) {
        return None;
    }
    let (na, nb) = (state.node(a), state.node(b));
    if na.coord == nb.coord {
        let site = state.site(na.coord)?;
        let fixed = state.fixed_planes(na.coord);
        let moves = exchange(
            &spans(site),
            &fixed,
            site.object_at(na.plane)?,
            site.object_at(nb.plane)?,
        )?;
        return Some(SwapPlan {
            sites: vec![(na.coord, moves)],
        });
    }
    let first = exchange_with_slot(state, na.coord, na.plane, nb.plane)?;
    let second = exchange_with_slot(state, nb.coord, nb.plane, na.plane)?;
    Some(SwapPlan {
        sites: vec![(na.coord, first), (nb.coord, second)],
    })
}

#[derive(Clone, Copy, Debug)]
struct Span {
    start: Plane,
    len: Plane,
    object: Option<usize>,
}

fn spans(site: &Site) -> Vec<Span> {
    site.objects()
        .iter()
        .enumerate()
        .map(|(i, o)| Span {
            start: o.start,
            len: o.len(),
            object: Some(i),
        })
        .collect()
}

/// Exchanges the object at `own` with the content of plane `target` at one site.
fn exchange_with_slot(
    state: &PlaneState,
    coord: Coord,
    own: Plane,
    target: Plane,
) -> Option<Vec<ObjectMove>> {
    let site = state.site(coord)?;
    let fixed = state.fixed_planes(coord);
    if fixed.contains(&target) {
        return None;
    }
    let own_index = site.object_at(own)?;
    let mut spans = spans(site);
    let other = match site.object_at(target) {
        Some(index) if index == own_index => return None,
        Some(index) if site.objects()[index].start == target => index,
        Some(_) => return None,
        None => {
            spans.push(Span {
                start: target,
                len: 1,
                object: None,
            });
            spans.len() - 1
        }
    };
    exchange(&spans, &fixed, own_index, other)
}

/// Swaps spans `x` and `y`; spans strictly between them shift by the length
/// difference. Pseudo spans produce no moves.
fn exchange(
    spans: &[Span],
    fixed: &BTreeSet<Plane>,
    x: usize,
    y: usize,
) -> Option<Vec<ObjectMove>> {
    let (first, second) = if spans[x].start < spans[y].start {
        (spans[x], spans[y])
    } else {
        (spans[y], spans[x])
    };
    let lo = first.start;
    let hi = second.start + second.len - 1;
    if fixed.range(lo..=hi).next().is_some() {
        return None;
    }
    let shift = i16::from(second.len) - i16::from(first.len);

    let mut moves = Vec::new();
    for span in spans {
        let Some(object) = span.object else {
            continue;
        };
        let new_start = if span.start == first.start {
            hi + 1 - first.len
        } else if span.start == second.start {
            lo
        } else if span.start > first.start && span.start < second.start {
            Plane::try_from(i16::from(span.start) + shift).ok()?
        } else {
            continue;
        };
        if new_start != span.start {
            moves.push(ObjectMove { object, new_start });
        }
    }
    Some(moves)
}
