//! Physical realization of a plane assignment.
//!
//! The optimizer only relabels planes in [`PlaneState`]. Realization turns
//! that relabeling into a rewritten packing and placement: per site, the
//! object moves induce a permutation of plane slots, which is decomposed into
//! pairwise exchanges. Each exchange swaps the two plane blocks, renames their
//! instances, and rewrites every `plane_block[p]` reference in the cluster.
//! Work happens on copies; the caller gets either both new records or an
//! error.

use crate::convert::locate_clusters;
use crate::error::{PlaneError, PlaneResult};
use crate::records::{
    packing_checksum, plane_token, swap_tokens, PackedBlock, PlacementRecord,
};
use crate::state::{Coord, Plane, PlaneState, Site, SiteKind};
use std::collections::BTreeSet;
use strata_config::RealizationConfig;

/// What realization changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealizationReport {
    /// Sites whose cluster was rewritten.
    pub sites: usize,
    /// Pairwise plane exchanges performed.
    pub exchanges: usize,
    /// Checksum of the rewritten packing.
    pub checksum: String,
}

/// Rewritten records produced by [`realize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Realized {
    /// New packing tree.
    pub packing: PackedBlock,
    /// New placement, pointing at the new packing's checksum.
    pub placement: PlacementRecord,
    /// Summary.
    pub report: RealizationReport,
}

/// Maps every plane at a site to where its content ends up.
///
/// Planes of moved objects follow their object. Planes free both before and
/// after keep identity; the remaining freed and newly occupied planes pair up
/// in ascending order.
pub fn site_permutation(site: &Site, max_plane: Plane) -> Vec<Plane> {
    let mut perm: Vec<Plane> = (0..max_plane).collect();
    let mut held_before = BTreeSet::new();
    let mut held_after = BTreeSet::new();
    for object in site.objects() {
        for offset in 0..object.len() {
            perm[usize::from(object.origin + offset)] = object.start + offset;
            held_before.insert(object.origin + offset);
            held_after.insert(object.start + offset);
        }
    }
    let sources: Vec<Plane> = (0..max_plane)
        .filter(|p| !held_before.contains(p) && held_after.contains(p))
        .collect();
    let targets: Vec<Plane> = (0..max_plane)
        .filter(|p| held_before.contains(p) && !held_after.contains(p))
        .collect();
    for (from, to) in sources.into_iter().zip(targets) {
        perm[usize::from(from)] = to;
    }
    perm
}

/// Decomposes a permutation into pairwise exchanges that realize it in order.
pub fn decompose(perm: &[Plane]) -> Vec<(Plane, Plane)> {
    let mut perm = perm.to_vec();
    let mut exchanges = Vec::new();
    for p in 0..perm.len() {
        while usize::from(perm[p]) != p {
            let q = usize::from(perm[p]);
            exchanges.push((p as Plane, perm[p]));
            perm.swap(p, q);
        }
    }
    exchanges
}

/// Position of the plane block for `plane` among the cluster's children.
fn find_plane_block(
    cluster: &PackedBlock,
    plane: Plane,
    plane_block: &str,
) -> PlaneResult<Option<usize>> {
    for (i, child) in cluster.children.iter().enumerate() {
        if !child.is_instance_of(plane_block) {
            continue;
        }
        let (_, index) = child.instance_parts()?;
        if index == usize::from(plane) {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// Exchanges the content of planes `p` and `q` inside one cluster block.
///
/// `occupied` tracks which planes hold content and is updated in step.
fn exchange_planes(
    cluster: &mut PackedBlock,
    coord: Coord,
    p: Plane,
    q: Plane,
    occupied: &mut [bool],
    config: &RealizationConfig,
) -> PlaneResult<()> {
    let at_p = find_plane_block(cluster, p, &config.plane_block)?;
    let at_q = find_plane_block(cluster, q, &config.plane_block)?;
    for (plane, slot) in [(p, at_p), (q, at_q)] {
        if slot.is_none() && occupied[usize::from(plane)] {
            return Err(PlaneError::MissingSubBlock {
                x: coord.x,
                y: coord.y,
                plane,
            });
        }
    }

    let (token_p, token_q) = (
        plane_token(&config.plane_block, p),
        plane_token(&config.plane_block, q),
    );
    match (at_p, at_q) {
        (Some(i), Some(j)) => {
            cluster.children[i].instance = token_q.clone();
            cluster.children[j].instance = token_p.clone();
            cluster.children.swap(i, j);
        }
        (Some(i), None) => cluster.children[i].instance = token_q.clone(),
        (None, Some(j)) => cluster.children[j].instance = token_p.clone(),
        (None, None) => {}
    }
    cluster.rewrite_ports(&mut |value| swap_tokens(value, &token_p, &token_q));
    occupied.swap(usize::from(p), usize::from(q));
    Ok(())
}

/// Rewrites packing and placement so they match the planes in `state`.
pub fn realize(
    packing: &PackedBlock,
    placement: &PlacementRecord,
    state: &PlaneState,
    config: &RealizationConfig,
) -> PlaneResult<Realized> {
    let mut packing = packing.clone();
    let mut placement = placement.clone();
    let mut report = RealizationReport {
        sites: 0,
        exchanges: 0,
        checksum: String::new(),
    };
    let max_plane = state.max_plane();

    for cluster_site in locate_clusters(&packing, &placement, config)? {
        if cluster_site.kind != SiteKind::Clb {
            continue;
        }
        let coord = cluster_site.coord;
        let site = state.site(coord).ok_or(PlaneError::UnknownSite {
            x: coord.x,
            y: coord.y,
        })?;
        if !site.objects().iter().any(|o| o.has_moved()) {
            continue;
        }
        let perm = site_permutation(site, max_plane);
        let exchanges = decompose(&perm);
        if exchanges.is_empty() {
            continue;
        }

        let mut occupied = vec![false; usize::from(max_plane)];
        for object in site.objects() {
            for offset in 0..object.len() {
                occupied[usize::from(object.origin + offset)] = true;
            }
        }
        let mut cluster = packing.children[cluster_site.index].clone();
        let plane_blocks: BTreeSet<String> = cluster
            .children
            .iter()
            .filter(|c| !c.is_open() && c.is_instance_of(&config.plane_block))
            .map(|c| c.name.clone())
            .collect();
        for &(p, q) in &exchanges {
            exchange_planes(&mut cluster, coord, p, q, &mut occupied, config)?;
        }
        packing.children[cluster_site.index] = cluster;

        // Only plane blocks follow the permutation; the cluster's own entry
        // and any other sub-block keep their plane.
        for entry in placement
            .entries
            .iter_mut()
            .filter(|e| e.coord() == coord && plane_blocks.contains(&e.name))
        {
            if let Some(&to) = perm.get(usize::from(entry.plane)) {
                entry.plane = to;
            }
        }
        report.sites += 1;
        report.exchanges += exchanges.len();
    }

    report.checksum = packing_checksum(&packing)?;
    placement.packing_checksum = report.checksum.clone();
    Ok(Realized {
        packing,
        placement,
        report,
    })
}
