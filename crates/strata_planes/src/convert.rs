//! Conversion from packing and placement records to a [`PlaneState`].
//!
//! Every top-level block of the packing is a cluster. Its site is where its
//! placed elements sit; a cluster whose type is a logic-cluster type becomes
//! an optimizable site whose movable objects are read off its plane blocks.
//! A plane block continues the object below it when its chain input is fed
//! from the previous plane.

use crate::error::{PlaneError, PlaneResult};
use crate::records::{plane_token, references, PackedBlock, PlacementRecord};
use crate::state::{Coord, Plane, PlaneState, SiteKind};
use std::collections::BTreeMap;
use strata_config::{OptimizerConfig, RealizationConfig};

/// A top-level cluster of the packing and the site it is placed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSite {
    /// Position among the packing root's children.
    pub index: usize,
    /// Site coordinate.
    pub coord: Coord,
    /// Site class derived from the cluster type.
    pub kind: SiteKind,
}

/// Locates every occupied cluster of the packing on the placement grid.
pub fn locate_clusters(
    packing: &PackedBlock,
    placement: &PlacementRecord,
    config: &RealizationConfig,
) -> PlaneResult<Vec<ClusterSite>> {
    let placed = placement.by_name();
    let mut owners: BTreeMap<Coord, &str> = BTreeMap::new();
    let mut clusters = Vec::new();

    for (index, cluster) in packing.children.iter().enumerate() {
        if cluster.is_open() {
            continue;
        }
        let (block_type, _) = cluster.instance_parts()?;
        let mut coord = placed.get(cluster.name.as_str()).map(|e| e.coord());

        for child in cluster.children.iter().filter(|c| !c.is_open()) {
            let Some(entry) = placed.get(child.name.as_str()) else {
                continue;
            };
            if child.is_instance_of(&config.plane_block) {
                let (_, plane) = child.instance_parts()?;
                if plane != usize::from(entry.plane) {
                    return Err(PlaneError::InconsistentPlacement {
                        element: child.name.clone(),
                        reason: format!(
                            "packed as {} but placed on plane {}",
                            child.instance, entry.plane
                        ),
                    });
                }
            }
            match coord {
                None => coord = Some(entry.coord()),
                Some(c) if c != entry.coord() => {
                    return Err(PlaneError::InconsistentPlacement {
                        element: child.name.clone(),
                        reason: format!(
                            "placed at ({}, {}) but cluster '{}' is at ({}, {})",
                            entry.x, entry.y, cluster.name, c.x, c.y
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        let Some(coord) = coord else {
            return Err(PlaneError::InconsistentPlacement {
                element: cluster.name.clone(),
                reason: "cluster has no placed element".to_string(),
            });
        };
        if let Some(other) = owners.insert(coord, &cluster.name) {
            return Err(PlaneError::InconsistentPlacement {
                element: cluster.name.clone(),
                reason: format!(
                    "site ({}, {}) is already taken by cluster '{other}'",
                    coord.x, coord.y
                ),
            });
        }
        let kind = if config.clb_types.iter().any(|t| t == block_type) {
            SiteKind::Clb
        } else {
            SiteKind::Other
        };
        clusters.push(ClusterSite { index, coord, kind });
    }
    Ok(clusters)
}

/// Reads the movable objects of one cluster as inclusive plane ranges.
pub fn cluster_objects(
    cluster: &PackedBlock,
    coord: Coord,
    config: &RealizationConfig,
    max_plane: Plane,
) -> PlaneResult<Vec<(Plane, Plane)>> {
    let mut occupied: BTreeMap<Plane, &PackedBlock> = BTreeMap::new();
    for child in cluster
        .children
        .iter()
        .filter(|c| !c.is_open() && c.is_instance_of(&config.plane_block))
    {
        let (_, index) = child.instance_parts()?;
        let plane = match Plane::try_from(index) {
            Ok(p) if p < max_plane => p,
            _ => {
                let clamped = Plane::try_from(index).unwrap_or(Plane::MAX);
                return Err(PlaneError::ObjectOutOfRange {
                    x: coord.x,
                    y: coord.y,
                    start: clamped,
                    end: clamped,
                    max_plane,
                });
            }
        };
        occupied.insert(plane, child);
    }

    let mut objects: Vec<(Plane, Plane)> = Vec::new();
    for (&plane, child) in &occupied {
        let continues = plane > 0
            && objects.last().is_some_and(|&(_, end)| end + 1 == plane)
            && child
                .inputs
                .get(&config.chain_port)
                .is_some_and(|v| references(v, &plane_token(&config.plane_block, plane - 1)));
        match objects.last_mut() {
            Some(last) if continues => last.1 = plane,
            _ => objects.push((plane, plane)),
        }
    }
    Ok(objects)
}

/// Builds the optimizer state of a packed and placed design.
///
/// Net nodes are materialized later by the graph builder.
pub fn load_state(
    packing: &PackedBlock,
    placement: &PlacementRecord,
    config: &OptimizerConfig,
) -> PlaneResult<PlaneState> {
    let max_plane = config.planes.max_plane;
    let mut state = PlaneState::new(max_plane);
    for site in locate_clusters(packing, placement, &config.realization)? {
        let ranges = match site.kind {
            SiteKind::Clb => cluster_objects(
                &packing.children[site.index],
                site.coord,
                &config.realization,
                max_plane,
            )?,
            SiteKind::Other => Vec::new(),
        };
        state.add_site(site.coord, site.kind, &ranges)?;
    }
    Ok(state)
}
