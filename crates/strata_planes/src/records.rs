//! Packing, placement, and net-table records exchanged with the outer flow.
//!
//! All three records are plain serde types. The packing is a block tree whose
//! port values are whitespace-separated connection tokens such as
//! `ble[2].out->clbout`; the placement pins every placed element to a site and
//! plane and carries the checksum of the packing it was produced against.

use crate::error::{PlaneError, PlaneResult};
use crate::state::{Coord, Plane};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_common::ContentHash;

/// Name given to unoccupied blocks in the packing record.
pub const OPEN: &str = "open";

/// One block of the packing tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedBlock {
    /// Element name, or `open` for an empty slot.
    pub name: String,
    /// Instance string `type[index]`.
    pub instance: String,
    /// Operating mode of the block, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Input ports and their connection tokens.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Output ports and their connection tokens.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// Clock ports and their connection tokens.
    #[serde(default)]
    pub clocks: BTreeMap<String, String>,
    /// Nested blocks.
    #[serde(default)]
    pub children: Vec<PackedBlock>,
}

impl PackedBlock {
    /// Returns `true` for an unoccupied slot.
    pub fn is_open(&self) -> bool {
        self.name == OPEN
    }

    /// Splits the instance string into block type and index.
    pub fn instance_parts(&self) -> PlaneResult<(&str, usize)> {
        parse_instance(&self.instance).ok_or_else(|| PlaneError::MalformedInstance {
            name: self.name.clone(),
            instance: self.instance.clone(),
        })
    }

    /// Returns `true` if the instance is `block_type[index]` for the given type.
    pub fn is_instance_of(&self, block_type: &str) -> bool {
        matches!(parse_instance(&self.instance), Some((t, _)) if t == block_type)
    }

    /// Applies `f` to every port value in this block and its whole subtree.
    pub fn rewrite_ports(&mut self, f: &mut impl FnMut(&str) -> String) {
        let mut stack: Vec<&mut PackedBlock> = vec![self];
        while let Some(block) = stack.pop() {
            for value in block
                .inputs
                .values_mut()
                .chain(block.outputs.values_mut())
                .chain(block.clocks.values_mut())
            {
                let rewritten = f(value.as_str());
                *value = rewritten;
            }
            stack.extend(block.children.iter_mut());
        }
    }
}

/// Parses `type[index]`.
pub fn parse_instance(instance: &str) -> Option<(&str, usize)> {
    let (block_type, rest) = instance.split_once('[')?;
    let index = rest.strip_suffix(']')?.parse().ok()?;
    if block_type.is_empty() {
        return None;
    }
    Some((block_type, index))
}

/// The reference token for plane `plane` of a plane block type, e.g. `ble[3]`.
pub fn plane_token(plane_block: &str, plane: Plane) -> String {
    format!("{plane_block}[{plane}]")
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Returns `true` if `value` contains `token` not glued to a preceding identifier.
pub fn references(value: &str, token: &str) -> bool {
    value.match_indices(token).any(|(at, _)| {
        value[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c))
    })
}

/// Exchanges every standalone occurrence of `a` with `b` and vice versa.
pub fn swap_tokens(value: &str, a: &str, b: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut prev: Option<char> = None;
    while let Some(c) = rest.chars().next() {
        let standalone = prev.map_or(true, |p| !is_ident_char(p));
        if standalone && rest.starts_with(a) {
            out.push_str(b);
            prev = a.chars().next_back();
            rest = &rest[a.len()..];
        } else if standalone && rest.starts_with(b) {
            out.push_str(a);
            prev = b.chars().next_back();
            rest = &rest[b.len()..];
        } else {
            out.push(c);
            prev = Some(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// Computes the checksum the placement stores for a packing tree.
pub fn packing_checksum(root: &PackedBlock) -> PlaneResult<String> {
    let bytes = serde_json::to_vec_pretty(root).map_err(|e| PlaneError::Encode {
        what: "packing",
        message: e.to_string(),
    })?;
    Ok(ContentHash::from_bytes(&bytes).to_string())
}

/// One placed element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedElement {
    /// Element name as it appears in the packing.
    pub name: String,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Plane slot.
    pub plane: Plane,
}

impl PlacedElement {
    /// The site coordinate.
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

/// The placement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    /// File name of the packing this placement belongs to.
    pub packing_file: String,
    /// Checksum of that packing.
    pub packing_checksum: String,
    /// Grid width.
    pub width: u32,
    /// Grid height.
    pub height: u32,
    /// Placed elements.
    pub entries: Vec<PlacedElement>,
}

impl PlacementRecord {
    /// Indexes entries by element name.
    pub fn by_name(&self) -> BTreeMap<&str, &PlacedElement> {
        self.entries.iter().map(|e| (e.name.as_str(), e)).collect()
    }
}

/// The sink end of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkDescriptor {
    /// Sink element name.
    pub block: String,
    /// Plane of the sink pin.
    pub plane: Plane,
}

/// One source-to-sink connection of a net.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetConnection {
    /// Plane of the source pin.
    pub plane: Plane,
    /// Source column.
    pub source_x: i32,
    /// Source row.
    pub source_y: i32,
    /// Sink element and plane.
    pub sink: SinkDescriptor,
    /// Sink column.
    pub sink_x: i32,
    /// Sink row.
    pub sink_y: i32,
}

impl NetConnection {
    /// Source site.
    pub fn source(&self) -> Coord {
        Coord::new(self.source_x, self.source_y)
    }

    /// Sink site.
    pub fn sink_coord(&self) -> Coord {
        Coord::new(self.sink_x, self.sink_y)
    }
}

/// Net name to its ordered connections.
pub type NetTable = BTreeMap<String, Vec<NetConnection>>;
