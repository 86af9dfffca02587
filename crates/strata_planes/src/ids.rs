//! Opaque ID newtypes for optimizer entities.
//!
//! [`NodeId`] indexes the canonical node arena in [`PlaneState`](crate::state::PlaneState);
//! [`NetId`] indexes the net graphs built for one run. Both are thin `u32`
//! wrappers that are `Copy`, `Hash`, and usable as [`Arena`](strata_common::Arena) keys.

use serde::{Deserialize, Serialize};
use strata_common::ArenaId;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a canonical `(x, y, plane)` node.
    NodeId
);

define_id!(
    /// Opaque, copyable ID for a net graph.
    NetId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn node_id_roundtrip() {
        let id = NodeId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
        assert_eq!(<NodeId as ArenaId>::as_raw(id), 42);
    }

    #[test]
    fn id_hash_in_set() {
        let mut set = HashSet::new();
        set.insert(NetId::from_raw(1));
        set.insert(NetId::from_raw(2));
        set.insert(NetId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn id_ordering_follows_index() {
        assert!(NodeId::from_raw(3) < NodeId::from_raw(4));
    }

    #[test]
    fn id_display() {
        assert_eq!(format!("{}", NetId::from_raw(9)), "9");
    }
}
