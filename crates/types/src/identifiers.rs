//! Dense arena identifiers for network elements.
//!
//! Every element lives in a dense array inside [`NetworkState`](crate::NetworkState)
//! and is referred to by its index. No element holds a pointer to another one.

use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Position of the element in its arena.
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

arena_id!(
    /// Node identifier.
    NodeId,
    "Node"
);

arena_id!(
    /// Unidirectional link identifier.
    LinkId,
    "Link"
);

arena_id!(
    /// Traffic demand identifier.
    DemandId,
    "Demand"
);

arena_id!(
    /// Route identifier.
    RouteId,
    "Route"
);

arena_id!(
    /// Protection segment identifier.
    SegmentId,
    "Segment"
);

arena_id!(
    /// Shared risk group identifier.
    SrgId,
    "Srg"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(NodeId(3).to_string(), "Node(3)");
        assert_eq!(LinkId(0).to_string(), "Link(0)");
        assert_eq!(SrgId(12).to_string(), "Srg(12)");
    }

    #[test]
    fn test_index_roundtrip() {
        assert_eq!(RouteId::from_index(7).index(), 7);
    }
}
