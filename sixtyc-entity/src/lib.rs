//! Densely numbered entity references used as map/set keys throughout the
//! compiler: basic block ids, virtual register ids, instruction ids, module
//! ids, and so on.
//!
//! Instructions, blocks and functions need to reference each other. Doing
//! that with real Rust references makes ownership and mutation fights
//! constant, since the IL is a graph (blocks reference predecessors,
//! functions own blocks that reference each other). Instead every such
//! reference is a small `Copy` struct wrapping a `u32` index into a
//! `PrimaryMap` owned by the enclosing object. See [`PrimaryMap`].

#![deny(missing_docs)]

mod map;
mod packed_option;
mod primary_map;

pub use map::SecondaryMap;
pub use packed_option::{PackedOption, ReservedValue};
pub use primary_map::{Keys, PrimaryMap};

/// A type wrapping a small integer index should implement `EntityRef` so it
/// can be used as the key of a [`PrimaryMap`] or [`SecondaryMap`].
pub trait EntityRef: Copy + Eq {
    /// Create a new entity reference from a small `usize` index.
    fn new(index: usize) -> Self;

    /// Get the index of this entity reference.
    fn index(self) -> usize;
}

/// Generate an `EntityRef` implementation, a `ReservedValue` reservation of
/// `u32::MAX` for use in [`PackedOption`], and a `Display` impl rendering
/// the entity the way the textual IR dialect expects (e.g. `blk3`, `v12`).
///
/// ```ignore
/// pub struct BlockId(u32);
/// entity_impl!(BlockId, "blk");
/// ```
#[macro_export]
macro_rules! entity_impl {
    ($entity:ident, $display_prefix:expr) => {
        impl $crate::EntityRef for $entity {
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                $entity(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl $crate::ReservedValue for $entity {
            fn reserved_value() -> Self {
                $entity(u32::MAX)
            }

            fn is_reserved_value(&self) -> bool {
                self.0 == u32::MAX
            }
        }

        impl ::core::fmt::Display for $entity {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                write!(f, concat!($display_prefix, "{}"), self.0)
            }
        }

        impl ::core::fmt::Debug for $entity {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                (self as &dyn ::core::fmt::Display).fmt(f)
            }
        }
    };
    ($entity:ident, $display_prefix:expr, $doc:expr) => {
        #[doc = $doc]
        $crate::entity_impl!($entity, $display_prefix);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct TestId(u32);
    entity_impl!(TestId, "t");

    #[test]
    fn round_trips_index() {
        let e = TestId::new(12);
        assert_eq!(e.index(), 12);
        assert_eq!(e.to_string(), "t12");
    }

    #[test]
    fn reserved_value_is_distinguishable() {
        let e = TestId::new(0);
        assert!(!e.is_reserved_value());
        assert!(TestId::reserved_value().is_reserved_value());
    }
}
