//! Densely numbered entity references as mapping keys, for auxiliary data
//! attached to entities that already live in a [`crate::PrimaryMap`].

use crate::primary_map::Keys;
use crate::EntityRef;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

/// A mapping `K -> V` for densely indexed entity references.
///
/// Unlike [`crate::PrimaryMap`], a `SecondaryMap` can't allocate entity
/// references; it only attaches auxiliary data to references that are
/// already valid (handed out elsewhere, usually by a `PrimaryMap`). The map
/// does not track whether an entry was explicitly inserted: indexing past
/// the end of the backing vector transparently returns `default`, and
/// resizes the vector on write.
#[derive(Debug, Clone)]
pub struct SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    elems: Vec<V>,
    default: V,
    unused: PhantomData<K>,
}

impl<K, V> SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone + Default,
{
    /// Create a new empty map whose implicit default value is `V::default()`.
    pub fn new() -> Self {
        Self {
            elems: Vec::new(),
            default: V::default(),
            unused: PhantomData,
        }
    }

    /// Create a new empty map with room for `capacity` keys before the
    /// first resize.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elems: Vec::with_capacity(capacity),
            default: V::default(),
            unused: PhantomData,
        }
    }
}

impl<K, V> SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    /// Create a new empty map with an explicit implicit default value.
    pub fn with_default(default: V) -> Self {
        Self {
            elems: Vec::new(),
            default,
            unused: PhantomData,
        }
    }

    /// Get the value at `k`, or the map's default if `k` was never written.
    pub fn get(&self, k: K) -> &V {
        self.elems.get(k.index()).unwrap_or(&self.default)
    }

    /// Resize the backing storage so that it has room for `n` keys.
    pub fn resize(&mut self, n: usize) {
        if self.elems.len() < n {
            self.elems.resize(n, self.default.clone());
        }
    }

    /// Remove all entries, reverting to the implicit default for every key.
    pub fn clear(&mut self) {
        self.elems.clear();
    }

    /// Iterate over the keys that have been resized into existence.
    pub fn keys(&self) -> Keys<K> {
        Keys::new(self.elems.len())
    }

    /// Is the map empty (no key has ever been resized into existence)?
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }
}

impl<K, V> Index<K> for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    type Output = V;

    fn index(&self, k: K) -> &V {
        self.get(k)
    }
}

impl<K, V> IndexMut<K> for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone,
{
    fn index_mut(&mut self, k: K) -> &mut V {
        if k.index() >= self.elems.len() {
            self.resize(k.index() + 1);
        }
        &mut self.elems[k.index()]
    }
}

impl<K, V> Default for SecondaryMap<K, V>
where
    K: EntityRef,
    V: Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    struct Id(u32);
    crate::entity_impl!(Id, "id");

    #[test]
    fn unwritten_keys_read_as_default() {
        let map: SecondaryMap<Id, u32> = SecondaryMap::new();
        assert_eq!(*map.get(Id::new(5)), 0);
    }

    #[test]
    fn write_then_read() {
        let mut map: SecondaryMap<Id, bool> = SecondaryMap::new();
        map[Id::new(3)] = true;
        assert!(*map.get(Id::new(3)));
        assert!(!*map.get(Id::new(0)));
    }
}
