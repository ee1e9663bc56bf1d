//! `StripedNodeHashMap`: the node-based concurrent map front.
//!
//! Identical contract to [`StripedHashMap`](crate::StripedHashMap), except
//! each element is individually heap-allocated: the slot stores a box, so
//! the element's address is stable for its whole lifetime, including across
//! rehashes, at the cost of one indirection. Callers holding raw pointers
//! into elements (FFI, intrusive structures) want this variant; everyone
//! else wants the flat one.

use crate::engine::{MapEntry, StripedCore};
use crate::table::AllocationError;
use crate::DefaultHashBuilder;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

/// A concurrent hash map whose elements are heap-allocated nodes with
/// stable addresses. See [`StripedHashMap`](crate::StripedHashMap) for the
/// shared visitation contract.
pub struct StripedNodeHashMap<K, V, S = DefaultHashBuilder> {
    core: StripedCore<Box<MapEntry<K, V>>, S>,
}

impl<K, V> StripedNodeHashMap<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_capacity_and_hasher(0, DefaultHashBuilder::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V> Default for StripedNodeHashMap<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> StripedNodeHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            core: StripedCore::with_capacity_and_hasher(capacity, hasher),
        }
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    pub fn stripe_count(&self) -> usize {
        self.core.stripe_count()
    }

    /// Insert if absent; `Ok(true)` iff inserted. The node allocation only
    /// happens when insertion does.
    pub fn insert(&self, key: K, value: V) -> Result<bool, AllocationError> {
        self.core
            .emplace_or_visit(key, |key| Box::new(MapEntry { key, value }), |_| {})
    }

    /// Insert with a lazily constructed value.
    pub fn insert_with<F>(&self, key: K, make: F) -> Result<bool, AllocationError>
    where
        F: FnOnce() -> V,
    {
        self.core.emplace_or_visit(
            key,
            |key| {
                Box::new(MapEntry {
                    key,
                    value: make(),
                })
            },
            |_| {},
        )
    }

    /// Atomic upsert; see
    /// [`StripedHashMap::insert_or_visit`](crate::StripedHashMap::insert_or_visit).
    pub fn insert_or_visit<F>(&self, key: K, value: V, f: F) -> Result<bool, AllocationError>
    where
        F: FnOnce(&K, &mut V),
    {
        self.core.emplace_or_visit(
            key,
            |key| Box::new(MapEntry { key, value }),
            |e| f(&e.key, &mut e.value),
        )
    }

    /// Atomic upsert with a lazily constructed value.
    pub fn insert_with_or_visit<M, F>(&self, key: K, make: M, f: F) -> Result<bool, AllocationError>
    where
        M: FnOnce() -> V,
        F: FnOnce(&K, &mut V),
    {
        self.core.emplace_or_visit(
            key,
            |key| {
                Box::new(MapEntry {
                    key,
                    value: make(),
                })
            },
            |e| f(&e.key, &mut e.value),
        )
    }

    /// Remove and return the element for `key`. The node is deallocated
    /// here; the pair is moved out.
    pub fn erase<Q>(&self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.erase(key).map(|node| {
            let e = *node;
            (e.key, e.value)
        })
    }

    pub fn visit<Q, F>(&self, key: &Q, f: F) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &mut V),
    {
        self.core.visit(key, |e| f(&e.key, &mut e.value))
    }

    pub fn cvisit<Q, F>(&self, key: &Q, f: F) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &V),
    {
        self.core.cvisit(key, |e| f(&e.key, &e.value))
    }

    pub fn bulk_visit<Q, F>(&self, keys: &[Q], mut f: F) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
        F: FnMut(&K, &mut V),
    {
        self.core.bulk_visit(keys, |e| f(&e.key, &mut e.value))
    }

    pub fn bulk_cvisit<Q, F>(&self, keys: &[Q], mut f: F) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
        F: FnMut(&K, &V),
    {
        self.core.bulk_cvisit(keys, |e| f(&e.key, &e.value))
    }

    pub fn visit_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&K, &mut V),
    {
        self.core.visit_all(|e| f(&e.key, &mut e.value))
    }

    pub fn cvisit_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&K, &V),
    {
        self.core.cvisit_all(|e| f(&e.key, &e.value))
    }

    pub fn visit_while<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.core.visit_while(|e| f(&e.key, &mut e.value))
    }

    pub fn cvisit_while<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.core.cvisit_while(|e| f(&e.key, &e.value))
    }

    pub fn par_visit_all<F>(&self, f: F) -> usize
    where
        K: Send,
        V: Send,
        S: Sync,
        F: Fn(&K, &mut V) + Sync,
    {
        self.core.par_visit_all(|e| f(&e.key, &mut e.value))
    }

    pub fn par_cvisit_all<F>(&self, f: F) -> usize
    where
        K: Send,
        V: Send,
        S: Sync,
        F: Fn(&K, &V) + Sync,
    {
        self.core.par_cvisit_all(|e| f(&e.key, &e.value))
    }

    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.count(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.contains(key)
    }

    pub fn clear(&self) {
        self.core.clear()
    }
}
