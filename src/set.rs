//! `StripedHashSet`: the concurrent set front.
//!
//! The key is the whole element, so only read-only visitation is offered:
//! handing out `&mut K` would let a visitor change the key in place and
//! silently corrupt its placement.

use crate::engine::{SetEntry, StripedCore};
use crate::table::AllocationError;
use crate::DefaultHashBuilder;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

/// A concurrent hash set with unique keys, striped locking, and read-only
/// visitation. See [`StripedHashMap`](crate::StripedHashMap) for the shared
/// concurrency contract.
pub struct StripedHashSet<K, S = DefaultHashBuilder> {
    core: StripedCore<SetEntry<K>, S>,
}

impl<K> StripedHashSet<K>
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

impl<K> Default for StripedHashSet<K>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> StripedHashSet<K, S>
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

    /// Insert if absent; `Ok(true)` iff inserted.
    pub fn insert(&self, key: K) -> Result<bool, AllocationError> {
        self.core.emplace_or_visit(key, SetEntry, |_| {})
    }

    /// Atomic find-or-insert: `f` runs on the existing key when the insert
    /// loses. Returns `Ok(true)` iff this call inserted.
    pub fn insert_or_visit<F>(&self, key: K, f: F) -> Result<bool, AllocationError>
    where
        F: FnOnce(&K),
    {
        self.core.emplace_or_visit(key, SetEntry, |e| f(&e.0))
    }

    /// Remove and return the key. `None` when absent.
    pub fn erase<Q>(&self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.erase(key).map(|e| e.0)
    }

    /// Run `f` on the stored key while its stripe is held. Returns 0 or 1.
    pub fn visit<Q, F>(&self, key: &Q, f: F) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K),
    {
        self.core.cvisit(key, |e| f(&e.0))
    }

    /// Visit every present key in `keys`; returns how many were found.
    pub fn bulk_visit<Q, F>(&self, keys: &[Q], mut f: F) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
        F: FnMut(&K),
    {
        self.core.bulk_cvisit(keys, |e| f(&e.0))
    }

    /// Visit every element, one stripe at a time.
    pub fn visit_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&K),
    {
        self.core.cvisit_all(|e| f(&e.0))
    }

    /// Scan until `f` returns `false`; `true` means everything was visited.
    pub fn visit_while<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&K) -> bool,
    {
        self.core.cvisit_while(|e| f(&e.0))
    }

    /// [`visit_all`](Self::visit_all) fanned out over scoped worker
    /// threads.
    pub fn par_visit_all<F>(&self, f: F) -> usize
    where
        K: Send,
        S: Sync,
        F: Fn(&K) + Sync,
    {
        self.core.par_cvisit_all(|e| f(&e.0))
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
