//! `StripedHashMap`: the flat concurrent map front.
//!
//! Elements live inline in the table's slot groups (best locality; no
//! address stability across rehash, which the visitation API makes
//! unobservable anyway). All access is through short-lived callbacks that
//! borrow the element while its stripe lock is held; there are no iterators
//! and no references escape a call.

use crate::engine::{MapEntry, StripedCore};
use crate::table::AllocationError;
use crate::DefaultHashBuilder;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

/// A concurrent hash map with unique keys, striped locking, and
/// visitation-based access.
///
/// Shared across threads by reference (`Arc` or scoped borrows); every
/// operation takes `&self`. Visitor callbacks must not call back into the
/// same map: the calling thread already holds a stripe lock, and the nested
/// acquisition deadlocks (debug builds panic instead).
pub struct StripedHashMap<K, V, S = DefaultHashBuilder> {
    core: StripedCore<MapEntry<K, V>, S>,
}

impl<K, V> StripedHashMap<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::with_capacity_and_hasher(0, DefaultHashBuilder::default())
    }

    /// Pre-size for roughly `capacity` elements. The map still grows beyond
    /// this as needed.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V> Default for StripedHashMap<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> StripedHashMap<K, V, S>
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

    /// Number of live elements. A point-in-time snapshot under concurrent
    /// mutation.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }

    /// Total slot capacity currently allocated.
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    pub fn stripe_count(&self) -> usize {
        self.core.stripe_count()
    }

    /// Insert `(key, value)` if the key is absent. Returns `Ok(true)` on
    /// insertion; `Ok(false)` leaves the existing element untouched and
    /// drops the argument.
    pub fn insert(&self, key: K, value: V) -> Result<bool, AllocationError> {
        self.core
            .emplace_or_visit(key, |key| MapEntry { key, value }, |_| {})
    }

    /// Insert with a lazily constructed value: `make` runs only if the key
    /// is absent.
    pub fn insert_with<F>(&self, key: K, make: F) -> Result<bool, AllocationError>
    where
        F: FnOnce() -> V,
    {
        self.core.emplace_or_visit(
            key,
            |key| MapEntry {
                key,
                value: make(),
            },
            |_| {},
        )
    }

    /// Atomic upsert: insert `(key, value)` if absent, otherwise run `f` on
    /// the existing element. The check and the act share one stripe critical
    /// section, so racing upserts for one key insert exactly once. Returns
    /// `Ok(true)` iff this call inserted.
    pub fn insert_or_visit<F>(&self, key: K, value: V, f: F) -> Result<bool, AllocationError>
    where
        F: FnOnce(&K, &mut V),
    {
        self.core.emplace_or_visit(
            key,
            |key| MapEntry { key, value },
            |e| f(&e.key, &mut e.value),
        )
    }

    /// Atomic upsert with a lazily constructed value; the emplace
    /// counterpart of [`insert_or_visit`](Self::insert_or_visit).
    pub fn insert_with_or_visit<M, F>(&self, key: K, make: M, f: F) -> Result<bool, AllocationError>
    where
        M: FnOnce() -> V,
        F: FnOnce(&K, &mut V),
    {
        self.core.emplace_or_visit(
            key,
            |key| MapEntry {
                key,
                value: make(),
            },
            |e| f(&e.key, &mut e.value),
        )
    }

    /// Remove the element for `key`, returning it. `None` when absent.
    pub fn erase<Q>(&self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.erase(key).map(|e| (e.key, e.value))
    }

    /// Run `f` on the element for `key`, with mutable access to the value,
    /// while the owning stripe is held. Returns the number of elements
    /// visited (0 or 1). No other thread's visitor for an equal key can
    /// overlap with `f`.
    pub fn visit<Q, F>(&self, key: &Q, f: F) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &mut V),
    {
        self.core.visit(key, |e| f(&e.key, &mut e.value))
    }

    /// Read-only form of [`visit`](Self::visit).
    pub fn cvisit<Q, F>(&self, key: &Q, f: F) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &V),
    {
        self.core.cvisit(key, |e| f(&e.key, &e.value))
    }

    /// Visit every present key in `keys`, batching stripe acquisition.
    /// Returns how many entries were found; absent keys are skipped and a
    /// repeated key is visited once per occurrence.
    pub fn bulk_visit<Q, F>(&self, keys: &[Q], mut f: F) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
        F: FnMut(&K, &mut V),
    {
        self.core.bulk_visit(keys, |e| f(&e.key, &mut e.value))
    }

    /// Read-only form of [`bulk_visit`](Self::bulk_visit).
    pub fn bulk_cvisit<Q, F>(&self, keys: &[Q], mut f: F) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
        F: FnMut(&K, &V),
    {
        self.core.bulk_cvisit(keys, |e| f(&e.key, &e.value))
    }

    /// Visit every element, one stripe at a time; returns the number
    /// visited. Concurrent callers each see every element independently.
    pub fn visit_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&K, &mut V),
    {
        self.core.visit_all(|e| f(&e.key, &mut e.value))
    }

    /// Read-only form of [`visit_all`](Self::visit_all).
    pub fn cvisit_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&K, &V),
    {
        self.core.cvisit_all(|e| f(&e.key, &e.value))
    }

    /// Scan until `f` returns `false`. Returns `false` iff the scan was cut
    /// short; an empty map yields `true`. The only way to short-circuit a
    /// scan.
    pub fn visit_while<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.core.visit_while(|e| f(&e.key, &mut e.value))
    }

    /// Read-only form of [`visit_while`](Self::visit_while).
    pub fn cvisit_while<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.core.cvisit_while(|e| f(&e.key, &e.value))
    }

    /// [`visit_all`](Self::visit_all) fanned out over scoped worker
    /// threads.
    pub fn par_visit_all<F>(&self, f: F) -> usize
    where
        K: Send,
        V: Send,
        S: Sync,
        F: Fn(&K, &mut V) + Sync,
    {
        self.core.par_visit_all(|e| f(&e.key, &mut e.value))
    }

    /// [`cvisit_all`](Self::cvisit_all) fanned out over scoped worker
    /// threads.
    pub fn par_cvisit_all<F>(&self, f: F) -> usize
    where
        K: Send,
        V: Send,
        S: Sync,
        F: Fn(&K, &V) + Sync,
    {
        self.core.par_cvisit_all(|e| f(&e.key, &e.value))
    }

    /// Number of elements with this key: 0 or 1 (keys are unique).
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

    /// Remove every element, retaining capacity. Totally ordered with
    /// respect to all other operations (takes every stripe).
    pub fn clear(&self) {
        self.core.clear()
    }
}
