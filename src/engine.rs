//! Core engine shared by the map, node map, and set fronts: hashing and
//! stripe routing, the visitation operations, the check-then-act upsert, and
//! the rehash controller.
//!
//! Every access path is the same shape: compute the hash once, derive the
//! owning stripe from its high bits, lock that stripe, operate on the shard
//! it owns, unlock. Two calls for equal keys always contend on the same
//! mutex, which is what makes same-key visitation mutually exclusive and
//! upserts atomic. Only the rehash path escalates to all stripes.

use crate::group::GROUP_WIDTH;
use crate::reentrancy::DebugReentrancy;
use crate::stripes::{default_stripe_count, StripeSet};
use crate::table::{AllocationError, Shard, SlotRef, MAX_LOAD_DEN, MAX_LOAD_NUM};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::sync::atomic::{AtomicUsize, Ordering};

/// Number of keys a bulk visit routes and locks as one batch. Small enough
/// to bound how many stripes are held at once, large enough to amortize the
/// lock traffic.
pub(crate) const BULK_VISIT_SIZE: usize = 16;

/// A stored element with an addressable key. The key extractor that
/// distinguishes map elements (pair, key is the first field), node elements
/// (boxed pair), and set elements (the key is the whole element).
pub(crate) trait Keyed {
    type Key: Hash + Eq;
    fn key(&self) -> &Self::Key;
}

/// Map element: key plus mapped value, stored inline in its slot group.
pub(crate) struct MapEntry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
}

impl<K: Hash + Eq, V> Keyed for MapEntry<K, V> {
    type Key = K;
    fn key(&self) -> &K {
        &self.key
    }
}

/// Node element: the pair lives on the heap, so its address is stable for
/// its whole lifetime, including across rehashes.
impl<K: Hash + Eq, V> Keyed for Box<MapEntry<K, V>> {
    type Key = K;
    fn key(&self) -> &K {
        &self.key
    }
}

/// Set element: the key is the value.
pub(crate) struct SetEntry<K>(pub(crate) K);

impl<K: Hash + Eq> Keyed for SetEntry<K> {
    type Key = K;
    fn key(&self) -> &K {
        &self.0
    }
}

pub(crate) struct StripedCore<T, S> {
    stripes: StripeSet<Shard<T>>,
    hasher: S,
    /// Live element count across all stripes.
    count: AtomicUsize,
    /// Total slot capacity; kept alongside `threshold` so accessors never
    /// need a stripe lock.
    slots: AtomicUsize,
    /// Rehash trigger: `count > threshold` after an insert.
    threshold: AtomicUsize,
    /// Bumped once per completed migration; lets a thread that decided to
    /// grow detect that another thread already did.
    generation: AtomicUsize,
    reentrancy: DebugReentrancy,
}

/// Smallest power-of-two groups-per-shard whose load threshold covers
/// `capacity`. The threshold arithmetic is checked: a request too large to
/// size exactly caps at the largest representable table instead of wrapping.
fn groups_per_shard_for(stripe_count: usize, capacity: usize) -> usize {
    let mut groups_per_shard = 1usize;
    loop {
        let threshold = stripe_count
            .checked_mul(groups_per_shard)
            .and_then(|n| n.checked_mul(GROUP_WIDTH))
            .and_then(|slots| slots.checked_mul(MAX_LOAD_NUM))
            .map(|n| n / MAX_LOAD_DEN);
        match threshold {
            Some(t) if t < capacity => groups_per_shard *= 2,
            Some(_) => return groups_per_shard,
            None => return (groups_per_shard / 2).max(1),
        }
    }
}

impl<T, S: BuildHasher> StripedCore<T, S> {
    pub(crate) fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        let stripe_count = default_stripe_count();
        let groups_per_shard = groups_per_shard_for(stripe_count, capacity);
        let stripes =
            StripeSet::new((0..stripe_count).map(|_| Shard::with_groups(groups_per_shard)));
        let slots = stripe_count * groups_per_shard * GROUP_WIDTH;
        Self {
            stripes,
            hasher,
            count: AtomicUsize::new(0),
            slots: AtomicUsize::new(slots),
            threshold: AtomicUsize::new(slots * MAX_LOAD_NUM / MAX_LOAD_DEN),
            generation: AtomicUsize::new(0),
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.load(Ordering::Relaxed)
    }

    pub(crate) fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    fn hash_of<Q: ?Sized + Hash>(&self, q: &Q) -> u64 {
        self.hasher.hash_one(q)
    }
}

impl<T: Keyed, S: BuildHasher> StripedCore<T, S> {
    fn find_slot<Q>(shard: &Shard<T>, hash: u64, q: &Q) -> Option<SlotRef>
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        shard.find(hash, |e| e.key().borrow() == q)
    }

    /// Unguarded lookup shared by `count` and `contains`.
    fn lookup<Q>(&self, q: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.hash_of(q);
        let shard = self.stripes.lock(self.stripes.stripe_of(hash));
        Self::find_slot(&shard, hash, q).is_some()
    }

    pub(crate) fn contains<Q>(&self, q: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _re = self.reentrancy.enter();
        self.lookup(q)
    }

    pub(crate) fn count<Q>(&self, q: &Q) -> usize
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _re = self.reentrancy.enter();
        self.lookup(q) as usize
    }

    /// Single-key mutating visit. The callback runs while the owning stripe
    /// is held, so no other thread's visitor for an equal key can overlap.
    pub(crate) fn visit<Q, F>(&self, q: &Q, f: F) -> usize
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&mut T),
    {
        let _re = self.reentrancy.enter();
        let hash = self.hash_of(q);
        let mut shard = self.stripes.lock(self.stripes.stripe_of(hash));
        match Self::find_slot(&shard, hash, q) {
            Some(slot) => {
                f(shard.get_mut(slot));
                1
            }
            None => 0,
        }
    }

    /// Single-key read-only visit.
    pub(crate) fn cvisit<Q, F>(&self, q: &Q, f: F) -> usize
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&T),
    {
        let _re = self.reentrancy.enter();
        let hash = self.hash_of(q);
        let shard = self.stripes.lock(self.stripes.stripe_of(hash));
        match Self::find_slot(&shard, hash, q) {
            Some(slot) => {
                f(shard.get(slot));
                1
            }
            None => 0,
        }
    }

    /// Bulk visit: route a bounded batch of keys to their stripes, lock the
    /// batch's stripes in ascending order, and visit every key that is
    /// present. Keys sharing a stripe are visited while it is held; order
    /// across stripes is unspecified. Each request entry is looked up
    /// independently, so a repeated key is visited once per occurrence.
    /// Returns the number of entries found.
    pub(crate) fn bulk_visit<Q, F>(&self, keys: &[Q], mut f: F) -> usize
    where
        T::Key: Borrow<Q>,
        Q: Hash + Eq,
        F: FnMut(&mut T),
    {
        let _re = self.reentrancy.enter();
        let mut found = 0;
        for batch in keys.chunks(BULK_VISIT_SIZE) {
            // (stripe, hash, index into batch), grouped by stripe.
            let mut routed: Vec<(usize, u64, usize)> = batch
                .iter()
                .enumerate()
                .map(|(i, q)| {
                    let hash = self.hash_of(q);
                    (self.stripes.stripe_of(hash), hash, i)
                })
                .collect();
            routed.sort_unstable_by_key(|&(stripe, _, _)| stripe);
            let mut stripe_ids: Vec<usize> = routed.iter().map(|r| r.0).collect();
            stripe_ids.dedup();

            let mut guards = self.stripes.lock_many(&stripe_ids);
            let mut cursor = 0;
            for &(stripe, hash, i) in &routed {
                while guards[cursor].0 != stripe {
                    cursor += 1;
                }
                let shard = &mut *guards[cursor].1;
                if let Some(slot) = Self::find_slot(shard, hash, &batch[i]) {
                    f(shard.get_mut(slot));
                    found += 1;
                }
            }
        }
        found
    }

    /// Bulk read-only visit; same routing and locking as [`bulk_visit`].
    pub(crate) fn bulk_cvisit<Q, F>(&self, keys: &[Q], mut f: F) -> usize
    where
        T::Key: Borrow<Q>,
        Q: Hash + Eq,
        F: FnMut(&T),
    {
        let _re = self.reentrancy.enter();
        let mut found = 0;
        for batch in keys.chunks(BULK_VISIT_SIZE) {
            let mut routed: Vec<(usize, u64, usize)> = batch
                .iter()
                .enumerate()
                .map(|(i, q)| {
                    let hash = self.hash_of(q);
                    (self.stripes.stripe_of(hash), hash, i)
                })
                .collect();
            routed.sort_unstable_by_key(|&(stripe, _, _)| stripe);
            let mut stripe_ids: Vec<usize> = routed.iter().map(|r| r.0).collect();
            stripe_ids.dedup();

            let guards = self.stripes.lock_many(&stripe_ids);
            let mut cursor = 0;
            for &(stripe, hash, i) in &routed {
                while guards[cursor].0 != stripe {
                    cursor += 1;
                }
                let shard = &*guards[cursor].1;
                if let Some(slot) = Self::find_slot(shard, hash, &batch[i]) {
                    f(shard.get(slot));
                    found += 1;
                }
            }
        }
        found
    }

    /// Visit every element, one stripe at a time. Unlike rehash, only a
    /// single stripe is held at any moment, so concurrent whole-table scans
    /// and single-key operations on other stripes proceed in parallel.
    pub(crate) fn visit_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&mut T),
    {
        let _re = self.reentrancy.enter();
        let mut visited = 0;
        for stripe in 0..self.stripes.len() {
            let mut shard = self.stripes.lock(stripe);
            for element in shard.iter_mut() {
                f(element);
                visited += 1;
            }
        }
        visited
    }

    pub(crate) fn cvisit_all<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&T),
    {
        let _re = self.reentrancy.enter();
        let mut visited = 0;
        for stripe in 0..self.stripes.len() {
            let shard = self.stripes.lock(stripe);
            for element in shard.iter() {
                f(element);
                visited += 1;
            }
        }
        visited
    }

    /// Whole-table scan with early exit: stops at the first element for
    /// which `f` returns `false` and reports `false`; `true` means every
    /// element was visited.
    pub(crate) fn visit_while<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&mut T) -> bool,
    {
        let _re = self.reentrancy.enter();
        for stripe in 0..self.stripes.len() {
            let mut shard = self.stripes.lock(stripe);
            for element in shard.iter_mut() {
                if !f(element) {
                    return false;
                }
            }
        }
        true
    }

    pub(crate) fn cvisit_while<F>(&self, mut f: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        let _re = self.reentrancy.enter();
        for stripe in 0..self.stripes.len() {
            let shard = self.stripes.lock(stripe);
            for element in shard.iter() {
                if !f(element) {
                    return false;
                }
            }
        }
        true
    }

    /// Whole-table read-only scan fanned out over scoped worker threads,
    /// which claim stripes from a shared cursor. A convenience on top of the
    /// same per-stripe locking; the exclusivity contract is unchanged.
    pub(crate) fn par_cvisit_all<F>(&self, f: F) -> usize
    where
        T: Send,
        S: Sync,
        F: Fn(&T) + Sync,
    {
        let _re = self.reentrancy.enter();
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(self.stripes.len());
        let cursor = AtomicUsize::new(0);
        let visited = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let stripe = cursor.fetch_add(1, Ordering::Relaxed);
                    if stripe >= self.stripes.len() {
                        break;
                    }
                    let shard = self.stripes.lock(stripe);
                    let mut n = 0;
                    for element in shard.iter() {
                        f(element);
                        n += 1;
                    }
                    visited.fetch_add(n, Ordering::Relaxed);
                });
            }
        });
        visited.into_inner()
    }

    /// Mutating variant of [`par_cvisit_all`].
    pub(crate) fn par_visit_all<F>(&self, f: F) -> usize
    where
        T: Send,
        S: Sync,
        F: Fn(&mut T) + Sync,
    {
        let _re = self.reentrancy.enter();
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(self.stripes.len());
        let cursor = AtomicUsize::new(0);
        let visited = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let stripe = cursor.fetch_add(1, Ordering::Relaxed);
                    if stripe >= self.stripes.len() {
                        break;
                    }
                    let mut shard = self.stripes.lock(stripe);
                    let mut n = 0;
                    for element in shard.iter_mut() {
                        f(element);
                        n += 1;
                    }
                    visited.fetch_add(n, Ordering::Relaxed);
                });
            }
        });
        visited.into_inner()
    }

    /// Atomic find-or-construct. The absence check and the insertion happen
    /// under one unbroken stripe critical section, so two threads racing on
    /// the same key can never both construct. `make` runs only when
    /// insertion actually happens; `visit` runs on the existing element
    /// otherwise. Returns `Ok(true)` iff a new element was inserted.
    pub(crate) fn emplace_or_visit<M, F>(
        &self,
        key: T::Key,
        make: M,
        visit: F,
    ) -> Result<bool, AllocationError>
    where
        M: FnOnce(T::Key) -> T,
        F: FnOnce(&mut T),
    {
        let _re = self.reentrancy.enter();
        let hash = self.hash_of(&key);
        let stripe = self.stripes.stripe_of(hash);
        let mut pending_key = Some(key);
        let mut make = Some(make);
        let mut visit = Some(visit);
        // Constructed at most once; staged across a grow-and-retry cycle.
        let mut staged: Option<T> = None;
        loop {
            let generation = self.generation.load(Ordering::Acquire);
            let mut shard = self.stripes.lock(stripe);
            let found = match (&staged, &pending_key) {
                (Some(el), _) => Self::find_slot(&shard, hash, el.key()),
                (None, Some(k)) => Self::find_slot(&shard, hash, k),
                (None, None) => unreachable!("key consumed without staging an element"),
            };
            if let Some(slot) = found {
                if let Some(visit) = visit.take() {
                    visit(shard.get_mut(slot));
                }
                return Ok(false);
            }
            let element = match staged.take() {
                Some(el) => el,
                None => {
                    let make = make.take().unwrap();
                    make(pending_key.take().unwrap())
                }
            };
            match shard.insert_new(hash, element) {
                Ok(_) => {
                    let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
                    drop(shard);
                    if count > self.threshold.load(Ordering::Relaxed) {
                        self.grow_from(generation)?;
                    }
                    return Ok(true);
                }
                Err(el) => {
                    // Shard exhausted its probe sequence; grow and retry.
                    // The absence check is repeated after the retry because
                    // another thread may have inserted the key meanwhile.
                    staged = Some(el);
                    drop(shard);
                    self.grow_from(generation)?;
                }
            }
        }
    }

    /// Remove the element for `q`, returning ownership of it.
    pub(crate) fn erase<Q>(&self, q: &Q) -> Option<T>
    where
        T::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _re = self.reentrancy.enter();
        let hash = self.hash_of(q);
        let mut shard = self.stripes.lock(self.stripes.stripe_of(hash));
        let slot = Self::find_slot(&shard, hash, q)?;
        let element = shard.erase(slot);
        if element.is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
        }
        element
    }

    /// Drop every element. Takes all stripes (ascending), so it is totally
    /// ordered with respect to every other operation, like rehash. Capacity
    /// is retained.
    pub(crate) fn clear(&self) {
        let _re = self.reentrancy.enter();
        let mut guards = self.stripes.lock_all();
        for shard in guards.iter_mut() {
            shard.clear();
        }
        self.count.store(0, Ordering::Relaxed);
    }

    /// Rehash controller. Takes every stripe in ascending order, re-checks
    /// the generation (another thread may have migrated while we waited),
    /// stages all replacement group arrays, and only then moves elements.
    /// An allocation failure surfaces before any shard is touched, leaving
    /// the live table fully intact. Concurrent accessors simply block on
    /// their stripe until migration completes.
    #[cold]
    fn grow_from(&self, observed_generation: usize) -> Result<(), AllocationError> {
        let mut guards = self.stripes.lock_all();
        if self.generation.load(Ordering::Relaxed) != observed_generation {
            return Ok(());
        }
        let new_group_count = guards[0].group_count() * 2;
        let mut staged = Vec::new();
        staged.try_reserve_exact(guards.len())?;
        for _ in 0..guards.len() {
            staged.push(Shard::try_alloc_groups(new_group_count)?);
        }
        for (shard, groups) in guards.iter_mut().zip(staged) {
            shard.rebuild(groups, |element| self.hash_of(element.key()));
        }
        let slots = self.stripes.len() * new_group_count * GROUP_WIDTH;
        self.slots.store(slots, Ordering::Relaxed);
        self.threshold
            .store(slots * MAX_LOAD_NUM / MAX_LOAD_DEN, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }
}
