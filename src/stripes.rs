//! Stripe lock manager: a fixed array of mutexes, each owning one contiguous
//! partition of the table.
//!
//! The stripe count is fixed at construction, decoupling lock granularity
//! from table size. A key's stripe is a pure function of its hash and the
//! stripe count (multiply-shift on the high bits, which is cheaper than a
//! modulo and unbiased for power-of-two counts). Deadlock discipline: any
//! operation that needs more than one stripe acquires them in ascending
//! index order, and only the rehash path ever takes them all.
//!
//! `parking_lot` mutexes are used deliberately: guards are not poisoned, so
//! a visitor callback that panics unwinds through the guard and releases the
//! stripe without wedging the container.

use parking_lot::{Mutex, MutexGuard};

/// Pad each stripe to its own cache line so independent locks never share
/// one.
#[repr(align(64))]
struct CacheAligned<T>(T);

pub(crate) struct StripeSet<T> {
    stripes: Box<[CacheAligned<Mutex<T>>]>,
}

impl<T> StripeSet<T> {
    pub(crate) fn new(partitions: impl IntoIterator<Item = T>) -> Self {
        let stripes: Box<[_]> = partitions
            .into_iter()
            .map(|p| CacheAligned(Mutex::new(p)))
            .collect();
        assert!(!stripes.is_empty(), "stripe count must be positive");
        Self { stripes }
    }

    pub(crate) fn len(&self) -> usize {
        self.stripes.len()
    }

    /// Owning stripe for a hash value.
    pub(crate) fn stripe_of(&self, hash: u64) -> usize {
        ((hash as u128 * self.stripes.len() as u128) >> 64) as usize
    }

    /// Blocking single-stripe acquire.
    pub(crate) fn lock(&self, stripe: usize) -> MutexGuard<'_, T> {
        self.stripes[stripe].0.lock()
    }

    /// Acquire a strictly ascending, de-duplicated set of stripes. The
    /// ordering requirement is what makes concurrent bulk operations
    /// deadlock-free.
    pub(crate) fn lock_many<'a>(&'a self, stripes: &[usize]) -> Vec<(usize, MutexGuard<'a, T>)> {
        debug_assert!(stripes.windows(2).all(|w| w[0] < w[1]));
        stripes.iter().map(|&i| (i, self.lock(i))).collect()
    }

    /// Acquire every stripe in ascending order. The sole global
    /// serialization point; used only by rehash and clear.
    pub(crate) fn lock_all(&self) -> Vec<MutexGuard<'_, T>> {
        self.stripes.iter().map(|s| s.0.lock()).collect()
    }
}

/// Default stripe count: enough parallelism headroom for the machine without
/// an unbounded mutex array.
pub(crate) fn default_stripe_count() -> usize {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (threads * 4).next_power_of_two().clamp(8, 256)
}
