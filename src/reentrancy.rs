//! Debug-only re-entry guard.
//!
//! A visitor callback must not call back into the container it was invoked
//! from: the calling thread already holds a stripe lock, so the nested call
//! deadlocks on the same mutex (or, for a multi-stripe operation, violates
//! the ascending acquisition order). In debug builds this guard panics with
//! a clear message instead; in release builds it compiles to a no-op.
//!
//! Tracking is per thread and per container instance, so two containers may
//! freely visit into each other and other threads are never affected.

#[cfg(debug_assertions)]
use core::cell::RefCell;

#[cfg(debug_assertions)]
thread_local! {
    // Containers this thread is currently inside, by guard address.
    static ACTIVE: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Per-instance re-entry tracker. Embed in a container and guard public
/// entry points with `let _g = self.reentrancy.enter();`.
#[derive(Debug)]
pub(crate) struct DebugReentrancy {
    // Non-zero-sized in debug builds so each container has a distinct key.
    #[cfg(debug_assertions)]
    _key: u8,
}

impl DebugReentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            _key: 0,
        }
    }

    #[inline]
    pub(crate) fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let key = self as *const Self as usize;
            ACTIVE.with(|active| {
                let mut active = active.borrow_mut();
                assert!(
                    !active.contains(&key),
                    "re-entered a striped container from inside its own visitor"
                );
                active.push(key);
            });
        }
        ReentrancyGuard { owner: self }
    }
}

/// RAII guard returned by [`DebugReentrancy::enter`].
pub(crate) struct ReentrancyGuard<'a> {
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    owner: &'a DebugReentrancy,
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let key = self.owner as *const DebugReentrancy as usize;
            ACTIVE.with(|active| {
                let mut active = active.borrow_mut();
                match active.iter().rposition(|&k| k == key) {
                    Some(i) => {
                        active.remove(i);
                    }
                    None => debug_assert!(false, "guard dropped without matching enter"),
                }
            });
        }
    }
}
