//! striped-hashmap: a concurrent hash map/set with striped locking and
//! visitation-based access.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let many threads read, mutate, and scan one associative container
//!   with no external locking, built in small, independently verifiable
//!   layers.
//! - Layers:
//!   - `group`: fixed-capacity slot groups with an occupancy bitmap and an
//!     overflow marker; the unit of storage.
//!   - `table`: one stripe's shard of groups plus the probe policy
//!     (triangular probing over a power-of-two group count) and the
//!     placement/erase primitives.
//!   - `stripes`: a fixed array of cache-line-padded mutexes, one per shard;
//!     single, sorted-multi, and all-stripe acquisition.
//!   - `engine`: hashing and stripe routing, visitation
//!     (single-key, bulk, whole-table, early-exit, parallel), the atomic
//!     check-then-act upsert, and the rehash controller.
//!   - `map` / `node_map` / `set`: thin public fronts choosing the element
//!     representation (inline pair, boxed pair, bare key).
//!
//! Constraints
//! - Unique keys: `count(k)` is 0 or 1 for every key.
//! - No iterators: element references reach callers only as short-lived
//!   borrows inside visitor callbacks, scoped under the owning stripe lock.
//!   The borrow checker makes it impossible to retain one past the call.
//! - Same-key operations are mutually exclusive (they share a stripe
//!   mutex); different stripes run fully in parallel; rehash is the single
//!   globally exclusive operation.
//! - Visitors must not re-enter the container they came from; a debug-only
//!   guard panics on same-thread re-entry instead of deadlocking.
//! - Absence is a `0`/`false`/`None` result, never an error. The only
//!   container-originated failure is [`AllocationError`], and a failed grow
//!   leaves the live table intact.
//!
//! Why this split?
//! - Localize invariants: the bitmap/overflow rules live entirely in
//!   `group`/`table`; deadlock avoidance (ascending stripe order) lives
//!   entirely in `stripes`; `engine` composes them without re-deriving
//!   either.
//! - Clear failure boundaries: user code (hash, equality, visitors) only
//!   runs at well-defined points; a panicking visitor unwinds through a
//!   non-poisoning guard and the container stays valid.
//!
//! Hasher and rehashing invariants
//! - Hashing must be a pure function of the key's value: it runs on both
//!   sides of every lock boundary and again during migration. Hash values
//!   are not cached; a rehash recomputes them with the same `BuildHasher`.
//!
//! Notes and non-goals
//! - No cancellation or timeouts: bounded waiting is the caller's job
//!   (poll with `contains`/`visit`).
//! - No persistence, serialization, or wire format.
//! - Starvation-avoidance during rehash is not guaranteed: accessors block
//!   until migration completes.

mod engine;
mod group;
mod map;
mod node_map;
mod reentrancy;
mod set;
mod stripes;
mod table;

/// Default hasher: `ahash`'s randomized state, a fast, DoS-resistant
/// general-purpose choice.
pub type DefaultHashBuilder = ahash::RandomState;

// Public surface
pub use map::StripedHashMap;
pub use node_map::StripedNodeHashMap;
pub use set::StripedHashSet;
pub use table::AllocationError;
