//! Table storage: one stripe's partition of slot groups plus the probe
//! policy that maps a hash to candidate groups.
//!
//! Each shard owns a power-of-two number of groups. A key's home group is
//! `hash & mask`; on collision the probe follows triangular offsets
//! (`+1, +2, +3, …` cumulative), which visits every group exactly once when
//! the group count is a power of two. Lookup may terminate early at a group
//! with free slots unless that group's overflow marker is set, meaning some
//! element was pushed past it while it was full.
//!
//! Shards never grow themselves: when a probe exhausts the shard, the insert
//! hands the element back and the caller escalates to a table-wide rehash.

use crate::group::{Group, GROUP_WIDTH};
use core::fmt;
use std::collections::TryReserveError;

/// Numerator/denominator of the maximum load factor (7/8).
pub(crate) const MAX_LOAD_NUM: usize = 7;
pub(crate) const MAX_LOAD_DEN: usize = 8;

/// The one container-originated failure: storage for slot groups could not
/// be reserved. The operation that needed the allocation fails; the live
/// table is left in its previous valid state.
#[derive(Debug)]
pub struct AllocationError(TryReserveError);

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to allocate table storage: {}", self.0)
    }
}

impl std::error::Error for AllocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<TryReserveError> for AllocationError {
    fn from(e: TryReserveError) -> Self {
        AllocationError(e)
    }
}

/// Position of a live element: group index within the shard plus slot index
/// within the group. Only valid while the owning stripe lock is held and no
/// structural change has happened since it was produced.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct SlotRef {
    group: usize,
    slot: usize,
}

pub(crate) struct Shard<T> {
    groups: Vec<Group<T>>,
    mask: usize,
}

impl<T> Shard<T> {
    /// `group_count` must be a power of two.
    pub(crate) fn with_groups(group_count: usize) -> Self {
        debug_assert!(group_count.is_power_of_two());
        let groups = (0..group_count).map(|_| Group::new()).collect::<Vec<_>>();
        Self {
            groups,
            mask: group_count - 1,
        }
    }

    /// Fallibly allocate a replacement group array. Kept separate from
    /// `rebuild` so a rehash can stage every allocation before moving any
    /// element.
    pub(crate) fn try_alloc_groups(group_count: usize) -> Result<Vec<Group<T>>, AllocationError> {
        debug_assert!(group_count.is_power_of_two());
        let mut groups = Vec::new();
        groups.try_reserve_exact(group_count)?;
        groups.extend((0..group_count).map(|_| Group::new()));
        Ok(groups)
    }

    pub(crate) fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// First slot along the probe sequence whose element matches. No side
    /// effects; equality is supplied by the caller.
    pub(crate) fn find(&self, hash: u64, mut is_match: impl FnMut(&T) -> bool) -> Option<SlotRef> {
        let mut pos = (hash as usize) & self.mask;
        let mut stride = 0;
        loop {
            let group = &self.groups[pos];
            if let Some(slot) = group.find(&mut is_match) {
                return Some(SlotRef { group: pos, slot });
            }
            // A group with spare room that nothing ever overflowed past is
            // the end of every probe chain through it.
            if group.has_free_slot() && !group.overflowed() {
                return None;
            }
            stride += 1;
            if stride > self.mask {
                return None;
            }
            pos = (pos + stride) & self.mask;
        }
    }

    /// Place an element the caller has already established to be absent.
    /// Marks the overflow bit on every full group it probes past. Gives the
    /// element back when the whole shard is full; the caller must rehash and
    /// retry.
    pub(crate) fn insert_new(&mut self, hash: u64, mut value: T) -> Result<SlotRef, T> {
        let mut pos = (hash as usize) & self.mask;
        let mut stride = 0;
        loop {
            match self.groups[pos].insert(value) {
                Ok(slot) => return Ok(SlotRef { group: pos, slot }),
                Err(v) => {
                    value = v;
                    self.groups[pos].mark_overflowed();
                    stride += 1;
                    if stride > self.mask {
                        return Err(value);
                    }
                    pos = (pos + stride) & self.mask;
                }
            }
        }
    }

    /// Clear the occupancy bit and take ownership of the element.
    pub(crate) fn erase(&mut self, slot: SlotRef) -> Option<T> {
        self.groups[slot.group].remove(slot.slot)
    }

    pub(crate) fn get(&self, slot: SlotRef) -> &T {
        self.groups[slot.group].get(slot.slot)
    }

    pub(crate) fn get_mut(&mut self, slot: SlotRef) -> &mut T {
        self.groups[slot.group].get_mut(slot.slot)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.groups.iter().flat_map(|g| g.iter())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.groups.iter_mut().flat_map(|g| g.iter_mut())
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    /// Swap in a pre-allocated (larger) group array and re-place every live
    /// element using `hash_of`. The caller guarantees the new array has spare
    /// capacity for the current population.
    pub(crate) fn rebuild(&mut self, new_groups: Vec<Group<T>>, hash_of: impl Fn(&T) -> u64) {
        debug_assert!(new_groups.len().is_power_of_two());
        debug_assert!(new_groups.len() * GROUP_WIDTH > self.len());
        let old = core::mem::replace(&mut self.groups, new_groups);
        self.mask = self.groups.len() - 1;
        for mut group in old {
            for slot in 0..GROUP_WIDTH {
                if let Some(element) = group.remove(slot) {
                    let hash = hash_of(&element);
                    if self.insert_new(hash, element).is_err() {
                        unreachable!("rebuilt shard has spare capacity for every element");
                    }
                }
            }
        }
    }

    /// Drop every element, keeping the current capacity.
    pub(crate) fn clear(&mut self) {
        for group in &mut self.groups {
            group.clear();
        }
    }
}
