//! Slot groups: the fixed-capacity unit of element storage.
//!
//! A group holds up to [`GROUP_WIDTH`] elements plus an occupancy bitmap and
//! an overflow marker. The bitmap is authoritative: bit `i` is set iff slot
//! `i` holds a live element. The overflow marker records that some insert
//! probed past this group while it was full; lookups use it to decide whether
//! a probe may terminate at a group with free slots.

/// Number of element slots per group.
pub(crate) const GROUP_WIDTH: usize = 14;

/// Low `GROUP_WIDTH` bits of the occupancy word.
const OCCUPANCY_MASK: u16 = (1 << GROUP_WIDTH) - 1;

pub(crate) struct Group<T> {
    occupied: u16,
    overflowed: bool,
    slots: [Option<T>; GROUP_WIDTH],
}

impl<T> Group<T> {
    pub(crate) fn new() -> Self {
        Self {
            occupied: 0,
            overflowed: false,
            slots: core::array::from_fn(|_| None),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.occupied.count_ones() as usize
    }

    pub(crate) fn has_free_slot(&self) -> bool {
        self.occupied != OCCUPANCY_MASK
    }

    pub(crate) fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Record that an insert probed past this group while it was full.
    /// Never cleared by erase; only a rebuild starts from a clean slate.
    pub(crate) fn mark_overflowed(&mut self) {
        self.overflowed = true;
    }

    /// Index of the first occupied slot whose element matches `pred`.
    pub(crate) fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        let mut bits = self.occupied;
        while bits != 0 {
            let slot = bits.trailing_zeros() as usize;
            debug_assert!(self.slots[slot].is_some());
            if let Some(element) = self.slots[slot].as_ref() {
                if pred(element) {
                    return Some(slot);
                }
            }
            bits &= bits - 1;
        }
        None
    }

    /// Place `value` in the first free slot. Gives the value back if the
    /// group is full so the caller can continue its probe.
    pub(crate) fn insert(&mut self, value: T) -> Result<usize, T> {
        let free = !self.occupied & OCCUPANCY_MASK;
        if free == 0 {
            return Err(value);
        }
        let slot = free.trailing_zeros() as usize;
        debug_assert!(self.slots[slot].is_none());
        self.occupied |= 1 << slot;
        self.slots[slot] = Some(value);
        Ok(slot)
    }

    /// Clear the occupancy bit and return the element, if the slot was live.
    pub(crate) fn remove(&mut self, slot: usize) -> Option<T> {
        if self.occupied & (1 << slot) == 0 {
            return None;
        }
        self.occupied &= !(1 << slot);
        self.slots[slot].take()
    }

    pub(crate) fn get(&self, slot: usize) -> &T {
        debug_assert!(self.occupied & (1 << slot) != 0);
        self.slots[slot].as_ref().unwrap()
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> &mut T {
        debug_assert!(self.occupied & (1 << slot) != 0);
        self.slots[slot].as_mut().unwrap()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        let occupied = self.occupied;
        self.slots
            .iter()
            .enumerate()
            .filter(move |(i, _)| occupied & (1 << i) != 0)
            .map(|(_, slot)| slot.as_ref().unwrap())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        let occupied = self.occupied;
        self.slots
            .iter_mut()
            .enumerate()
            .filter(move |(i, _)| occupied & (1 << i) != 0)
            .map(|(_, slot)| slot.as_mut().unwrap())
    }

    pub(crate) fn clear(&mut self) {
        self.occupied = 0;
        self.overflowed = false;
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: the occupancy bitmap tracks exactly the live slots through
    /// insert and remove.
    #[test]
    fn bitmap_tracks_live_slots() {
        let mut g: Group<u32> = Group::new();
        assert_eq!(g.len(), 0);
        assert!(g.has_free_slot());

        let a = g.insert(10).unwrap();
        let b = g.insert(20).unwrap();
        assert_ne!(a, b);
        assert_eq!(g.len(), 2);
        assert_eq!(*g.get(a), 10);
        assert_eq!(*g.get(b), 20);

        assert_eq!(g.remove(a), Some(10));
        assert_eq!(g.remove(a), None, "slot already cleared");
        assert_eq!(g.len(), 1);
    }

    /// Invariant: a full group rejects inserts and returns the value intact.
    #[test]
    fn full_group_returns_value() {
        let mut g: Group<usize> = Group::new();
        for i in 0..GROUP_WIDTH {
            g.insert(i).unwrap();
        }
        assert!(!g.has_free_slot());
        assert_eq!(g.insert(99), Err(99));
    }

    /// Invariant: `find` only inspects occupied slots and returns the first
    /// match in slot order.
    #[test]
    fn find_skips_empty_slots() {
        let mut g: Group<u32> = Group::new();
        let a = g.insert(1).unwrap();
        let b = g.insert(2).unwrap();
        let _c = g.insert(2).unwrap();
        g.remove(a);

        assert_eq!(g.find(|v| *v == 2), Some(b));
        assert_eq!(g.find(|v| *v == 1), None);
    }

    /// Invariant: freed slots are reused by later inserts.
    #[test]
    fn freed_slot_is_reused() {
        let mut g: Group<u32> = Group::new();
        for i in 0..GROUP_WIDTH as u32 {
            g.insert(i).unwrap();
        }
        g.remove(3);
        assert_eq!(g.insert(77), Ok(3));
    }

    /// Invariant: `clear` resets occupancy and the overflow marker.
    #[test]
    fn clear_resets_state() {
        let mut g: Group<u32> = Group::new();
        g.insert(1).unwrap();
        g.mark_overflowed();
        g.clear();
        assert_eq!(g.len(), 0);
        assert!(!g.overflowed());
        assert_eq!(g.find(|_| true), None);
    }

    /// Invariant: iteration visits each live element exactly once.
    #[test]
    fn iter_visits_live_elements() {
        let mut g: Group<u32> = Group::new();
        let a = g.insert(1).unwrap();
        g.insert(2).unwrap();
        g.insert(3).unwrap();
        g.remove(a);

        let mut seen: Vec<u32> = g.iter().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![2, 3]);

        for v in g.iter_mut() {
            *v += 10;
        }
        let mut seen: Vec<u32> = g.iter().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![12, 13]);
    }
}
