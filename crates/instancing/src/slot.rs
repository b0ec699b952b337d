use std::collections::HashMap;
use std::fmt;

use lemuria_common::ObjectId;

/// Index into a pool's instance buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub u32);

impl Slot {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("all {capacity} slots are in use")]
    Full { capacity: u32 },
    #[error("object {0} holds no slot")]
    NotFound(ObjectId),
}

/// Fixed-capacity mapping from object ids to slots, with a payload per slot.
///
/// Slots are handed out from the free list first, then from a monotonic
/// counter. Which free slot gets reused is unspecified. Released slots are
/// reset to the `vacant` payload.
#[derive(Debug, Clone)]
pub struct SlotAllocator<T> {
    capacity: u32,
    /// Next never-used slot index; also the draw count.
    next: u32,
    vacant: T,
    values: Vec<T>,
    owners: Vec<Option<ObjectId>>,
    bindings: HashMap<ObjectId, Slot>,
    free: Vec<Slot>,
}

impl<T: Copy> SlotAllocator<T> {
    pub fn new(capacity: u32, vacant: T) -> Self {
        Self {
            capacity,
            next: 0,
            vacant,
            values: vec![vacant; capacity as usize],
            owners: vec![None; capacity as usize],
            bindings: HashMap::new(),
            free: Vec::new(),
        }
    }

    /// Bind `id` to a slot. An id that is already live keeps its slot.
    pub fn allocate(&mut self, id: ObjectId) -> Result<Slot, SlotError> {
        if let Some(&slot) = self.bindings.get(&id) {
            return Ok(slot);
        }

        let slot = if let Some(slot) = self.free.pop() {
            slot
        } else if self.next < self.capacity {
            let slot = Slot(self.next);
            self.next += 1;
            slot
        } else {
            return Err(SlotError::Full {
                capacity: self.capacity,
            });
        };

        self.bindings.insert(id, slot);
        self.owners[slot.index()] = Some(id);
        Ok(slot)
    }

    /// Unbind `id`, reset its payload and return the slot to the free list.
    pub fn release(&mut self, id: ObjectId) -> Result<Slot, SlotError> {
        let slot = self.bindings.remove(&id).ok_or(SlotError::NotFound(id))?;
        self.owners[slot.index()] = None;
        self.values[slot.index()] = self.vacant;
        self.free.push(slot);
        Ok(slot)
    }

    pub fn lookup(&self, id: ObjectId) -> Result<Slot, SlotError> {
        self.bindings.get(&id).copied().ok_or(SlotError::NotFound(id))
    }

    /// Overwrite the payload of `id`'s slot in place.
    pub fn update(&mut self, id: ObjectId, value: T) -> Result<Slot, SlotError> {
        let slot = self.lookup(id)?;
        self.values[slot.index()] = value;
        Ok(slot)
    }

    pub fn payload(&self, id: ObjectId) -> Result<&T, SlotError> {
        let slot = self.lookup(id)?;
        Ok(&self.values[slot.index()])
    }

    pub fn value(&self, slot: Slot) -> Option<&T> {
        if slot.0 < self.next {
            self.values.get(slot.index())
        } else {
            None
        }
    }

    pub fn owner(&self, slot: Slot) -> Option<ObjectId> {
        self.owners.get(slot.index()).copied().flatten()
    }

    /// Payloads of every slot ever handed out, free ones included.
    pub fn values(&self) -> &[T] {
        &self.values[..self.next as usize]
    }

    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, Slot, &T)> + '_ {
        self.owners[..self.next as usize]
            .iter()
            .enumerate()
            .filter_map(|(i, owner)| owner.map(|id| (id, Slot(i as u32), &self.values[i])))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.bindings.contains_key(&id)
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty() && self.next >= self.capacity
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Highest slot index ever handed out, plus one.
    pub fn high_water(&self) -> u32 {
        self.next
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn id(n: u64) -> ObjectId {
        ObjectId(n)
    }

    /// splitmix64 step, used to drive reproducible operation sequences.
    fn splitmix64(state: &mut u64) -> u64 {
        *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = *state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    #[test]
    fn allocates_sequential_slots_when_nothing_is_free() {
        let mut a = SlotAllocator::new(3, 0u8);
        assert_eq!(a.allocate(id(10)), Ok(Slot(0)));
        assert_eq!(a.allocate(id(11)), Ok(Slot(1)));
        assert_eq!(a.allocate(id(12)), Ok(Slot(2)));
        assert_eq!(a.allocate(id(13)), Err(SlotError::Full { capacity: 3 }));
        assert_eq!(a.len(), 3);
        assert!(a.is_full());
    }

    #[test]
    fn live_id_keeps_its_slot() {
        let mut a = SlotAllocator::new(2, 0u8);
        let first = a.allocate(id(1)).unwrap();
        assert_eq!(a.allocate(id(1)), Ok(first));
        assert_eq!(a.len(), 1);
        assert_eq!(a.high_water(), 1);
    }

    #[test]
    fn update_then_lookup_round_trip() {
        let mut a = SlotAllocator::new(4, 0i32);
        a.allocate(id(5)).unwrap();
        a.update(id(5), 77).unwrap();
        let slot = a.lookup(id(5)).unwrap();
        assert_eq!(a.value(slot), Some(&77));
        assert_eq!(a.payload(id(5)), Ok(&77));
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let mut a = SlotAllocator::new(4, 0i32);
        assert_eq!(a.update(id(9), 1), Err(SlotError::NotFound(id(9))));
        assert_eq!(a.high_water(), 0);
    }

    #[test]
    fn release_resets_payload_and_keeps_draw_count() {
        let mut a = SlotAllocator::new(4, -1i32);
        a.allocate(id(1)).unwrap();
        a.allocate(id(2)).unwrap();
        a.update(id(1), 10).unwrap();
        let slot = a.release(id(1)).unwrap();
        assert_eq!(a.value(slot), Some(&-1));
        assert_eq!(a.owner(slot), None);
        assert_eq!(a.high_water(), 2);
        assert_eq!(a.lookup(id(1)), Err(SlotError::NotFound(id(1))));
    }

    #[test]
    fn double_release_is_not_found_and_free_list_stays_sound() {
        let mut a = SlotAllocator::new(2, 0u8);
        a.allocate(id(1)).unwrap();
        a.release(id(1)).unwrap();
        assert_eq!(a.release(id(1)), Err(SlotError::NotFound(id(1))));
        assert_eq!(a.free_len(), 1);

        // Both slots are still usable exactly once each.
        let s1 = a.allocate(id(2)).unwrap();
        let s2 = a.allocate(id(3)).unwrap();
        assert_ne!(s1, s2);
        assert_eq!(a.allocate(id(4)), Err(SlotError::Full { capacity: 2 }));
    }

    #[test]
    fn released_slot_is_reused_before_growing() {
        let mut a = SlotAllocator::new(8, 0u8);
        for n in 0..4 {
            a.allocate(id(n)).unwrap();
        }
        let freed = a.release(id(2)).unwrap();
        let reused = a.allocate(id(99)).unwrap();
        assert_eq!(reused, freed);
        assert_eq!(a.high_water(), 4);
    }

    #[test]
    fn iter_lists_occupied_slots_only() {
        let mut a = SlotAllocator::new(4, 0u8);
        a.allocate(id(1)).unwrap();
        a.allocate(id(2)).unwrap();
        a.allocate(id(3)).unwrap();
        a.release(id(2)).unwrap();
        let ids: Vec<ObjectId> = a.iter().map(|(i, _, _)| i).collect();
        assert_eq!(ids, vec![id(1), id(3)]);
    }

    #[test]
    fn random_sequences_respect_capacity_and_bindings() {
        for seed in 0..20u64 {
            let mut state = seed;
            let capacity = 1 + (splitmix64(&mut state) % 16) as u32;
            let mut a = SlotAllocator::new(capacity, 0u32);
            let mut live: HashSet<ObjectId> = HashSet::new();

            for _ in 0..500 {
                let n = id(splitmix64(&mut state) % 40);
                if splitmix64(&mut state) % 2 == 0 {
                    match a.allocate(n) {
                        Ok(_) => {
                            live.insert(n);
                        }
                        Err(SlotError::Full { .. }) => {
                            assert!(!live.contains(&n));
                            assert_eq!(live.len(), capacity as usize);
                        }
                        Err(e) => panic!("unexpected {e}"),
                    }
                } else {
                    let released = a.release(n);
                    assert_eq!(released.is_ok(), live.remove(&n));
                    assert_eq!(a.lookup(n), Err(SlotError::NotFound(n)));
                }

                assert!(a.len() <= capacity as usize);
                assert_eq!(a.len(), live.len());
                // No two live ids share a slot.
                let slots: HashSet<Slot> = live.iter().map(|i| a.lookup(*i).unwrap()).collect();
                assert_eq!(slots.len(), live.len());
            }
        }
    }
}
