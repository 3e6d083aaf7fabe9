//! Slab-backed membership set of a socket pool.
//!
//! Entries are addressed by [`MemberKey`]: the slab index plus the id of
//! the member stored there. A stale key (its member already removed, the
//! slot possibly reused) never matches, so removal is idempotent and a
//! member is released exactly once.

use slab::Slab;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberKey {
    index: usize,
    id: u64,
}

impl MemberKey {
    pub fn id(&self) -> u64 {
        self.id
    }
}

enum Slot<T> {
    /// Owned by the set, waiting for events.
    Parked { id: u64, item: T },
    /// Taken out by the event loop for processing.
    CheckedOut { id: u64 },
}

impl<T> Slot<T> {
    fn id(&self) -> u64 {
        match self {
            Slot::Parked { id, .. } | Slot::CheckedOut { id } => *id,
        }
    }
}

pub struct Membership<T> {
    slots: Slab<Slot<T>>,
    capacity: usize,
}

impl<T> Membership<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Slab::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Adds a member. A full set hands the item back.
    pub fn register(&mut self, id: u64, item: T) -> Result<MemberKey, T> {
        if self.is_full() {
            return Err(item);
        }
        let index = self.slots.insert(Slot::Parked { id, item });
        Ok(MemberKey { index, id })
    }

    /// Removes the member under `key`, dropping it if it is parked here.
    ///
    /// Returns `false` when the key is stale.
    pub fn unregister(&mut self, key: MemberKey) -> bool {
        if !self.matches(key) {
            return false;
        }
        drop(self.slots.remove(key.index));
        true
    }

    /// Takes a parked member out for processing. Its slot stays reserved.
    pub fn checkout(&mut self, key: MemberKey) -> Option<T> {
        if !self.matches(key) {
            return None;
        }
        let slot = &mut self.slots[key.index];
        match std::mem::replace(slot, Slot::CheckedOut { id: key.id }) {
            Slot::Parked { item, .. } => Some(item),
            checked_out => {
                *slot = checked_out;
                None
            }
        }
    }

    /// Puts a checked-out member back.
    ///
    /// If the member was unregistered meanwhile, the item is dropped and
    /// `false` is returned.
    pub fn checkin(&mut self, key: MemberKey, item: T) -> bool {
        match self.slots.get_mut(key.index) {
            Some(slot) if matches!(*slot, Slot::CheckedOut { id } if id == key.id) => {
                *slot = Slot::Parked { id: key.id, item };
                true
            }
            _ => false,
        }
    }

    /// Parked members with their keys, in slot order.
    pub fn parked(&self) -> impl Iterator<Item = (MemberKey, &T)> {
        self.slots.iter().filter_map(|(index, slot)| match slot {
            Slot::Parked { id, item } => Some((MemberKey { index, id: *id }, item)),
            Slot::CheckedOut { .. } => None,
        })
    }

    pub fn get(&self, key: MemberKey) -> Option<&T> {
        match self.slots.get(key.index) {
            Some(Slot::Parked { id, item }) if *id == key.id => Some(item),
            _ => None,
        }
    }

    pub fn contains(&self, key: MemberKey) -> bool {
        self.matches(key)
    }

    /// Members, parked or checked out.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every member.
    pub fn clear(&mut self) -> usize {
        let n = self.slots.len();
        self.slots.clear();
        n
    }

    fn matches(&self, key: MemberKey) -> bool {
        self.slots
            .get(key.index)
            .is_some_and(|slot| slot.id() == key.id)
    }
}
