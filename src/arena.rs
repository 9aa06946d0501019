//! Generational slot arena backing the node store
//!
//! Nodes, live ranges, and live iterators are all kept in arenas keyed by
//! `(index, generation)` handles. Handles are `Copy` and cheap to pass around;
//! a freed slot bumps its generation so stale handles are detectable instead
//! of aliasing whatever reuses the slot.

/// Raw arena handle: slot index plus the generation it was allocated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawId {
  pub(crate) index: u32,
  pub(crate) generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
  generation: u32,
  value: Option<T>,
}

/// Growable arena with a free list and per-slot generations.
#[derive(Debug)]
pub(crate) struct Arena<T> {
  slots: Vec<Slot<T>>,
  free: Vec<u32>,
  len: usize,
}

impl<T> Arena<T> {
  pub fn new() -> Self {
    Self {
      slots: Vec::new(),
      free: Vec::new(),
      len: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn insert(&mut self, value: T) -> RawId {
    self.len += 1;
    if let Some(index) = self.free.pop() {
      let slot = &mut self.slots[index as usize];
      debug_assert!(slot.value.is_none());
      slot.value = Some(value);
      return RawId {
        index,
        generation: slot.generation,
      };
    }
    let index = self.slots.len() as u32;
    self.slots.push(Slot {
      generation: 0,
      value: Some(value),
    });
    RawId {
      index,
      generation: 0,
    }
  }

  pub fn contains(&self, id: RawId) -> bool {
    self
      .slots
      .get(id.index as usize)
      .is_some_and(|slot| slot.generation == id.generation && slot.value.is_some())
  }

  pub fn get(&self, id: RawId) -> Option<&T> {
    let slot = self.slots.get(id.index as usize)?;
    if slot.generation != id.generation {
      return None;
    }
    slot.value.as_ref()
  }

  pub fn get_mut(&mut self, id: RawId) -> Option<&mut T> {
    let slot = self.slots.get_mut(id.index as usize)?;
    if slot.generation != id.generation {
      return None;
    }
    slot.value.as_mut()
  }

  /// Free a slot, bumping its generation so outstanding handles go stale.
  pub fn remove(&mut self, id: RawId) -> Option<T> {
    let slot = self.slots.get_mut(id.index as usize)?;
    if slot.generation != id.generation {
      return None;
    }
    let value = slot.value.take()?;
    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(id.index);
    self.len -= 1;
    Some(value)
  }

  /// Iterate live slots in index order.
  pub fn iter(&self) -> impl Iterator<Item = (RawId, &T)> {
    self.slots.iter().enumerate().filter_map(|(index, slot)| {
      slot.value.as_ref().map(|value| {
        (
          RawId {
            index: index as u32,
            generation: slot.generation,
          },
          value,
        )
      })
    })
  }

  /// Live handles in index order, collected so callers can mutate while
  /// walking.
  pub fn ids(&self) -> Vec<RawId> {
    self.iter().map(|(id, _)| id).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn insert_and_get_round_trip() {
    let mut arena: Arena<&str> = Arena::new();
    let a = arena.insert("a");
    let b = arena.insert("b");
    assert_eq!(arena.get(a), Some(&"a"));
    assert_eq!(arena.get(b), Some(&"b"));
    assert_eq!(arena.len(), 2);
  }

  #[test]
  fn removed_handles_go_stale() {
    let mut arena: Arena<u32> = Arena::new();
    let a = arena.insert(1);
    assert_eq!(arena.remove(a), Some(1));
    assert!(!arena.contains(a));
    assert_eq!(arena.get(a), None);
    assert_eq!(arena.remove(a), None, "double free must be a no-op");
  }

  #[test]
  fn slot_reuse_bumps_generation() {
    let mut arena: Arena<u32> = Arena::new();
    let a = arena.insert(1);
    arena.remove(a);
    let b = arena.insert(2);
    assert_eq!(a.index, b.index, "free list should reuse the slot");
    assert_ne!(a.generation, b.generation);
    assert_eq!(arena.get(a), None, "stale handle must not see the new value");
    assert_eq!(arena.get(b), Some(&2));
  }

  #[test]
  fn iteration_follows_index_order() {
    let mut arena: Arena<u32> = Arena::new();
    let a = arena.insert(1);
    let b = arena.insert(2);
    arena.remove(a);
    let ids = arena.ids();
    assert_eq!(ids, vec![b]);
  }
}
