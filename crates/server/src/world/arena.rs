//! Index-addressed character storage.

use std::collections::BTreeSet;

use crate::error::WorldError;

/// Slots addressed by protocol index. Index 0 is never handed out.
///
/// A removed index is not reused until [`CharacterArena::release_pending`]
/// runs at the end of the tick, so observers still see it vanish before
/// anything else takes its place.
#[derive(Debug)]
pub struct CharacterArena<T> {
    slots: Vec<Option<T>>,
    free: BTreeSet<u16>,
    pending_free: Vec<u16>,
    capacity: u16,
    len: usize,
}

impl<T> CharacterArena<T> {
    /// Arena with indices `1..capacity`.
    pub fn new(capacity: u16) -> Self {
        Self {
            slots: vec![None],
            free: BTreeSet::new(),
            pending_free: Vec::new(),
            capacity,
            len: 0,
        }
    }

    /// Store the value built for the lowest free index.
    pub fn insert_with(&mut self, build: impl FnOnce(u16) -> T) -> Result<u16, WorldError> {
        let index = match self.free.pop_first() {
            Some(index) => index,
            None if self.slots.len() < self.capacity as usize => {
                self.slots.push(None);
                (self.slots.len() - 1) as u16
            }
            None => return Err(WorldError::ArenaFull),
        };
        self.slots[index as usize] = Some(build(index));
        self.len += 1;
        Ok(index)
    }

    pub fn remove(&mut self, index: u16) -> Option<T> {
        let value = self.slots.get_mut(index as usize)?.take()?;
        self.pending_free.push(index);
        self.len -= 1;
        Some(value)
    }

    /// Make indices removed this tick available again.
    pub fn release_pending(&mut self) {
        self.free.extend(self.pending_free.drain(..));
    }

    #[inline]
    pub fn get(&self, index: u16) -> Option<&T> {
        self.slots.get(index as usize)?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, index: u16) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.as_mut()
    }

    pub fn contains(&self, index: u16) -> bool {
        self.get(index).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Occupied indices in ascending order.
    pub fn indices(&self) -> Vec<u16> {
        self.iter().map(|(index, _)| index).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index as u16, value)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u16, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_mut().map(|value| (index as u16, value)))
    }
}
