//! Compact list of stub ordinals.
//!
//! Ordinals inside one file are almost always small, so each entry takes a
//! 16-bit slot. Anything that does not fit, and the sentinel itself, is kept
//! in a lazily allocated side map keyed by slot index.

use std::collections::HashMap;
use std::fmt;

const OVERFLOW: u16 = u16::MAX;

#[derive(Clone, Default)]
pub struct CompactIdList {
    slots: Vec<u16>,
    overflow: Option<HashMap<u32, i32>>,
}

impl CompactIdList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            overflow: None,
        }
    }

    pub fn add(&mut self, value: i32) {
        let idx = self.slots.len();
        self.slots.push(0);
        self.store(idx, value);
    }

    /// Overwrite the entry at `index`. Panics if `index >= len()`.
    pub fn set(&mut self, index: usize, value: i32) {
        assert!(
            index < self.slots.len(),
            "index {} out of bounds for CompactIdList of length {}",
            index,
            self.slots.len()
        );
        self.store(index, value);
    }

    /// Entry at `index`. Panics if `index >= len()`.
    pub fn get(&self, index: usize) -> i32 {
        let slot = self.slots[index];
        if slot != OVERFLOW {
            return slot as i32;
        }
        self.overflow
            .as_ref()
            .and_then(|m| m.get(&(index as u32)))
            .copied()
            .unwrap_or(OVERFLOW as i32)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn last(&self) -> Option<i32> {
        self.len().checked_sub(1).map(|idx| self.get(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        (0..self.len()).map(move |idx| self.get(idx))
    }

    pub fn trim_to_size(&mut self) {
        self.slots.shrink_to_fit();
        if let Some(map) = self.overflow.as_mut() {
            if map.is_empty() {
                self.overflow = None;
            } else {
                map.shrink_to_fit();
            }
        }
    }

    /// Entries held out of line.
    pub fn overflow_len(&self) -> usize {
        self.overflow.as_ref().map_or(0, HashMap::len)
    }

    fn store(&mut self, index: usize, value: i32) {
        if (0..OVERFLOW as i32).contains(&value) {
            self.slots[index] = value as u16;
            if let Some(map) = self.overflow.as_mut() {
                map.remove(&(index as u32));
            }
        } else {
            self.slots[index] = OVERFLOW;
            self.overflow
                .get_or_insert_with(HashMap::new)
                .insert(index as u32, value);
        }
    }
}

impl PartialEq for CompactIdList {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for CompactIdList {}

impl fmt::Debug for CompactIdList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<i32> for CompactIdList {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut list = CompactIdList::with_capacity(iter.size_hint().0);
        for value in iter {
            list.add(value);
        }
        list
    }
}

impl From<&[i32]> for CompactIdList {
    fn from(values: &[i32]) -> Self {
        values.iter().copied().collect()
    }
}
