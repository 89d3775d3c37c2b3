//! Per-destination storage of the tables defined so far.

use std::fmt;

use crate::marker::{HuffmanTable, QuantizationTable};

/// A table that can be stored in a [`TableAggregator`].
pub trait Table {
    /// The identifier that later segments use to refer to the table.
    type Key: Copy + fmt::Debug;

    /// Number of distinct keys.
    const SLOTS: usize;

    fn key(&self) -> Self::Key;

    /// Maps a key to its storage slot in `0..SLOTS`, or `None` if the key is out of range.
    fn slot(key: Self::Key) -> Option<usize>;
}

impl Table for QuantizationTable {
    /// The destination (0-3).
    type Key = u8;

    const SLOTS: usize = 4;

    fn key(&self) -> u8 {
        self.destination()
    }

    fn slot(destination: u8) -> Option<usize> {
        (destination < 4).then_some(usize::from(destination))
    }
}

impl Table for HuffmanTable {
    /// The `(class, destination)` pair: class 0-1, destination 0-3.
    type Key = (u8, u8);

    const SLOTS: usize = 8;

    fn key(&self) -> (u8, u8) {
        (self.class(), self.destination())
    }

    fn slot((class, destination): (u8, u8)) -> Option<usize> {
        (class < 2 && destination < 4).then_some(usize::from(class) * 4 + usize::from(destination))
    }
}

/// Maps table keys to the most recently defined table for that key.
///
/// Redefining a table replaces the previous definition, so later scans always see the newest one.
#[derive(Clone, PartialEq, Eq)]
pub struct TableAggregator<T> {
    slots: Vec<Option<T>>,
}

impl<T: Table> TableAggregator<T> {
    pub fn new() -> Self {
        Self {
            slots: (0..T::SLOTS).map(|_| None).collect(),
        }
    }

    /// Stores `table` under its key, returning the table it replaces.
    ///
    /// Tables whose key is outside of the key range of `T` are not stored. Decoded tables are
    /// always in range.
    pub fn insert(&mut self, table: T) -> Option<T> {
        let key = table.key();
        let Some(slot) = T::slot(key) else {
            log::warn!("ignoring table with out-of-range key {key:?}");
            return None;
        };
        self.slots[slot].replace(table)
    }

    /// Returns the table currently defined for `key`.
    pub fn get(&self, key: T::Key) -> Option<&T> {
        self.slots.get(T::slot(key)?)?.as_ref()
    }

    /// Returns the number of keys that have a table defined.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over the defined tables in key order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }
}

impl<T: Table> Default for TableAggregator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Table> fmt::Debug for TableAggregator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|table| table.key()))
            .finish()
    }
}
