//! Item types for the allocation kernel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Unique identifier for an indivisible good.
///
/// Items are opaque: the key is the only thing the kernel knows about them.
/// Implements `Ord` so every collection of items iterates in ascending key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(u32);

impl ItemId {
    /// Create a new ItemId from its integer key.
    pub fn new(key: u32) -> Self {
        Self(key)
    }

    /// Get the integer key.
    pub fn key(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item({})", self.0)
    }
}

impl From<u32> for ItemId {
    fn from(key: u32) -> Self {
        Self(key)
    }
}

/// Ordered pool of items.
///
/// Backed by a `BTreeSet`, so iteration, `first()` and serialization are
/// always in ascending key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Items {
    items: BTreeSet<ItemId>,
}

impl Items {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool of `count` items with consecutive keys starting at `start`.
    pub fn range(start: u32, count: usize) -> Self {
        (start..start + count as u32).map(ItemId::new).collect()
    }

    /// Add an item. Returns `false` if it was already present.
    pub fn insert(&mut self, item: ItemId) -> bool {
        self.items.insert(item)
    }

    /// Remove an item. Returns `false` if it was not present.
    pub fn remove(&mut self, item: &ItemId) -> bool {
        self.items.remove(item)
    }

    /// Check membership.
    pub fn contains(&self, item: &ItemId) -> bool {
        self.items.contains(item)
    }

    /// Number of items in the pool.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().copied()
    }

    /// Integer keys in ascending order.
    pub fn keys(&self) -> Vec<u32> {
        self.iter().map(|item| item.key()).collect()
    }
}

impl FromIterator<ItemId> for Items {
    fn from_iter<T: IntoIterator<Item = ItemId>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Items {
    type Item = ItemId;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, ItemId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter().copied()
    }
}
