//! Bundles: the sets of items handed to agents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::item::{ItemId, Items};

/// A set of items owned by one agent.
///
/// Ownership is tracked by the `Allocation` holding the bundle, not by the
/// bundle itself, so moving a bundle between agents is a plain value move.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bundle {
    items: BTreeSet<ItemId>,
}

impl Bundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item to the bundle.
    pub fn add_item(&mut self, item: ItemId) {
        self.items.insert(item);
    }

    /// Remove an item from the bundle. Returns `false` if it was absent.
    pub fn remove_item(&mut self, item: &ItemId) -> bool {
        self.items.remove(item)
    }

    /// Copy of this bundle without `item`.
    pub fn without(&self, item: &ItemId) -> Self {
        let mut subset = self.clone();
        subset.remove_item(item);
        subset
    }

    /// Check membership.
    pub fn contains(&self, item: &ItemId) -> bool {
        self.items.contains(item)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the bundle holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate items in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().copied()
    }

    /// The bundle's items as an `Items` pool.
    pub fn to_items(&self) -> Items {
        self.iter().collect()
    }
}

impl FromIterator<ItemId> for Bundle {
    fn from_iter<T: IntoIterator<Item = ItemId>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.items.iter().map(|i| i.key().to_string()).collect();
        write!(f, "Bundle([{}])", keys.join(", "))
    }
}
