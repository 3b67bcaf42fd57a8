//! Per-prefix ticket counters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last-issued number for every prefix that has minted a ticket.
///
/// A prefix that has never been used reads as `0`, so the first number it
/// hands out is `1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterTable(BTreeMap<String, u64>);

impl CounterTable {
    /// Creates an empty table
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Last number issued for `prefix` (0 if none)
    #[must_use]
    pub fn current(&self, prefix: &str) -> u64 {
        self.0.get(prefix).copied().unwrap_or(0)
    }

    /// Advances the counter for `prefix` and returns the new value.
    pub fn next_number(&mut self, prefix: &str) -> u64 {
        let next = self.current(prefix) + 1;
        self.0.insert(prefix.to_string(), next);
        next
    }

    /// Forgets every counter
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Whether no prefix has been used yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
