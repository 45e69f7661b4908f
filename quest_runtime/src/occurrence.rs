use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Visit counters keyed by arbitrary story strings ("met_gatekeeper",
/// "door_opened", ...). Counts grow monotonically except for the scoped
/// rollback path: keys recorded on the per-interaction undo list are
/// decremented exactly once per recorded add when the interaction is
/// canceled.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct OccurrenceLedger {
    counts: BTreeMap<String, u32>,
    #[serde(skip)]
    undo: Vec<String>,
}

impl OccurrenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter for `key` and returns the new count.
    pub fn add(&mut self, key: &str) -> u32 {
        let slot = self.counts.entry(key.to_string()).or_insert(0);
        *slot = slot.saturating_add(1);
        *slot
    }

    pub fn count(&self, key: &str) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Marks the latest `add(key)` as undoable if the current interaction is
    /// canceled. Callers outside a cancelable interaction must not record.
    pub fn record_for_rollback(&mut self, key: &str) {
        self.undo.push(key.to_string());
    }

    /// Undoes every increment on the undo list, then clears it. Returns how
    /// many increments were undone. Increments that were never recorded are
    /// untouched even when they share a key with recorded ones.
    pub fn rollback(&mut self) -> usize {
        let undone = self.undo.len();
        for key in self.undo.drain(..) {
            match self.counts.get_mut(&key) {
                Some(slot) if *slot > 1 => *slot -= 1,
                Some(_) => {
                    self.counts.remove(&key);
                }
                None => {}
            }
        }
        undone
    }

    /// Clears the undo list without undoing anything (the interaction ran to
    /// completion, its increments are permanent).
    pub fn commit(&mut self) {
        self.undo.clear();
    }

    pub fn pending_rollback(&self) -> usize {
        self.undo.len()
    }

    pub fn counts(&self) -> &BTreeMap<String, u32> {
        &self.counts
    }

    pub fn restore_counts(&mut self, counts: BTreeMap<String, u32>) {
        self.counts = counts;
        self.undo.clear();
    }
}
