//! Fixed-size slot table.
//!
//! Each slot is an `ArcSwapOption`, so lookups never block and a restart can
//! swap a connection in without a pool-wide lock. Only a slot's own supervisor
//! writes to it. Readers may see the old or the new connection during a swap
//! and must re-check its status before use.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::connection::ServiceConnection;

/// A connection occupying a slot.
pub struct SlotEntry {
    pub connection: Arc<dyn ServiceConnection>,
    /// Incremented on every placement; distinguishes replacements in snapshots.
    pub generation: u64,
}

pub struct SlotTable {
    slots: Box<[ArcSwapOption<SlotEntry>]>,
}

impl SlotTable {
    pub fn new(entries: Vec<Arc<SlotEntry>>) -> Self {
        Self {
            slots: entries
                .into_iter()
                .map(|entry| ArcSwapOption::new(Some(entry)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot of a slot.
    pub fn load(&self, index: usize) -> Option<Arc<SlotEntry>> {
        self.slots.get(index).and_then(|slot| slot.load_full())
    }

    /// Swap a slot's entry, returning the previous one.
    pub fn replace(&self, index: usize, entry: Option<Arc<SlotEntry>>) -> Option<Arc<SlotEntry>> {
        self.slots.get(index).and_then(|slot| slot.swap(entry))
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, Option<Arc<SlotEntry>>)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| (index, slot.load_full()))
    }
}
