//! Tick-ordered notification cache with approximate size accounting.

use std::collections::btree_map;
use std::collections::BTreeMap;

use tidings_core::{Notification, Tick};

/// Fixed per-entry overhead added to the payload length when estimating an
/// entry's footprint. The estimate only drives the eviction threshold.
pub const ENTRY_OVERHEAD_BYTES: u64 = 150;

/// Estimated footprint of one cached notification.
pub fn estimated_size(notification: &Notification) -> u64 {
    notification.payload_len() as u64 + ENTRY_OVERHEAD_BYTES
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Estimated size of the cached entries in bytes.
    pub tracked_bytes: u64,
    /// Entries removed by the size budget.
    pub evictions: u64,
    /// Full clears after a store failure.
    pub flushes: u64,
}

/// In-memory map from tick to notification, ordered by tick.
///
/// Entries are write-once: inserting an already cached tick is a no-op.
/// Removal happens only through [`evict_oldest`](Self::evict_oldest) or
/// [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct TickCache {
    entries: BTreeMap<Tick, Notification>,
    tracked_bytes: u64,
    evictions: u64,
    flushes: u64,
}

impl TickCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a notification under its `create_tick`.
    ///
    /// Returns `false` (and leaves size accounting untouched) when the tick
    /// is already cached.
    pub fn insert(&mut self, notification: Notification) -> bool {
        match self.entries.entry(notification.create_tick) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(slot) => {
                self.tracked_bytes += estimated_size(&notification);
                slot.insert(notification);
                true
            }
        }
    }

    /// Insert many notifications, returning how many were new.
    pub fn extend<I>(&mut self, notifications: I) -> usize
    where
        I: IntoIterator<Item = Notification>,
    {
        notifications
            .into_iter()
            .map(|n| self.insert(n))
            .filter(|inserted| *inserted)
            .count()
    }

    pub fn earliest_tick(&self) -> Option<Tick> {
        self.entries.keys().next().copied()
    }

    pub fn latest_tick(&self) -> Option<Tick> {
        self.entries.keys().next_back().copied()
    }

    pub fn contains(&self, tick: Tick) -> bool {
        self.entries.contains_key(&tick)
    }

    /// Ascending iteration over all entries.
    pub fn iter(&self) -> btree_map::Values<'_, Tick, Notification> {
        self.entries.values()
    }

    /// Ascending iteration over entries with `tick >= from`.
    pub fn iter_from(&self, from: Tick) -> btree_map::Range<'_, Tick, Notification> {
        self.entries.range(from..)
    }

    /// Evict oldest entries until the tracked size is at most `target_bytes`.
    /// Returns the number of entries evicted.
    pub fn evict_oldest(&mut self, target_bytes: u64) -> usize {
        let mut evicted = 0;
        while self.tracked_bytes > target_bytes {
            let Some((_, oldest)) = self.entries.pop_first() else {
                break;
            };
            self.tracked_bytes = self.tracked_bytes.saturating_sub(estimated_size(&oldest));
            evicted += 1;
        }
        self.evictions += evicted as u64;
        evicted
    }

    /// Drop every entry and reset the size counter.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.tracked_bytes = 0;
        self.flushes += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tracked_bytes(&self) -> u64 {
        self.tracked_bytes
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len() as u64,
            tracked_bytes: self.tracked_bytes,
            evictions: self.evictions,
            flushes: self.flushes,
        }
    }
}
