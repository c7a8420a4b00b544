// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::collections::BTreeSet;

use tracing::debug;

use crate::router::{SHARD_COUNT, ShardId};
use crate::unit::StatisticsUnit;

/// Statistics about shard cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served by a resident unit
    pub hits: u64,
    /// Lookups that had to load or create a unit
    pub misses: u64,
    /// Clean units dropped to make room or on trim
    pub evictions: u64,
    /// Units currently in memory
    pub resident: usize,
    /// Units with unsaved mutations
    pub dirty: usize,
}

/// A unit held by a cache slot
#[derive(Debug)]
struct Resident {
    unit: StatisticsUnit,
    last_access: u64, // Cache tick of the most recent lookup
}

/// One slot per shard plus the dirty set.
///
/// Clean units are evicted least recently used first once more than
/// `capacity` are resident. Dirty units are pinned: eviction, trimming and
/// capacity pressure never touch them, so unsaved mutations cannot be lost.
#[derive(Debug)]
pub struct ShardCache {
    slots: Vec<Option<Resident>>,
    dirty: BTreeSet<ShardId>,
    capacity: usize,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ShardCache {
    /// Creates an empty cache keeping at most `capacity` clean units
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..SHARD_COUNT).map(|_| None).collect(),
            dirty: BTreeSet::new(),
            capacity: capacity.max(1),
            tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Returns the resident unit of `shard` without touching its access time
    pub fn get(&self, shard: ShardId) -> Option<&StatisticsUnit> {
        self.slots[shard.index()].as_ref().map(|r| &r.unit)
    }

    #[cfg(test)]
    fn contains(&self, shard: ShardId) -> bool {
        self.slots[shard.index()].is_some()
    }

    /// Returns the unit of `shard`, calling `load` to produce it on a miss
    pub fn get_or_load<F>(&mut self, shard: ShardId, load: F) -> &mut StatisticsUnit
    where
        F: FnOnce() -> StatisticsUnit,
    {
        self.tick += 1;
        let tick = self.tick;

        let resident = match self.slots[shard.index()].take() {
            Some(resident) => {
                self.hits += 1;
                resident
            }
            None => {
                self.misses += 1;
                // The slot is empty here, so `shard` can't be picked as victim
                self.evict_to(self.capacity.saturating_sub(1));
                Resident { unit: load(), last_access: tick }
            }
        };

        let resident = self.slots[shard.index()].insert(resident);
        resident.last_access = tick;
        &mut resident.unit
    }

    /// Pins `shard` until it is marked clean
    pub fn mark_dirty(&mut self, shard: ShardId) {
        self.dirty.insert(shard);
    }

    /// Unpins `shard` after its unit was persisted
    pub fn mark_clean(&mut self, shard: ShardId) {
        self.dirty.remove(&shard);
    }

    pub fn is_dirty(&self, shard: ShardId) -> bool {
        self.dirty.contains(&shard)
    }

    /// Dirty shards in ascending order
    pub fn dirty_shards(&self) -> Vec<ShardId> {
        self.dirty.iter().copied().collect()
    }

    /// Forgets every pending mutation without persisting it
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Resets every slot and the dirty set
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.dirty.clear();
    }

    /// Evicts clean units until no more than `capacity` are resident
    pub fn enforce_capacity(&mut self) -> usize {
        self.evict_to(self.capacity)
    }

    /// Evicts every clean unit, returning how many were dropped
    pub fn trim(&mut self) -> usize {
        self.evict_to(0)
    }

    pub fn resident_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            resident: self.resident_count(),
            dirty: self.dirty.len(),
        }
    }

    /// Evicts least recently used clean units until at most `target` units
    /// are resident or only dirty units are left
    fn evict_to(&mut self, target: usize) -> usize {
        let mut evicted = 0;
        let mut resident = self.resident_count();

        while resident > target {
            let victim = ShardId::all()
                .zip(&self.slots)
                .filter(|(shard, _)| !self.is_dirty(*shard))
                .filter_map(|(shard, slot)| slot.as_ref().map(|r| (shard, r.last_access)))
                .min_by_key(|(_, last_access)| *last_access)
                .map(|(shard, _)| shard);

            let Some(shard) = victim else {
                // Everything left is pinned
                break;
            };

            self.slots[shard.index()] = None;
            self.evictions += 1;
            evicted += 1;
            resident -= 1;
            debug!(shard = %shard, "Evicted clean statistics unit");
        }

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard(id: usize) -> ShardId {
        ShardId::new(id).unwrap()
    }

    fn load_empty(id: usize) -> impl FnOnce() -> StatisticsUnit {
        move || StatisticsUnit::new(shard(id))
    }

    #[test]
    fn test_miss_then_hit() {
        let mut cache = ShardCache::new(8);
        let mut loads = 0;

        cache.get_or_load(shard(1), || {
            loads += 1;
            StatisticsUnit::new(shard(1))
        });
        cache.get_or_load(shard(1), || {
            loads += 1;
            StatisticsUnit::new(shard(1))
        });

        assert_eq!(loads, 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.resident, 1);
    }

    #[test]
    fn test_mutations_stay_resident() {
        let mut cache = ShardCache::new(8);
        cache.get_or_load(shard(3), load_empty(3)).increment("ctx", "v", 1);
        assert_eq!(cache.get(shard(3)).unwrap().count("ctx", "v"), 1);
    }

    #[test]
    fn test_lru_eviction_of_clean_units() {
        let mut cache = ShardCache::new(2);
        cache.get_or_load(shard(1), load_empty(1));
        cache.get_or_load(shard(2), load_empty(2));
        // Touch 1 so that 2 becomes the least recently used
        cache.get_or_load(shard(1), load_empty(1));
        cache.get_or_load(shard(3), load_empty(3));

        assert!(cache.contains(shard(1)));
        assert!(!cache.contains(shard(2)));
        assert!(cache.contains(shard(3)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_dirty_units_are_pinned() {
        let mut cache = ShardCache::new(1);
        cache.get_or_load(shard(1), load_empty(1)).increment("ctx", "v", 1);
        cache.mark_dirty(shard(1));

        cache.get_or_load(shard(2), load_empty(2));
        assert!(cache.contains(shard(1)));
        assert!(cache.contains(shard(2)));
        assert_eq!(cache.resident_count(), 2);

        assert_eq!(cache.trim(), 1);
        assert!(cache.contains(shard(1)));
        assert!(!cache.contains(shard(2)));

        cache.mark_clean(shard(1));
        assert_eq!(cache.trim(), 1);
        assert_eq!(cache.resident_count(), 0);
    }

    #[test]
    fn test_enforce_capacity_after_clean() {
        let mut cache = ShardCache::new(1);
        for id in 1..=3 {
            cache.get_or_load(shard(id), load_empty(id));
            cache.mark_dirty(shard(id));
        }
        assert_eq!(cache.resident_count(), 3);

        for id in 1..=3 {
            cache.mark_clean(shard(id));
        }
        assert_eq!(cache.enforce_capacity(), 2);
        assert_eq!(cache.resident_count(), 1);
    }

    #[test]
    fn test_dirty_shards_sorted() {
        let mut cache = ShardCache::new(8);
        for id in [9, 2, 5] {
            cache.mark_dirty(shard(id));
        }
        assert_eq!(cache.dirty_shards(), vec![shard(2), shard(5), shard(9)]);
        assert!(cache.is_dirty(shard(5)));

        cache.clear_dirty();
        assert!(cache.dirty_shards().is_empty());
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut cache = ShardCache::new(8);
        cache.get_or_load(shard(1), load_empty(1));
        cache.mark_dirty(shard(1));

        cache.clear();
        assert_eq!(cache.resident_count(), 0);
        assert!(!cache.is_dirty(shard(1)));
    }
}
