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

//! Statistics Store
//!
//! Owns the shard cache, the dirty set and the recency clock behind a single
//! lock, and exposes the read/write/save API used by ranking code.
//!
//! # Threading
//!
//! Reads may come from any thread. Mutations (`increment_use`, `save`) are
//! only valid on the thread that created the store; calling them elsewhere
//! is a programming error and panics.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::cache::{CacheStats, ShardCache};
use super::clock::RecencyClock;
use super::notify::{LogSink, SaveFailureSink, SaveReport};
use crate::codec;
use crate::info::StatisticsInfo;
use crate::router::{ShardId, shard_of};
use crate::storage::{ConfigError, SaveError, StoreConfig, StoreLayout};
use crate::unit::StatisticsUnit;

/// Everything guarded by the store lock
#[derive(Debug)]
struct StoreState {
    cache: ShardCache,
    clock: RecencyClock,
}

/// Sharded, cached and persisted usage counters
pub struct StatisticsStore {
    config: StoreConfig,
    layout: StoreLayout,
    owner: ThreadId,
    /// Number of live `TestRecordingGuard`s
    recording: AtomicUsize,
    sink: Arc<dyn SaveFailureSink>,
    state: Mutex<StoreState>,
}

impl StatisticsStore {
    /// Opens a store reporting save failures through the log.
    ///
    /// The calling thread becomes the owner thread.
    pub fn new(config: StoreConfig) -> Result<Self, ConfigError> {
        Self::with_failure_sink(config, Arc::new(LogSink))
    }

    /// Opens a store reporting save failures to `sink`.
    ///
    /// The calling thread becomes the owner thread.
    pub fn with_failure_sink(config: StoreConfig, sink: Arc<dyn SaveFailureSink>) -> Result<Self, ConfigError> {
        config.validate()?;

        let layout = StoreLayout::new(&config);
        let clock = if config.test_mode { RecencyClock::new() } else { restore_clock(&layout) };
        info!(
            stat_dir = %layout.stat_dir().display(),
            test_mode = config.test_mode,
            next_stamp = clock.peek(),
            "Opened usage statistics store"
        );

        Ok(Self {
            state: Mutex::new(StoreState {
                cache: ShardCache::new(config.max_resident_shards),
                clock,
            }),
            config,
            layout,
            owner: thread::current().id(),
            recording: AtomicUsize::new(0),
            sink,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// How often `info` was used: the maximum count over its conjuncts
    pub fn get_use_count(&self, info: &StatisticsInfo) -> u32 {
        if info.is_empty() {
            return 0;
        }

        let mut state = self.state.lock();
        let StoreState { cache, clock } = &mut *state;
        info.conjuncts()
            .map(|conjunct| self.unit(cache, clock, shard_of(conjunct.context())).count(conjunct.context(), conjunct.value()))
            .max()
            .unwrap_or(0)
    }

    /// How recently `info` was used: the minimum stamp over its conjuncts,
    /// 0 if any conjunct was never used
    pub fn get_last_use_recency(&self, info: &StatisticsInfo) -> u64 {
        if info.is_empty() {
            return 0;
        }

        let mut state = self.state.lock();
        let StoreState { cache, clock } = &mut *state;
        info.conjuncts()
            .map(|conjunct| self.unit(cache, clock, shard_of(conjunct.context())).recency(conjunct.context(), conjunct.value()))
            .min()
            .unwrap_or(0)
    }

    /// Records one use of every conjunct of `info`.
    ///
    /// # Panics
    ///
    /// Panics when called from a thread other than the owner thread.
    pub fn increment_use(&self, info: &StatisticsInfo) {
        if info.is_empty() {
            return;
        }
        if self.config.test_mode && self.recording.load(Ordering::Acquire) == 0 {
            debug!(info = %info, "Ignoring use outside of test recording");
            return;
        }

        self.assert_owner_thread("increment_use");

        let mut state = self.state.lock();
        let StoreState { cache, clock } = &mut *state;
        for conjunct in info.conjuncts() {
            let shard = shard_of(conjunct.context());
            let unit = self.unit(cache, clock, shard);
            let stamp = clock.next_stamp();
            unit.increment(conjunct.context(), conjunct.value(), stamp);
            cache.mark_dirty(shard);
        }
    }

    /// Every value recorded under `context`, sorted by value
    pub fn get_all_values(&self, context: &str) -> Vec<StatisticsInfo> {
        let mut values: Vec<String> = {
            let mut state = self.state.lock();
            let StoreState { cache, clock } = &mut *state;
            self.unit(cache, clock, shard_of(context)).keys_for(context).into_iter().collect()
        };
        values.sort();
        values.into_iter().map(|value| StatisticsInfo::new(context, value)).collect()
    }

    /// Writes every dirty shard to disk.
    ///
    /// Failures are reported to the sink and listed in the report; the
    /// affected shards stay dirty so the next save retries them. If the
    /// statistics folder can't be created nothing is written at all.
    ///
    /// # Panics
    ///
    /// Panics when called from a thread other than the owner thread.
    pub fn save(&self) -> SaveReport {
        self.assert_owner_thread("save");

        let report = {
            let mut state = self.state.lock();
            if self.config.test_mode {
                state.cache.clear_dirty();
                return SaveReport::default();
            }
            self.flush_dirty(&mut state)
        };

        for failure in &report.failures {
            self.sink.notify(failure);
        }
        report
    }

    /// Turns recording on for a test harness host until the guard is dropped.
    ///
    /// Guards nest: recording stays on until the last live guard is dropped.
    /// Outside test mode increments are always recorded and the guard has no
    /// effect.
    pub fn enable_test_recording(&self) -> TestRecordingGuard<'_> {
        let _state = self.state.lock();
        let active = self.recording.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(active, "Enabled test recording of usage statistics");
        TestRecordingGuard { store: self }
    }

    /// Drops every clean unit from memory, returning how many were evicted
    pub fn trim_cache(&self) -> usize {
        let evicted = self.state.lock().cache.trim();
        debug!(evicted, "Trimmed usage statistics cache");
        evicted
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.state.lock().cache.stats()
    }

    /// Number of shards with unsaved mutations
    pub fn dirty_shard_count(&self) -> usize {
        self.state.lock().cache.dirty_shards().len()
    }

    fn flush_dirty(&self, state: &mut StoreState) -> SaveReport {
        let mut report = SaveReport::default();

        let dirty = state.cache.dirty_shards();
        if dirty.is_empty() {
            return report;
        }

        if let Err(source) = self.layout.ensure_stat_dir() {
            report.failures.push(SaveError::CreateDir {
                path: self.layout.stat_dir().to_path_buf(),
                source,
            });
            return report;
        }

        for shard in dirty {
            let Some(unit) = state.cache.get(shard) else {
                // Dirty units are pinned, so this means the invariant broke
                warn!(shard = %shard, "Dirty statistics unit is not resident");
                state.cache.mark_clean(shard);
                continue;
            };

            match codec::write_unit(&self.layout.unit_path(shard), unit) {
                Ok(()) => {
                    state.cache.mark_clean(shard);
                    report.saved.push(shard);
                }
                Err(source) => report.failures.push(SaveError::WriteUnit { shard, source }),
            }
        }

        if !report.saved.is_empty() {
            if let Err(source) = codec::write_sequence(&self.layout.sequence_path(), state.clock.peek()) {
                report.failures.push(SaveError::WriteSequence { source });
            }
        }

        state.cache.enforce_capacity();
        info!(saved = report.saved.len(), failed = report.failures.len(), "Saved usage statistics");
        report
    }

    fn unit<'a>(&self, cache: &'a mut ShardCache, clock: &mut RecencyClock, shard: ShardId) -> &'a mut StatisticsUnit {
        cache.get_or_load(shard, || self.load_unit(shard, clock))
    }

    /// Loads a unit from disk. Any fault yields an empty unit.
    fn load_unit(&self, shard: ShardId, clock: &mut RecencyClock) -> StatisticsUnit {
        if self.config.test_mode {
            return StatisticsUnit::new(shard);
        }

        let path = self.layout.unit_path(shard);
        match codec::read_unit(&path, shard) {
            Ok(unit) => {
                clock.observe(unit.max_recency());
                debug!(shard = %shard, entries = unit.len(), "Loaded statistics unit");
                unit
            }
            Err(e) if e.is_not_found() => StatisticsUnit::new(shard),
            Err(e) => {
                warn!(shard = %shard, path = %path.display(), error = %e, "Discarding unreadable statistics unit");
                StatisticsUnit::new(shard)
            }
        }
    }

    fn assert_owner_thread(&self, operation: &str) {
        let current = thread::current();
        assert!(
            current.id() == self.owner,
            "{} must be called on the thread that created the statistics store ({:?}), not on {:?} ({})",
            operation,
            self.owner,
            current.id(),
            current.name().unwrap_or("unnamed")
        );
    }
}

impl fmt::Debug for StatisticsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatisticsStore")
            .field("config", &self.config)
            .field("owner", &self.owner)
            .field("recording", &self.recording.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Reads the persisted clock, falling back to the stamps found in the shard
/// files when the sequence file is unusable
fn restore_clock(layout: &StoreLayout) -> RecencyClock {
    let error = match codec::read_sequence(&layout.sequence_path()) {
        Ok(next) => return RecencyClock::starting_at(next),
        Err(e) if e.is_not_found() => None,
        Err(e) => Some(e),
    };

    let mut clock = RecencyClock::new();
    let Ok(shards) = layout.persisted_shards() else {
        return clock;
    };
    if shards.is_empty() {
        return clock;
    }

    if let Some(e) = error {
        warn!(error = %e, "Recency sequence unreadable, rebuilding it from shard files");
    }
    for shard in shards {
        if let Ok(unit) = codec::read_unit(&layout.unit_path(shard), shard) {
            clock.observe(unit.max_recency());
        }
    }
    clock
}

/// Keeps test recording enabled while alive.
///
/// Dropping the last live guard of a test mode store, including during
/// unwinding, resets every cache slot and the dirty set and turns recording
/// off again. Stores outside test mode keep their state.
#[must_use = "test recording stops as soon as the guard is dropped"]
pub struct TestRecordingGuard<'a> {
    store: &'a StatisticsStore,
}

impl Drop for TestRecordingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.store.state.lock();
        let active = self.store.recording.fetch_sub(1, Ordering::AcqRel) - 1;
        if active > 0 {
            debug!(active, "Left nested test recording scope");
            return;
        }
        if self.store.config.test_mode {
            state.cache.clear();
        }
        debug!("Disabled test recording of usage statistics");
    }
}
