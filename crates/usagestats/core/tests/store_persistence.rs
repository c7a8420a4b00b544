// Persistence scenarios for the usage statistics store
use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::tempdir;
use usagestats_core::{SaveError, SaveFailureSink, StatisticsInfo, StatisticsStore, StoreConfig, shard_of};

/// Sink remembering every reported failure
#[derive(Default)]
struct RecordingSink {
    failures: Mutex<Vec<String>>,
}

impl SaveFailureSink for RecordingSink {
    fn notify(&self, failure: &SaveError) {
        self.failures.lock().push(failure.to_string());
    }
}

#[test]
fn test_round_trip_through_fresh_store() {
    let dir = tempdir().unwrap();
    let pairs = [("ctxA", "v1", 1), ("ctxA", "v2", 3), ("ctxB", "v1", 2), ("other context", "x", 4)];

    let mut expected = Vec::new();
    {
        let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
        for (context, value, times) in pairs {
            let info = StatisticsInfo::new(context, value);
            for _ in 0..times {
                store.increment_use(&info);
            }
        }
        for (context, value, _) in pairs {
            let info = StatisticsInfo::new(context, value);
            expected.push((info.clone(), store.get_use_count(&info), store.get_last_use_recency(&info)));
        }
        assert!(store.save().is_success());
    }

    let reopened = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
    for (info, count, recency) in expected {
        assert_eq!(reopened.get_use_count(&info), count, "count of {}", info);
        assert_eq!(reopened.get_last_use_recency(&info), recency, "recency of {}", info);
    }

    let values: Vec<String> = reopened.get_all_values("ctxA").iter().map(|i| i.value().to_string()).collect();
    assert_eq!(values, vec!["v1", "v2"]);
}

#[test]
fn test_unsaved_changes_are_not_persisted() {
    let dir = tempdir().unwrap();
    let info = StatisticsInfo::new("ctx", "value");
    {
        let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
        store.increment_use(&info);
        store.save();
        store.increment_use(&info);
    }

    let reopened = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
    assert_eq!(reopened.get_use_count(&info), 1);
}

#[test]
fn test_recency_keeps_increasing_after_restart() {
    let dir = tempdir().unwrap();
    let old = StatisticsInfo::new("first", "a");
    let old_recency = {
        let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
        for _ in 0..10 {
            store.increment_use(&old);
        }
        store.save();
        store.get_last_use_recency(&old)
    };

    // A context on another shard, so its unit is never loaded before the stamp is issued
    let new = (0..100)
        .map(|i| StatisticsInfo::new(format!("second-{}", i), "b"))
        .find(|info| shard_of(info.context()) != shard_of(old.context()))
        .unwrap();

    let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
    store.increment_use(&new);
    assert!(store.get_last_use_recency(&new) > old_recency);
}

#[test]
fn test_missing_sequence_is_rebuilt_from_units() {
    let dir = tempdir().unwrap();
    let old = StatisticsInfo::new("first", "a");
    let old_recency = {
        let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
        for _ in 0..5 {
            store.increment_use(&old);
        }
        store.save();
        store.get_last_use_recency(&old)
    };
    fs::write(dir.path().join("stat").join("sequence"), b"garbage").unwrap();

    let new = (0..100)
        .map(|i| StatisticsInfo::new(format!("second-{}", i), "b"))
        .find(|info| shard_of(info.context()) != shard_of(old.context()))
        .unwrap();

    let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
    store.increment_use(&new);
    assert!(store.get_last_use_recency(&new) > old_recency);
}

#[test]
fn test_corrupt_shard_loads_empty() {
    let dir = tempdir().unwrap();
    let corrupt = StatisticsInfo::new("ctx", "value");
    let intact = (0..100)
        .map(|i| StatisticsInfo::new(format!("intact-{}", i), "v"))
        .find(|info| shard_of(info.context()) != shard_of(corrupt.context()))
        .unwrap();
    {
        let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
        store.increment_use(&corrupt);
        store.increment_use(&intact);
        store.save();
    }

    let unit_path = dir.path().join("stat").join(format!("unit.{}", shard_of("ctx")));
    fs::write(&unit_path, [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x13, 0x37]).unwrap();

    let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
    assert_eq!(store.get_use_count(&corrupt), 0);
    assert_eq!(store.get_last_use_recency(&corrupt), 0);
    assert_eq!(store.get_use_count(&intact), 1);

    // The shard is usable again and overwrites the garbage on save
    store.increment_use(&corrupt);
    assert!(store.save().is_success());
    let reopened = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
    assert_eq!(reopened.get_use_count(&corrupt), 1);
}

#[test]
fn test_folder_creation_failure_keeps_shards_dirty() {
    let dir = tempdir().unwrap();
    // A file where the statistics folder should go
    fs::write(dir.path().join("stat"), b"in the way").unwrap();

    let sink = Arc::new(RecordingSink::default());
    let store = StatisticsStore::with_failure_sink(StoreConfig::with_root(dir.path()), sink.clone()).unwrap();
    let info = StatisticsInfo::new("ctx", "value");
    store.increment_use(&info);

    let report = store.save();
    assert!(report.saved.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0], SaveError::CreateDir { .. }));
    assert_eq!(sink.failures.lock().len(), 1);
    assert_eq!(store.dirty_shard_count(), 1);

    // The next save retries
    fs::remove_file(dir.path().join("stat")).unwrap();
    let report = store.save();
    assert!(report.is_success());
    assert_eq!(store.dirty_shard_count(), 0);
    assert_eq!(sink.failures.lock().len(), 1);
}

#[test]
fn test_unit_write_failure_is_reported() {
    let dir = tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let store = StatisticsStore::with_failure_sink(StoreConfig::with_root(dir.path()), sink.clone()).unwrap();

    let blocked = StatisticsInfo::new("ctx", "value");
    let fine = (0..100)
        .map(|i| StatisticsInfo::new(format!("fine-{}", i), "v"))
        .find(|info| shard_of(info.context()) != shard_of(blocked.context()))
        .unwrap();

    // A directory where the shard file should go
    fs::create_dir_all(dir.path().join("stat").join(format!("unit.{}", shard_of("ctx")))).unwrap();

    store.increment_use(&blocked);
    store.increment_use(&fine);
    let report = store.save();

    assert_eq!(report.saved, vec![shard_of(fine.context())]);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(&report.failures[0], SaveError::WriteUnit { shard, .. } if *shard == shard_of("ctx")));
    assert_eq!(sink.failures.lock().len(), 1);
    assert_eq!(store.dirty_shard_count(), 1);

    // Still readable from memory
    assert_eq!(store.get_use_count(&blocked), 1);
}

#[test]
fn test_test_mode_ignores_existing_files() {
    let dir = tempdir().unwrap();
    let info = StatisticsInfo::new("ctx", "value");
    {
        let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
        store.increment_use(&info);
        store.save();
    }

    let config = StoreConfig {
        test_mode: true,
        ..StoreConfig::with_root(dir.path())
    };
    let store = StatisticsStore::new(config).unwrap();
    assert_eq!(store.get_use_count(&info), 0);

    {
        let _recording = store.enable_test_recording();
        store.increment_use(&info);
        assert_eq!(store.get_use_count(&info), 1);
    }
    assert_eq!(store.get_use_count(&info), 0);

    // The real data is untouched
    let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
    assert_eq!(store.get_use_count(&info), 1);
}
