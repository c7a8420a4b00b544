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

//! Usage Statistics Store
//!
//! Records how often and how recently a candidate value was chosen inside a
//! context, so that ranking code can prefer previously chosen candidates.
//!
//! # Core Components
//!
//! - [`StatisticsInfo`]: an immutable (context, value) pair, possibly composite
//! - [`router`]: deterministic mapping from a context to one of 997 shards
//! - [`StatisticsUnit`]: the in-memory counter table of one shard
//! - [`codec`]: scrambled, checksummed on-disk form of a unit
//! - [`StatisticsStore`]: the shard cache, dirty tracking and public API
//!
//! # Usage
//!
//! ```rust
//! use usagestats_core::{StatisticsInfo, StatisticsStore, StoreConfig};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = StatisticsStore::new(StoreConfig::with_root(dir.path())).unwrap();
//!
//! let info = StatisticsInfo::new("completion:call", "println");
//! store.increment_use(&info);
//! store.increment_use(&info);
//! assert_eq!(store.get_use_count(&info), 2);
//!
//! let report = store.save();
//! assert!(report.is_success());
//! ```

pub mod codec;
pub mod info;
pub mod router;
pub mod storage;
pub mod store;
pub mod unit;

pub use info::StatisticsInfo;
pub use router::{SHARD_COUNT, ShardId, shard_of};
pub use storage::{CodecError, ConfigError, FormatError, SaveError, StoreConfig, StoreLayout};
pub use store::{CacheStats, LogSink, SaveFailureSink, SaveReport, StatisticsStore, TestRecordingGuard};
pub use unit::{StatisticsUnit, UsageRecord};
