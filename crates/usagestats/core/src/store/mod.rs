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

/// Statistics store
///
/// - Shard cache with dirty pinning and LRU eviction of clean units
/// - Store-wide recency clock
/// - Save failure reporting
/// - The store itself and its test recording scope
pub mod cache; // Shard slots and dirty set
pub mod clock; // Recency stamps
pub mod manager; // Public read/write/save API
pub mod notify; // Save failure sinks and reports

// Re-export main components for easier access
pub use cache::{CacheStats, ShardCache};
pub use clock::RecencyClock;
pub use manager::{StatisticsStore, TestRecordingGuard};
pub use notify::{LogSink, SaveFailureSink, SaveReport};
