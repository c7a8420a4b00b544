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

//! Shard routing
//!
//! Maps a context string to one of [`SHARD_COUNT`] shards. The mapping is
//! persisted implicitly through the shard file names, so the hash must stay
//! the same across processes and toolchains. CRC-32 (IEEE) is used for that
//! reason; `std`'s `DefaultHasher` gives no such guarantee.
//!
//! Changing the hash orphans every existing shard file.

use std::fmt;

/// Number of shards. Fixed for the lifetime of the on-disk format.
pub const SHARD_COUNT: usize = 997;

/// Index of a shard, always in `[0, SHARD_COUNT)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(u16);

impl ShardId {
    /// Creates a shard id, or `None` when `id` is out of range
    pub fn new(id: usize) -> Option<Self> {
        if id < SHARD_COUNT { Some(Self(id as u16)) } else { None }
    }

    /// Returns the raw shard index
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Returns the shard index as a slot position
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Iterates over every shard id in ascending order
    pub fn all() -> impl Iterator<Item = ShardId> {
        (0..SHARD_COUNT as u16).map(ShardId)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the shard owning `context`: `abs(hash(context) % SHARD_COUNT)`
pub fn shard_of(context: &str) -> ShardId {
    let hash = crc32fast::hash(context.as_bytes()) as i32;
    ShardId((hash % SHARD_COUNT as i32).unsigned_abs() as u16)
}
