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

//! Statistics unit
//!
//! The in-memory counter table of one shard together with its binary form.
//! A unit does no I/O; reading and writing files is the codec's job.
//!
//! Binary layout (all integers little endian):
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | magic `USTU` |
//! | 4 | 4 | format version |
//! | 8 | 2 | shard id |
//! | 10 | 4 | payload length |
//! | 14 | 4 | CRC-32 of payload |
//! | 18 | n | bincode payload: context -> value -> record |

use std::collections::{HashMap, HashSet};

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::router::ShardId;
use crate::storage::FormatError;

/// Magic number identifying a unit (USTU)
const UNIT_MAGIC: [u8; 4] = [0x55, 0x53, 0x54, 0x55];
/// Current format version
const FORMAT_VERSION: u32 = 1;
/// Size of the unit header in bytes
const HEADER_SIZE: usize = 18;
/// Upper bound on a payload, also the bincode decode limit
const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Usage of one (context, value) pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Number of recorded uses
    pub count: u32,
    /// Stamp of the last use; larger is more recent, 0 means never used
    pub recency: u64,
}

/// Counter table for a single shard
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsUnit {
    shard: ShardId,
    table: HashMap<String, HashMap<String, UsageRecord>>,
}

impl StatisticsUnit {
    /// Creates an empty unit for `shard`
    pub fn new(shard: ShardId) -> Self {
        Self { shard, table: HashMap::new() }
    }

    pub fn shard(&self) -> ShardId {
        self.shard
    }

    /// Returns the record of a pair, if it was ever used
    pub fn record(&self, context: &str, value: &str) -> Option<&UsageRecord> {
        self.table.get(context).and_then(|values| values.get(value))
    }

    /// Use count of a pair, 0 if unseen
    pub fn count(&self, context: &str, value: &str) -> u32 {
        self.record(context, value).map(|r| r.count).unwrap_or(0)
    }

    /// Last use stamp of a pair, 0 if unseen
    pub fn recency(&self, context: &str, value: &str) -> u64 {
        self.record(context, value).map(|r| r.recency).unwrap_or(0)
    }

    /// Records one use of a pair stamped with `stamp`, returning the updated record
    pub fn increment(&mut self, context: &str, value: &str, stamp: u64) -> UsageRecord {
        let record = self.table.entry(context.to_string()).or_default().entry(value.to_string()).or_default();
        record.count = record.count.saturating_add(1);
        record.recency = stamp;
        *record
    }

    /// All values recorded under `context`
    pub fn keys_for(&self, context: &str) -> HashSet<String> {
        self.table.get(context).map(|values| values.keys().cloned().collect()).unwrap_or_default()
    }

    /// All contexts with at least one recorded value
    pub fn contexts(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Number of recorded (context, value) pairs
    pub fn len(&self) -> usize {
        self.table.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Largest stamp in the table, 0 for an empty unit
    pub fn max_recency(&self) -> u64 {
        self.table.values().flat_map(HashMap::values).map(|r| r.recency).max().unwrap_or(0)
    }

    /// Serializes the full table
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        let config = bincode::config::standard().with_limit::<MAX_PAYLOAD_SIZE>();
        let payload = bincode::serde::encode_to_vec(&self.table, config).map_err(|e| FormatError::Encode(e.to_string()))?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(FormatError::Encode(format!("payload of {} bytes exceeds the {} byte limit", payload.len(), MAX_PAYLOAD_SIZE)));
        }

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&UNIT_MAGIC);
        LittleEndian::write_u32(&mut header[4..8], FORMAT_VERSION);
        LittleEndian::write_u16(&mut header[8..10], self.shard.value());
        LittleEndian::write_u32(&mut header[10..14], payload.len() as u32);
        LittleEndian::write_u32(&mut header[14..18], crc32fast::hash(&payload));

        let mut buffer = Vec::with_capacity(HEADER_SIZE + payload.len());
        buffer.extend_from_slice(&header);
        buffer.extend_from_slice(&payload);
        Ok(buffer)
    }

    /// Reconstructs a unit from bytes produced by [`encode`](Self::encode)
    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        if data.len() < HEADER_SIZE {
            return Err(FormatError::Truncated {
                needed: HEADER_SIZE,
                available: data.len(),
            });
        }

        if data[0..4] != UNIT_MAGIC {
            return Err(FormatError::BadMagic);
        }

        let version = LittleEndian::read_u32(&data[4..8]);
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let raw_shard = LittleEndian::read_u16(&data[8..10]);
        let shard = ShardId::new(raw_shard as usize).ok_or_else(|| FormatError::Malformed(format!("shard id {} out of range", raw_shard)))?;

        let payload_len = LittleEndian::read_u32(&data[10..14]) as usize;
        let expected_checksum = LittleEndian::read_u32(&data[14..18]);

        let payload = &data[HEADER_SIZE..];
        if payload.len() < payload_len {
            return Err(FormatError::Truncated {
                needed: HEADER_SIZE + payload_len,
                available: data.len(),
            });
        }
        if payload.len() > payload_len {
            return Err(FormatError::Malformed(format!("{} trailing bytes", payload.len() - payload_len)));
        }

        let actual_checksum = crc32fast::hash(payload);
        if actual_checksum != expected_checksum {
            return Err(FormatError::ChecksumMismatch {
                expected: expected_checksum,
                actual: actual_checksum,
            });
        }

        let config = bincode::config::standard().with_limit::<MAX_PAYLOAD_SIZE>();
        let (table, consumed): (HashMap<String, HashMap<String, UsageRecord>>, usize) =
            bincode::serde::decode_from_slice(payload, config).map_err(|e| FormatError::Malformed(e.to_string()))?;
        if consumed != payload.len() {
            return Err(FormatError::Malformed(format!("payload decoded {} of {} bytes", consumed, payload.len())));
        }

        Ok(Self { shard, table })
    }
}
