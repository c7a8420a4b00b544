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

use std::fs;
use std::io::Result;
use std::path::{Path, PathBuf};

use super::lib::StoreConfig;
use crate::router::ShardId;

/// File name prefix of shard files: `unit.<shard>`
const UNIT_FILE_PREFIX: &str = "unit.";
/// File name of the persisted recency sequence
const SEQUENCE_FILE: &str = "sequence";

/// Resolves the on-disk locations used by a store.
///
/// Nothing is created on construction; the statistics directory is created
/// lazily by the first save.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    stat_dir: PathBuf,
}

impl StoreLayout {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            stat_dir: config.root.join(&config.stat_dir),
        }
    }

    /// Returns the directory holding every shard file
    pub fn stat_dir(&self) -> &Path {
        &self.stat_dir
    }

    /// Returns the path of the file backing `shard`
    pub fn unit_path(&self, shard: ShardId) -> PathBuf {
        self.stat_dir.join(format!("{}{}", UNIT_FILE_PREFIX, shard))
    }

    /// Returns the path of the persisted recency sequence
    pub fn sequence_path(&self) -> PathBuf {
        self.stat_dir.join(SEQUENCE_FILE)
    }

    /// Ensures the statistics directory exists, creating it if necessary
    pub fn ensure_stat_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.stat_dir)
    }

    /// Parses a shard id out of a shard file name, `None` for anything else
    pub fn parse_unit_file_name(name: &str) -> Option<ShardId> {
        let id = name.strip_prefix(UNIT_FILE_PREFIX)?;
        // Reject "unit.+1", "unit.007" and friends so names map one to one
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) || (id.len() > 1 && id.starts_with('0')) {
            return None;
        }
        ShardId::new(id.parse().ok()?)
    }

    /// Lists the shards that have a file on disk, in ascending order
    pub fn persisted_shards(&self) -> Result<Vec<ShardId>> {
        let mut shards = Vec::new();

        if !self.stat_dir.exists() {
            return Ok(shards);
        }

        for entry in fs::read_dir(&self.stat_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(shard) = entry.file_name().to_str().and_then(Self::parse_unit_file_name) {
                shards.push(shard);
            }
        }

        shards.sort();
        Ok(shards)
    }
}
