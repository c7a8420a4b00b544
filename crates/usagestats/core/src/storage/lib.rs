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

// Common types for statistics persistence: configuration and error taxonomy

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::router::{SHARD_COUNT, ShardId};

/// Store configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory; shard files live under `<root>/<stat_dir>`
    pub root: PathBuf,
    /// Name of the directory holding the shard files
    pub stat_dir: String,
    /// Maximum number of clean units kept in memory. Dirty units are never
    /// evicted, so the resident count may exceed this while saves are pending.
    pub max_resident_shards: usize,
    /// The host is running under a test harness. Increments are ignored
    /// unless test recording is enabled, shard files are neither read nor
    /// written.
    pub test_mode: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data"),
            stat_dir: "stat".to_string(),
            max_resident_shards: SHARD_COUNT,
            test_mode: false,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Checks the configuration for values the store cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resident_shards == 0 {
            return Err(ConfigError::Invalid("max_resident_shards must be at least 1".to_string()));
        }
        if self.stat_dir.is_empty() {
            return Err(ConfigError::Invalid("stat_dir must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Structural problems in a serialized unit or sequence file
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Bad magic number")]
    BadMagic,

    #[error("Unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("Shard mismatch: expected {expected}, found {found}")]
    ShardMismatch { expected: u16, found: u16 },

    #[error("Truncated data: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Checksum mismatch: expected {expected:#010x}, actual {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Errors reading or writing persisted statistics
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),
}

impl CodecError {
    /// The file simply does not exist yet
    pub fn is_not_found(&self) -> bool {
        matches!(self, CodecError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

/// Result type for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Failures during a save cycle. These are reported, never returned as `Err`.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("Failed to create statistics folder {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to save statistics shard {shard}: {source}")]
    WriteUnit {
        shard: ShardId,
        #[source]
        source: CodecError,
    },

    #[error("Failed to save recency sequence: {source}")]
    WriteSequence {
        #[source]
        source: CodecError,
    },
}
