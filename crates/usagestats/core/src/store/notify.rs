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

// Save failure reporting
// Save cycles never fail with an error. Every failure is handed to a
// `SaveFailureSink` so the host can surface it, and collected in the
// returned `SaveReport`.

use tracing::error;

use crate::router::ShardId;
use crate::storage::SaveError;

/// Receives save failures so they can be shown to the user.
///
/// Called after the store lock is released; implementations may call back
/// into the store.
pub trait SaveFailureSink: Send + Sync {
    fn notify(&self, failure: &SaveError);
}

/// Default sink: logs every failure at error level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl SaveFailureSink for LogSink {
    fn notify(&self, failure: &SaveError) {
        error!(error = %failure, "Failed to save usage statistics");
    }
}

/// Outcome of a save cycle
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Shards written to disk and no longer dirty
    pub saved: Vec<ShardId>,
    /// Failures; the affected shards stay dirty for the next save
    pub failures: Vec<SaveError>,
}

impl SaveReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
