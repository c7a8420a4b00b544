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

/// Store-wide source of recency stamps.
///
/// Stamps start at 1 so that 0 can mean "never used".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyClock {
    next: u64,
}

impl Default for RecencyClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RecencyClock {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Resumes a clock whose next stamp is `next`
    pub fn starting_at(next: u64) -> Self {
        Self { next: next.max(1) }
    }

    /// Returns the current stamp and advances the clock
    pub fn next_stamp(&mut self) -> u64 {
        let stamp = self.next;
        self.next = self.next.saturating_add(1);
        stamp
    }

    /// Moves the clock past a stamp found in persisted data
    pub fn observe(&mut self, stamp: u64) {
        if stamp >= self.next {
            self.next = stamp.saturating_add(1);
        }
    }

    /// The stamp the next use will receive
    pub fn peek(&self) -> u64 {
        self.next
    }
}
