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

/// Shard codec
///
/// Layers a reversible byte transform over the serialized form of a unit
/// and moves the result to and from disk:
/// - Scrambling of every persisted byte
/// - Atomic replacement of shard files
/// - The persisted recency sequence
pub mod scramble;
pub mod shard_file;

pub use scramble::Scrambler;
pub use shard_file::{read_sequence, read_unit, write_sequence, write_unit};
