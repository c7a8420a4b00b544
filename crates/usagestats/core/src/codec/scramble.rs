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

/// Fixed key stream mixed into every byte. Obfuscation only, not a secret.
const SCRAMBLE_KEY: [u8; 16] = [0xA5, 0x3C, 0x96, 0x0F, 0x5A, 0xC3, 0x69, 0xF0, 0x1E, 0xE1, 0x2D, 0xD2, 0x4B, 0xB4, 0x78, 0x87];
/// Bit rotation applied after the key is mixed in
const ROTATION: u32 = 3;

/// Stateless, invertible byte transform applied to persisted statistics so
/// the files are not plain text.
///
/// Byte `i` becomes `(b ^ KEY[i % 16]).rotate_left(3)`; the inverse rotates
/// back and mixes the same key byte in again.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scrambler;

impl Scrambler {
    pub fn new() -> Self {
        Self
    }

    /// Scrambles `data` in place
    pub fn scramble(&self, data: &mut [u8]) {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (*byte ^ SCRAMBLE_KEY[i % SCRAMBLE_KEY.len()]).rotate_left(ROTATION);
        }
    }

    /// Reverses [`scramble`](Self::scramble) in place
    pub fn unscramble(&self, data: &mut [u8]) {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = byte.rotate_right(ROTATION) ^ SCRAMBLE_KEY[i % SCRAMBLE_KEY.len()];
        }
    }
}
