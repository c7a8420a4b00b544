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

// Shard file I/O
// Reads and writes scrambled unit files and the recency sequence file. I/O
// failures and format failures are kept apart so the caller can decide how
// to recover from each.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use tempfile::NamedTempFile;

use super::scramble::Scrambler;
use crate::router::ShardId;
use crate::storage::{CodecResult, FormatError};
use crate::unit::StatisticsUnit;

/// Magic number identifying the sequence file (USTQ)
const SEQUENCE_MAGIC: [u8; 4] = [0x55, 0x53, 0x54, 0x51];
/// magic(4) + sequence(8) + checksum(4)
const SEQUENCE_FILE_SIZE: usize = 16;

/// Reads and decodes the unit stored at `path`, which must belong to `expected`
pub fn read_unit(path: &Path, expected: ShardId) -> CodecResult<StatisticsUnit> {
    let mut data = fs::read(path)?;
    Scrambler::new().unscramble(&mut data);

    let unit = StatisticsUnit::decode(&data)?;
    if unit.shard() != expected {
        return Err(FormatError::ShardMismatch {
            expected: expected.value(),
            found: unit.shard().value(),
        }
        .into());
    }
    Ok(unit)
}

/// Encodes `unit` and replaces the file at `path` with it
pub fn write_unit(path: &Path, unit: &StatisticsUnit) -> CodecResult<()> {
    let mut data = unit.encode()?;
    Scrambler::new().scramble(&mut data);
    write_atomically(path, &data)?;
    Ok(())
}

/// Reads the persisted recency sequence
pub fn read_sequence(path: &Path) -> CodecResult<u64> {
    let mut data = fs::read(path)?;
    Scrambler::new().unscramble(&mut data);

    if data.len() != SEQUENCE_FILE_SIZE {
        return Err(FormatError::Truncated {
            needed: SEQUENCE_FILE_SIZE,
            available: data.len(),
        }
        .into());
    }
    if data[0..4] != SEQUENCE_MAGIC {
        return Err(FormatError::BadMagic.into());
    }

    let expected = LittleEndian::read_u32(&data[12..16]);
    let actual = crc32fast::hash(&data[4..12]);
    if expected != actual {
        return Err(FormatError::ChecksumMismatch { expected, actual }.into());
    }

    Ok(LittleEndian::read_u64(&data[4..12]))
}

/// Replaces the sequence file at `path` with `sequence`
pub fn write_sequence(path: &Path, sequence: u64) -> CodecResult<()> {
    let mut data = [0u8; SEQUENCE_FILE_SIZE];
    data[0..4].copy_from_slice(&SEQUENCE_MAGIC);
    LittleEndian::write_u64(&mut data[4..12], sequence);
    let checksum = crc32fast::hash(&data[4..12]);
    LittleEndian::write_u32(&mut data[12..16], checksum);

    Scrambler::new().scramble(&mut data);
    write_atomically(path, &data)?;
    Ok(())
}

/// Writes to a temporary file next to `path`, then renames it into place so
/// a failed write never leaves a half-written file behind.
fn write_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("{} has no parent directory", path.display())))?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CodecError;
    use tempfile::tempdir;

    fn sample_unit(id: usize) -> StatisticsUnit {
        let mut unit = StatisticsUnit::new(ShardId::new(id).unwrap());
        unit.increment("ctx", "alpha", 5);
        unit.increment("ctx", "beta", 6);
        unit
    }

    #[test]
    fn test_unit_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unit.12");
        let unit = sample_unit(12);

        write_unit(&path, &unit).unwrap();
        let loaded = read_unit(&path, ShardId::new(12).unwrap()).unwrap();
        assert_eq!(loaded, unit);
    }

    #[test]
    fn test_unit_file_is_scrambled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unit.12");
        write_unit(&path, &sample_unit(12)).unwrap();

        let raw = fs::read(&path).unwrap();
        assert_ne!(&raw[0..4], b"USTU");
        assert!(!raw.windows(5).any(|w| w == b"alpha"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = read_unit(&dir.path().join("unit.1"), ShardId::new(1).unwrap()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_garbage_file_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unit.1");
        fs::write(&path, b"this is definitely not a statistics unit").unwrap();

        let err = read_unit(&path, ShardId::new(1).unwrap()).unwrap_err();
        assert!(matches!(err, CodecError::Format(_)));
    }

    #[test]
    fn test_shard_mismatch_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unit.3");
        write_unit(&path, &sample_unit(4)).unwrap();

        let err = read_unit(&path, ShardId::new(3).unwrap()).unwrap_err();
        assert!(matches!(err, CodecError::Format(FormatError::ShardMismatch { expected: 3, found: 4 })));
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unit.12");
        write_unit(&path, &sample_unit(12)).unwrap();

        let mut updated = sample_unit(12);
        updated.increment("ctx", "gamma", 7);
        write_unit(&path, &updated).unwrap();

        let loaded = read_unit(&path, ShardId::new(12).unwrap()).unwrap();
        assert_eq!(loaded.count("ctx", "gamma"), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent").join("unit.12");
        let err = write_unit(&path, &sample_unit(12)).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }

    #[test]
    fn test_sequence_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sequence");

        write_sequence(&path, 123_456).unwrap();
        assert_eq!(read_sequence(&path).unwrap(), 123_456);

        write_sequence(&path, 7).unwrap();
        assert_eq!(read_sequence(&path).unwrap(), 7);
    }

    #[test]
    fn test_corrupt_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sequence");
        write_sequence(&path, 99).unwrap();

        let mut raw = fs::read(&path).unwrap();
        raw[6] ^= 0x01;
        fs::write(&path, &raw).unwrap();
        assert!(matches!(read_sequence(&path), Err(CodecError::Format(FormatError::ChecksumMismatch { .. }))));

        fs::write(&path, b"short").unwrap();
        assert!(matches!(read_sequence(&path), Err(CodecError::Format(FormatError::Truncated { .. }))));
    }
}
