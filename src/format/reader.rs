//! Reads engine snapshots from disk.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::engine::EngineSnapshot;
use crate::types::error::{LmemError, LmemResult};
use crate::types::{SNAPSHOT_MAGIC, SNAPSHOT_VERSION};

use super::compression::decompress_body;
use super::HEADER_SIZE;

/// Reader for snapshot files.
pub struct SnapshotReader;

impl SnapshotReader {
    /// Read a snapshot file.
    pub fn read_from_file(path: &Path) -> LmemResult<EngineSnapshot> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Read from any reader.
    pub fn read_from(reader: &mut impl Read) -> LmemResult<EngineSnapshot> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Decode and verify a snapshot.
    pub fn from_bytes(data: &[u8]) -> LmemResult<EngineSnapshot> {
        if data.len() < HEADER_SIZE {
            return Err(LmemError::Truncated);
        }
        if data[..4] != SNAPSHOT_MAGIC {
            return Err(LmemError::InvalidMagic);
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&data[4..8]);
        let version = u32::from_le_bytes(version);
        if version != SNAPSHOT_VERSION {
            return Err(LmemError::UnsupportedVersion(version));
        }
        let expected = &data[8..HEADER_SIZE];
        let body_data = &data[HEADER_SIZE..];
        if body_data.is_empty() {
            return Err(LmemError::Truncated);
        }

        let body = decompress_body(body_data)?;
        if Sha256::digest(&body).as_slice() != expected {
            return Err(LmemError::ChecksumMismatch);
        }
        let snapshot: EngineSnapshot = serde_json::from_slice(&body)?;
        if snapshot.version != version {
            return Err(LmemError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }
}
