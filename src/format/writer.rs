//! Writes engine snapshots to disk.

use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::engine::EngineSnapshot;
use crate::types::error::LmemResult;
use crate::types::{SNAPSHOT_MAGIC, SNAPSHOT_VERSION};

use super::compression::compress_body;

/// Writer for snapshot files.
///
/// Layout: 4 magic bytes, version as little-endian u32, SHA-256 of the JSON
/// body, then the LZ4-compressed JSON body.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotWriter;

impl SnapshotWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write a snapshot to a file, replacing it.
    pub fn write_to_file(&self, snapshot: &EngineSnapshot, path: &Path) -> LmemResult<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write_to(snapshot, &mut writer)?;
        writer.flush()?;
        log::debug!("Wrote snapshot to {}", path.display());
        Ok(())
    }

    /// Write a snapshot to any writer.
    pub fn write_to(&self, snapshot: &EngineSnapshot, writer: &mut impl Write) -> LmemResult<()> {
        let body = serde_json::to_vec(snapshot)?;
        let digest = Sha256::digest(&body);
        writer.write_all(&SNAPSHOT_MAGIC)?;
        writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
        writer.write_all(digest.as_slice())?;
        writer.write_all(&compress_body(&body))?;
        Ok(())
    }

    /// Encode a snapshot into bytes.
    pub fn to_bytes(&self, snapshot: &EngineSnapshot) -> LmemResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(snapshot, &mut buf)?;
        Ok(buf)
    }
}
