//! Snapshot files: header, checksum and compressed JSON body.

pub mod compression;
pub mod reader;
pub mod writer;

pub use reader::SnapshotReader;
pub use writer::SnapshotWriter;

/// Magic, version and SHA-256 digest.
pub const HEADER_SIZE: usize = 4 + 4 + 32;
