//! LZ4 body compression/decompression.

use crate::types::error::{LmemError, LmemResult};

/// Compress the serialized body with LZ4 (prepend size for decompression).
pub fn compress_body(body: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(body)
}

/// Decompress an LZ4 body back to its serialized bytes.
pub fn decompress_body(data: &[u8]) -> LmemResult<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data).map_err(|e| LmemError::Compression(e.to_string()))
}
