//! core::delta::compress
//!
//! Lossless byte compression for snapshot and delta payloads.

use std::io;

/// Default zstd level when none is configured.
pub const DEFAULT_LEVEL: i32 = 3;

/// Valid zstd levels.
pub const LEVELS: std::ops::RangeInclusive<i32> = 1..=22;

/// Compress `bytes` at the given zstd level.
pub fn compress(bytes: &[u8], level: i32) -> io::Result<Vec<u8>> {
    zstd::encode_all(bytes, level)
}

/// Decompress a payload produced by [`compress`].
pub fn decompress(bytes: &[u8]) -> io::Result<Vec<u8>> {
    zstd::decode_all(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = br#"{"children":[{"id":"a"},{"id":"a"},{"id":"a"}]}"#.repeat(20);
        let packed = compress(&data, DEFAULT_LEVEL).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn garbage_fails() {
        assert!(decompress(b"definitely not zstd").is_err());
    }
}
