// LZ4 CompressionCodec Implementation

use qcache_core::error::{AppError, Result};
use qcache_core::port::CompressionCodec;
use tracing::trace;

/// LZ4 block compression with the uncompressed length prepended
/// (little-endian u32), so values are self-describing at rest.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Codec;

impl Lz4Codec {
    pub fn new() -> Self {
        Self
    }
}

impl CompressionCodec for Lz4Codec {
    fn compress(&self, data: &[u8]) -> Vec<u8> {
        let out = lz4_flex::compress_prepend_size(data);
        trace!(raw = data.len(), compressed = out.len(), "LZ4 compress");
        out
    }

    fn uncompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(data)
            .map_err(|e| AppError::Codec(format!("LZ4 decompression failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_text() {
        let codec = Lz4Codec::new();
        let value = r#"{"user":"ada","roles":["admin","admin","admin","admin"]}"#;
        let packed = codec.compress(value.as_bytes());
        assert_ne!(packed.as_slice(), value.as_bytes());
        assert_eq!(codec.uncompress(&packed).unwrap(), value.as_bytes());
    }

    #[test]
    fn test_empty_input() {
        let codec = Lz4Codec::new();
        let packed = codec.compress(b"");
        assert_eq!(codec.uncompress(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_repetitive_input_shrinks() {
        let codec = Lz4Codec::new();
        let value = "abc".repeat(1_000);
        assert!(codec.compress(value.as_bytes()).len() < value.len());
    }

    #[test]
    fn test_foreign_bytes_are_codec_error() {
        let codec = Lz4Codec::new();
        // Claims 1000 bytes of output but carries no block
        let garbage = [0xE8, 0x03, 0x00, 0x00, 0xFF];
        assert!(matches!(
            codec.uncompress(&garbage),
            Err(AppError::Codec(_))
        ));
        assert!(matches!(codec.uncompress(&[1]), Err(AppError::Codec(_))));
    }
}
