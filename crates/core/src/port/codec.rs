// Compression Codec Port

use crate::error::Result;

/// Reversible byte transform applied to every cached value
pub trait CompressionCodec: Send + Sync {
    fn compress(&self, data: &[u8]) -> Vec<u8>;

    /// # Errors
    /// - AppError::Codec if `data` was not produced by `compress`
    fn uncompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;

    const TAG: &[u8] = b"z1:";

    /// Prepends a marker so tests can tell stored bytes from caller bytes
    #[derive(Debug, Default, Clone, Copy)]
    pub struct TaggingCodec;

    impl TaggingCodec {
        pub fn is_tagged(data: &[u8]) -> bool {
            data.starts_with(TAG)
        }
    }

    impl CompressionCodec for TaggingCodec {
        fn compress(&self, data: &[u8]) -> Vec<u8> {
            let mut out = Vec::with_capacity(TAG.len() + data.len());
            out.extend_from_slice(TAG);
            out.extend_from_slice(data);
            out
        }

        fn uncompress(&self, data: &[u8]) -> Result<Vec<u8>> {
            data.strip_prefix(TAG)
                .map(|rest| rest.to_vec())
                .ok_or_else(|| AppError::Codec("missing codec tag".to_string()))
        }
    }
}
