// qcache Infrastructure - Value Compression
// Implements: CompressionCodec

mod lz4;

pub use lz4::Lz4Codec;
