//! Zstd page compression.

use strata_common::{StoreError, StoreResult};

use crate::transform::Transform;

/// Zstd compression at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompression {
    level: i32,
}

impl ZstdCompression {
    /// Creates the transform with the given compression level.
    #[must_use]
    pub const fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Transform for ZstdCompression {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn encode(&self, input: &[u8]) -> StoreResult<Vec<u8>> {
        zstd::stream::encode_all(input, self.level)
            .map_err(|e| StoreError::pipeline(format!("zstd encode: {e}")))
    }

    fn decode(&self, input: &[u8]) -> StoreResult<Vec<u8>> {
        zstd::stream::decode_all(input)
            .map_err(|e| StoreError::pipeline(format!("zstd decode: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let input: Vec<u8> = (0..4096u32).flat_map(|i| i.to_be_bytes()).collect();
        let transform = ZstdCompression::new(3);

        let encoded = transform.encode(&input).unwrap();
        assert_eq!(transform.decode(&encoded).unwrap(), input);
    }

    #[test]
    fn repetitive_pages_shrink() {
        let input = vec![0x42u8; 64 * 1024];
        let encoded = ZstdCompression::new(3).encode(&input).unwrap();
        assert!(encoded.len() < input.len() / 10);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = ZstdCompression::new(3).decode(b"not a zstd frame").unwrap_err();
        assert!(err.is_integrity());
    }
}
