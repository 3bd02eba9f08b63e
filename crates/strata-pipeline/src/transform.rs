//! The transform seam of the byte pipeline.

use std::fmt;

use strata_common::StoreResult;

/// One reversible byte transform.
///
/// Implementations must guarantee that `decode` inverts `encode` for every
/// input. Transforms see whole encoded pages, never fragments.
pub trait Transform: fmt::Debug + Send + Sync {
    /// Short name used in pipeline descriptions.
    fn name(&self) -> &'static str;

    /// Applies the forward direction.
    fn encode(&self, input: &[u8]) -> StoreResult<Vec<u8>>;

    /// Applies the reverse direction.
    fn decode(&self, input: &[u8]) -> StoreResult<Vec<u8>>;
}

/// The do-nothing transform.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl Transform for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn encode(&self, input: &[u8]) -> StoreResult<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn decode(&self, input: &[u8]) -> StoreResult<Vec<u8>> {
        Ok(input.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_passes_bytes_through() {
        let input = b"page bytes".to_vec();
        assert_eq!(Identity.encode(&input).unwrap(), input);
        assert_eq!(Identity.decode(&input).unwrap(), input);
    }
}
