//! Transform composition.

use std::fmt;

use strata_common::{Compression, Encryption, StoreError, StoreResult};

use crate::compress::ZstdCompression;
use crate::encrypt::{AesGcmEncryption, EncryptionKey};
use crate::transform::Transform;

/// An ordered stack of byte transforms.
///
/// Encoding applies the transforms front to back, decoding applies their
/// inverses back to front. The empty pipeline passes bytes through
/// untouched.
pub struct Pipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    /// The empty pipeline.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Builds the pipeline described by a resource configuration:
    /// compression first, encryption second.
    ///
    /// Fails when the configuration asks for encryption but no key was
    /// supplied.
    pub fn from_config(
        compression: &Compression,
        encryption: &Encryption,
        key: Option<&EncryptionKey>,
    ) -> StoreResult<Self> {
        let mut transforms: Vec<Box<dyn Transform>> = Vec::new();
        if let Compression::Zstd { level } = compression {
            transforms.push(Box::new(ZstdCompression::new(*level)));
        }
        if let Encryption::Aes256Gcm { key_id } = encryption {
            let key = key.ok_or_else(|| {
                StoreError::usage("resource is encrypted but no key was supplied")
            })?;
            transforms.push(Box::new(AesGcmEncryption::new(*key_id, key)));
        }
        Ok(Self { transforms })
    }

    /// Appends a transform to the encode side of the stack.
    #[must_use]
    pub fn with(mut self, transform: Box<dyn Transform>) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Whether the pipeline passes bytes through untouched.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Runs the forward direction over `input`.
    pub fn encode(&self, input: Vec<u8>) -> StoreResult<Vec<u8>> {
        let mut data = input;
        for transform in &self.transforms {
            data = transform.encode(&data)?;
        }
        Ok(data)
    }

    /// Runs the reverse direction over `input`.
    pub fn decode(&self, input: Vec<u8>) -> StoreResult<Vec<u8>> {
        let mut data = input;
        for transform in self.transforms.iter().rev() {
            data = transform.decode(&data)?;
        }
        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.transforms.iter().map(|t| t.name()).collect();
        write!(f, "Pipeline[{}]", names.join(", "))
    }
}
