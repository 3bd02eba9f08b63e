//! Byte transform pipeline for StrataDB pages.
//!
//! Every page travels through a configurable stack of reversible transforms
//! on its way to the store: compression first, encryption second. Page
//! checksums are always computed over the final encoded bytes, so integrity
//! is checked before any transform runs on the read path.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod compress;
mod encrypt;
mod pipeline;
mod transform;

pub use compress::ZstdCompression;
pub use encrypt::{AesGcmEncryption, EncryptionKey, KEY_SIZE};
pub use pipeline::Pipeline;
pub use transform::{Identity, Transform};
