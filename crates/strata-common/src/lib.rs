//! Shared foundation for the StrataDB workspace.
//!
//! StrataDB is an embedded, versioned page store: records live in
//! copy-on-write page trees, every commit produces a new immutable revision,
//! and readers pin whichever revision they started on. This crate holds the
//! pieces the other workspace crates agree on: key and locator types, the
//! error taxonomy, resource configuration, and the geometry constants that
//! define the on-disk format.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{BackendKind, Compression, Encryption, ResourceConfig, RevisioningKind};
pub use error::{StoreError, StoreResult};
pub use types::{Checksum, LogKey, PageKey, RecordKey, Revision, StorageKey, Timestamp};
