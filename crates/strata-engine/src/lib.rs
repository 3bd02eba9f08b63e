//! The StrataDB storage engine.
//!
//! This crate ties the lower layers together into the public embedded API:
//! resources on disk, sessions over resources, and snapshot-isolated
//! transactions over sessions.
//!
//! Every commit builds a new copy-on-write page tree next to the existing
//! ones and publishes it by swapping a single root beacon, so readers are
//! never blocked and a torn commit is invisible after a crash. How much of
//! each touched page a commit writes is the revisioning strategy's call;
//! reads reassemble pages from however many stored instances the strategy
//! needs.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod read;
mod resource;
mod revisioning;
mod session;
mod write;

pub use read::ReadTxn;
pub use resource::{OpenOptions, Resource};
pub use session::{Session, SessionStats};
pub use write::{TxnState, WriteTxn};

pub use strata_common::{
    BackendKind, Checksum, Compression, Encryption, RecordKey, ResourceConfig, Revision,
    RevisioningKind, StorageKey, StoreError, StoreResult, Timestamp,
};
pub use strata_pipeline::EncryptionKey;
