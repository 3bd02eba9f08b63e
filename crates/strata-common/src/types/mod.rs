//! Core value types shared across the StrataDB crates.

mod keys;
mod log;
mod storage;
mod timestamps;

pub use keys::{PageKey, RecordKey, Revision};
pub use log::LogKey;
pub use storage::{Checksum, StorageKey};
pub use timestamps::Timestamp;
