//! Storage backends for StrataDB.
//!
//! A backend stores encoded pages and a single root beacon. Pages are
//! immutable once written; only the beacon is ever overwritten, which is
//! what makes commits atomic. Two implementations share the contract: an
//! append-only file and a volatile in-memory arena. The byte pipeline runs
//! inside the backend, so callers hand over and receive decoded pages.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod backend;
mod file;
mod memory;

pub use backend::{backend_exists, create_backend, open_backend, PageReader, PageWriter};
pub use file::FileBackend;
pub use memory::MemoryBackend;
