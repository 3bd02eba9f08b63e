//! Caching tiers for StrataDB transactions.
//!
//! Write transactions keep their dirty pages in a [`TxnLog`]: a bounded
//! [`LruCache`] that demotes cold containers into an on-disk [`SpillLog`],
//! so arbitrarily large transactions hold a fixed number of pages in
//! memory. Read transactions reuse the bare [`LruCache`] for reconstructed
//! pages; their next tier is the backend itself, so evicted entries are
//! simply dropped.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod lru;
mod spill;
mod txn_log;

pub use lru::{CacheStats, LruCache};
pub use spill::SpillLog;
pub use txn_log::TxnLog;
