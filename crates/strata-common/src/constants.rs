//! System-wide constants for StrataDB.
//!
//! The tree-geometry and file-layout sections are part of the on-disk
//! contract: changing any of those values makes existing resources
//! unreadable.

// =============================================================================
// Tree geometry
// =============================================================================

/// log2 of the child count of an indirect page.
pub const FANOUT_EXPONENT: u32 = 7;

/// Number of child references held by one indirect page.
pub const FANOUT: usize = 1 << FANOUT_EXPONENT;

/// Mask extracting a child offset from a shifted key.
pub const FANOUT_MASK: u64 = (FANOUT as u64) - 1;

/// log2 of the record slot count of a leaf page.
pub const SLOTS_PER_LEAF_EXPONENT: u32 = 7;

/// Number of record slots held by one leaf page.
pub const SLOTS_PER_LEAF: usize = 1 << SLOTS_PER_LEAF_EXPONENT;

/// Mask extracting a slot index from a record key.
pub const SLOT_MASK: u64 = (SLOTS_PER_LEAF as u64) - 1;

/// Number of indirect levels between a tree root and its leaf pages.
pub const INDIRECT_LEVEL_COUNT: usize = 5;

/// Right-shift applied to a page key to find the child offset at each
/// indirect level, root first.
pub const LEVEL_SHIFTS: [u32; INDIRECT_LEVEL_COUNT] = [28, 21, 14, 7, 0];

/// Largest page key addressable through the indirect levels.
pub const MAX_PAGE_KEY: u64 = (1 << (FANOUT_EXPONENT * INDIRECT_LEVEL_COUNT as u32)) - 1;

/// Largest record key addressable within a resource.
pub const MAX_RECORD_KEY: u64 =
    (1 << (FANOUT_EXPONENT * INDIRECT_LEVEL_COUNT as u32 + SLOTS_PER_LEAF_EXPONENT)) - 1;

/// Largest accepted record value, in bytes.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

// =============================================================================
// File layout
// =============================================================================

/// Magic number at offset 0 of a data file ("STRA").
pub const FILE_MAGIC: u32 = 0x5354_5241;

/// On-disk format version written after the magic number.
pub const FILE_VERSION: u32 = 1;

/// Byte offset of the root beacon within a data file.
pub const BEACON_OFFSET: u64 = 8;

/// Size of the root beacon: offset (8) + length (4) + checksum (16).
pub const BEACON_SIZE: usize = 28;

/// Byte offset where the append-only data region begins.
pub const DATA_REGION_START: u64 = 64;

/// Magic number at offset 0 of a transaction overflow file ("STLG").
pub const SPILL_MAGIC: u32 = 0x5354_4C47;

/// Format version of the transaction overflow file.
pub const SPILL_VERSION: u32 = 1;

/// Size of the overflow file header: magic (4) + version (4).
pub const SPILL_HEADER_SIZE: u64 = 8;

// =============================================================================
// Resource directory
// =============================================================================

/// File name of the persisted resource configuration.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// File name of the page data store.
pub const DATA_FILE_NAME: &str = "data.strata";

/// File name of the write transaction overflow log.
pub const SPILL_FILE_NAME: &str = "txn-overflow.strata";

// =============================================================================
// Defaults
// =============================================================================

/// Default entry capacity of the in-memory page cache tiers.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Default distance between full page dumps for windowed revisioning.
pub const DEFAULT_REVISION_WINDOW: u32 = 4;

/// Default zstd compression level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;
