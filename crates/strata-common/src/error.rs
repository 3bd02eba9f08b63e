//! Error taxonomy for StrataDB.
//!
//! Every fallible operation in the workspace returns [`StoreResult`]. The
//! variants fall into two groups that callers can branch on without matching
//! individually: store faults (`is_io_kind`, with the integrity subset
//! flagged by `is_integrity`) and caller mistakes (`is_usage`). Store faults
//! are never retried internally.

use thiserror::Error;

use crate::types::Checksum;

/// Convenience alias for results produced by StrataDB operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// All errors surfaced by StrataDB.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying storage failed.
    #[error("i/o failure: {source}")]
    Io {
        /// Operating-system error that caused the failure.
        #[from]
        source: std::io::Error,
    },

    /// Stored bytes do not match their recorded digest.
    #[error("checksum mismatch at offset {offset}: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        /// Digest recorded next to the reference.
        expected: Checksum,
        /// Digest computed over the bytes actually read.
        computed: Checksum,
        /// Store offset of the offending page.
        offset: u64,
    },

    /// Stored bytes are structurally unreadable.
    #[error("corrupt store: {reason}")]
    Corrupt {
        /// Description of the damage.
        reason: String,
    },

    /// A wire structure could not be decoded.
    #[error("decode failure: {reason}")]
    Decode {
        /// Description of the malformed structure.
        reason: String,
    },

    /// A byte transform failed to encode or decode a payload.
    #[error("pipeline failure: {reason}")]
    Pipeline {
        /// Description of the failed transform step.
        reason: String,
    },

    /// Operation on a closed session or transaction.
    #[error("{what} is closed")]
    Closed {
        /// The closed object.
        what: &'static str,
    },

    /// A write transaction is already active on this session.
    #[error("another write transaction is active")]
    WriterActive,

    /// The requested revision has not been committed.
    #[error("revision {requested} not found (newest is {newest})")]
    RevisionNotFound {
        /// Revision asked for.
        requested: u64,
        /// Newest committed revision.
        newest: u64,
    },

    /// Configuration rejected at resource creation or open.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the rejected setting.
        reason: String,
    },

    /// The caller violated an API contract.
    #[error("usage error: {reason}")]
    Usage {
        /// Description of the violation.
        reason: String,
    },
}

impl StoreError {
    /// Creates a [`StoreError::Corrupt`].
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    /// Creates a [`StoreError::Decode`].
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Creates a [`StoreError::Pipeline`].
    pub fn pipeline(reason: impl Into<String>) -> Self {
        Self::Pipeline {
            reason: reason.into(),
        }
    }

    /// Creates a [`StoreError::InvalidConfig`].
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a [`StoreError::Usage`].
    pub fn usage(reason: impl Into<String>) -> Self {
        Self::Usage {
            reason: reason.into(),
        }
    }

    /// Creates a [`StoreError::Closed`].
    pub const fn closed(what: &'static str) -> Self {
        Self::Closed { what }
    }

    /// Whether this is a store fault: an environment or integrity failure
    /// the caller cannot fix by changing arguments.
    #[must_use]
    pub const fn is_io_kind(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ChecksumMismatch { .. }
                | Self::Corrupt { .. }
                | Self::Decode { .. }
                | Self::Pipeline { .. }
        )
    }

    /// Whether stored bytes failed validation against their digests,
    /// framing, or authentication tags.
    #[must_use]
    pub const fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::Corrupt { .. }
                | Self::Decode { .. }
                | Self::Pipeline { .. }
        )
    }

    /// Whether the caller misused the API while the store itself is healthy.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::Closed { .. }
                | Self::WriterActive
                | Self::RevisionNotFound { .. }
                | Self::InvalidConfig { .. }
                | Self::Usage { .. }
        )
    }
}
