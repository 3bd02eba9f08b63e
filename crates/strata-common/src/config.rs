//! Resource configuration.
//!
//! A [`ResourceConfig`] is fixed when a resource is created, persisted next
//! to the data as `config.json`, and reloaded verbatim on every open. The
//! settings describe the on-disk shape of the resource, so they cannot be
//! changed for an existing resource.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CACHE_CAPACITY, DEFAULT_REVISION_WINDOW, DEFAULT_ZSTD_LEVEL};

/// Storage backend flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Append-only file in the resource directory.
    File,
    /// Volatile in-memory arena, usable only for the lifetime of one session.
    Memory,
}

/// Page compression applied on the encode side of the byte pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Compression {
    /// Pages are stored uncompressed.
    None,
    /// Pages are compressed with zstd before encryption.
    Zstd {
        /// Compression level, 1 (fastest) to 21 (smallest).
        level: i32,
    },
}

impl Compression {
    /// Zstd at the default level.
    #[must_use]
    pub const fn zstd_default() -> Self {
        Self::Zstd {
            level: DEFAULT_ZSTD_LEVEL,
        }
    }
}

/// Page encryption applied after compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Encryption {
    /// Pages are stored in the clear.
    None,
    /// Pages are sealed with AES-256-GCM.
    ///
    /// Only the key identifier is persisted; the key itself must be supplied
    /// by the caller on every open.
    Aes256Gcm {
        /// Caller-assigned identifier of the key in use.
        key_id: u32,
    },
}

/// Version retention strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisioningKind {
    /// Every commit writes complete pages.
    Full,
    /// Commits write the delta against the last full dump, with a full dump
    /// every window-th revision.
    Differential,
    /// Commits write only the touched slots, with a full dump every
    /// window-th revision.
    Incremental,
    /// Commits write the touched slots plus whatever would otherwise slide
    /// out of the reconstruction window.
    SlidingSnapshot,
}

/// Immutable per-resource settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Where page bytes live.
    pub backend: BackendKind,
    /// Compression step of the byte pipeline.
    pub compression: Compression,
    /// Encryption step of the byte pipeline.
    pub encryption: Encryption,
    /// How page versions are materialized across revisions.
    pub revisioning: RevisioningKind,
    /// Distance between full page dumps for the windowed strategies.
    pub revision_window: u32,
    /// Entry capacity of each in-memory page cache tier.
    pub cache_capacity: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            compression: Compression::None,
            encryption: Encryption::None,
            revisioning: RevisioningKind::Incremental,
            revision_window: DEFAULT_REVISION_WINDOW,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ResourceConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage backend.
    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the compression step.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the encryption step.
    #[must_use]
    pub fn with_encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption;
        self
    }

    /// Sets the revisioning strategy.
    #[must_use]
    pub fn with_revisioning(mut self, kind: RevisioningKind) -> Self {
        self.revisioning = kind;
        self
    }

    /// Sets the revision window.
    #[must_use]
    pub fn with_revision_window(mut self, window: u32) -> Self {
        self.revision_window = window;
        self
    }

    /// Sets the cache capacity.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Checks the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.revision_window == 0 {
            return Err("revision window must be at least 1".to_string());
        }
        if self.revisioning != RevisioningKind::Full && self.revision_window < 2 {
            return Err("windowed revisioning needs a revision window of at least 2".to_string());
        }
        if self.cache_capacity == 0 {
            return Err("cache capacity must be at least 1".to_string());
        }
        if let Compression::Zstd { level } = self.compression {
            if !(1..=21).contains(&level) {
                return Err(format!("zstd level {level} outside 1..=21"));
            }
        }
        Ok(())
    }

    /// Small-footprint configuration for tests: in-memory backend, no
    /// transforms, tight cache.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            backend: BackendKind::Memory,
            compression: Compression::None,
            encryption: Encryption::None,
            revisioning: RevisioningKind::Incremental,
            revision_window: 4,
            cache_capacity: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ResourceConfig::default().validate().is_ok());
        assert!(ResourceConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn zero_window_is_rejected() {
        let config = ResourceConfig::new().with_revision_window(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn windowed_strategies_need_room() {
        let config = ResourceConfig::new()
            .with_revisioning(RevisioningKind::SlidingSnapshot)
            .with_revision_window(1);
        assert!(config.validate().is_err());

        let config = ResourceConfig::new()
            .with_revisioning(RevisioningKind::Full)
            .with_revision_window(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zstd_level_bounds() {
        let config = ResourceConfig::new().with_compression(Compression::Zstd { level: 0 });
        assert!(config.validate().is_err());

        let config = ResourceConfig::new().with_compression(Compression::zstd_default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_round_trip() {
        let config = ResourceConfig::new()
            .with_compression(Compression::zstd_default())
            .with_encryption(Encryption::Aes256Gcm { key_id: 7 })
            .with_revisioning(RevisioningKind::SlidingSnapshot)
            .with_revision_window(8);

        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: ResourceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
