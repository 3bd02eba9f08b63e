//! Resource lifecycle: create, open, existence, removal.
//!
//! A resource is one directory holding the persisted configuration next to
//! the page store. The configuration is fixed at creation; opening reloads
//! it and wires up the same byte pipeline the pages were written through.

use std::path::Path;

use strata_common::constants::{CONFIG_FILE_NAME, DATA_FILE_NAME, INDIRECT_LEVEL_COUNT};
use strata_common::{Checksum, ResourceConfig, StorageKey, StoreError, StoreResult};
use strata_io::{backend_exists, create_backend, open_backend, PageWriter};
use strata_page::{IndirectPage, NamePage, Page, PageReference, RevisionRootPage, UberPage};
use strata_pipeline::{EncryptionKey, Pipeline};

use crate::session::Session;

/// Options supplied when creating or opening a resource.
#[derive(Debug, Default)]
pub struct OpenOptions {
    key: Option<EncryptionKey>,
}

impl OpenOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the key for a resource configured with encryption.
    #[must_use]
    pub fn with_encryption_key(mut self, key: EncryptionKey) -> Self {
        self.key = Some(key);
        self
    }
}

/// Entry points for managing resources on disk.
#[derive(Debug)]
pub struct Resource;

impl Resource {
    /// Creates a new resource under `dir` and opens a session on it.
    ///
    /// The directory is created if needed, the configuration is persisted,
    /// and an empty revision zero is committed so the resource is readable
    /// immediately.
    pub fn create(
        dir: &Path,
        config: ResourceConfig,
        options: OpenOptions,
    ) -> StoreResult<Session> {
        config.validate().map_err(StoreError::invalid_config)?;
        if Self::exists(dir) {
            return Err(StoreError::usage(format!(
                "resource at {} already exists",
                dir.display()
            )));
        }

        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(&config)
            .map_err(|err| StoreError::invalid_config(format!("unwritable configuration: {err}")))?;
        std::fs::write(dir.join(CONFIG_FILE_NAME), json)?;

        let pipeline = Pipeline::from_config(&config.compression, &config.encryption, options.key.as_ref())?;
        let backend = create_backend(config.backend, dir, pipeline)?;
        let (uber, location) = bootstrap(&*backend)?;

        tracing::info!(dir = %dir.display(), backend = ?config.backend, "created resource");
        Ok(Session::new(config, dir.to_path_buf(), backend, uber, location))
    }

    /// Opens an existing resource under `dir`.
    pub fn open(dir: &Path, options: OpenOptions) -> StoreResult<Session> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        let raw = match std::fs::read_to_string(&config_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::invalid_config(format!(
                    "no resource at {}",
                    dir.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };
        let config: ResourceConfig = serde_json::from_str(&raw)
            .map_err(|err| StoreError::invalid_config(format!("unreadable configuration: {err}")))?;
        config.validate().map_err(StoreError::invalid_config)?;

        let pipeline = Pipeline::from_config(&config.compression, &config.encryption, options.key.as_ref())?;
        let backend = open_backend(config.backend, dir, pipeline)?;

        let Some((key, checksum)) = backend.read_root()? else {
            return Err(StoreError::corrupt("resource has no published root"));
        };
        let uber = backend.read_page(key, checksum)?.into_uber()?;

        tracing::info!(
            dir = %dir.display(),
            revisions = uber.revision_count(),
            "opened resource"
        );
        Ok(Session::new(config, dir.to_path_buf(), backend, uber, (key, checksum)))
    }

    /// Whether an initialized resource exists under `dir`.
    ///
    /// Memory-backed resources never exist here: their pages die with the
    /// session that created them.
    #[must_use]
    pub fn exists(dir: &Path) -> bool {
        let Ok(raw) = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME)) else {
            return false;
        };
        let Ok(config) = serde_json::from_str::<ResourceConfig>(&raw) else {
            return false;
        };
        backend_exists(config.backend, dir)
    }

    /// Removes the resource under `dir`, if present. Removing a missing
    /// resource is not an error.
    pub fn truncate(dir: &Path) -> StoreResult<()> {
        let looks_like_resource =
            dir.join(CONFIG_FILE_NAME).exists() || dir.join(DATA_FILE_NAME).exists();
        if looks_like_resource {
            std::fs::remove_dir_all(dir)?;
            tracing::info!(dir = %dir.display(), "truncated resource");
        }
        Ok(())
    }
}

/// Writes the empty revision zero: a name page, its revision root, and the
/// revision-tree spine binding revision zero, published under the first
/// uber page.
fn bootstrap(backend: &dyn PageWriter) -> StoreResult<(UberPage, (StorageKey, Checksum))> {
    let (name_key, name_checksum) = backend.write_page(&Page::Name(NamePage::new()))?;

    let mut root = RevisionRootPage::bootstrap();
    root.set_name_ref(PageReference::persisted(name_key, name_checksum));
    let (root_key, root_checksum) = backend.write_page(&Page::RevisionRoot(root))?;

    // Revision zero descends through offset zero at every level.
    let mut child = PageReference::persisted(root_key, root_checksum);
    for _ in 0..INDIRECT_LEVEL_COUNT {
        let mut page = IndirectPage::new();
        page.set_reference(0, child);
        let (key, checksum) = backend.write_page(&Page::Indirect(page))?;
        child = PageReference::persisted(key, checksum);
    }

    let mut uber = UberPage::bootstrap();
    uber.set_tree_ref(child);
    uber.add_pages_written(2 + INDIRECT_LEVEL_COUNT as u64 + 1);
    let (uber_key, uber_checksum) = backend.write_page(&Page::Uber(uber.clone()))?;

    backend.write_root(uber_key, uber_checksum)?;
    Ok((uber, (uber_key, uber_checksum)))
}
