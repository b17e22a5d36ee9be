//! In-process and file-backed token stores
//!
//! - [`InMemoryTokenStore`]: default store, lives as long as the coordinator
//! - [`FileTokenStore`]: JSON file, re-read on every `get`
//! - [`FileWithInMemoryCacheTokenStore`]: JSON file read once, then served
//!   from memory

use std::path::{Path, PathBuf};

use boxsdk_domain::TokenPair;
use parking_lot::RwLock;
use tracing::debug;

use super::error::TokenStoreError;
use super::traits::TokenStore;

/// Token store holding the pair in memory
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    pair: RwLock<Option<TokenPair>>,
}

impl InMemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pair(pair: TokenPair) -> Self {
        Self { pair: RwLock::new(Some(pair)) }
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self) -> Result<Option<TokenPair>, TokenStoreError> {
        Ok(self.pair.read().clone())
    }

    fn store(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        *self.pair.write() = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.pair.write() = None;
        Ok(())
    }
}

/// Token store persisting the pair as JSON on disk
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Result<Option<TokenPair>, TokenStoreError> {
        match std::fs::read(&self.path) {
            Ok(contents) => Ok(Some(serde_json::from_slice(&contents)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn store(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        debug!(path = %self.path.display(), "Writing token file");
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec(pair)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// File store fronted by a memory cache
///
/// The file is read at most once; writes go to both.
#[derive(Debug)]
pub struct FileWithInMemoryCacheTokenStore {
    file: FileTokenStore,
    cache: RwLock<Option<TokenPair>>,
}

impl FileWithInMemoryCacheTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { file: FileTokenStore::new(path), cache: RwLock::new(None) }
    }
}

impl TokenStore for FileWithInMemoryCacheTokenStore {
    fn get(&self) -> Result<Option<TokenPair>, TokenStoreError> {
        if let Some(pair) = self.cache.read().clone() {
            return Ok(Some(pair));
        }
        let loaded = self.file.get()?;
        if let Some(pair) = &loaded {
            *self.cache.write() = Some(pair.clone());
        }
        Ok(loaded)
    }

    fn store(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        self.file.store(pair)?;
        *self.cache.write() = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.cache.write() = None;
        self.file.clear()
    }
}
