//! On-disk ABI cache at `<cacheDir>/<chainId>/<lowercaseAddress>.json`.
//! No TTL — entries are permanent until manually removed.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AbiError;

#[derive(Clone)]
pub struct AbiCache {
    root: PathBuf,
}

impl AbiCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default cache root: `<home>/.chaintap/abi-cache`.
    pub fn default_root() -> PathBuf {
        let home = dirs_home();
        home.join(".chaintap").join("abi-cache")
    }

    fn path_for(&self, chain_id: u64, address: &str) -> PathBuf {
        self.root
            .join(chain_id.to_string())
            .join(format!("{}.json", address.to_lowercase()))
    }

    pub fn get(&self, chain_id: u64, address: &str) -> Result<Option<String>, AbiError> {
        let path = self.path_for(chain_id, address);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| AbiError::CacheIo {
            path: path.display().to_string(),
            source,
        })?;
        debug!(chain_id, address, path = %path.display(), "ABI cache hit");
        Ok(Some(contents))
    }

    /// Write-through. Idempotent; last-writer-wins under concurrent tasks.
    pub fn put(&self, chain_id: u64, address: &str, abi_json: &str) -> Result<(), AbiError> {
        let path = self.path_for(chain_id, address);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AbiError::CacheIo {
                path: parent.display().to_string(),
                source,
            })?;
        }
        std::fs::write(&path, abi_json).map_err(|source| AbiError::CacheIo {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(".").to_path_buf())
}
