//! Content-addressed on-disk cache for remote socket lists.
//!
//! One file per source URL, named by the hex SHA-256 of the URL. Freshness is
//! the file's modification time compared against a caller-supplied TTL at read
//! time; nothing is ever evicted.
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache entry not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cache entry expired: {} is {age:?} old (ttl {ttl:?})", .path.display())]
    Expired {
        path: PathBuf,
        age: Duration,
        ttl: Duration,
    },
    #[error("cache I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Deterministic cache file name for a source URL.
pub fn key_for(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Create-or-truncate the entry for `key`, creating the directory if needed.
    pub fn put(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        fs::write(&path, bytes).map_err(|source| CacheError::Io { path, source })
    }

    /// Read the entry for `key` if it is younger than `ttl`.
    pub fn get(&self, key: &str, ttl: Duration) -> Result<Vec<u8>, CacheError> {
        let path = self.path_for(key);
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(CacheError::NotFound(path)),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let modified = meta.modified().map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        // A timestamp in the future counts as brand new.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age >= ttl {
            return Err(CacheError::Expired { path, age, ttl });
        }
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CacheError::NotFound(path)),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}
