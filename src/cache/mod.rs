//! Content-addressed cache for derived assets.
//!
//! Derived artifacts (e.g. resized images) are stored under a cache root
//! and addressed by a key built from the SHA-256 hash of the source
//! content plus a canonical variant label. The index mapping keys to
//! entry metadata is persisted as JSON next to the artifacts; an absent
//! or unparsable index is treated as an empty cache, never an error.
//!
//! Every insertion is followed by an eviction sweep that removes entries
//! past the configured maximum age, then removes oldest-first until the
//! total retained size is back under the configured limit.
//!
//! The index load-mutate-save cycle is protected by an in-process mutex
//! plus an advisory file lock scoped to the cache root, so concurrent
//! callers (including separate processes sharing a root) cannot silently
//! drop each other's entries.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// File name of the persisted cache index, relative to the cache root.
const INDEX_FILE: &str = "cache_info.json";

/// File name of the advisory lock file, relative to the cache root.
const LOCK_FILE: &str = "cache_info.lock";

/// Chunk size for hashing source content.
const HASH_BUF_SIZE: usize = 8192;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// File system error on a cache or source path.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the cache index.
    #[error("failed to serialize cache index: {0}")]
    IndexSerialize(#[from] serde_json::Error),

    /// The deriver failed to produce the artifact.
    #[error("failed to derive artifact from {path}: {source}")]
    Derive {
        /// The source path being transformed.
        path: PathBuf,
        /// The underlying deriver error.
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A named transformation applied when deriving a cached artifact,
/// canonically labeled `"{width}x{height}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variant {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
}

impl Variant {
    /// Creates a variant for the given target dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Produces a transformed artifact at `dest` from the content at `source`.
///
/// Injected into [`CacheManager::get_or_create`] so the transformation
/// toolchain (image resizing, format conversion) stays outside the cache
/// and tests can count invocations.
pub trait VariantDeriver {
    /// Derives the artifact, writing it to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the source cannot be read or the artifact
    /// cannot be produced.
    fn derive(&self, source: &Path, dest: &Path, variant: Variant) -> std::io::Result<()>;
}

/// Eviction limits for the cache.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Entries older than this are removed on the next sweep.
    pub max_age: Duration,
    /// Total retained artifact size is kept under this bound.
    pub max_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            max_size_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Index record for one cached artifact.
///
/// Every key present in the index must correspond to an existing stored
/// artifact; a broken entry is treated as a miss and self-heals by
/// re-derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// Last-access time, seconds since the Unix epoch.
    timestamp: f64,
    /// Artifact size in bytes, measured at insertion.
    size: u64,
    /// The source path the artifact was derived from.
    original: String,
}

type CacheIndex = BTreeMap<String, CacheEntry>;

/// Content-addressed store for derived assets with age- and size-based
/// eviction.
///
/// Artifact paths returned by [`CacheManager::get_or_create`] must never
/// be assumed stable beyond the next eviction sweep.
#[derive(Debug)]
pub struct CacheManager {
    root: PathBuf,
    config: CacheConfig,
    // In-process serialization of the index read-modify-write cycle;
    // the lock file covers cross-process callers on the same root.
    guard: Mutex<()>,
}

impl CacheManager {
    /// Creates a cache manager over `root`, creating the directory and
    /// an empty index if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the root directory cannot be created.
    #[instrument(skip(root), fields(root = %root.display()))]
    pub fn new(root: &Path, config: CacheConfig) -> Result<Self, CacheError> {
        fs::create_dir_all(root).map_err(|e| CacheError::io(root, e))?;

        let manager = Self {
            root: root.to_path_buf(),
            config,
            guard: Mutex::new(()),
        };

        let index_path = manager.index_path();
        if !index_path.exists() {
            manager.save_index(&CacheIndex::new())?;
        }

        Ok(manager)
    }

    /// Returns the cached artifact path for `source` at `variant`,
    /// deriving and storing it first on a miss.
    ///
    /// A hit refreshes the entry's last-access timestamp and performs no
    /// other mutation. A miss (absent key, or an index entry whose
    /// backing artifact is gone) invokes `deriver`, records the new
    /// entry, and then runs an eviction sweep.
    ///
    /// # Errors
    ///
    /// - [`CacheError::Io`] if the source cannot be hashed or the index
    ///   cannot be written
    /// - [`CacheError::Derive`] if the deriver fails
    #[instrument(skip(self, deriver), fields(source = %source.display(), variant = %variant))]
    pub fn get_or_create(
        &self,
        source: &Path,
        variant: Variant,
        deriver: &dyn VariantDeriver,
    ) -> Result<PathBuf, CacheError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = self.acquire_root_lock()?;

        let key = self.cache_key(source, variant)?;
        let artifact_path = self.root.join(&key);

        let mut index = self.load_index();

        if let Some(entry) = index.get_mut(&key) {
            if artifact_path.exists() {
                // Hit: refresh last-access time only
                entry.timestamp = now_secs();
                self.save_index(&index)?;
                debug!(key = %key, "cache hit");
                return Ok(artifact_path);
            }
            // Dangling entry: artifact lost out-of-band, fall through to
            // re-derivation under the same key
            debug!(key = %key, "dangling cache entry, re-deriving");
        }

        deriver
            .derive(source, &artifact_path, variant)
            .map_err(|e| CacheError::Derive {
                path: source.to_path_buf(),
                source: e,
            })?;

        let size = fs::metadata(&artifact_path)
            .map_err(|e| CacheError::io(&artifact_path, e))?
            .len();

        index.insert(
            key.clone(),
            CacheEntry {
                timestamp: now_secs(),
                size,
                original: source.display().to_string(),
            },
        );

        self.sweep(&mut index);
        self.save_index(&index)?;

        debug!(key = %key, size, "cache insert");
        Ok(artifact_path)
    }

    /// Derives the cache key: SHA-256 of the source content plus the
    /// canonical variant label.
    fn cache_key(&self, source: &Path, variant: Variant) -> Result<String, CacheError> {
        let file = File::open(source).map_err(|e| CacheError::io(source, e))?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();
        let mut buf = [0u8; HASH_BUF_SIZE];

        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| CacheError::io(source, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(format!("{}_{variant}", hex::encode(hasher.finalize())))
    }

    /// Removes entries past the maximum age, then removes oldest-first
    /// until total retained size is under the limit.
    ///
    /// Invoked after every insertion, never after a pure hit.
    fn sweep(&self, index: &mut CacheIndex) {
        let now = now_secs();
        let max_age = self.config.max_age.as_secs_f64();

        let expired: Vec<String> = index
            .iter()
            .filter(|(_, entry)| now - entry.timestamp > max_age)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove_entry(index, &key);
        }

        let mut total_size: u64 = index.values().map(|entry| entry.size).sum();
        while total_size > self.config.max_size_bytes {
            let Some(oldest) = index
                .iter()
                .min_by(|a, b| {
                    a.1.timestamp
                        .partial_cmp(&b.1.timestamp)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(key, _)| key.clone())
            else {
                break;
            };

            if let Some(entry) = index.get(&oldest) {
                total_size = total_size.saturating_sub(entry.size);
            }
            self.remove_entry(index, &oldest);
        }
    }

    /// Drops an entry from the index and deletes its artifact.
    ///
    /// The index is the source of truth for existence, so the record is
    /// removed even when the artifact unlink fails (best-effort cleanup).
    fn remove_entry(&self, index: &mut CacheIndex, key: &str) {
        let artifact = self.root.join(key);
        if let Err(e) = fs::remove_file(&artifact) {
            warn!(key, error = %e, "failed to remove cache artifact");
        }
        index.remove(key);
    }

    /// Loads the index, treating an absent or corrupt file as empty.
    fn load_index(&self) -> CacheIndex {
        match fs::read(self.index_path()) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => CacheIndex::new(),
        }
    }

    /// Persists the index as JSON.
    fn save_index(&self, index: &CacheIndex) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(index)?;
        let path = self.index_path();
        fs::write(&path, bytes).map_err(|e| CacheError::io(path, e))
    }

    /// Takes the advisory file lock for this cache root, blocking until
    /// available. Released when the returned handle drops.
    fn acquire_root_lock(&self) -> Result<File, CacheError> {
        let path = self.root.join(LOCK_FILE);
        let file = File::create(&path).map_err(|e| CacheError::io(&path, e))?;
        file.lock_exclusive()
            .map_err(|e| CacheError::io(&path, e))?;
        Ok(file)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }
}

/// Seconds since the Unix epoch as a float, matching the index format.
fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
