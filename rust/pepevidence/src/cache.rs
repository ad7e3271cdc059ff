//! Memoization of loaded evidence sets.
//!
//! Loaders describe their inputs with a [`Fingerprint`]; an [`EvidenceCache`]
//! maps fingerprints to previously built evidence sets. The aggregation code
//! never decides the caching policy itself, callers inject one.

use crate::errors::CacheError;
use crate::models::EvidenceSet;
use serde::Serialize;
use sha2::{
    Digest,
    Sha256,
};
use std::io::{
    BufReader,
    BufWriter,
};
use std::path::{
    Path,
    PathBuf,
};
use std::time::UNIX_EPOCH;
use tracing::{
    debug,
    info,
    warn,
};

/// Name, size and modification time of an input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStamp {
    pub name: String,
    pub size: u64,
    pub modified_secs: u64,
}

impl FileStamp {
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        // Filesystems without mtime support still get a usable stamp.
        let modified_secs = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(Self {
            name: path.to_string_lossy().into_owned(),
            size: meta.len(),
            modified_secs,
        })
    }
}

/// Lowercase hex SHA-256 over a loader kind and its serialized inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new<T: Serialize>(kind: &str, payload: &T) -> Result<Self, CacheError> {
        let payload = serde_json::json!({
            "kind": kind,
            "version": env!("CARGO_PKG_VERSION"),
            "payload": payload,
        });
        let serialized = serde_json::to_vec(&payload).map_err(CacheError::Serialization)?;
        let mut hasher = Sha256::new();
        hasher.update(&serialized);
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait EvidenceCache {
    /// Returns the stored set for a fingerprint, if any.
    ///
    /// A broken entry is reported as a miss.
    fn load(&self, fingerprint: &Fingerprint) -> Option<EvidenceSet>;
    fn store(&self, fingerprint: &Fingerprint, set: &EvidenceSet) -> Result<(), CacheError>;
}

/// Never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl EvidenceCache for NoCache {
    fn load(&self, _fingerprint: &Fingerprint) -> Option<EvidenceSet> {
        None
    }

    fn store(&self, _fingerprint: &Fingerprint, _set: &EvidenceSet) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Stores each set as zstd compressed JSON named after its fingerprint.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    directory: PathBuf,
}

impl DirectoryCache {
    const EXTENSION: &'static str = "evidence.json.zst";
    const COMPRESSION_LEVEL: i32 = 3;

    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|source| CacheError::Io {
            source,
            path: directory.clone(),
        })?;
        Ok(Self { directory })
    }

    pub fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.directory
            .join(format!("{}.{}", fingerprint.key(), Self::EXTENSION))
    }

    fn try_load(&self, path: &Path) -> Result<EvidenceSet, CacheError> {
        let io_err = |source| CacheError::Io {
            source,
            path: path.to_path_buf(),
        };
        let file = std::fs::File::open(path).map_err(io_err)?;
        let decoder = zstd::Decoder::new(file).map_err(io_err)?;
        serde_json::from_reader(BufReader::new(decoder)).map_err(CacheError::Serialization)
    }
}

impl EvidenceCache for DirectoryCache {
    fn load(&self, fingerprint: &Fingerprint) -> Option<EvidenceSet> {
        let path = self.path_for(fingerprint);
        if !path.exists() {
            debug!("Cache miss for {}", fingerprint);
            return None;
        }
        match self.try_load(&path) {
            Ok(set) => {
                info!("Loaded cached evidence from {}", path.display());
                Some(set)
            }
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    fn store(&self, fingerprint: &Fingerprint, set: &EvidenceSet) -> Result<(), CacheError> {
        let path = self.path_for(fingerprint);
        let io_err = |source| CacheError::Io {
            source,
            path: path.clone(),
        };
        let file = std::fs::File::create(&path).map_err(io_err)?;
        let mut encoder =
            zstd::Encoder::new(BufWriter::new(file), Self::COMPRESSION_LEVEL).map_err(io_err)?;
        serde_json::to_writer(&mut encoder, set).map_err(CacheError::Serialization)?;
        encoder.finish().map_err(io_err)?;
        debug!("Stored evidence cache entry {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Protein;

    #[test]
    fn test_fingerprint_depends_on_params() {
        let a = Fingerprint::new("prophet", &("a.xml", 0.01)).unwrap();
        let b = Fingerprint::new("prophet", &("a.xml", 0.05)).unwrap();
        let c = Fingerprint::new("prophet", &("a.xml", 0.01)).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.key().len(), 64);
    }

    #[test]
    fn test_directory_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirectoryCache::new(dir.path().join("cache")).unwrap();
        let key = Fingerprint::new("test", &"payload").unwrap();
        assert!(cache.load(&key).is_none());

        let mut set = EvidenceSet::new(vec!["run1".into()]);
        set.insert_protein(Protein::new("P1", 1));
        cache.store(&key, &set).unwrap();
        assert_eq!(cache.load(&key), Some(set));

        std::fs::write(cache.path_for(&key), b"not zstd").unwrap();
        assert!(cache.load(&key).is_none());
    }

    #[test]
    fn test_no_cache() {
        let key = Fingerprint::new("test", &1).unwrap();
        let set = EvidenceSet::new(vec![]);
        NoCache.store(&key, &set).unwrap();
        assert!(NoCache.load(&key).is_none());
    }
}
