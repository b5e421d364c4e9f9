//! Scan result caching keyed by project root.
//!
//! One JSON snapshot per project under the cache directory, named by the
//! sha256 of the absolute root path. Validity is judged on file mtimes
//! alone: any candidate newer than the snapshot, or any change to the
//! candidate set, invalidates the whole entry. Writes go through a temp
//! file and rename, so concurrent readers never observe a torn snapshot.

use crate::error::Result;
use chrono::{DateTime, Utc};
use covenant_protocol::{Action, Diagnostic};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persisted scan snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Absolute project root the snapshot was taken from.
    pub root: String,
    pub created_at: DateTime<Utc>,
    /// Candidate file mtimes in epoch milliseconds, keyed by path
    /// relative to the root.
    pub file_mtimes: BTreeMap<String, i64>,
    pub actions: Vec<Action>,
    /// Every diagnostic the scan produced, including module-level ones
    /// (parse failures) that no action carries.
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl CacheSnapshot {
    /// A snapshot is valid for `current` iff the candidate set is
    /// unchanged and no file is newer than recorded.
    pub fn is_valid_for(&self, current: &BTreeMap<String, i64>) -> bool {
        if self.file_mtimes.len() != current.len() {
            return false;
        }
        current.iter().all(|(path, mtime)| {
            self.file_mtimes
                .get(path)
                .is_some_and(|recorded| mtime <= recorded)
        })
    }
}

/// Cache directory handle. Single writer, last write wins.
#[derive(Debug, Clone)]
pub struct ScanCache {
    dir: PathBuf,
}

impl ScanCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Cache under the default location, `~/.covenant/cache/scanner`.
    pub fn default_location() -> Self {
        Self::new(covenant_logging::scanner_cache_dir())
    }

    /// Snapshot path for a project root.
    pub fn entry_path(&self, root: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(root.to_string_lossy().as_bytes());
        let digest = hasher.finalize();
        let mut name = String::with_capacity(digest.len() * 2 + 5);
        for byte in digest {
            name.push_str(&format!("{:02x}", byte));
        }
        name.push_str(".json");
        self.dir.join(name)
    }

    /// Load the snapshot for a root. Any failure (missing, unreadable,
    /// stale format) reads as a miss.
    pub fn load(&self, root: &Path) -> Option<CacheSnapshot> {
        let path = self.entry_path(root);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    /// Persist a fresh snapshot, replacing any previous entry.
    pub fn store(
        &self,
        root: &Path,
        file_mtimes: BTreeMap<String, i64>,
        actions: &[Action],
        diagnostics: &[Diagnostic],
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let snapshot = CacheSnapshot {
            root: root.to_string_lossy().to_string(),
            created_at: Utc::now(),
            file_mtimes,
            actions: actions.to_vec(),
            diagnostics: diagnostics.to_vec(),
        };
        let path = self.entry_path(root);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&snapshot)?)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), actions = snapshot.actions.len(), "Stored scan cache");
        Ok(())
    }

    /// Drop the entry for a root, if any.
    pub fn clear(&self, root: &Path) -> Result<()> {
        let path = self.entry_path(root);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Mtime of a file in epoch milliseconds.
pub fn mtime_millis(path: &Path) -> Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    let millis = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    Ok(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn snapshot(mtimes: &[(&str, i64)]) -> CacheSnapshot {
        CacheSnapshot {
            root: "/p".to_string(),
            created_at: Utc::now(),
            file_mtimes: mtimes
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            actions: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn mtimes(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn unchanged_mtimes_are_valid() {
        let snap = snapshot(&[("tools/a.py", 100), ("tools/b.py", 200)]);
        assert!(snap.is_valid_for(&mtimes(&[("tools/a.py", 100), ("tools/b.py", 200)])));
    }

    #[test]
    fn newer_file_invalidates() {
        let snap = snapshot(&[("tools/a.py", 100)]);
        assert!(!snap.is_valid_for(&mtimes(&[("tools/a.py", 101)])));
    }

    #[test]
    fn file_set_change_invalidates() {
        let snap = snapshot(&[("tools/a.py", 100)]);
        assert!(!snap.is_valid_for(&mtimes(&[("tools/a.py", 100), ("tools/b.py", 50)])));
        assert!(!snap.is_valid_for(&mtimes(&[])));
        assert!(!snap.is_valid_for(&mtimes(&[("tools/other.py", 100)])));
    }

    #[test]
    fn distinct_roots_get_distinct_entries() {
        let cache = ScanCache::new(PathBuf::from("/tmp/cache"));
        let a = cache.entry_path(Path::new("/projects/alpha"));
        let b = cache.entry_path(Path::new("/projects/beta"));
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with(".json"));
    }

    #[test]
    fn store_load_clear_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScanCache::new(dir.path().to_path_buf());
        let root = Path::new("/projects/alpha");

        assert!(cache.load(root).is_none());
        cache
            .store(root, mtimes(&[("tools/a.py", 100)]), &[], &[])
            .unwrap();
        let loaded = cache.load(root).unwrap();
        assert_eq!(loaded.file_mtimes.get("tools/a.py"), Some(&100));

        cache.clear(root).unwrap();
        assert!(cache.load(root).is_none());
        // Clearing an absent entry is fine.
        cache.clear(root).unwrap();
    }
}
