//! Content-addressed artifact store with hardened file permissions.
//!
//! Artifacts are stored by SHA-256 in a two-level layout (first two hex
//! chars as the subdirectory). Duplicate content is deduplicated: storing
//! the same bytes twice returns the same hash without a second write.
//!
//! Hashes are validated against `^[0-9a-f]{64}$` before any path is formed,
//! so path traversal through a crafted "hash" is impossible. The base
//! directory is created with mode `0o700`; files are written `0o600` via
//! temp-write + rename.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{EventStoreError, Result};

/// Store and retrieve opaque blobs by content hash.
#[derive(Debug)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    /// Open (or create) an artifact store rooted at `base_dir`.
    pub fn open(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir)?;
        restrict_dir(base_dir)?;
        Ok(Self {
            base_dir: base_dir.to_owned(),
        })
    }

    /// Store `content` and return its SHA-256 hex digest.
    ///
    /// Content already present is not rewritten.
    pub fn put(&self, content: &[u8]) -> Result<String> {
        let sha = hex_digest(content);
        let path = self.artifact_path(&sha)?;

        if !path.exists() {
            let subdir = path.parent().ok_or_else(|| {
                EventStoreError::InvalidHash(sha.clone())
            })?;
            std::fs::create_dir_all(subdir)?;
            restrict_dir(subdir)?;

            // Temp-write + rename so readers never observe a partial file.
            let tmp = path.with_extension("tmp");
            let write = || -> Result<()> {
                std::fs::write(&tmp, content)?;
                restrict_file(&tmp)?;
                std::fs::rename(&tmp, &path)?;
                Ok(())
            };
            if let Err(e) = write() {
                let _ = std::fs::remove_file(&tmp);
                return Err(e);
            }
            debug!(sha = %sha, bytes = content.len(), "artifact stored");
        }

        Ok(sha)
    }

    /// Retrieve the bytes for a hash.
    pub fn get(&self, sha256: &str) -> Result<Vec<u8>> {
        let path = self.artifact_path(sha256)?;
        if !path.exists() {
            return Err(EventStoreError::ArtifactNotFound(sha256.to_owned()));
        }
        Ok(std::fs::read(path)?)
    }

    /// Whether an artifact with the given hash is stored.
    pub fn exists(&self, sha256: &str) -> Result<bool> {
        Ok(self.artifact_path(sha256)?.exists())
    }

    /// Remove a stored artifact. Returns `true` if it existed.
    ///
    /// The parent subdirectory is removed when it becomes empty.
    pub fn delete(&self, sha256: &str) -> Result<bool> {
        let path = self.artifact_path(sha256)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        if let Some(subdir) = path.parent() {
            // only succeeds if empty
            let _ = std::fs::remove_dir(subdir);
        }
        Ok(true)
    }

    fn artifact_path(&self, sha256: &str) -> Result<PathBuf> {
        if !is_valid_hash(sha256) {
            return Err(EventStoreError::InvalidHash(sha256.to_owned()));
        }
        Ok(self.base_dir.join(&sha256[..2]).join(sha256))
    }
}

/// Whether `s` matches `^[0-9a-f]{64}$`.
#[must_use]
pub fn is_valid_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn hex_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(unix)]
fn restrict_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file(_path: &Path) -> Result<()> {
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(&dir.path().join("artifacts")).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get_roundtrip() {
        let (_dir, store) = open_store();
        let sha = store.put(b"hello artifacts").unwrap();
        assert_eq!(store.get(&sha).unwrap(), b"hello artifacts");
    }

    #[test]
    fn identical_content_same_hash_single_file() {
        let (dir, store) = open_store();
        let a = store.put(b"same bytes").unwrap();
        let b = store.put(b"same bytes").unwrap();
        assert_eq!(a, b);

        let files: Vec<_> = walk_files(&dir.path().join("artifacts"));
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn different_content_different_hash() {
        let (_dir, store) = open_store();
        let a = store.put(b"one").unwrap();
        let b = store.put(b"two").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_sixty_four_hex_chars() {
        let (_dir, store) = open_store();
        let sha = store.put(b"x").unwrap();
        assert!(is_valid_hash(&sha));
    }

    #[test]
    fn get_missing_artifact_errors() {
        let (_dir, store) = open_store();
        let err = store.get(&"0".repeat(64)).unwrap_err();
        assert!(matches!(err, EventStoreError::ArtifactNotFound(_)));
    }

    #[test]
    fn traversal_hashes_are_refused() {
        let (_dir, store) = open_store();
        for bad in ["../../etc/passwd", "ABCDEF", "", "zz", &"A".repeat(64)] {
            let err = store.get(bad).unwrap_err();
            assert!(matches!(err, EventStoreError::InvalidHash(_)), "accepted: {bad}");
        }
    }

    #[test]
    fn files_are_under_two_level_layout() {
        let (dir, store) = open_store();
        let sha = store.put(b"layout").unwrap();
        let expected = dir
            .path()
            .join("artifacts")
            .join(&sha[..2])
            .join(&sha);
        assert!(expected.exists());
    }

    #[cfg(unix)]
    #[test]
    fn permissions_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, store) = open_store();
        let sha = store.put(b"perm check").unwrap();
        let file = dir.path().join("artifacts").join(&sha[..2]).join(&sha);
        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let dir_mode = std::fs::metadata(dir.path().join("artifacts"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn delete_removes_file_and_empty_subdir() {
        let (dir, store) = open_store();
        let sha = store.put(b"to delete").unwrap();
        assert!(store.delete(&sha).unwrap());
        assert!(!store.exists(&sha).unwrap());
        assert!(!dir.path().join("artifacts").join(&sha[..2]).exists());
        assert!(!store.delete(&sha).unwrap());
    }

    fn walk_files(root: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(root).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                out.extend(walk_files(&path));
            } else {
                out.push(path);
            }
        }
        out
    }
}
