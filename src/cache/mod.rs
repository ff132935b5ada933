// src/cache/mod.rs

//! Read-only view of the on-disk package cache
//!
//! The cache root holds one directory per package name. Each carries an
//! `index.json` mapping resolved version strings to their tarball URL and
//! content digest, plus the unpacked package (including its manifest) at
//! `<root>/<name>/<version>/`. The resolver only ever reads this layout;
//! writing it is the downstream installer's job.

use crate::error::{Error, Result};
use crate::manifest::PackageManifest;
use crate::version::{max_satisfying, VersionRange};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Metadata for one cached package version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedVersion {
    /// Content-integrity digest of the tarball
    pub sha: String,
    /// Tarball URL the cached copy was fetched from
    pub tarball: String,
}

/// Parsed `index.json` for one package name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheIndex {
    versions: BTreeMap<String, CachedVersion>,
}

impl CacheIndex {
    /// Highest cached version satisfying `range`, with its metadata
    ///
    /// Index keys that are not valid semver are skipped.
    pub fn find_satisfying(&self, range: &VersionRange) -> Option<(Version, &CachedVersion)> {
        let candidates = self.versions.keys().filter_map(|k| Version::parse(k).ok());
        let best = max_satisfying(candidates, range)?;
        let entry = self.versions.get(&best.to_string())?;
        Some((best, entry))
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }
}

/// Handle on a cache root directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the unpacked copy of `name@version`
    pub fn package_dir(&self, name: &str, version: &Version) -> PathBuf {
        self.root.join(name).join(version.to_string())
    }

    /// Load the version index for a package
    ///
    /// Returns `Ok(None)` when the package has never been cached. A
    /// present-but-unreadable index is an error; callers treat it as a
    /// miss after logging.
    pub async fn load_index(&self, name: &str) -> Result<Option<CacheIndex>> {
        let path = self.root.join(name).join("index.json");
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::IoError(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let index: CacheIndex = serde_json::from_str(&content)
            .map_err(|e| Error::ParseError(format!("Corrupt cache index {}: {}", path.display(), e)))?;
        Ok(Some(index))
    }

    /// Read the manifest of a cached package version
    pub async fn read_manifest(&self, name: &str, version: &Version) -> Result<PackageManifest> {
        let path = self.package_dir(name, version).join("package.json");
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::ParseError(format!("Failed to parse {}: {}", path.display(), e)))
    }
}
