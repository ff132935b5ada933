// src/registry/mod.rs

//! Registry metadata fetching
//!
//! Provides the `ManifestFetcher` abstraction the resolver consumes and an
//! HTTP implementation speaking the npm registry packument protocol. The
//! fetcher resolves a `name@range` spec to one concrete version with its
//! dist metadata; it never downloads tarballs.

mod coalesce;

pub use coalesce::FetchCoalescer;

use crate::error::{Error, Result};
use crate::manifest::PackageManifest;
use crate::version::{max_satisfying, VersionRange};
use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed metadata fetches
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Abbreviated metadata media type; the registry omits per-version fields
/// the resolver never reads
const ABBREVIATED_ACCEPT: &str = "application/vnd.npm.install-v1+json";

/// Distribution metadata for one published version
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DistInfo {
    #[serde(default)]
    pub tarball: String,
    #[serde(default)]
    pub integrity: Option<String>,
    #[serde(default)]
    pub shasum: Option<String>,
}

/// A `name@range` spec resolved to one concrete version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
    pub name: String,
    pub version: Version,
    pub dist: DistInfo,
    pub dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
    pub peer_dependencies: BTreeMap<String, String>,
}

impl ResolvedManifest {
    /// View the resolved version's dependency tables as a manifest, for
    /// uniform extraction alongside cache-loaded manifests
    pub fn package_manifest(&self) -> PackageManifest {
        PackageManifest {
            name: self.name.clone(),
            version: self.version.to_string(),
            dependencies: self.dependencies.clone(),
            dev_dependencies: BTreeMap::new(),
            optional_dependencies: self.optional_dependencies.clone(),
            peer_dependencies: self.peer_dependencies.clone(),
        }
    }
}

/// Trait for resolving a `name@range` spec against a registry
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Resolve `name@range` to a concrete version with dist metadata
    ///
    /// Fails with `NotFound` when no published version satisfies the
    /// range, or `DownloadError` on transport failures.
    async fn fetch(&self, name: &str, range: &str) -> Result<ResolvedManifest>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Full package metadata document as served by the registry
#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    versions: BTreeMap<String, VersionMetadata>,
}

/// Per-version slice of a packument
#[derive(Debug, Clone, Deserialize)]
struct VersionMetadata {
    version: String,
    #[serde(default)]
    dist: DistInfo,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(rename = "optionalDependencies", default)]
    optional_dependencies: BTreeMap<String, String>,
    #[serde(rename = "peerDependencies", default)]
    peer_dependencies: BTreeMap<String, String>,
}

/// HTTP manifest fetcher with retry support
pub struct HttpManifestFetcher {
    client: reqwest::Client,
    registry: Url,
    max_retries: u32,
}

impl HttpManifestFetcher {
    /// Create a fetcher against the given registry endpoint
    pub fn new(registry_url: &str) -> Result<Self> {
        Self::with_retries(registry_url, MAX_RETRIES)
    }

    /// Create with a custom retry count
    pub fn with_retries(registry_url: &str, max_retries: u32) -> Result<Self> {
        let registry = Url::parse(registry_url)
            .map_err(|e| Error::InitError(format!("Invalid registry URL '{}': {}", registry_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            registry,
            max_retries,
        })
    }

    /// Packument URL for a package name
    ///
    /// Scoped names keep their `@` but encode the inner slash, per the
    /// registry convention.
    fn metadata_url(&self, name: &str) -> String {
        let encoded = if name.starts_with('@') {
            name.replacen('/', "%2F", 1)
        } else {
            name.to_string()
        };
        let base = self.registry.as_str().trim_end_matches('/');
        format!("{}/{}", base, encoded)
    }

    /// Fetch a package's packument with retry support
    async fn fetch_packument(&self, name: &str) -> Result<Packument> {
        let url = self.metadata_url(name);
        debug!("Fetching packument from {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .client
                .get(&url)
                .header(reqwest::header::ACCEPT, ABBREVIATED_ACCEPT)
                .send()
                .await
            {
                Ok(response) => {
                    if response.status() == reqwest::StatusCode::NOT_FOUND {
                        return Err(Error::NotFound(name.to_string()));
                    }
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    return response.json::<Packument>().await.map_err(|e| {
                        Error::ParseError(format!("Failed to parse packument for {}: {}", name, e))
                    });
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {} after {attempt} attempts: {e}",
                            name
                        )));
                    }
                    warn!("Packument fetch attempt {} failed: {}, retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
                }
            }
        }
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, name: &str, range: &str) -> Result<ResolvedManifest> {
        let packument = self.fetch_packument(name).await.map_err(|e| match e {
            // A missing package surfaces with the full requested spec
            Error::NotFound(_) => Error::NotFound(format!("{}@{}", name, range)),
            other => other,
        })?;
        let metadata = select_version(&packument, name, range)?;

        let version = Version::parse(&metadata.version).map_err(|e| {
            Error::ParseError(format!(
                "Registry returned invalid version '{}' for {}: {}",
                metadata.version, name, e
            ))
        })?;

        debug!("Resolved {}@{} to {}", name, range, version);

        Ok(ResolvedManifest {
            name: name.to_string(),
            version,
            dist: metadata.dist.clone(),
            dependencies: metadata.dependencies.clone(),
            optional_dependencies: metadata.optional_dependencies.clone(),
            peer_dependencies: metadata.peer_dependencies.clone(),
        })
    }

    fn name(&self) -> &str {
        "registry"
    }
}

/// Pick the version a spec resolves to within a packument
///
/// Ranges select the highest satisfying published version; a spec that is
/// not a valid range is looked up as a distribution tag.
fn select_version<'a>(
    packument: &'a Packument,
    name: &str,
    range_str: &str,
) -> Result<&'a VersionMetadata> {
    let range = match VersionRange::parse(range_str) {
        Ok(range) => range,
        Err(_) => {
            let tagged = packument.dist_tags.get(range_str.trim()).ok_or_else(|| {
                Error::NotFound(format!("{}@{}", name, range_str))
            })?;
            return packument
                .versions
                .get(tagged)
                .ok_or_else(|| Error::NotFound(format!("{}@{}", name, range_str)));
        }
    };

    // An open range follows the latest tag when the registry publishes one.
    if matches!(range, VersionRange::Any) {
        if let Some(latest) = packument.dist_tags.get("latest") {
            if let Some(metadata) = packument.versions.get(latest) {
                return Ok(metadata);
            }
        }
    }

    let candidates = packument
        .versions
        .keys()
        .filter_map(|k| Version::parse(k).ok());
    let best = max_satisfying(candidates, &range)
        .ok_or_else(|| Error::NotFound(format!("{}@{}", name, range_str)))?;

    packument
        .versions
        .get(&best.to_string())
        .ok_or_else(|| Error::NotFound(format!("{}@{}", name, range_str)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packument(json: &str) -> Packument {
        serde_json::from_str(json).unwrap()
    }

    const SAMPLE: &str = r#"{
        "dist-tags": { "latest": "2.0.0", "next": "3.0.0-rc.1" },
        "versions": {
            "1.0.0": { "version": "1.0.0", "dist": { "tarball": "t1" } },
            "1.4.0": { "version": "1.4.0", "dist": { "tarball": "t2" } },
            "2.0.0": { "version": "2.0.0", "dist": { "tarball": "t3" } },
            "3.0.0-rc.1": { "version": "3.0.0-rc.1", "dist": { "tarball": "t4" } }
        }
    }"#;

    #[test]
    fn test_select_highest_satisfying() {
        let p = packument(SAMPLE);
        let m = select_version(&p, "a", "^1.0.0").unwrap();
        assert_eq!(m.version, "1.4.0");
    }

    #[test]
    fn test_select_by_tag() {
        let p = packument(SAMPLE);
        let m = select_version(&p, "a", "next").unwrap();
        assert_eq!(m.version, "3.0.0-rc.1");
    }

    #[test]
    fn test_open_range_follows_latest_tag() {
        let p = packument(SAMPLE);
        let m = select_version(&p, "a", "*").unwrap();
        assert_eq!(m.version, "2.0.0");
    }

    #[test]
    fn test_unsatisfiable_range_is_not_found() {
        let p = packument(SAMPLE);
        let result = select_version(&p, "a", "^9.0.0");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_unknown_tag_is_not_found() {
        let p = packument(SAMPLE);
        let result = select_version(&p, "a", "canary");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_metadata_url_scoped_package() {
        let fetcher = HttpManifestFetcher::new("https://registry.npmjs.org").unwrap();
        assert_eq!(
            fetcher.metadata_url("@types/node"),
            "https://registry.npmjs.org/@types%2Fnode"
        );
        assert_eq!(
            fetcher.metadata_url("lodash"),
            "https://registry.npmjs.org/lodash"
        );
    }

    #[test]
    fn test_invalid_registry_url() {
        assert!(matches!(
            HttpManifestFetcher::new("not a url"),
            Err(Error::InitError(_))
        ));
    }

    #[test]
    fn test_package_manifest_view() {
        let resolved = ResolvedManifest {
            name: "a".to_string(),
            version: Version::parse("1.2.0").unwrap(),
            dist: DistInfo::default(),
            dependencies: BTreeMap::from([("b".to_string(), "^2.0.0".to_string())]),
            optional_dependencies: BTreeMap::new(),
            peer_dependencies: BTreeMap::new(),
        };
        let manifest = resolved.package_manifest();
        assert_eq!(manifest.version, "1.2.0");
        assert_eq!(manifest.dependencies.get("b"), Some(&"^2.0.0".to_string()));
        assert!(manifest.dev_dependencies.is_empty());
    }
}
