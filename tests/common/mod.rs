// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use canopy::{DistInfo, Error, ManifestFetcher, ResolvedManifest, Resolver, ResolverConfig, VersionRange};
use semver::Version;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

/// One published version in the mock registry
#[derive(Debug, Clone, Default)]
pub struct MockPackage {
    pub dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
}

/// In-memory registry with per-spec fetch logging
///
/// Resolves ranges against its published versions the way the real
/// registry does (highest satisfying version; `latest` follows the
/// highest published version). Optional per-name delays let tests skew
/// fetch completion order without changing the input.
#[derive(Default)]
pub struct MockFetcher {
    packages: BTreeMap<String, BTreeMap<Version, MockPackage>>,
    delays: BTreeMap<String, Duration>,
    log: Mutex<Vec<(String, String, Version)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `name@version` with regular dependencies
    pub fn add(&mut self, name: &str, version: &str, deps: &[(&str, &str)]) {
        self.add_package(name, version, deps, &[]);
    }

    /// Publish `name@version` with regular and optional dependencies
    pub fn add_package(
        &mut self,
        name: &str,
        version: &str,
        deps: &[(&str, &str)],
        optional_deps: &[(&str, &str)],
    ) {
        let package = MockPackage {
            dependencies: deps
                .iter()
                .map(|(n, r)| (n.to_string(), r.to_string()))
                .collect(),
            optional_dependencies: optional_deps
                .iter()
                .map(|(n, r)| (n.to_string(), r.to_string()))
                .collect(),
        };
        self.packages
            .entry(name.to_string())
            .or_default()
            .insert(Version::parse(version).unwrap(), package);
    }

    /// Delay every fetch of `name` to skew completion order
    pub fn delay(&mut self, name: &str, millis: u64) {
        self.delays
            .insert(name.to_string(), Duration::from_millis(millis));
    }

    /// Total number of fetch invocations
    pub fn fetch_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    /// Fetch invocations for one package name
    pub fn fetches_for_name(&self, name: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _, _)| n == name)
            .count()
    }

    /// Fetch invocations that resolved to one concrete version
    pub fn fetches_for_version(&self, name: &str, version: &str) -> usize {
        let version = Version::parse(version).unwrap();
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _, v)| n == name && *v == version)
            .count()
    }
}

#[async_trait]
impl ManifestFetcher for MockFetcher {
    async fn fetch(&self, name: &str, range: &str) -> canopy::Result<ResolvedManifest> {
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }

        let versions = self
            .packages
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("{}@{}", name, range)))?;

        let best = match VersionRange::parse(range) {
            Ok(parsed) => versions.keys().filter(|v| parsed.satisfies(v)).max().cloned(),
            // The only tag the mock registry publishes
            Err(_) if range == "latest" => versions.keys().max().cloned(),
            Err(_) => None,
        }
        .ok_or_else(|| Error::NotFound(format!("{}@{}", name, range)))?;

        self.log
            .lock()
            .unwrap()
            .push((name.to_string(), range.to_string(), best.clone()));

        let package = versions.get(&best).unwrap().clone();
        Ok(ResolvedManifest {
            name: name.to_string(),
            version: best.clone(),
            dist: DistInfo {
                tarball: format!("https://mock.registry/{}/-/{}-{}.tgz", name, name, best),
                integrity: Some(format!("sha512-{}-{}", name, best)),
                shasum: None,
            },
            dependencies: package.dependencies,
            optional_dependencies: package.optional_dependencies,
            peer_dependencies: BTreeMap::new(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Write a package.json into a project directory
pub fn write_project(dir: &Path, manifest_json: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("package.json"), manifest_json).unwrap();
}

/// Seed one version of a package into an on-disk cache root
pub fn seed_cache(
    cache_root: &Path,
    name: &str,
    version: &str,
    sha: &str,
    tarball: &str,
    manifest_json: &str,
) {
    let package_root = cache_root.join(name);
    let version_dir = package_root.join(version);
    std::fs::create_dir_all(&version_dir).unwrap();

    let index_path = package_root.join("index.json");
    let mut index: serde_json::Map<String, serde_json::Value> = if index_path.exists() {
        serde_json::from_str(&std::fs::read_to_string(&index_path).unwrap()).unwrap()
    } else {
        serde_json::Map::new()
    };
    index.insert(
        version.to_string(),
        serde_json::json!({ "sha": sha, "tarball": tarball }),
    );
    std::fs::write(&index_path, serde_json::to_string_pretty(&index).unwrap()).unwrap();

    std::fs::write(version_dir.join("package.json"), manifest_json).unwrap();
}

/// Resolver wired to a mock registry and an isolated cache root
pub fn resolver_with(fetcher: Arc<MockFetcher>, cache_root: &Path) -> Resolver {
    init_logging();
    let config = ResolverConfig::default()
        .with_registry_url("https://mock.registry")
        .with_cache_root(cache_root);
    Resolver::with_fetcher(config, fetcher)
}

/// Install a tracing subscriber once per test binary (RUST_LOG-aware)
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
