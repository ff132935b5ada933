// src/config.rs

//! Resolver configuration

use std::path::PathBuf;

/// Default npm registry endpoint
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Maximum concurrent registry fetches per resolution run
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Retry attempts for failed metadata fetches
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Configuration for a resolution run
///
/// The cache root is explicit configuration rather than a process-wide
/// constant so tests can isolate runs with temporary directories.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Registry endpoint for manifest fetches
    pub registry_url: String,

    /// Root of the on-disk package cache
    pub cache_root: PathBuf,

    /// Top-level shared installation directory, relative to the project
    pub install_root: PathBuf,

    /// Include the root manifest's devDependencies
    pub include_dev: bool,

    /// Maximum concurrent registry fetches
    pub max_concurrent_fetches: usize,

    /// Retry attempts for failed metadata fetches
    pub max_retries: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            cache_root: default_cache_root(),
            install_root: PathBuf::from("node_modules"),
            include_dev: true,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ResolverConfig {
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = url.into();
        self
    }

    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    pub fn with_install_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.install_root = root.into();
        self
    }

    pub fn with_dev(mut self, include_dev: bool) -> Self {
        self.include_dev = include_dev;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// The user-level package cache directory
///
/// Falls back to a directory under the current working directory when the
/// platform offers no cache location.
fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("canopy"))
        .unwrap_or_else(|| PathBuf::from(".canopy-cache"))
}
