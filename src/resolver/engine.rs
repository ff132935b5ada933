// src/resolver/engine.rs

//! The resolution driver
//!
//! Walks the dependency graph in parent-before-children generations. Each
//! generation runs in two phases:
//!
//! 1. **Prefetch** (concurrent across names, sequential per name): every
//!    edge not already satisfied by the resolution cache loads its
//!    manifest — from the on-disk package cache when a cached version
//!    satisfies the range, otherwise from the registry. Fetches are
//!    coalesced and memoized per run and bounded by a semaphore. No
//!    shared state is committed here.
//! 2. **Commit** (sequential, declared precedence order): satisfaction
//!    check, directory allocation, cache recording and event emission for
//!    each edge, then its children join the next generation.
//!
//! Serializing commits is what makes the plan deterministic: which version
//! of a contested package wins the hoisted slot depends only on declared
//! precedence, never on fetch completion order. It also makes the
//! check-then-reserve sequence atomic, so no `(name, version)` pair is
//! ever fetched or placed twice.

use crate::cache::CacheStore;
use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, ResolvedDependencyEvent, SilentSink};
use crate::manifest::{self, DepOptions, DependencyKind, PackageManifest};
use crate::registry::{FetchCoalescer, HttpManifestFetcher, ManifestFetcher};
use crate::resolver::cache::{ResolutionCache, ResolvedEntry, Satisfaction};
use crate::resolver::placement::DirectoryAllocator;
use crate::resolver::plan::{ResolutionPlan, ResolutionStats};
use crate::version::VersionRange;
use futures::stream::{self, StreamExt};
use semver::Version;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// One edge of the dependency graph, consumed by one resolution step
#[derive(Debug, Clone)]
pub struct DependencyRequest {
    pub name: String,
    pub range: String,
    /// Directories from the install root to the requesting dependent
    pub parent_chain: Vec<PathBuf>,
    /// Set for optional declarations and inherited by every edge of an
    /// optional subtree
    pub optional: bool,
    pub kind: DependencyKind,
}

/// A manifest loaded during the prefetch phase
#[derive(Debug, Clone)]
struct Prefetched {
    version: Version,
    tarball: Option<String>,
    integrity: Option<String>,
    manifest: PackageManifest,
}

/// Shared state for one resolution run
struct RunState {
    cache: ResolutionCache,
    allocator: DirectoryAllocator,
    coalescer: FetchCoalescer,
    semaphore: Semaphore,
    registry_fetches: AtomicUsize,
    cache_hits: AtomicUsize,
}

/// The dependency resolver
///
/// Holds the run-independent collaborators; per-run state lives and dies
/// inside [`Resolver::resolve`].
pub struct Resolver {
    config: ResolverConfig,
    store: CacheStore,
    fetcher: Arc<dyn ManifestFetcher>,
    sink: Arc<dyn EventSink>,
}

impl Resolver {
    /// Create a resolver with an HTTP fetcher against the configured
    /// registry and a silent event sink
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpManifestFetcher::with_retries(
            &config.registry_url,
            config.max_retries,
        )?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Create a resolver around a custom manifest fetcher
    pub fn with_fetcher(config: ResolverConfig, fetcher: Arc<dyn ManifestFetcher>) -> Self {
        let store = CacheStore::new(config.cache_root.clone());
        Self {
            config,
            store,
            fetcher,
            sink: Arc::new(SilentSink::new()),
        }
    }

    /// Replace the event sink
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the project at `project_dir` into a complete plan
    ///
    /// Reads `<project_dir>/package.json` and resolves its dependency
    /// graph. Returns either the full plan or the first (in precedence
    /// order) non-optional failure.
    pub async fn resolve(&self, project_dir: &Path) -> Result<ResolutionPlan> {
        let root_manifest = manifest::read_manifest(&project_dir.join("package.json"))?;
        self.resolve_manifest(&root_manifest).await
    }

    /// Resolve an already-loaded root manifest
    pub async fn resolve_manifest(&self, root_manifest: &PackageManifest) -> Result<ResolutionPlan> {
        let display_name = if root_manifest.name.is_empty() {
            "project"
        } else {
            root_manifest.name.as_str()
        };
        info!("Resolving dependencies for {}", display_name);

        let decls = manifest::extract_deps(
            root_manifest,
            &DepOptions {
                dev: self.config.include_dev,
            },
        );

        let root_chain = vec![self.config.install_root.clone()];
        let mut frontier: Vec<DependencyRequest> = decls
            .into_iter()
            .map(|decl| DependencyRequest {
                name: decl.name,
                range: decl.range,
                parent_chain: root_chain.clone(),
                optional: decl.optional,
                kind: decl.kind,
            })
            .collect();

        let run = RunState {
            cache: ResolutionCache::new(),
            allocator: DirectoryAllocator::new(self.config.install_root.clone()),
            coalescer: FetchCoalescer::new(),
            semaphore: Semaphore::new(self.config.max_concurrent_fetches),
            registry_fetches: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
        };
        let mut stats = ResolutionStats::default();

        while !frontier.is_empty() {
            stats.generations += 1;
            debug!(
                "Generation {}: {} edges",
                stats.generations,
                frontier.len()
            );

            let prefetched = self.prefetch_generation(&frontier, &run).await;

            let mut next = Vec::new();
            for (request, fetched) in frontier.into_iter().zip(prefetched) {
                self.commit(request, fetched, &run, &mut next, &mut stats)?;
            }
            frontier = next;
        }

        stats.registry_fetches = run.registry_fetches.load(Ordering::Relaxed);
        stats.cache_hits = run.cache_hits.load(Ordering::Relaxed);

        info!(
            "Resolution complete: {} installed, {} reused, {} registry fetches, {} cache hits",
            stats.installed, stats.reused, stats.registry_fetches, stats.cache_hits
        );

        Ok(ResolutionPlan {
            packages: run.cache.snapshot(),
            stats,
        })
    }

    /// Load manifests for every unsatisfied edge of a generation
    ///
    /// Edges are grouped by package name: groups run concurrently, but the
    /// edges within one group run sequentially in precedence order, so a
    /// version fetched for one range is deterministically visible to the
    /// next range of the same name. This is the per-package-name
    /// serialization that keeps the check-then-fetch sequence atomic.
    ///
    /// Results come back aligned with the frontier; `None` marks edges the
    /// resolution cache already satisfies.
    async fn prefetch_generation(
        &self,
        frontier: &[DependencyRequest],
        run: &RunState,
    ) -> Vec<Option<Result<Prefetched>>> {
        let mut results: Vec<Option<Result<Prefetched>>> =
            (0..frontier.len()).map(|_| None).collect();

        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, request) in frontier.iter().enumerate() {
            groups.entry(request.name.as_str()).or_default().push(idx);
        }

        let fetches = stream::iter(groups.into_values())
            .map(|indices| async move {
                let mut group_results = Vec::with_capacity(indices.len());
                for idx in indices {
                    let fetched = self.prefetch_one(&frontier[idx], run).await;
                    group_results.push((idx, fetched));
                }
                group_results
            })
            .buffer_unordered(frontier.len().max(1));

        let collected: Vec<Vec<(usize, Option<Result<Prefetched>>)>> = fetches.collect().await;
        for (idx, result) in collected.into_iter().flatten() {
            results[idx] = result;
        }
        results
    }

    /// Load one edge's manifest: resolution cache, then the on-disk
    /// package cache, then the registry
    async fn prefetch_one(
        &self,
        request: &DependencyRequest,
        run: &RunState,
    ) -> Option<Result<Prefetched>> {
        let satisfied = run
            .cache
            .satisfies(&request.name, &request.range, &self.config.install_root);
        if !matches!(satisfied, Satisfaction::NotSatisfied) {
            return None;
        }

        if let Some(hit) = self.prefetch_from_cache(request, run).await {
            return Some(Ok(hit));
        }

        let result = run
            .coalescer
            .resolve(&request.name, &request.range, || async {
                let _permit = run.semaphore.acquire().await.unwrap();
                run.registry_fetches.fetch_add(1, Ordering::Relaxed);
                self.fetcher.fetch(&request.name, &request.range).await
            })
            .await;

        Some(result.map(|resolved| Prefetched {
            version: resolved.version.clone(),
            tarball: if resolved.dist.tarball.is_empty() {
                None
            } else {
                Some(resolved.dist.tarball.clone())
            },
            integrity: resolved
                .dist
                .integrity
                .clone()
                .or_else(|| resolved.dist.shasum.clone()),
            manifest: resolved.package_manifest(),
        }))
    }

    /// Try to satisfy an edge from the on-disk package cache
    ///
    /// A corrupt index or unreadable cached manifest degrades to a miss.
    async fn prefetch_from_cache(
        &self,
        request: &DependencyRequest,
        run: &RunState,
    ) -> Option<Prefetched> {
        let range = VersionRange::parse(&request.range).ok()?;

        let index = match self.store.load_index(&request.name).await {
            Ok(Some(index)) => index,
            Ok(None) => return None,
            Err(e) => {
                warn!("Ignoring cache index for {}: {}", request.name, e);
                return None;
            }
        };

        let (version, cached) = index.find_satisfying(&range)?;

        match self.store.read_manifest(&request.name, &version).await {
            Ok(cached_manifest) => {
                run.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache satisfies {}@{} with {}",
                    request.name, request.range, version
                );
                Some(Prefetched {
                    version,
                    tarball: Some(cached.tarball.clone()),
                    integrity: Some(cached.sha.clone()),
                    manifest: cached_manifest,
                })
            }
            Err(e) => {
                warn!(
                    "Cached manifest unreadable for {}@{}: {}",
                    request.name, version, e
                );
                None
            }
        }
    }

    /// Apply one edge's resolution decision and enqueue its children
    fn commit(
        &self,
        request: DependencyRequest,
        fetched: Option<Result<Prefetched>>,
        run: &RunState,
        next: &mut Vec<DependencyRequest>,
        stats: &mut ResolutionStats,
    ) -> Result<()> {
        match run
            .cache
            .satisfies(&request.name, &request.range, &self.config.install_root)
        {
            Satisfaction::Satisfies => return Ok(()),
            Satisfaction::NestedAt(path) => {
                stats.reused += 1;
                run.cache.record_reference(
                    &request.name,
                    path.clone(),
                    ResolvedEntry {
                        spec: request.range,
                        parent_chain: request.parent_chain,
                        optional: request.optional,
                        install_path: path,
                        kind: request.kind,
                        tarball: None,
                        integrity: None,
                    },
                );
                return Ok(());
            }
            Satisfaction::NotSatisfied => {}
        }

        let prefetched = match fetched {
            Some(Ok(prefetched)) => prefetched,
            Some(Err(e)) => {
                if request.optional {
                    debug!(
                        "Dropping optional dependency {}@{}: {}",
                        request.name, request.range, e
                    );
                    return Ok(());
                }
                return Err(e);
            }
            // The cache only grows, so an edge satisfied at prefetch time
            // cannot become unsatisfied by commit time.
            None => {
                return Err(Error::ResolutionError(format!(
                    "Missing prefetched manifest for {}@{}",
                    request.name, request.range
                )));
            }
        };

        let placed =
            run.allocator
                .allocate(&request.name, &prefetched.version, &request.parent_chain)?;
        let Some(install_path) = placed else {
            // The exact pair is already installed or mid-installation.
            return Ok(());
        };

        run.cache.record_install(
            &request.name,
            prefetched.version.clone(),
            ResolvedEntry {
                spec: request.range.clone(),
                parent_chain: request.parent_chain.clone(),
                optional: request.optional,
                install_path: install_path.clone(),
                kind: request.kind,
                tarball: prefetched.tarball.clone(),
                integrity: prefetched.integrity.clone(),
            },
        );
        stats.installed += 1;

        self.sink.add_resolved_dep(ResolvedDependencyEvent {
            name: request.name.clone(),
            version: prefetched.version.clone(),
            integrity: prefetched.integrity.clone(),
            tarball: prefetched.tarball.clone(),
            cache_path: self.store.package_dir(&request.name, &prefetched.version),
            install_path: install_path.clone(),
            kind: request.kind,
        });

        let mut child_chain = request.parent_chain;
        child_chain.push(install_path);

        let child_decls = manifest::extract_deps(&prefetched.manifest, &DepOptions { dev: false });
        for decl in child_decls {
            next.push(DependencyRequest {
                name: decl.name,
                range: decl.range,
                parent_chain: child_chain.clone(),
                optional: request.optional || decl.optional,
                kind: decl.kind,
            });
        }

        Ok(())
    }
}
