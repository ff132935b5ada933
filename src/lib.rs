// src/lib.rs

//! Canopy Dependency Resolver
//!
//! Computes a complete, deduplicated installation plan for npm-style
//! package trees: which version of every transitive dependency to
//! install, where in the `node_modules` hierarchy it must live, and which
//! tarballs need fetching — reusing already-cached packages whenever a
//! cached version satisfies the requested range.
//!
//! # Architecture
//!
//! - Hoist-first placement: shared top-level directories, with conflicting
//!   versions nested under their dependents
//! - Deterministic plans: placement is decided in declared precedence
//!   order, independent of fetch scheduling
//! - Single fetch per package version: satisfaction checks, request
//!   coalescing and permanent directory reservations each close one
//!   duplicate-work path
//! - Library only: tarball download/extraction, CLI and terminal progress
//!   belong to the surrounding tooling, fed through the [`EventSink`]
//!   interface

pub mod cache;
pub mod config;
mod error;
pub mod events;
pub mod manifest;
pub mod registry;
pub mod resolver;
pub mod version;

pub use cache::{CacheIndex, CacheStore, CachedVersion};
pub use config::{ResolverConfig, DEFAULT_REGISTRY_URL};
pub use error::{Error, Result};
pub use events::{
    ChannelSink, CollectingSink, EventSink, LogSink, ResolvedDependencyEvent, SilentSink,
};
pub use manifest::{read_manifest, DepDecl, DepOptions, DependencyKind, PackageManifest};
pub use registry::{
    DistInfo, FetchCoalescer, HttpManifestFetcher, ManifestFetcher, ResolvedManifest,
};
pub use resolver::{
    DependencyRequest, DirectoryAllocator, EntryKey, ResolutionCache, ResolutionPlan,
    ResolutionStats, ResolvedEntry, Resolver, Satisfaction,
};
pub use version::{range_satisfies, VersionRange};
