// src/resolver/mod.rs

//! Dependency resolution: cache, placement and the driver
//!
//! This module implements the core of the resolver: the shared resolution
//! cache with its range-satisfaction check, the hoist-or-nest directory
//! allocator, and the generation-based driver that ties them together
//! with the manifest fetcher and event sink.

mod cache;
mod engine;
mod placement;
mod plan;

pub use cache::{EntryKey, ResolutionCache, ResolvedEntry, Satisfaction};
pub use engine::{DependencyRequest, Resolver};
pub use placement::DirectoryAllocator;
pub use plan::{ResolutionPlan, ResolutionStats};
