// src/resolver/plan.rs

//! The resolution plan: final output of a resolver run

use crate::resolver::cache::{EntryKey, ResolvedEntry};
use semver::Version;
use std::collections::BTreeMap;
use std::path::Path;

/// Counters describing how a resolution run unfolded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Distinct installations placed (one event each)
    pub installed: usize,
    /// Edges satisfied by recording a reference to an existing nested copy
    pub reused: usize,
    /// Registry round-trips actually performed
    pub registry_fetches: usize,
    /// Edges answered from the on-disk package cache
    pub cache_hits: usize,
    /// Parent-before-children generations walked
    pub generations: usize,
}

/// The complete, deduplicated installation plan
///
/// Maps every package name to its resolved entries, keyed by version
/// (actual installations) or nested path (references). Ordered maps make
/// iteration deterministic for consumers and tests.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    pub packages: BTreeMap<String, BTreeMap<EntryKey, ResolvedEntry>>,
    pub stats: ResolutionStats,
}

impl ResolutionPlan {
    /// Entries for one package name
    pub fn get(&self, name: &str) -> Option<&BTreeMap<EntryKey, ResolvedEntry>> {
        self.packages.get(name)
    }

    /// The install path chosen for `name@version`, if that exact pair was
    /// installed
    pub fn install_path(&self, name: &str, version: &Version) -> Option<&Path> {
        self.packages
            .get(name)?
            .get(&EntryKey::Version(version.clone()))
            .map(|entry| entry.install_path.as_path())
    }

    /// Every `(name, version, install_path)` triple in the plan, ordered
    pub fn triples(&self) -> Vec<(String, Version, &Path)> {
        let mut triples = Vec::new();
        for (name, entries) in &self.packages {
            for (key, entry) in entries {
                if let EntryKey::Version(version) = key {
                    triples.push((name.clone(), version.clone(), entry.install_path.as_path()));
                }
            }
        }
        triples
    }

    /// Number of distinct installations in the plan
    pub fn install_count(&self) -> usize {
        self.packages
            .values()
            .flat_map(|entries| entries.keys())
            .filter(|key| matches!(key, EntryKey::Version(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
