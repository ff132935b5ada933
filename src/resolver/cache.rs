// src/resolver/cache.rs

//! The shared resolution cache and range-satisfaction check
//!
//! One entry set per package name. Entries keyed by a concrete version are
//! actual installations (hoisted or nested); entries keyed by a nested
//! path are references to an installation that already lives at a
//! non-hoisted location. Only version keys participate in satisfaction
//! matching: nested keys are conflict-resolved placements by construction
//! and are never shareable.

use crate::manifest::DependencyKind;
use crate::version::range_satisfies;
use dashmap::DashMap;
use semver::Version;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Key of a resolved entry within one package name's entry set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKey {
    /// An actual installation of this concrete version
    Version(Version),
    /// A reference to an installation nested at this path
    Nested(PathBuf),
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(v) => write!(f, "{}", v),
            Self::Nested(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One resolution decision for a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    /// The version range the edge requested
    pub spec: String,
    /// Directory chain from the install root to the requesting dependent
    pub parent_chain: Vec<PathBuf>,
    pub optional: bool,
    /// Directory the package is installed at (for references, the
    /// directory of the installation being reused)
    pub install_path: PathBuf,
    pub kind: DependencyKind,
    pub tarball: Option<String>,
    pub integrity: Option<String>,
}

/// Outcome of a satisfaction check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Satisfaction {
    /// No cached version of the package satisfies the range
    NotSatisfied,
    /// A satisfying version is installed at the canonical hoisted path;
    /// the edge needs no further work
    Satisfies,
    /// A satisfying version exists but lives at a nested path; the caller
    /// records a reference without re-resolving
    NestedAt(PathBuf),
}

/// Process-wide resolution state for one run
///
/// Mutated only by the resolver's commit step, read by the satisfaction
/// check; discarded once the plan is handed downstream.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: DashMap<String, BTreeMap<EntryKey, ResolvedEntry>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether an already-resolved version of `name` satisfies
    /// `range`
    ///
    /// Tie-break: a version at the hoisted path wins over any satisfying
    /// nested version; among satisfying nested versions the highest wins.
    /// A malformed range satisfies nothing.
    pub fn satisfies(&self, name: &str, range: &str, install_root: &Path) -> Satisfaction {
        let Some(entries) = self.entries.get(name) else {
            return Satisfaction::NotSatisfied;
        };

        let hoisted = install_root.join(name);
        let mut best_nested: Option<(Version, PathBuf)> = None;

        for (key, entry) in entries.iter() {
            let EntryKey::Version(version) = key else {
                continue;
            };
            if !range_satisfies(range, version) {
                continue;
            }
            if entry.install_path == hoisted {
                return Satisfaction::Satisfies;
            }
            let higher = best_nested
                .as_ref()
                .map_or(true, |(best, _)| version > best);
            if higher {
                best_nested = Some((version.clone(), entry.install_path.clone()));
            }
        }

        match best_nested {
            Some((_, path)) => Satisfaction::NestedAt(path),
            None => Satisfaction::NotSatisfied,
        }
    }

    /// Record an actual installation of `name@version`
    pub fn record_install(&self, name: &str, version: Version, entry: ResolvedEntry) {
        self.entries
            .entry(name.to_string())
            .or_default()
            .insert(EntryKey::Version(version), entry);
    }

    /// Record a reference to an installation nested at `path`
    pub fn record_reference(&self, name: &str, path: PathBuf, entry: ResolvedEntry) {
        self.entries
            .entry(name.to_string())
            .or_default()
            .insert(EntryKey::Nested(path), entry);
    }

    /// Number of package names with at least one entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered snapshot of all entries, consumed into the final plan
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<EntryKey, ResolvedEntry>> {
        self.entries
            .iter()
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect()
    }
}
