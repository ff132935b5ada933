// src/resolver/placement.rs

//! Directory allocation: hoist-first placement with conflict nesting
//!
//! Decides the single installation directory for each `(name, version)`
//! pair. The hoist-first policy tries the top-level shared slot, then
//! nests under the nearest ancestor whose `node_modules` is free of a
//! conflicting version, walking outward through the ancestor chain.
//!
//! Invariants:
//! - a physical path is reserved for at most one `(name, version)` pair
//!   and never reassigned within a run
//! - a pair reserved anywhere is never given a second directory; repeat
//!   requests for it return `None` ("already handled")

use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use semver::Version;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Allocates installation directories and tracks reservations
#[derive(Debug)]
pub struct DirectoryAllocator {
    install_root: PathBuf,
    /// (name, version) -> reserved path
    reservations: DashMap<(String, Version), PathBuf>,
    /// path -> occupying (name, version)
    occupants: DashMap<PathBuf, (String, Version)>,
}

impl DirectoryAllocator {
    pub fn new(install_root: PathBuf) -> Self {
        Self {
            install_root,
            reservations: DashMap::new(),
            occupants: DashMap::new(),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// The canonical top-level slot for a package name
    pub fn hoisted_path(&self, name: &str) -> PathBuf {
        self.install_root.join(name)
    }

    /// The path a pair was reserved at, if any
    pub fn path_for(&self, name: &str, version: &Version) -> Option<PathBuf> {
        self.reservations
            .get(&(name.to_string(), version.clone()))
            .map(|r| r.value().clone())
    }

    /// Choose and reserve the installation directory for `name@version`
    /// requested under `parent_chain`
    ///
    /// Returns `None` when the pair is already reserved (by an earlier
    /// edge or a concurrent branch): the existing installation is
    /// authoritative and the caller must not emit or recurse.
    pub fn allocate(
        &self,
        name: &str,
        version: &Version,
        parent_chain: &[PathBuf],
    ) -> Result<Option<PathBuf>> {
        let pair = (name.to_string(), version.clone());
        if self.reservations.contains_key(&pair) {
            return Ok(None);
        }

        for candidate in self.candidates(name, parent_chain) {
            match self.occupants.entry(candidate.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(pair.clone());
                    self.reservations.insert(pair, candidate.clone());
                    debug!("Placed {}@{} at {}", name, version, candidate.display());
                    return Ok(Some(candidate));
                }
                Entry::Occupied(slot) => {
                    let (occupant_name, occupant_version) = slot.get();
                    if occupant_name == name && occupant_version == version {
                        // Same pair mid-installation by another edge
                        return Ok(None);
                    }
                    if occupant_name == name {
                        // Conflicting version holds this slot; nest deeper
                        continue;
                    }
                    // A slot ending in /name occupied by another package
                    // means reservation bookkeeping is corrupt.
                    return Err(Error::PathConflict {
                        path: candidate.display().to_string(),
                        existing: format!("{}@{}", occupant_name, occupant_version),
                        requested: format!("{}@{}", name, version),
                    });
                }
            }
        }

        Err(Error::ResolutionError(format!(
            "No installation slot available for {}@{} under {}",
            name,
            version,
            parent_chain
                .last()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )))
    }

    /// Candidate slots in placement order: the hoisted slot, then the
    /// ancestors' `node_modules`, nearest first
    fn candidates(&self, name: &str, parent_chain: &[PathBuf]) -> Vec<PathBuf> {
        let mut candidates = vec![self.hoisted_path(name)];
        for ancestor in parent_chain.iter().rev() {
            if *ancestor == self.install_root {
                continue;
            }
            candidates.push(ancestor.join("node_modules").join(name));
        }
        candidates
    }

    /// Number of reserved `(name, version)` pairs
    pub fn reserved_count(&self) -> usize {
        self.reservations.len()
    }
}
