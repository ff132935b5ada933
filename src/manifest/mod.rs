// src/manifest/mod.rs

//! Manifest reading and dependency extraction
//!
//! Loads a `package.json` into a typed model and normalizes its four
//! dependency tables into a flat list of declarations for the resolver.
//! Extraction order is fixed (dependencies, devDependencies, optional,
//! peer; names sorted within each table), which is what makes resolution
//! precedence well-defined independent of JSON key order.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Dependency classification, mirroring the manifest table a declaration
/// came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Regular runtime dependency
    #[default]
    Prod,
    /// Development-only dependency (installed for the root manifest only)
    Dev,
    /// Peer dependency (range-checked, no arbitration)
    Peer,
    /// Optional dependency (failures are dropped silently)
    Optional,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prod => write!(f, "prod"),
            Self::Dev => write!(f, "dev"),
            Self::Peer => write!(f, "peer"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

/// package.json structure
///
/// Only the fields the resolver consumes; unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(rename = "devDependencies", default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(rename = "optionalDependencies", default)]
    pub optional_dependencies: BTreeMap<String, String>,
    #[serde(rename = "peerDependencies", default)]
    pub peer_dependencies: BTreeMap<String, String>,
}

/// One normalized dependency declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepDecl {
    pub name: String,
    pub range: String,
    pub optional: bool,
    pub kind: DependencyKind,
}

/// Options for dependency extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct DepOptions {
    /// Include devDependencies (root manifest only, per policy)
    pub dev: bool,
}

/// Read and parse a package.json file
pub fn read_manifest(path: &Path) -> Result<PackageManifest> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::ParseError(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Normalize a manifest's dependency tables into declarations
///
/// A name listed in both `dependencies` and `optionalDependencies` is
/// emitted once, as optional. Later tables never shadow earlier ones
/// beyond that rule.
pub fn extract_deps(manifest: &PackageManifest, opts: &DepOptions) -> Vec<DepDecl> {
    let mut deps = Vec::new();
    let mut seen: Vec<&str> = Vec::new();

    for (name, range) in &manifest.dependencies {
        if manifest.optional_dependencies.contains_key(name) {
            continue;
        }
        seen.push(name);
        deps.push(DepDecl {
            name: name.clone(),
            range: range.clone(),
            optional: false,
            kind: DependencyKind::Prod,
        });
    }

    if opts.dev {
        for (name, range) in &manifest.dev_dependencies {
            if seen.contains(&name.as_str()) || manifest.optional_dependencies.contains_key(name) {
                continue;
            }
            seen.push(name);
            deps.push(DepDecl {
                name: name.clone(),
                range: range.clone(),
                optional: false,
                kind: DependencyKind::Dev,
            });
        }
    }

    for (name, range) in &manifest.optional_dependencies {
        seen.push(name);
        deps.push(DepDecl {
            name: name.clone(),
            range: range.clone(),
            optional: true,
            kind: DependencyKind::Optional,
        });
    }

    for (name, range) in &manifest.peer_dependencies {
        if seen.contains(&name.as_str()) {
            continue;
        }
        deps.push(DepDecl {
            name: name.clone(),
            range: range.clone(),
            optional: false,
            kind: DependencyKind::Peer,
        });
    }

    deps
}
