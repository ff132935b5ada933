// src/error.rs

//! Error types for dependency resolution

use thiserror::Error;

/// Errors that can occur during dependency resolution
///
/// The enum is `Clone` so in-flight fetch results (including failures) can
/// be broadcast to coalesced waiters without losing the variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Dependency spec unresolvable against the registry or cache
    #[error("Package not found: {0}")]
    NotFound(String),

    /// Transient network failure while talking to the registry
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// Malformed version range
    #[error("Invalid version range: {0}")]
    InvalidRange(String),

    /// Malformed version string
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// A reserved installation path would be reassigned to a different
    /// package version. Indicates a driver bug if it ever surfaces.
    #[error("Path conflict at {path}: reserved for {existing}, requested for {requested}")]
    PathConflict {
        path: String,
        existing: String,
        requested: String,
    },

    /// Resolution failed for a reason other than the above
    #[error("Resolution failed: {0}")]
    ResolutionError(String),

    /// Failed to parse a manifest, packument or cache index
    #[error("Parse error: {0}")]
    ParseError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Component initialization failed
    #[error("Initialization error: {0}")]
    InitError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
