// src/version/mod.rs

//! Version range handling and satisfaction for npm-style dependencies
//!
//! npm range syntax is close to, but not identical to, what the semver
//! crate parses natively. This module normalizes the differences:
//! - a bare full version (`1.2.3`) is an exact match, not a caret range
//! - partial versions widen (`1.2` means `~1.2`, `1` means `^1`)
//! - `||` separates alternatives, any of which may match
//! - hyphen ranges (`1.2.3 - 2.0.0`) are inclusive bounds
//! - `x`/`X`/`*` wildcards pass through (semver understands them)
//!
//! Distribution tags (`latest`, `next`, ...) are not ranges: parsing them
//! fails, and satisfaction checks treat a malformed range as "does not
//! satisfy". Tag specs are resolved by the registry fetcher instead.

use crate::error::{Error, Result};
use semver::{Version, VersionReq};
use std::fmt;

/// A parsed npm version range
#[derive(Debug, Clone, PartialEq)]
pub enum VersionRange {
    /// Matches any version (`*` or an empty range)
    Any,
    /// Matches exactly one version (bare `1.2.3` in npm syntax)
    Exact(Version),
    /// A single comparator set (`^1.0.0`, `>=1.2 <2`, `~1.2.3`)
    Req(VersionReq),
    /// `||`-separated alternatives, any of which may match
    AnyOf(Vec<VersionRange>),
}

impl VersionRange {
    /// Parse an npm version range string
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::Any);
        }

        let alternatives: Vec<&str> = s.split("||").collect();
        if alternatives.len() == 1 {
            return Self::parse_alternative(alternatives[0]);
        }

        let parsed = alternatives
            .into_iter()
            .map(Self::parse_alternative)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::AnyOf(parsed))
    }

    /// Parse one `||`-free alternative
    fn parse_alternative(part: &str) -> Result<Self> {
        let part = part.trim();
        if part.is_empty() || part == "*" {
            return Ok(Self::Any);
        }

        // Hyphen ranges need the spaced separator to avoid eating the
        // dash in prerelease identifiers like "1.0.0-beta".
        if let Some((lo, hi)) = part.split_once(" - ") {
            return Self::parse_hyphen(lo.trim(), hi.trim());
        }

        let tokens: Vec<&str> = part.split_whitespace().collect();

        // A single bare full version is an exact match in npm syntax.
        if tokens.len() == 1 {
            let bare = tokens[0].trim_start_matches(['v', 'V']);
            if !has_operator(tokens[0]) && !has_wildcard(bare) && numeric_parts(bare) >= 3 {
                let version = Version::parse(bare)
                    .map_err(|e| Error::InvalidVersion(format!("'{}': {}", tokens[0], e)))?;
                return Ok(Self::Exact(version));
            }
        }

        let normalized: Vec<String> = tokens.iter().map(|t| normalize_token(t)).collect();
        let req = VersionReq::parse(&normalized.join(", "))
            .map_err(|e| Error::InvalidRange(format!("'{}': {}", part, e)))?;
        Ok(Self::Req(req))
    }

    /// Parse an inclusive hyphen range `lo - hi`
    ///
    /// Partial bounds follow npm: a partial lower bound is zero-filled,
    /// a partial upper bound excludes the next widened version
    /// (`1.2.3 - 2.3` means `>=1.2.3 <2.4.0`).
    fn parse_hyphen(lo: &str, hi: &str) -> Result<Self> {
        let lower = format!(">={}", zero_fill(lo.trim_start_matches(['v', 'V'])));

        let hi = hi.trim_start_matches(['v', 'V']);
        let upper = if has_wildcard(hi) || numeric_parts(hi) >= 3 {
            format!("<={}", hi)
        } else {
            format!("<{}", next_boundary(hi)?)
        };

        let req = VersionReq::parse(&format!("{}, {}", lower, upper))
            .map_err(|e| Error::InvalidRange(format!("'{} - {}': {}", lo, hi, e)))?;
        Ok(Self::Req(req))
    }

    /// Check whether a concrete version satisfies this range
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => exact == version,
            Self::Req(req) => req.matches(version),
            Self::AnyOf(alternatives) => alternatives.iter().any(|a| a.satisfies(version)),
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "{}", v),
            Self::Req(req) => write!(f, "{}", req),
            Self::AnyOf(alternatives) => {
                let parts: Vec<String> = alternatives.iter().map(|a| a.to_string()).collect();
                write!(f, "{}", parts.join(" || "))
            }
        }
    }
}

/// Check whether `version` satisfies `range`, treating a malformed range
/// as "does not satisfy" rather than an error
pub fn range_satisfies(range: &str, version: &Version) -> bool {
    VersionRange::parse(range)
        .map(|r| r.satisfies(version))
        .unwrap_or(false)
}

/// Pick the highest version satisfying `range` from an iterator
pub fn max_satisfying<I>(versions: I, range: &VersionRange) -> Option<Version>
where
    I: IntoIterator<Item = Version>,
{
    versions.into_iter().filter(|v| range.satisfies(v)).max()
}

/// Does the token start with a comparison operator?
fn has_operator(token: &str) -> bool {
    token.starts_with(['^', '~', '>', '<', '='])
}

/// Does the version core contain an npm wildcard component?
fn has_wildcard(token: &str) -> bool {
    version_core(token)
        .split('.')
        .any(|p| p == "x" || p == "X" || p == "*")
}

/// The numeric core of a version token, before prerelease/build metadata
fn version_core(token: &str) -> &str {
    token.split(['-', '+']).next().unwrap_or(token)
}

/// Number of dotted components in the version core
fn numeric_parts(token: &str) -> usize {
    version_core(token).split('.').count()
}

/// Zero-fill a partial version ("1.2" -> "1.2.0")
fn zero_fill(token: &str) -> String {
    match numeric_parts(token) {
        1 => format!("{}.0.0", token),
        2 => format!("{}.0", token),
        _ => token.to_string(),
    }
}

/// The exclusive upper boundary one widening step above a partial version
/// ("2.3" -> "2.4.0", "2" -> "3.0.0")
fn next_boundary(token: &str) -> Result<String> {
    let parts: Vec<&str> = version_core(token).split('.').collect();
    let parse = |s: &str| {
        s.parse::<u64>()
            .map_err(|e| Error::InvalidRange(format!("'{}': {}", token, e)))
    };
    match parts.as_slice() {
        [major] => Ok(format!("{}.0.0", parse(major)? + 1)),
        [major, minor] => Ok(format!("{}.{}.0", major, parse(minor)? + 1)),
        _ => Err(Error::InvalidRange(format!(
            "'{}' is not a partial version",
            token
        ))),
    }
}

/// Normalize one npm range token into semver-crate syntax
fn normalize_token(token: &str) -> String {
    if has_operator(token) {
        return token.to_string();
    }

    let bare = token.trim_start_matches(['v', 'V']);
    if has_wildcard(bare) {
        return bare.to_string();
    }

    match numeric_parts(bare) {
        1 => format!("^{}", bare),
        2 => format!("~{}", bare),
        _ => format!("={}", bare),
    }
}
