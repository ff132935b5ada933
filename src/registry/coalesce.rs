// src/registry/coalesce.rs
//! Manifest fetch coalescing and memoization (singleflight pattern)
//!
//! When multiple resolution branches request the same spec concurrently,
//! only one registry round-trip is made; other branches wait for the
//! in-flight result and share it. Results are additionally memoized for
//! the whole run: a later request whose range is satisfied by an
//! already-fetched version of the same package reuses that manifest
//! instead of asking the registry again. Failures are memoized per spec,
//! so a spec that could not resolve is never retried within a run.

use crate::error::{Error, Result};
use crate::registry::ResolvedManifest;
use crate::version::VersionRange;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Fetch coalescer and per-run manifest memo
pub struct FetchCoalescer {
    /// In-flight fetches (spec -> broadcast sender)
    inflight: DashMap<String, broadcast::Sender<std::result::Result<ResolvedManifest, Error>>>,
    /// Successfully fetched manifests by package name
    resolved: DashMap<String, Vec<ResolvedManifest>>,
    /// Failed fetches by spec
    failures: DashMap<String, Error>,
    /// Count of requests answered without a new round-trip
    coalesced_count: AtomicU64,
}

impl FetchCoalescer {
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
            resolved: DashMap::new(),
            failures: DashMap::new(),
            coalesced_count: AtomicU64::new(0),
        }
    }

    /// Resolve `name@range`, reusing any previously fetched satisfying
    /// version before executing `fetch`
    ///
    /// Reuse picks the highest memoized satisfying version, mirroring how
    /// the registry selects within the versions it knows.
    pub async fn resolve<F, Fut>(&self, name: &str, range: &str, fetch: F) -> Result<ResolvedManifest>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResolvedManifest>>,
    {
        let spec = format!("{}@{}", name, range);

        if let Some(failure) = self.failures.get(&spec) {
            self.coalesced_count.fetch_add(1, Ordering::Relaxed);
            return Err(failure.clone());
        }

        if let Some(manifest) = self.reuse(name, range) {
            debug!("Reusing fetched {}@{} for {}", name, manifest.version, spec);
            self.coalesced_count.fetch_add(1, Ordering::Relaxed);
            return Ok(manifest);
        }

        if let Some(sender) = self.inflight.get(&spec) {
            let mut rx = sender.subscribe();
            drop(sender); // Release map shard before awaiting

            debug!("Coalescing fetch for {}", spec);
            self.coalesced_count.fetch_add(1, Ordering::Relaxed);

            match rx.recv().await {
                Ok(result) => return result,
                Err(_) => {
                    // Sender dropped without sending - fall through and fetch
                    debug!("Coalesced fetch sender dropped, retrying {}", spec);
                }
            }
        }

        let (tx, _rx) = broadcast::channel(1);
        self.inflight.insert(spec.clone(), tx.clone());

        let result = fetch().await;

        match &result {
            Ok(manifest) => {
                self.resolved
                    .entry(name.to_string())
                    .or_default()
                    .push(manifest.clone());
            }
            Err(e) => {
                self.failures.insert(spec.clone(), e.clone());
            }
        }

        // Broadcast to any waiters (ignore errors if no receivers)
        let _ = tx.send(result.clone());

        self.inflight.remove(&spec);

        result
    }

    /// Highest already-fetched version of `name` satisfying `range`
    fn reuse(&self, name: &str, range: &str) -> Option<ResolvedManifest> {
        let parsed = VersionRange::parse(range).ok()?;
        let manifests = self.resolved.get(name)?;
        manifests
            .iter()
            .filter(|m| parsed.satisfies(&m.version))
            .max_by(|a, b| a.version.cmp(&b.version))
            .cloned()
    }

    /// Count of requests answered without a new registry round-trip
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced_count.load(Ordering::Relaxed)
    }

    /// Number of currently in-flight fetches
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }
}

impl Default for FetchCoalescer {
    fn default() -> Self {
        Self::new()
    }
}
