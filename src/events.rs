// src/events.rs

//! Resolved-dependency event sink trait and implementations
//!
//! The resolver emits exactly one event per installation decision; a
//! version that is reused through an existing directory emits nothing
//! further. Downstream consumers (typically a tarball downloader and
//! extractor) subscribe through the `EventSink` trait.
//!
//! Sinks must never block the resolver: implementations are fire-and-forget
//! or buffered.
//!
//! # Example
//!
//! ```ignore
//! use canopy::{CollectingSink, Resolver, ResolverConfig};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(CollectingSink::new());
//! let resolver = Resolver::new(ResolverConfig::default())?.with_sink(sink.clone());
//! let plan = resolver.resolve(project_dir).await?;
//! for event in sink.events() {
//!     schedule_download(event);
//! }
//! ```

use crate::manifest::DependencyKind;
use semver::Version;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::info;

/// Immutable record of one installation decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependencyEvent {
    pub name: String,
    pub version: Version,
    /// Content-integrity digest of the tarball, when known
    pub integrity: Option<String>,
    /// Tarball URL, when known
    pub tarball: Option<String>,
    /// Where the unpacked copy lives (or will live) in the package cache
    pub cache_path: PathBuf,
    /// Directory the package must be installed at
    pub install_path: PathBuf,
    pub kind: DependencyKind,
}

/// Receiver for resolved-dependency events
///
/// Implementations must be thread-safe; events arrive from the resolver
/// as decisions are committed.
pub trait EventSink: Send + Sync {
    /// Receive one event; must not block
    fn add_resolved_dep(&self, event: ResolvedDependencyEvent);

    /// Number of events received so far
    fn count(&self) -> u64;
}

/// Silent sink (no-op)
#[derive(Debug, Default)]
pub struct SilentSink {
    count: AtomicU64,
}

impl SilentSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for SilentSink {
    fn add_resolved_dep(&self, _event: ResolvedDependencyEvent) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Logging sink
///
/// Logs every resolution decision at info level. Useful for
/// non-interactive environments or when the plan should appear in logs.
#[derive(Debug, Default)]
pub struct LogSink {
    count: AtomicU64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for LogSink {
    fn add_resolved_dep(&self, event: ResolvedDependencyEvent) {
        self.count.fetch_add(1, Ordering::Relaxed);
        info!(
            "Resolved {}@{} -> {}",
            event.name,
            event.version,
            event.install_path.display()
        );
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Collecting sink
///
/// Buffers every event for later inspection. Used by tests and by callers
/// that want the full event list after resolution completes.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ResolvedDependencyEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<ResolvedDependencyEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for CollectingSink {
    fn add_resolved_dep(&self, event: ResolvedDependencyEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn count(&self) -> u64 {
        self.events.lock().unwrap().len() as u64
    }
}

/// Channel sink
///
/// Forwards events into an unbounded tokio channel so a downstream task
/// (e.g. the tarball downloader) can start work while resolution is still
/// running. Sends are fire-and-forget; a dropped receiver discards events
/// rather than failing the resolver.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ResolvedDependencyEvent>,
    count: AtomicU64,
}

impl ChannelSink {
    /// Create a sink and the receiver for its events
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ResolvedDependencyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                count: AtomicU64::new(0),
            },
            rx,
        )
    }
}

impl EventSink for ChannelSink {
    fn add_resolved_dep(&self, event: ResolvedDependencyEvent) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(event);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
