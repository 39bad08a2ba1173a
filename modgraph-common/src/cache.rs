// modgraph-common/src/cache.rs
// Traversal-scoped resolution caches.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, trace};

use super::error::{ModgraphError, Result};

/// Two-tier cache for one traversal.
///
/// `lookup_names` dedupes logical imports (same specifier from the same
/// directory) before the filename resolver runs. `filenames` dedupes physical
/// files reached through different specifiers. Files claimed but not yet
/// appended to the output are tracked as in flight so that a later edge can
/// wait for them to settle.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    lookup_names: HashMap<String, PathBuf>,
    filenames: HashSet<PathBuf>,
    in_flight: HashMap<PathBuf, InFlight>,
}

#[derive(Debug)]
struct InFlight {
    settled: watch::Sender<bool>,
    /// Files this one cannot settle before: claimed children and awaited files.
    waits_on: HashSet<PathBuf>,
}

/// Outcome of trying to claim a resolved filename.
#[derive(Debug)]
pub enum Claim {
    /// First time this file is seen; the caller must load and walk it.
    New,
    /// Already handled or being handled elsewhere.
    Seen,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lookup(&self, lookup_name: &str) -> Option<PathBuf> {
        self.state().lookup_names.get(lookup_name).cloned()
    }

    pub fn record_lookup(&self, lookup_name: &str, filename: &Path) {
        let mut state = self.state();
        if let Some(previous) = state
            .lookup_names
            .insert(lookup_name.to_string(), filename.to_path_buf())
        {
            if previous != filename {
                debug!(
                    "Lookup name '{}' re-resolved from {} to {}",
                    lookup_name,
                    previous.display(),
                    filename.display()
                );
            }
        }
    }

    pub fn contains_filename(&self, filename: &Path) -> bool {
        self.state().filenames.contains(filename)
    }

    /// Atomically checks the filename cache and records `filename` in it.
    /// A new claim is marked in flight and linked under `parent` when the
    /// parent is itself in flight.
    pub fn claim(&self, filename: &Path, parent: &Path) -> Claim {
        let mut state = self.state();
        if !state.filenames.insert(filename.to_path_buf()) {
            return Claim::Seen;
        }
        let (settled, _) = watch::channel(false);
        state.in_flight.insert(
            filename.to_path_buf(),
            InFlight {
                settled,
                waits_on: HashSet::new(),
            },
        );
        if parent != filename {
            if let Some(entry) = state.in_flight.get_mut(parent) {
                entry.waits_on.insert(filename.to_path_buf());
            }
        }
        trace!("Claimed {}", filename.display());
        Claim::New
    }

    /// Marks `filename` as appended to the output and wakes its waiters.
    pub fn settle(&self, filename: &Path) {
        let mut state = self.state();
        if let Some(entry) = state.in_flight.remove(filename) {
            entry.settled.send_replace(true);
            trace!("Settled {}", filename.display());
        }
    }

    /// Returns a receiver to wait on when `filename` is still in flight and
    /// waiting on it from `waiter` cannot close a cycle. `None` means the
    /// caller may continue immediately.
    pub fn pending(&self, filename: &Path, waiter: &Path) -> Option<watch::Receiver<bool>> {
        let mut state = self.state();
        let receiver = state.in_flight.get(filename)?.settled.subscribe();
        if !state.in_flight.contains_key(waiter) {
            return Some(receiver);
        }
        if filename == waiter || state.reaches(filename, waiter) {
            debug!(
                "Cycle between {} and {}; not waiting",
                waiter.display(),
                filename.display()
            );
            return None;
        }
        if let Some(entry) = state.in_flight.get_mut(waiter) {
            entry.waits_on.insert(filename.to_path_buf());
        }
        Some(receiver)
    }

    /// Waits for `filename` to settle unless that would deadlock.
    pub async fn wait_settled(&self, filename: &Path, waiter: &Path) -> Result<()> {
        let Some(mut receiver) = self.pending(filename, waiter) else {
            return Ok(());
        };
        trace!("{} waits for {}", waiter.display(), filename.display());
        receiver
            .wait_for(|settled| *settled)
            .await
            .map(|_| ())
            .map_err(|_| ModgraphError::Interrupted(filename.to_path_buf()))
    }

    pub fn in_flight_count(&self) -> usize {
        self.state().in_flight.len()
    }

    pub fn filename_count(&self) -> usize {
        self.state().filenames.len()
    }
}

impl CacheState {
    /// Whether `to` is reachable from `from` through in-flight wait edges.
    fn reaches(&self, from: &Path, to: &Path) -> bool {
        let mut stack = vec![from.to_path_buf()];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(entry) = self.in_flight.get(&current) {
                stack.extend(
                    entry
                        .waits_on
                        .iter()
                        .filter(|next| self.in_flight.contains_key(*next))
                        .cloned(),
                );
            }
        }
        false
    }
}
