//! Analysis cache with per-key single-flight computation
//!
//! Completed reports live in a bounded Moka cache with time-to-live expiry.
//! Computations in progress are tracked in a separate map of in-flight
//! markers: the first caller for a key becomes the leader and computes, later
//! callers for the same key wait on the leader's result. The map lock is only
//! held to read or edit markers, so unrelated keys never wait on each other.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{AnalysisError, DateRange, SubjectId, TrendReport};

type Shared = Option<Result<Arc<TrendReport>, AnalysisError>>;

/// Where a superseded leader finds the run that replaced it
type Handover = Arc<Mutex<Option<watch::Receiver<Shared>>>>;

/// Cache identity of one analysis request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub subject: SubjectId,
    pub range: DateRange,
}

impl CacheKey {
    pub fn new(subject: SubjectId, range: DateRange) -> Self {
        Self { subject, range }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub time_to_live: Duration,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            time_to_live: Duration::from_secs(15 * 60),
            max_entries: 1_000,
        }
    }
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
    result: watch::Receiver<Shared>,
    handover: Handover,
}

enum Role {
    Hit(Arc<TrendReport>),
    Follower(watch::Receiver<Shared>),
    Leader {
        generation: u64,
        cancel: CancellationToken,
        publish: watch::Sender<Shared>,
        handover: Handover,
    },
}

pub struct AnalysisCache {
    entries: Cache<CacheKey, Arc<TrendReport>>,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    next_generation: AtomicU64,
}

impl AnalysisCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.time_to_live)
                .build(),
            in_flight: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<TrendReport>> {
        self.entries.get(key)
    }

    /// Store `report`, replacing any earlier entry for the key
    pub fn put(&self, key: CacheKey, report: Arc<TrendReport>) {
        self.entries.insert(key, report);
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.entries.invalidate(key);
    }

    /// Number of keys with a computation currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Return the cached report for `key`, or compute it exactly once
    ///
    /// With `force_refresh` the entry is dropped, any in-flight run for the key
    /// is cancelled, and this caller computes a replacement that every waiter
    /// receives. A run whose token was cancelled never populates the cache.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        force_refresh: bool,
        compute: F,
    ) -> Result<Arc<TrendReport>, AnalysisError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<TrendReport, AnalysisError>>,
    {
        let mut compute = Some(compute);
        let mut force_refresh = force_refresh;

        loop {
            match self.claim(&key, force_refresh) {
                Role::Hit(report) => {
                    debug!(subject = %key.subject, range = %key.range, "analysis cache hit");
                    return Ok(report);
                }
                Role::Follower(result) => {
                    if let Some(outcome) = Self::wait(result).await {
                        return outcome;
                    }
                    // The leader went away without publishing; look again.
                }
                Role::Leader {
                    generation,
                    cancel,
                    publish,
                    handover,
                } => {
                    let _marker = MarkerGuard {
                        cache: self,
                        key: &key,
                        generation,
                    };
                    let Some(compute) = compute.take() else {
                        return Err(AnalysisError::Cancelled);
                    };

                    let outcome = compute(cancel.clone()).await;
                    if cancel.is_cancelled() {
                        // Superseded by a forced refresh: take its result, even
                        // when that run already finished and left no marker.
                        debug!(subject = %key.subject, range = %key.range, "analysis run superseded");
                        let successor = handover.lock().take();
                        if let Some(result) = successor {
                            if let Some(outcome) = Self::wait(result).await {
                                return outcome;
                            }
                        }
                        force_refresh = false;
                        continue;
                    }

                    let outcome = outcome.map(Arc::new);
                    if let Ok(report) = &outcome {
                        self.entries.insert(key.clone(), report.clone());
                    }
                    publish.send_replace(Some(outcome.clone()));
                    return outcome;
                }
            }
        }
    }

    /// `None` when the publisher was dropped before it produced an outcome
    async fn wait(
        mut result: watch::Receiver<Shared>,
    ) -> Option<Result<Arc<TrendReport>, AnalysisError>> {
        result
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|value| value.clone())
    }

    fn claim(&self, key: &CacheKey, force_refresh: bool) -> Role {
        let mut in_flight = self.in_flight.lock();

        let mut superseded = None;
        if force_refresh {
            superseded = in_flight.remove(key);
            self.entries.invalidate(key);
        } else if let Some(running) = in_flight.get(key) {
            return Role::Follower(running.result.clone());
        } else if let Some(report) = self.entries.get(key) {
            return Role::Hit(report);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (publish, result) = watch::channel(None);
        let handover = Handover::default();
        if let Some(previous) = superseded {
            *previous.handover.lock() = Some(result.clone());
            previous.cancel.cancel();
        }
        in_flight.insert(
            key.clone(),
            InFlight {
                generation,
                cancel: cancel.clone(),
                result,
                handover: handover.clone(),
            },
        );
        Role::Leader {
            generation,
            cancel,
            publish,
            handover,
        }
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Removes the leader's in-flight marker when the leader finishes or is dropped
struct MarkerGuard<'a> {
    cache: &'a AnalysisCache,
    key: &'a CacheKey,
    generation: u64,
}

impl Drop for MarkerGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.cache.in_flight.lock();
        if in_flight
            .get(self.key)
            .is_some_and(|marker| marker.generation == self.generation)
        {
            in_flight.remove(self.key);
        }
    }
}
