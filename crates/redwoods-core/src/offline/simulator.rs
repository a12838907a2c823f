use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::OfflineCounts;

// ============================================================================
// Constants
// ============================================================================

/// Delay between simulated items.
pub const DEFAULT_TICK: Duration = Duration::from_millis(200);

/// Share of items the default oracle fails.
const DEFAULT_FAILURE_RATE: f64 = 0.1;

/// Decides whether the item at a given position fails to sync.
pub trait FailureOracle: Send + 'static {
    fn item_fails(&mut self, index: u64) -> bool;
}

impl<F> FailureOracle for F
where
    F: FnMut(u64) -> bool + Send + 'static,
{
    fn item_fails(&mut self, index: u64) -> bool {
        self(index)
    }
}

/// Fails each item independently with a fixed probability.
pub struct RandomFailures {
    rng: StdRng,
    rate: f64,
}

impl RandomFailures {
    pub fn new(rate: f64) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            rate: rate.clamp(0.0, 1.0),
        }
    }

    pub fn seeded(seed: u64, rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            rate: rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for RandomFailures {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_RATE)
    }
}

impl FailureOracle for RandomFailures {
    fn item_fails(&mut self, _index: u64) -> bool {
        self.rng.gen_bool(self.rate)
    }
}

/// Progress of the current (or last) sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub syncing: bool,
    /// Percent of items processed, 0 to 100.
    pub progress: u8,
    pub total_items: u64,
    pub synced_items: u64,
    pub failed_items: u64,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Result of a completed sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: u64,
    pub failed: u64,
    /// Pending counts left afterwards.
    pub remaining: OfflineCounts,
}

struct Inner {
    counts: OfflineCounts,
    online: bool,
    running: Option<AbortHandle>,
    /// Bumped by every start and clear; a sync task only publishes while
    /// its generation is current.
    generation: u64,
}

/// Animates sync progress for pending offline data.
pub struct SyncSimulator {
    status: Arc<watch::Sender<SyncStatus>>,
    inner: Arc<Mutex<Inner>>,
    oracle: Arc<Mutex<Box<dyn FailureOracle>>>,
    tick: Duration,
}

impl SyncSimulator {
    pub fn new(counts: OfflineCounts) -> Self {
        Self::with_oracle(counts, RandomFailures::default())
    }

    pub fn with_oracle(counts: OfflineCounts, oracle: impl FailureOracle) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        let oracle: Box<dyn FailureOracle> = Box::new(oracle);
        Self {
            status: Arc::new(status),
            inner: Arc::new(Mutex::new(Inner {
                counts,
                online: true,
                running: None,
                generation: 0,
            })),
            oracle: Arc::new(Mutex::new(oracle)),
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn counts(&self) -> OfflineCounts {
        self.lock().counts
    }

    pub fn storage_usage_mb(&self) -> f64 {
        self.counts().storage_usage_mb()
    }

    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Record connectivity. Coming back online with pending data starts a
    /// sync, whose handle is returned.
    pub fn set_online(&self, online: bool) -> Option<JoinHandle<Option<SyncReport>>> {
        let was_online = {
            let mut inner = self.lock();
            std::mem::replace(&mut inner.online, online)
        };
        debug!(online, "Connectivity changed");
        if online && !was_online {
            self.start_sync()
        } else {
            None
        }
    }

    /// Start syncing pending items in the background.
    ///
    /// Returns `None` without doing anything when a sync is already running
    /// or nothing is pending. The task yields `None` if the sync was
    /// cleared before it finished.
    pub fn start_sync(&self) -> Option<JoinHandle<Option<SyncReport>>> {
        let mut inner = self.lock();
        if self.status.borrow().syncing {
            debug!("Sync already running");
            return None;
        }
        let counts = inner.counts;
        if !counts.has_pending() {
            return None;
        }

        let total = counts.sync_items();
        self.status.send_modify(|s| {
            s.syncing = true;
            s.progress = 0;
            s.total_items = total;
            s.synced_items = 0;
            s.failed_items = 0;
        });
        info!(total, "Starting offline sync");

        inner.generation += 1;
        let handle = tokio::spawn(run_sync(
            inner.generation,
            counts,
            self.tick,
            self.status.clone(),
            self.inner.clone(),
            self.oracle.clone(),
        ));
        inner.running = Some(handle.abort_handle());
        Some(handle)
    }

    /// Drop all pending data and reset progress. Cancels a running sync.
    pub fn clear(&self) {
        let mut inner = self.lock();
        if let Some(running) = inner.running.take() {
            running.abort();
        }
        inner.generation += 1;
        inner.counts = OfflineCounts::default();
        self.status.send_modify(|s| {
            s.syncing = false;
            s.progress = 0;
            s.total_items = 0;
            s.synced_items = 0;
            s.failed_items = 0;
        });
    }
}

impl Drop for SyncSimulator {
    fn drop(&mut self) {
        let running = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running
            .take();
        if let Some(running) = running {
            running.abort();
        }
    }
}

/// Count a failed item against its category. Items are processed emails
/// first, then messages, then drafts.
fn record_failure(failed: &mut OfflineCounts, counts: &OfflineCounts, index: u64) {
    let emails = u64::from(counts.emails);
    let messages = u64::from(counts.messages);
    if index < emails {
        failed.emails += 1;
    } else if index < emails + messages {
        failed.messages += 1;
    } else {
        failed.drafts += 1;
    }
}

async fn run_sync(
    generation: u64,
    counts: OfflineCounts,
    tick: Duration,
    status: Arc<watch::Sender<SyncStatus>>,
    inner: Arc<Mutex<Inner>>,
    oracle: Arc<Mutex<Box<dyn FailureOracle>>>,
) -> Option<SyncReport> {
    let total = counts.sync_items();
    let mut failed = OfflineCounts::default();

    for index in 0..total {
        tokio::time::sleep(tick).await;

        let fails = oracle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .item_fails(index);
        if fails {
            record_failure(&mut failed, &counts, index);
            warn!(index, "Offline item failed to sync");
        }

        // Publish under the lock so a concurrent clear() cannot interleave
        let guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.generation != generation {
            debug!("Sync cleared, dropping progress");
            return None;
        }
        let done = index + 1;
        status.send_modify(|s| {
            if fails {
                s.failed_items += 1;
            } else {
                s.synced_items += 1;
            }
            s.progress = percent(done, total);
        });
    }

    let failed_total = failed.sync_items();
    let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
    if inner.generation != generation {
        debug!("Sync cleared, dropping result");
        return None;
    }
    // Anything added while syncing stays pending on top of the failures
    let current = inner.counts;
    let remaining = OfflineCounts {
        emails: current.emails.saturating_sub(counts.emails).saturating_add(failed.emails),
        messages: current
            .messages
            .saturating_sub(counts.messages)
            .saturating_add(failed.messages),
        drafts: current.drafts.saturating_sub(counts.drafts).saturating_add(failed.drafts),
        attachments: if failed.emails == 0 {
            current.attachments.saturating_sub(counts.attachments)
        } else {
            current.attachments
        },
    };
    inner.counts = remaining;
    inner.running = None;
    status.send_modify(|s| {
        s.syncing = false;
        s.progress = 100;
        s.last_sync = Some(Utc::now());
    });
    info!(synced = total - failed_total, failed = failed_total, "Offline sync finished");

    Some(SyncReport {
        synced: total - failed_total,
        failed: failed_total,
        remaining,
    })
}

fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let scaled = (u128::from(done) * 100 + u128::from(total) / 2) / u128::from(total);
    scaled.min(100) as u8
}
