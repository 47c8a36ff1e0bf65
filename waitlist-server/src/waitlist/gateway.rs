//! Change propagation gateway
//!
//! Holds the latest engine-validated [`QueueSnapshot`] and hands it to
//! viewers, either pushed through a `watch` channel or pulled by revision.
//!
//! ```text
//! QueueManager ── broadcast ──► EventRouter ── mpsc ──► PropagationGateway::run
//!                                                          │  (also ticks every poll_interval)
//!                                                          ▼
//!                                                     refresh() ──► watch ──► SSE viewers
//!                                                          │
//!                                                          └──► poll(since) ──► HTTP pollers
//! ```
//!
//! The gateway only reads from the engine. A snapshot whose positions are
//! not dense is never published; the previous one stays current instead.

use super::manager::{QueueManager, QueueResult};
use parking_lot::{Mutex, RwLock};
use shared::waitlist::{QueueEvent, QueueSnapshot, SnapshotPoll};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Default refresh interval when no event arrives
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on how old a published snapshot may get
pub const DEFAULT_MAX_STALENESS: Duration = Duration::from_secs(3);

/// Outcome of a single refresh attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A newer snapshot was published
    Published(u64),
    /// The store revision has not moved
    Unchanged(u64),
    /// The candidate failed the dense check and was dropped
    Rejected(u64),
}

pub struct PropagationGateway {
    manager: Arc<QueueManager>,
    latest: RwLock<Arc<QueueSnapshot>>,
    publish_tx: watch::Sender<Arc<QueueSnapshot>>,
    poll_interval: Duration,
    max_staleness: Duration,
    last_refresh: Mutex<Instant>,
}

impl std::fmt::Debug for PropagationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagationGateway")
            .field("revision", &self.latest.read().revision)
            .field("poll_interval", &self.poll_interval)
            .field("max_staleness", &self.max_staleness)
            .finish()
    }
}

impl PropagationGateway {
    /// Create a gateway and publish the first snapshot
    pub fn new(
        manager: Arc<QueueManager>,
        poll_interval: Duration,
        max_staleness: Duration,
    ) -> QueueResult<Self> {
        let initial = Arc::new(manager.snapshot()?);
        tracing::info!(
            revision = initial.revision,
            waiting = initial.entries.len(),
            "Propagation gateway initialized"
        );
        let (publish_tx, _) = watch::channel(Arc::clone(&initial));
        Ok(Self {
            manager,
            latest: RwLock::new(initial),
            publish_tx,
            poll_interval: poll_interval.max(Duration::from_millis(10)),
            max_staleness,
            last_refresh: Mutex::new(Instant::now()),
        })
    }

    pub fn epoch(&self) -> &str {
        self.manager.epoch()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> Arc<QueueSnapshot> {
        Arc::clone(&self.latest.read())
    }

    /// Push channel; the current value is always the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<QueueSnapshot>> {
        self.publish_tx.subscribe()
    }

    /// Pull the snapshot if it is newer than `since`
    ///
    /// A caller without a revision (first load) always gets the snapshot.
    pub fn poll(&self, since: Option<u64>) -> SnapshotPoll {
        let latest = self.latest();
        let changed = since.is_none_or(|rev| rev != latest.revision);
        SnapshotPoll {
            changed,
            revision: latest.revision,
            epoch: self.epoch().to_string(),
            snapshot: changed.then(|| (*latest).clone()),
        }
    }

    /// Time since the last successful refresh
    pub fn staleness(&self) -> Duration {
        self.last_refresh.lock().elapsed()
    }

    pub fn is_stale(&self) -> bool {
        self.staleness() > self.max_staleness
    }

    /// Read a fresh snapshot from the engine and publish it when it is newer
    ///
    /// Blocking: reads the store. Async callers use `spawn_blocking`.
    pub fn refresh(&self) -> QueueResult<RefreshOutcome> {
        let candidate = self.manager.snapshot()?;
        let revision = candidate.revision;

        if !candidate.is_dense() {
            tracing::error!(
                revision,
                positions = ?candidate.entries.iter().map(|e| e.entry.position).collect::<Vec<_>>(),
                "Invariant violation: snapshot positions are not dense, not publishing"
            );
            return Ok(RefreshOutcome::Rejected(revision));
        }

        *self.last_refresh.lock() = Instant::now();

        let mut latest = self.latest.write();
        // Revisions only move forward for viewers
        if revision <= latest.revision {
            return Ok(RefreshOutcome::Unchanged(latest.revision));
        }
        let snapshot = Arc::new(candidate);
        *latest = Arc::clone(&snapshot);
        drop(latest);

        self.publish_tx.send_replace(snapshot);
        tracing::debug!(revision, "Published queue snapshot");
        Ok(RefreshOutcome::Published(revision))
    }

    async fn refresh_async(self: &Arc<Self>) {
        let gateway = Arc::clone(self);
        match tokio::task::spawn_blocking(move || gateway.refresh()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Snapshot refresh failed"),
            Err(e) => tracing::error!(error = %e, "Snapshot refresh task failed"),
        }
        if self.is_stale() {
            tracing::warn!(
                staleness_ms = self.staleness().as_millis() as u64,
                "Published snapshot exceeds the staleness bound"
            );
        }
    }

    /// Refresh on every routed event and on every poll tick until cancelled
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<Arc<QueueEvent>>,
        shutdown: CancellationToken,
    ) {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Propagation gateway started"
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Propagation gateway stopping");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        // Coalesce a burst into a single read
                        while events.try_recv().is_ok() {}
                        tracing::trace!(revision = event.revision, "Refreshing after queue event");
                        self.refresh_async().await;
                    }
                    None => {
                        tracing::info!("Gateway event channel closed, stopping");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.refresh_async().await;
                }
            }
        }
    }
}
