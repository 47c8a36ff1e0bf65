//! Event Router - fans committed queue events out to consumers
//!
//! ```text
//! QueueManager (broadcast)
//!        │
//!        └── EventRouter
//!               ├── mpsc ──► AuditWorker (StatusChanged only) [CRITICAL]
//!               ├── mpsc ──► NotificationHook (StatusChanged only) [best-effort]
//!               └── mpsc ──► PropagationGateway (all events) [best-effort]
//! ```
//!
//! ## Priority
//!
//! - **Audit**: blocking send, never dropped
//! - **Notify/Gateway**: `try_send`, dropped when full. The gateway also
//!   refreshes on its poll tick, so a dropped event only delays viewers.

use shared::waitlist::{QueueEvent, QueueEventKind};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Receiving ends handed to the consumers
pub struct EventChannels {
    pub audit_rx: mpsc::Receiver<Arc<QueueEvent>>,
    pub notify_rx: mpsc::Receiver<Arc<QueueEvent>>,
    pub gateway_rx: mpsc::Receiver<Arc<QueueEvent>>,
}

pub struct EventRouter {
    audit_tx: mpsc::Sender<Arc<QueueEvent>>,
    notify_tx: mpsc::Sender<Arc<QueueEvent>>,
    gateway_tx: mpsc::Sender<Arc<QueueEvent>>,
}

fn is_status_change(event: &QueueEvent) -> bool {
    matches!(event.kind, QueueEventKind::StatusChanged { .. })
}

impl EventRouter {
    /// `audit_buffer` for the critical channel, `other_buffer` for the rest
    pub fn new(audit_buffer: usize, other_buffer: usize) -> (Self, EventChannels) {
        let (audit_tx, audit_rx) = mpsc::channel(audit_buffer.max(1));
        let (notify_tx, notify_rx) = mpsc::channel(other_buffer.max(1));
        let (gateway_tx, gateway_rx) = mpsc::channel(other_buffer.max(1));

        let router = Self {
            audit_tx,
            notify_tx,
            gateway_tx,
        };
        let channels = EventChannels {
            audit_rx,
            notify_rx,
            gateway_rx,
        };
        (router, channels)
    }

    /// Run until the source closes
    pub async fn run(self, mut source: broadcast::Receiver<QueueEvent>) {
        tracing::info!("Event router started");

        loop {
            match source.recv().await {
                Ok(event) => self.dispatch(event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::error!(
                        skipped = n,
                        "Event router lagged! Events skipped - audit records may be missing"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Source channel closed, event router stopping");
                    break;
                }
            }
        }
    }

    async fn dispatch(&self, event: QueueEvent) {
        let event = Arc::new(event);

        if is_status_change(&event) {
            if self.audit_tx.send(Arc::clone(&event)).await.is_err() {
                tracing::error!(
                    entry_id = event.entry_id,
                    "Audit channel closed - audit record lost!"
                );
            }
            Self::offer(&self.notify_tx, &event, "notify");
        }

        Self::offer(&self.gateway_tx, &event, "gateway");
    }

    fn offer(tx: &mpsc::Sender<Arc<QueueEvent>>, event: &Arc<QueueEvent>, channel: &'static str) {
        match tx.try_send(Arc::clone(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    channel,
                    entry_id = event.entry_id,
                    revision = event.revision,
                    event_type = event.kind.name(),
                    "Channel full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(channel, "Channel closed");
            }
        }
    }
}
