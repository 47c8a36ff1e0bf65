//! Audit background worker
//!
//! Consumes routed queue events and hands status changes to the sink.
//! Exits when the channel closes.

use super::sink::AuditSink;
use super::types::AuditRecord;
use shared::waitlist::QueueEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct AuditWorker {
    sink: Arc<dyn AuditSink>,
}

impl AuditWorker {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Run until the channel closes
    pub async fn run(self, mut rx: mpsc::Receiver<Arc<QueueEvent>>) {
        tracing::info!("Audit worker started");

        while let Some(event) = rx.recv().await {
            let Some(record) = AuditRecord::from_event(&event) else {
                continue;
            };
            let entry_id = record.entry_id;
            match self.sink.record(record).await {
                Ok(()) => {
                    tracing::debug!(entry_id, revision = event.revision, "Audit record written");
                }
                Err(e) => {
                    tracing::error!(entry_id, revision = event.revision, error = %e, "Failed to write audit record");
                }
            }
        }

        tracing::info!("Audit channel closed, worker stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use shared::waitlist::{QueueEventKind, WaitlistStatus};

    fn event(revision: u64, kind: QueueEventKind) -> Arc<QueueEvent> {
        Arc::new(QueueEvent {
            revision,
            entry_id: revision,
            timestamp: 0,
            actor: "host".into(),
            kind,
        })
    }

    #[tokio::test]
    async fn test_worker_records_status_changes_only() {
        let sink = Arc::new(MemoryAuditSink::new());
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(AuditWorker::new(sink.clone()).run(rx));

        tx.send(event(1, QueueEventKind::EntryAdded { position: 1 }))
            .await
            .unwrap();
        tx.send(event(
            2,
            QueueEventKind::StatusChanged {
                old: WaitlistStatus::Waiting,
                new: WaitlistStatus::Seated,
            },
        ))
        .await
        .unwrap();
        tx.send(event(3, QueueEventKind::Reordered { order: vec![] }))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entry_id, 2);
        assert_eq!(records[0].new_status, WaitlistStatus::Seated);
    }
}
