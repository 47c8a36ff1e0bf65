//! NotificationHook - duplicate suppression, delivery and history
//!
//! # Marker rules
//!
//! One marker per `(entry_id, kind)`:
//!
//! | Marker | Another send of the same kind |
//! |--------|-------------------------------|
//! | none | allowed |
//! | pending | `Duplicate`, nothing sent |
//! | sent | `Duplicate`, nothing sent |
//! | failed | allowed (the caller decides to retry) |
//!
//! Markers and history are kept in the queue's database by
//! [`NotificationStore`], so a restart does not reopen a slot.

use super::sender::NotificationSender;
use super::store::{Claim, Draft, NotificationStore};
use super::templates::MessageTemplates;
use super::{NotificationKind, NotificationRecord, NotificationStatus, NotifyError, NotifyResult};
use crate::waitlist::{QueueManager, StorageError};
use shared::util::now_millis;
use shared::waitlist::{
    MAX_MESSAGE_LEN, QueueEvent, QueueEventKind, ValidationErrors, WaitlistEntry, WaitlistStatus,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Statuses that trigger a status-update message when an entry enters them
#[derive(Debug, Clone, Default)]
pub struct NotifyPolicy {
    statuses: HashSet<WaitlistStatus>,
}

impl NotifyPolicy {
    pub fn new(statuses: impl IntoIterator<Item = WaitlistStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
        }
    }

    pub fn triggers_on(&self, status: WaitlistStatus) -> bool {
        self.statuses.contains(&status)
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

pub struct NotificationHook {
    manager: Arc<QueueManager>,
    sender: Arc<dyn NotificationSender>,
    templates: MessageTemplates,
    policy: NotifyPolicy,
    store: NotificationStore,
}

impl std::fmt::Debug for NotificationHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHook")
            .field("sender", &self.sender.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl NotificationHook {
    pub fn new(
        manager: Arc<QueueManager>,
        store: NotificationStore,
        sender: Arc<dyn NotificationSender>,
        templates: MessageTemplates,
        policy: NotifyPolicy,
    ) -> Self {
        Self {
            manager,
            sender,
            templates,
            policy,
            store,
        }
    }

    pub fn sender_name(&self) -> &'static str {
        self.sender.name()
    }

    // ========== Triggers ==========

    /// Tell the guest their table is ready
    ///
    /// A non-empty `custom_message` replaces the template text.
    pub async fn notify_ready(
        &self,
        entry_id: u64,
        custom_message: Option<&str>,
    ) -> NotifyResult<NotificationRecord> {
        let custom = custom_message.map(str::trim).filter(|m| !m.is_empty());
        if let Some(message) = custom
            && message.chars().count() > MAX_MESSAGE_LEN
        {
            let mut errors = ValidationErrors::new();
            errors.add(
                "message",
                format!("message must be at most {MAX_MESSAGE_LEN} characters"),
            );
            return Err(NotifyError::Validation(errors));
        }

        let entry = self.load_entry(entry_id).await?;
        let message = match custom {
            Some(message) => message.to_string(),
            None => self.templates.table_ready(&entry.guest_name),
        };
        self.deliver(&entry, NotificationKind::TableReady, message)
            .await
    }

    /// Remind a waiting guest their table is coming up in about `minutes`
    pub async fn notify_reminder(
        &self,
        entry_id: u64,
        minutes: u32,
    ) -> NotifyResult<NotificationRecord> {
        let entry = self.load_entry(entry_id).await?;
        let message = self.templates.reminder(&entry.guest_name, minutes);
        self.deliver(&entry, NotificationKind::Reminder, message)
            .await
    }

    /// React to a committed queue event
    ///
    /// Returns `Ok(None)` when the policy does not cover the event.
    pub async fn handle_event(&self, event: &QueueEvent) -> NotifyResult<Option<NotificationRecord>> {
        let QueueEventKind::StatusChanged { new, .. } = event.kind else {
            return Ok(None);
        };
        if !self.policy.triggers_on(new) {
            return Ok(None);
        }

        let entry = self.load_entry(event.entry_id).await?;
        let message = self.templates.status_update(&entry.guest_name, new);
        self.deliver(&entry, NotificationKind::StatusUpdate, message)
            .await
            .map(Some)
    }

    // ========== History ==========
    //
    // Blocking: these read the store.

    /// Every attempt for an entry, newest first
    pub fn notifications_for(&self, entry_id: u64) -> NotifyResult<Vec<NotificationRecord>> {
        Ok(self.store.for_entry(entry_id)?)
    }

    pub fn notification(&self, id: u64) -> NotifyResult<Option<NotificationRecord>> {
        Ok(self.store.get(id)?)
    }

    /// Status of the latest attempt for an entry and kind, if any
    pub fn marker(
        &self,
        entry_id: u64,
        kind: NotificationKind,
    ) -> NotifyResult<Option<NotificationStatus>> {
        Ok(self.store.marker(entry_id, kind)?)
    }

    /// Whether a send of this kind would be suppressed
    pub fn has_active_marker(&self, entry_id: u64, kind: NotificationKind) -> NotifyResult<bool> {
        Ok(self
            .marker(entry_id, kind)?
            .is_some_and(NotificationStatus::blocks_resend))
    }

    // ========== Delivery ==========

    async fn load_entry(&self, entry_id: u64) -> NotifyResult<WaitlistEntry> {
        let manager = Arc::clone(&self.manager);
        let view = tokio::task::spawn_blocking(move || manager.get_entry(entry_id))
            .await
            .map_err(|e| NotifyError::Internal(format!("entry lookup task failed: {e}")))??;
        Ok(view.entry)
    }

    async fn on_store<T, F>(&self, op: F) -> NotifyResult<T>
    where
        F: FnOnce(&NotificationStore) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| NotifyError::Internal(format!("notification store task failed: {e}")))?
            .map_err(NotifyError::from)
    }

    async fn deliver(
        &self,
        entry: &WaitlistEntry,
        kind: NotificationKind,
        message: String,
    ) -> NotifyResult<NotificationRecord> {
        let entry_id = entry.id;
        let draft = Draft {
            entry_id,
            kind,
            phone: entry.guest_phone.clone(),
            message,
            created_at: now_millis(),
        };
        let mut record = match self.on_store(move |store| store.claim(draft)).await? {
            Claim::Claimed(record) => record,
            Claim::Duplicate(existing) => {
                tracing::info!(
                    entry_id,
                    kind = %kind,
                    existing = ?existing,
                    "Notification suppressed as duplicate"
                );
                return Err(NotifyError::Duplicate { entry_id, kind });
            }
        };
        let id = record.id;

        let result = self.sender.send(&record.phone, &record.message).await;

        match result {
            Ok(()) => {
                record.status = NotificationStatus::Sent;
                record.sent_at = Some(now_millis());
                self.save(&record).await?;
                tracing::info!(
                    entry_id,
                    notification_id = id,
                    kind = %kind,
                    sender = self.sender.name(),
                    "Notification sent"
                );
                Ok(record)
            }
            Err(e) => {
                let reason = e.to_string();
                record.status = NotificationStatus::Failed;
                record.error = Some(reason.clone());
                self.save(&record).await?;
                tracing::warn!(
                    entry_id,
                    notification_id = id,
                    kind = %kind,
                    error = %reason,
                    "Notification delivery failed"
                );
                Err(NotifyError::Delivery {
                    entry_id,
                    kind,
                    reason,
                })
            }
        }
    }

    /// Store the outcome of a claimed send
    ///
    /// If this write fails the record stays pending, which keeps blocking
    /// resends of a message that may have gone out.
    async fn save(&self, record: &NotificationRecord) -> NotifyResult<()> {
        let done = record.clone();
        self.on_store(move |store| store.complete(&done))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    notification_id = record.id,
                    entry_id = record.entry_id,
                    error = %e,
                    "Failed to store notification outcome"
                );
            })
    }

    /// Listen for routed queue events until cancelled
    ///
    /// Each delivery runs in its own task so a slow provider never holds up
    /// the listener. In-flight deliveries are awaited before returning.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<Arc<QueueEvent>>,
        shutdown: CancellationToken,
    ) {
        tracing::info!(
            sender = self.sender.name(),
            policy = ?self.policy,
            "Notification hook started"
        );
        let mut deliveries = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Notification hook stopping");
                    break;
                }
                Some(joined) = deliveries.join_next(), if !deliveries.is_empty() => {
                    log_join(joined);
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Notification event channel closed, stopping");
                        break;
                    };
                    let hook = Arc::clone(&self);
                    deliveries.spawn(async move {
                        match hook.handle_event(&event).await {
                            Ok(_) | Err(NotifyError::Duplicate { .. }) => {}
                            Err(e) => tracing::warn!(
                                entry_id = event.entry_id,
                                revision = event.revision,
                                error = %e,
                                "Event notification failed"
                            ),
                        }
                    });
                }
            }
        }

        if !deliveries.is_empty() {
            tracing::info!(
                in_flight = deliveries.len(),
                "Waiting for in-flight notifications"
            );
        }
        while let Some(joined) = deliveries.join_next().await {
            log_join(joined);
        }
        tracing::info!("Notification hook stopped");
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Notification delivery task panicked");
    }
}
