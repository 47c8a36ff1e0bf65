//! ReminderScheduler - periodic "your table is coming up" messages
//!
//! For a waiting entry at position `p` with average turn time `t` minutes:
//!
//! ```text
//! estimated_seat_at = created_at + p * t
//! reminder_at       = estimated_seat_at - minutes_before
//! due               = now >= reminder_at && no pending/sent reminder marker
//! ```

use super::hook::NotificationHook;
use super::{NotificationKind, NotifyError, NotifyResult};
use crate::waitlist::QueueManager;
use serde::Serialize;
use shared::util::now_millis;
use shared::waitlist::WaitlistEntry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_REMINDER_MINUTES_BEFORE: u32 = 10;
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// A waiting entry whose reminder is due
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReminder {
    pub entry_id: u64,
    pub guest_name: String,
    pub guest_phone: String,
    pub position: u32,
    pub created_at: i64,
    pub estimated_seat_at: i64,
    pub reminder_at: i64,
}

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub entries_processed: usize,
    /// Entry ids that received a reminder
    pub reminders_sent: Vec<u64>,
    pub failures: usize,
    pub timestamp: i64,
}

/// Waiting entries whose reminder is due at `now`
///
/// Pure: marker state is applied by the caller.
pub fn due_reminders(
    entries: &[WaitlistEntry],
    turn_minutes: f64,
    minutes_before: u32,
    now: i64,
) -> Vec<PendingReminder> {
    entries
        .iter()
        .filter(|entry| entry.is_waiting())
        .filter_map(|entry| {
            let position = entry.position?;
            let estimated_seat_at =
                entry.created_at + (position as f64 * turn_minutes * MILLIS_PER_MINUTE) as i64;
            let reminder_at = estimated_seat_at - i64::from(minutes_before) * 60_000;
            (now >= reminder_at).then(|| PendingReminder {
                entry_id: entry.id,
                guest_name: entry.guest_name.clone(),
                guest_phone: entry.guest_phone.clone(),
                position,
                created_at: entry.created_at,
                estimated_seat_at,
                reminder_at,
            })
        })
        .collect()
}

/// Waiting count and the due reminders no pending or sent marker covers
fn unsent_due(
    manager: &QueueManager,
    hook: &NotificationHook,
    minutes_before: u32,
) -> NotifyResult<(usize, Vec<PendingReminder>)> {
    let turn_minutes = manager.turn_minutes()?;
    let (_, waiting) = manager.store().waiting_with_revision()?;
    let mut unsent = Vec::new();
    for reminder in due_reminders(&waiting, turn_minutes, minutes_before, now_millis()) {
        if !hook.has_active_marker(reminder.entry_id, NotificationKind::Reminder)? {
            unsent.push(reminder);
        }
    }
    Ok((waiting.len(), unsent))
}

pub struct ReminderScheduler {
    manager: Arc<QueueManager>,
    hook: Arc<NotificationHook>,
    minutes_before: u32,
    interval: Duration,
}

impl ReminderScheduler {
    pub fn new(
        manager: Arc<QueueManager>,
        hook: Arc<NotificationHook>,
        minutes_before: u32,
        interval: Duration,
    ) -> Self {
        Self {
            manager,
            hook,
            minutes_before,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    pub fn minutes_before(&self) -> u32 {
        self.minutes_before
    }

    /// Due reminders that have not been sent yet
    ///
    /// Blocking: reads the store.
    pub fn pending(&self) -> NotifyResult<Vec<PendingReminder>> {
        Ok(unsent_due(&self.manager, &self.hook, self.minutes_before)?.1)
    }

    /// Send every due reminder once
    ///
    /// A failure for one entry is logged and the sweep moves on.
    pub async fn sweep(&self) -> NotifyResult<SweepReport> {
        let manager = Arc::clone(&self.manager);
        let hook = Arc::clone(&self.hook);
        let minutes_before = self.minutes_before;
        let (processed, due) =
            tokio::task::spawn_blocking(move || unsent_due(&manager, &hook, minutes_before))
                .await
                .map_err(|e| NotifyError::Internal(format!("reminder sweep task failed: {e}")))??;

        let mut report = SweepReport {
            entries_processed: processed,
            timestamp: now_millis(),
            ..Default::default()
        };

        for reminder in due {
            match self
                .hook
                .notify_reminder(reminder.entry_id, self.minutes_before)
                .await
            {
                Ok(_) => report.reminders_sent.push(reminder.entry_id),
                Err(NotifyError::Duplicate { .. }) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(entry_id = reminder.entry_id, error = %e, "Reminder failed");
                }
            }
        }

        if !report.reminders_sent.is_empty() || report.failures > 0 {
            tracing::info!(
                processed = report.entries_processed,
                sent = report.reminders_sent.len(),
                failures = report.failures,
                "Reminder sweep completed"
            );
        }
        Ok(report)
    }

    /// Sweep on every interval tick until cancelled
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            minutes_before = self.minutes_before,
            "Reminder scheduler started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Reminder scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!(error = %e, "Reminder sweep failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::sender::MockSender;
    use crate::notify::{MessageTemplates, NotificationStore, NotifyPolicy};
    use crate::waitlist::{EntryStore, FixedTurnTime};
    use shared::waitlist::{EntrySource, GuestIntake, WaitlistStatus};

    fn entry(id: u64, position: Option<u32>, status: WaitlistStatus, created_at: i64) -> WaitlistEntry {
        WaitlistEntry {
            id,
            guest_name: format!("guest-{id}"),
            guest_phone: "+15550100".into(),
            party_size: 2,
            status,
            position,
            vip: false,
            source: EntrySource::Admin,
            created_at,
            updated_at: created_at,
            version: 0,
        }
    }

    const MINUTE: i64 = 60_000;

    #[test]
    fn test_due_threshold() {
        // Position 2, 15 min turns: seat at +30m, reminder at +20m
        let entries = vec![entry(1, Some(2), WaitlistStatus::Waiting, 0)];

        assert!(due_reminders(&entries, 15.0, 10, 20 * MINUTE - 1).is_empty());

        let due = due_reminders(&entries, 15.0, 10, 20 * MINUTE);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].estimated_seat_at, 30 * MINUTE);
        assert_eq!(due[0].reminder_at, 20 * MINUTE);
    }

    #[test]
    fn test_position_one_due_immediately() {
        // 15 min turn, 15 min before: reminder at creation time
        let entries = vec![entry(1, Some(1), WaitlistStatus::Waiting, 5 * MINUTE)];
        assert_eq!(due_reminders(&entries, 15.0, 15, 5 * MINUTE).len(), 1);
    }

    #[test]
    fn test_non_waiting_entries_skipped() {
        let entries = vec![
            entry(1, None, WaitlistStatus::Seated, 0),
            entry(2, None, WaitlistStatus::Canceled, 0),
        ];
        assert!(due_reminders(&entries, 15.0, 10, i64::MAX / 2).is_empty());
    }

    fn scheduler(minutes_before: u32) -> (Arc<QueueManager>, Arc<MockSender>, ReminderScheduler) {
        let store = EntryStore::open_in_memory().unwrap();
        let notifications = NotificationStore::open(&store).unwrap();
        let manager = Arc::new(QueueManager::new(store, Arc::new(FixedTurnTime(None)), 64));
        let sender = Arc::new(MockSender::new());
        let hook = Arc::new(NotificationHook::new(
            Arc::clone(&manager),
            notifications,
            sender.clone(),
            MessageTemplates::new("Luigi's"),
            NotifyPolicy::default(),
        ));
        let scheduler = ReminderScheduler::new(
            Arc::clone(&manager),
            hook,
            minutes_before,
            DEFAULT_CHECK_INTERVAL,
        );
        (manager, sender, scheduler)
    }

    fn add(manager: &QueueManager, name: &str) -> u64 {
        manager
            .add_guest(
                &GuestIntake {
                    guest_name: name.to_string(),
                    guest_phone: "+15550100".to_string(),
                    party_size: 2,
                    ..Default::default()
                },
                "host",
            )
            .unwrap()
            .entry
            .id
    }

    #[tokio::test]
    async fn test_sweep_sends_once_per_entry() {
        // 15 minutes before with 15 minute turns: position 1 is due now
        let (manager, sender, scheduler) = scheduler(15);
        let first = add(&manager, "Ana");
        add(&manager, "Ben");

        let pending = scheduler.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entry_id, first);

        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.entries_processed, 2);
        assert_eq!(report.reminders_sent, vec![first]);
        assert_eq!(
            sender.sent_messages()[0].message,
            "Hi Ana! Reminder: Your table at Luigi's should be ready in about 15 minutes. Please stay nearby!"
        );

        let again = scheduler.sweep().await.unwrap();
        assert!(again.reminders_sent.is_empty());
        assert_eq!(sender.sent_messages().len(), 1);
        assert!(scheduler.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_continues_after_failure() {
        let (manager, sender, scheduler) = scheduler(60);
        add(&manager, "Ana");
        add(&manager, "Ben");
        sender.set_should_fail(true);

        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.failures, 2);
        assert!(report.reminders_sent.is_empty());

        // Failed markers allow the next sweep to try again
        sender.set_should_fail(false);
        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.reminders_sent.len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_due_sends_nothing() {
        let (manager, sender, scheduler) = scheduler(0);
        add(&manager, "Ana");

        let report = scheduler.sweep().await.unwrap();
        assert_eq!(report.entries_processed, 1);
        assert!(report.reminders_sent.is_empty());
        assert!(sender.sent_messages().is_empty());
    }
}
