use super::*;
use crate::waitlist::eta::FixedTurnTime;
use shared::waitlist::EntrySource;

fn create_test_manager() -> QueueManager {
    let store = EntryStore::open_in_memory().unwrap();
    QueueManager::new(store, Arc::new(FixedTurnTime(None)), 64)
}

fn intake(name: &str, party_size: i64) -> GuestIntake {
    GuestIntake {
        guest_name: name.to_string(),
        guest_phone: "+1 555 0100".to_string(),
        party_size,
        source: EntrySource::Admin,
    }
}

fn add(manager: &QueueManager, name: &str) -> EntryView {
    manager.add_guest(&intake(name, 2), "host").unwrap()
}

fn positions(manager: &QueueManager) -> Vec<(u64, u32)> {
    manager
        .get_waitlist()
        .unwrap()
        .into_iter()
        .map(|v| (v.entry.id, v.entry.position.unwrap()))
        .collect()
}

fn assert_dense(manager: &QueueManager) {
    let waitlist = manager.get_waitlist().unwrap();
    for (index, view) in waitlist.iter().enumerate() {
        assert_eq!(view.entry.position, Some(index as u32 + 1));
        assert_eq!(view.entry.status, WaitlistStatus::Waiting);
    }
}

// ========================================================================
// Intake
// ========================================================================

#[test]
fn test_add_guest_assigns_positions_and_eta() {
    let manager = create_test_manager();

    let a = add(&manager, "A");
    let b = add(&manager, "B");
    let c = add(&manager, "C");

    assert_eq!(a.entry.position, Some(1));
    assert_eq!(b.entry.position, Some(2));
    assert_eq!(c.entry.position, Some(3));
    assert_eq!(a.eta_minutes, Some(15));
    assert_eq!(b.eta_minutes, Some(30));
    assert_eq!(c.eta_minutes, Some(45));
    assert_eq!(a.entry.version, 0);
}

#[test]
fn test_add_guest_reports_all_violations() {
    let manager = create_test_manager();
    let err = manager
        .add_guest(
            &GuestIntake {
                guest_name: String::new(),
                guest_phone: "5550100".into(),
                party_size: 0,
                source: EntrySource::Kiosk,
            },
            "kiosk",
        )
        .unwrap_err();

    match err {
        QueueError::Validation(errors) => {
            assert_eq!(errors.fields(), vec!["guestName", "partySize"]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(manager.get_waitlist().unwrap().is_empty());
}

#[test]
fn test_add_guest_rejects_bad_turn_time() {
    let store = EntryStore::open_in_memory().unwrap();
    let manager = QueueManager::new(store, Arc::new(FixedTurnTime(Some(0.0))), 16);

    let err = manager.add_guest(&intake("A", 2), "host").unwrap_err();
    assert!(matches!(err, QueueError::Configuration(_)));
    assert!(manager.store().get_by_id(1).unwrap().is_none());
}

#[test]
fn test_configured_turn_time() {
    let store = EntryStore::open_in_memory().unwrap();
    let manager = QueueManager::new(store, Arc::new(FixedTurnTime(Some(10.0))), 16);

    add(&manager, "A");
    let b = add(&manager, "B");
    assert_eq!(b.eta_minutes, Some(20));
}

// ========================================================================
// Status transitions
// ========================================================================

#[test]
fn test_seat_compacts_queue() {
    let manager = create_test_manager();
    let a = add(&manager, "A");
    let b = add(&manager, "B");
    let c = add(&manager, "C");

    let seated = manager
        .update_status(a.entry.id, 0, WaitlistStatus::Seated, "host")
        .unwrap();
    assert_eq!(seated.status, WaitlistStatus::Seated);
    assert_eq!(seated.position, None);
    assert_eq!(seated.version, 1);

    assert_eq!(positions(&manager), vec![(b.entry.id, 1), (c.entry.id, 2)]);
    assert_eq!(manager.get_eta(b.entry.id).unwrap(), Some(15));
    assert_eq!(manager.get_eta(c.entry.id).unwrap(), Some(30));
}

#[test]
fn test_cancel_middle_only_shifts_later_entries() {
    let manager = create_test_manager();
    let a = add(&manager, "A");
    let b = add(&manager, "B");
    let c = add(&manager, "C");

    manager
        .update_status(b.entry.id, 0, WaitlistStatus::Canceled, "host")
        .unwrap();

    let a_after = manager.get_entry(a.entry.id).unwrap().entry;
    let c_after = manager.get_entry(c.entry.id).unwrap().entry;
    assert_eq!(a_after.position, Some(1));
    assert_eq!(a_after.version, 0);
    assert_eq!(c_after.position, Some(2));
    assert_eq!(c_after.version, 1);
}

#[test]
fn test_terminal_transition_rejected() {
    let manager = create_test_manager();
    let a = add(&manager, "A");
    manager
        .update_status(a.entry.id, 0, WaitlistStatus::Seated, "host")
        .unwrap();

    let err = manager
        .update_status(a.entry.id, 1, WaitlistStatus::Canceled, "host")
        .unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidTransition {
            from: WaitlistStatus::Seated,
            to: WaitlistStatus::Canceled,
            ..
        }
    ));

    let entry = manager.get_entry(a.entry.id).unwrap().entry;
    assert_eq!(entry.status, WaitlistStatus::Seated);
    assert_eq!(entry.version, 1);
}

#[test]
fn test_version_checked_before_transition() {
    let manager = create_test_manager();
    let a = add(&manager, "A");
    manager
        .update_status(a.entry.id, 0, WaitlistStatus::NoShow, "host")
        .unwrap();

    // Stale version and illegal transition: the caller must reload first
    let err = manager
        .update_status(a.entry.id, 0, WaitlistStatus::Seated, "host")
        .unwrap_err();
    assert!(matches!(
        err,
        QueueError::Conflict {
            expected: 0,
            actual: 1,
            ..
        }
    ));
    assert!(err.is_retryable());

    // After reloading, the same request is rejected by the state machine
    let err = manager
        .update_status(a.entry.id, 1, WaitlistStatus::Seated, "host")
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidTransition { .. }));
    assert!(!err.is_retryable());
}

#[test]
fn test_waiting_to_waiting_rejected() {
    let manager = create_test_manager();
    let a = add(&manager, "A");
    let err = manager
        .update_status(a.entry.id, 0, WaitlistStatus::Waiting, "host")
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidTransition { .. }));
}

#[test]
fn test_state_machine_law_all_pairs() {
    for from in WaitlistStatus::ALL {
        for to in WaitlistStatus::ALL {
            let manager = create_test_manager();
            let entry = add(&manager, "A").entry;
            let mut version = 0;
            if from != WaitlistStatus::Waiting {
                version = manager
                    .update_status(entry.id, 0, from, "setup")
                    .unwrap()
                    .version;
            }

            let result = manager.update_status(entry.id, version, to, "host");
            if from.can_transition_to(to) {
                assert_eq!(result.unwrap().status, to, "{from} -> {to}");
            } else {
                assert!(
                    matches!(result, Err(QueueError::InvalidTransition { .. })),
                    "{from} -> {to} should be rejected"
                );
            }
        }
    }
}

#[test]
fn test_stale_version_conflict() {
    let manager = create_test_manager();
    let a = add(&manager, "A");
    manager
        .toggle_vip(a.entry.id, 0, true, "host-1")
        .unwrap();

    let err = manager
        .update_status(a.entry.id, 0, WaitlistStatus::Seated, "host-2")
        .unwrap_err();
    assert!(matches!(
        err,
        QueueError::Conflict {
            expected: 0,
            actual: 1,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(
        manager.get_entry(a.entry.id).unwrap().entry.status,
        WaitlistStatus::Waiting
    );
}

#[test]
fn test_update_missing_entry() {
    let manager = create_test_manager();
    let err = manager
        .update_status(77, 0, WaitlistStatus::Seated, "host")
        .unwrap_err();
    assert!(matches!(err, QueueError::NotFound(77)));
}

// ========================================================================
// Reorder
// ========================================================================

#[test]
fn test_reorder_assigns_positions() {
    let manager = create_test_manager();
    let a = add(&manager, "A").entry.id;
    let b = add(&manager, "B").entry.id;
    let c = add(&manager, "C").entry.id;

    let views = manager.reorder(&[c, a, b], None, "host").unwrap();
    let order: Vec<u64> = views.iter().map(|v| v.entry.id).collect();
    assert_eq!(order, vec![c, a, b]);
    assert_eq!(views[0].eta_minutes, Some(15));
    assert_dense(&manager);
}

#[test]
fn test_reorder_is_idempotent() {
    let manager = create_test_manager();
    let a = add(&manager, "A").entry.id;
    let b = add(&manager, "B").entry.id;
    let c = add(&manager, "C").entry.id;

    let first = manager.reorder(&[b, a, c], None, "host").unwrap();
    let revision = manager.current_revision().unwrap();
    let second = manager.reorder(&[b, a, c], None, "host").unwrap();

    assert_eq!(first, second);
    assert_eq!(manager.current_revision().unwrap(), revision);
    let versions: Vec<u64> = second.iter().map(|v| v.entry.version).collect();
    assert_eq!(versions, vec![1, 1, 0]);
}

#[test]
fn test_reorder_wrong_set() {
    let manager = create_test_manager();
    let a = add(&manager, "A").entry.id;
    let b = add(&manager, "B").entry.id;
    let c = add(&manager, "C").entry.id;
    manager
        .update_status(c, 0, WaitlistStatus::Seated, "host")
        .unwrap();

    let err = manager.reorder(&[a, a, c], None, "host").unwrap_err();
    match err {
        QueueError::InvalidReorder {
            missing,
            unexpected,
            duplicates,
        } => {
            assert_eq!(missing, vec![b]);
            assert_eq!(unexpected, vec![c]);
            assert_eq!(duplicates, vec![a]);
        }
        other => panic!("expected InvalidReorder, got {other:?}"),
    }
    assert_eq!(positions(&manager), vec![(a, 1), (b, 2)]);
}

#[test]
fn test_reorder_stale_revision() {
    let manager = create_test_manager();
    let a = add(&manager, "A").entry.id;
    let b = add(&manager, "B").entry.id;
    let seen = manager.current_revision().unwrap();

    add(&manager, "C");
    let err = manager.reorder(&[b, a], Some(seen), "host").unwrap_err();
    assert!(matches!(err, QueueError::RevisionConflict { .. }));
    assert!(err.is_retryable());

    let fresh = manager.current_revision().unwrap();
    let c = manager.get_waitlist().unwrap()[2].entry.id;
    manager.reorder(&[b, a, c], Some(fresh), "host").unwrap();
    assert_eq!(positions(&manager), vec![(b, 1), (a, 2), (c, 3)]);
}

#[test]
fn test_reorder_empty_queue() {
    let manager = create_test_manager();
    assert!(manager.reorder(&[], None, "host").unwrap().is_empty());
}

// ========================================================================
// VIP
// ========================================================================

#[test]
fn test_toggle_vip_keeps_position() {
    let manager = create_test_manager();
    add(&manager, "A");
    let b = add(&manager, "B");

    let view = manager.toggle_vip(b.entry.id, 0, true, "host").unwrap();
    assert!(view.entry.vip);
    assert_eq!(view.entry.position, Some(2));
    assert_eq!(view.entry.version, 1);
    assert_eq!(view.eta_minutes, Some(30));
}

#[test]
fn test_toggle_vip_same_value_is_noop() {
    let manager = create_test_manager();
    let a = add(&manager, "A");
    let revision = manager.current_revision().unwrap();

    let view = manager.toggle_vip(a.entry.id, 0, false, "host").unwrap();
    assert_eq!(view.entry.version, 0);
    assert_eq!(manager.current_revision().unwrap(), revision);
}

#[test]
fn test_toggle_vip_conflict() {
    let manager = create_test_manager();
    let a = add(&manager, "A");
    manager.toggle_vip(a.entry.id, 0, true, "host-1").unwrap();
    let err = manager.toggle_vip(a.entry.id, 0, false, "host-2").unwrap_err();
    assert!(matches!(err, QueueError::Conflict { .. }));
}

// ========================================================================
// Queries
// ========================================================================

#[test]
fn test_get_eta_after_leaving_queue() {
    let manager = create_test_manager();
    let a = add(&manager, "A");
    manager
        .update_status(a.entry.id, 0, WaitlistStatus::Canceled, "host")
        .unwrap();

    assert_eq!(manager.get_eta(a.entry.id).unwrap(), None);
    assert!(matches!(manager.get_eta(999), Err(QueueError::NotFound(999))));
}

#[test]
fn test_list_by_status() {
    let manager = create_test_manager();
    let a = add(&manager, "A").entry.id;
    add(&manager, "B");
    manager
        .update_status(a, 0, WaitlistStatus::NoShow, "host")
        .unwrap();

    let no_shows = manager.list_by_status(WaitlistStatus::NoShow).unwrap();
    assert_eq!(no_shows.len(), 1);
    assert_eq!(no_shows[0].entry.id, a);
    assert_eq!(no_shows[0].eta_minutes, None);
    assert_eq!(manager.list_by_status(WaitlistStatus::Waiting).unwrap().len(), 1);
}

#[test]
fn test_snapshot_is_dense_and_stamped() {
    let manager = create_test_manager();
    let a = add(&manager, "A").entry.id;
    add(&manager, "B");
    manager
        .update_status(a, 0, WaitlistStatus::Seated, "host")
        .unwrap();

    let snapshot = manager.snapshot().unwrap();
    assert!(snapshot.is_dense());
    assert_eq!(snapshot.revision, manager.current_revision().unwrap());
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.average_turn_minutes, 15.0);
}

#[test]
fn test_versions_strictly_increase() {
    let manager = create_test_manager();
    let a = add(&manager, "A").entry.id;
    let b = add(&manager, "B").entry.id;
    let c = add(&manager, "C").entry.id;

    let mut last = manager.get_entry(c).unwrap().entry.version;
    manager.toggle_vip(c, last, true, "host").unwrap();
    let v = manager.get_entry(c).unwrap().entry.version;
    assert!(v > last);
    last = v;

    manager.reorder(&[c, a, b], None, "host").unwrap();
    let v = manager.get_entry(c).unwrap().entry.version;
    assert!(v > last);
    last = v;

    manager
        .update_status(a, manager.get_entry(a).unwrap().entry.version, WaitlistStatus::Seated, "host")
        .unwrap();
    manager
        .update_status(c, last, WaitlistStatus::Seated, "host")
        .unwrap();
    assert!(manager.get_entry(c).unwrap().entry.version > last);
}

// ========================================================================
// Events
// ========================================================================

#[test]
fn test_events_broadcast_after_commit() {
    let manager = create_test_manager();
    let mut rx = manager.subscribe();

    let a = add(&manager, "A").entry.id;
    let b = add(&manager, "B").entry.id;
    manager
        .update_status(a, 0, WaitlistStatus::Seated, "host-7")
        .unwrap();
    manager.toggle_vip(b, 1, true, "host-7").unwrap();

    let added = rx.try_recv().unwrap();
    assert_eq!(added.kind, QueueEventKind::EntryAdded { position: 1 });
    assert_eq!(added.revision, 1);
    rx.try_recv().unwrap();

    let changed = rx.try_recv().unwrap();
    assert_eq!(changed.entry_id, a);
    assert_eq!(changed.actor, "host-7");
    assert_eq!(
        changed.kind,
        QueueEventKind::StatusChanged {
            old: WaitlistStatus::Waiting,
            new: WaitlistStatus::Seated,
        }
    );
    assert_eq!(changed.revision, 3);

    let vip = rx.try_recv().unwrap();
    assert_eq!(vip.kind, QueueEventKind::VipToggled { vip: true });
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_failed_operations_emit_nothing() {
    let manager = create_test_manager();
    let a = add(&manager, "A").entry.id;
    let mut rx = manager.subscribe();

    let _ = manager.update_status(a, 5, WaitlistStatus::Seated, "host");
    let _ = manager.reorder(&[a, a], None, "host");
    let _ = manager.reorder(&[a], None, "host");

    assert!(rx.try_recv().is_err());
}

// ========================================================================
// Retry helper
// ========================================================================

#[test]
fn test_retry_on_conflict_reloads_version() {
    let manager = create_test_manager();
    let a = add(&manager, "A").entry.id;
    let mut stale = Some(0);
    manager.toggle_vip(a, 0, true, "other-host").unwrap();

    let entry = retry_on_conflict(DEFAULT_RETRY_ATTEMPTS, || {
        let version = match stale.take() {
            Some(v) => v,
            None => manager.get_entry(a)?.entry.version,
        };
        manager.update_status(a, version, WaitlistStatus::Seated, "host")
    })
    .unwrap();
    assert_eq!(entry.status, WaitlistStatus::Seated);
}

#[test]
fn test_retry_gives_up_after_budget() {
    let mut calls = 0;
    let result: QueueResult<()> = retry_on_conflict(3, || {
        calls += 1;
        Err(QueueError::Conflict {
            entry_id: 1,
            expected: 0,
            actual: 1,
        })
    });
    assert!(result.is_err());
    assert_eq!(calls, 3);
}

#[test]
fn test_retry_skips_non_retryable() {
    let mut calls = 0;
    let result: QueueResult<()> = retry_on_conflict(3, || {
        calls += 1;
        Err(QueueError::NotFound(1))
    });
    assert!(matches!(result, Err(QueueError::NotFound(1))));
    assert_eq!(calls, 1);
}
