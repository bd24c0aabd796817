//! Integration tests for timeclockd
//!
//! These tests run the coordinator end to end against a file-backed store.

use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone};
use std::path::Path;
use std::sync::Arc;
use timeclock_api::{Action, ActionRejection, CycleState, EventKind, StartRejection};
use timeclock_config::{SessionPolicy, parse_config};
use timeclock_core::{AttendanceMachine, Coordinator, CoordinatorError, SessionRegistry};
use timeclock_store::{EventLog, EventStore, SqliteStore};
use timeclock_util::{Clock, ManualClock, UserId};

fn t0() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

fn open_coordinator(
    db_path: &Path,
    clock: Arc<ManualClock>,
    policy: SessionPolicy,
) -> (Coordinator, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open(db_path, clock.clone()).unwrap());
    let coordinator = Coordinator::new(
        AttendanceMachine::new(EventLog::new(store.clone())),
        Arc::new(SessionRegistry::new()),
        clock,
        policy,
    );
    (coordinator, store)
}

#[test]
fn test_workday_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let (coordinator, _) = open_coordinator(
        &dir.path().join("timeclock.db"),
        clock.clone(),
        SessionPolicy::default(),
    );
    let u1 = UserId::new("U1");
    let u2 = UserId::new("U2");

    let started = coordinator.start_cycle(&u1, "First User").unwrap();
    assert_eq!(started.at, t0());

    // Someone else pressing U1's buttons changes nothing
    let err = coordinator
        .act_on_panel(started.panel.panel_id, &u2, Action::StartPause)
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&ActionRejection::NotOwner));

    clock.set(t0() + ChronoDuration::seconds(600));
    coordinator
        .act_on_panel(started.panel.panel_id, &u1, Action::StartPause)
        .unwrap();

    clock.set(t0() + ChronoDuration::seconds(900));
    coordinator.resume(&u1).unwrap();

    clock.set(t0() + ChronoDuration::seconds(4500));
    let exit_at = coordinator.finish(&u1).unwrap();
    assert_eq!(exit_at, t0() + ChronoDuration::seconds(4500));

    let err = coordinator.finish(&u1).unwrap_err();
    assert_eq!(err.rejection(), Some(&ActionRejection::NoOpenEntry));

    clock.set(exit_at + ChronoDuration::seconds(60));
    let err = coordinator.start_cycle(&u1, "First User").unwrap_err();
    assert_eq!(
        err.rejection(),
        Some(&StartRejection::CooldownActive { remaining_seconds: 60 })
    );

    clock.set(exit_at + ChronoDuration::seconds(121));
    coordinator.start_cycle(&u1, "First User").unwrap();

    let history = coordinator.history(&u1).unwrap();
    let kinds: Vec<_> = history.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Entry,
            EventKind::Pause,
            EventKind::Resume,
            EventKind::Exit,
            EventKind::Entry,
        ]
    );
    assert!(history.iter().all(|e| e.display_name == "First User"));
    assert!(coordinator.history(&u2).unwrap().is_empty());
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("timeclock.db");
    let clock = Arc::new(ManualClock::new(t0()));
    let user = UserId::new("U1");

    {
        let (coordinator, _) = open_coordinator(&db_path, clock.clone(), SessionPolicy::default());
        coordinator.start_cycle(&user, "U1").unwrap();
        clock.advance_secs(60);
        coordinator.pause(&user).unwrap();
    }

    // Sessions are gone, the log is not
    clock.advance_secs(60);
    let (coordinator, store) = open_coordinator(&db_path, clock.clone(), SessionPolicy::default());
    assert!(coordinator.session(&user).is_none());
    assert_eq!(coordinator.state(&user).unwrap(), CycleState::OnBreak);
    assert_eq!(coordinator.machine().derive_state(&user).unwrap(), CycleState::OnBreak);

    let err = coordinator.start_cycle(&user, "U1").unwrap_err();
    assert_eq!(err.rejection(), Some(&StartRejection::AlreadyOpen));

    coordinator.resume(&user).unwrap();
    coordinator.finish(&user).unwrap();
    assert_eq!(coordinator.state(&user).unwrap(), CycleState::Idle);
    assert_eq!(store.events_for_user(&user).unwrap().len(), 4);
}

#[test]
fn test_configured_cooldown() {
    let policy = parse_config(
        r#"
        config_version = 1

        [session]
        cooldown_seconds = 30
        "#,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let (coordinator, _) =
        open_coordinator(&dir.path().join("timeclock.db"), clock.clone(), policy.session);
    let user = UserId::new("U1");

    coordinator.start_cycle(&user, "U1").unwrap();
    coordinator.finish(&user).unwrap();

    clock.advance_secs(29);
    assert_eq!(
        coordinator.request_start(&user),
        Err(StartRejection::CooldownActive { remaining_seconds: 1 })
    );
    clock.advance_secs(1);
    assert!(coordinator.request_start(&user).is_ok());
}

#[test]
fn test_many_users_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let (coordinator, store) = open_coordinator(
        &dir.path().join("timeclock.db"),
        clock.clone(),
        SessionPolicy::default(),
    );
    let users: Vec<_> = (0..6).map(|i| UserId::new(format!("U{i}"))).collect();

    std::thread::scope(|s| {
        for user in &users {
            let coordinator = &coordinator;
            s.spawn(move || {
                // Racing starts for the same user record exactly one entry
                std::thread::scope(|inner| {
                    for _ in 0..4 {
                        inner.spawn(|| {
                            let _ = coordinator.start_cycle(user, user.as_str());
                        });
                    }
                });
                coordinator.pause(user).unwrap();
                coordinator.resume(user).unwrap();
                coordinator.finish(user).unwrap();
            });
        }
    });

    for user in &users {
        let kinds: Vec<_> = store
            .events_for_user(user)
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::Entry, EventKind::Pause, EventKind::Resume, EventKind::Exit]
        );
    }
    assert_eq!(store.recent_events(100).unwrap().len(), users.len() * 4);
}

#[test]
fn test_eviction_forgets_panels() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let (coordinator, _) = open_coordinator(
        &dir.path().join("timeclock.db"),
        clock.clone(),
        SessionPolicy::default(),
    );
    let user = UserId::new("U1");

    let started = coordinator.start_cycle(&user, "U1").unwrap();
    coordinator.finish(&user).unwrap();

    clock.advance(ChronoDuration::seconds(120 + 600));
    assert_eq!(coordinator.evict_expired(), 1);
    assert!(coordinator.registry().is_empty());

    let err = coordinator
        .act_on_panel(started.panel.panel_id, &user, Action::StartPause)
        .unwrap_err();
    assert_eq!(err.rejection(), Some(&ActionRejection::PanelClosed));
    assert_eq!(clock.now(), t0() + ChronoDuration::seconds(720));
}

#[test]
fn test_rejections_serialize_for_front_ends() {
    let json = serde_json::to_value(StartRejection::CooldownActive {
        remaining_seconds: 60,
    })
    .unwrap();
    assert_eq!(json["reason"], "cooldown_active");
    assert_eq!(json["remaining_seconds"], 60);

    let err: CoordinatorError<ActionRejection> =
        CoordinatorError::Rejected(ActionRejection::NotOwner);
    assert_eq!(err.to_string(), ActionRejection::NotOwner.to_string());
}
