mod common;

use common::{deliver, EchoServer};
use signage_core::{
    parse_date, Candidate, CandidateKind, DayOfWeek, DaySelection, DaySpec, Directory,
    PlaylistMode, ScheduledBlock, Scheduler, ScreenSelection, SlotStore, SplitCount, SyncState,
    TimeOfDay, ValidationError, ZoneAssignments, ZoneModel,
};
use signage_sync::{SyncClient, SyncEvent};

fn t(s: &str) -> TimeOfDay {
    TimeOfDay::parse(s).unwrap()
}

fn local_schedule() -> SlotStore {
    let mut store = SlotStore::new();

    let quad = ZoneAssignments::new(SplitCount::Four)
        .with_zone(0, "news")
        .with_zone(1, "weather")
        .with_zone(2, "menu")
        .with_zone(3, "promo");

    store.add_blocks(
        "lobby",
        vec![
            ScheduledBlock::new("lobby", "b1", DaySpec::weekday(DayOfWeek::Sunday), t("00:00"), t("00:00"))
                .with_zones(ZoneAssignments::single("ambient"))
                .recurring(true),
            ScheduledBlock::new("lobby", "b1", DaySpec::weekday(DayOfWeek::Monday), t("08:00"), t("12:00"))
                .with_zones(quad)
                .with_priority(4)
                .recurring(true),
            ScheduledBlock::new(
                "lobby",
                "b1",
                DaySpec::date(parse_date("2026-12-24").unwrap()),
                t("18:00"),
                t("23:30"),
            )
            .with_zones(ZoneAssignments::single("holiday")),
        ],
    );

    let ads = (8..20)
        .map(|h| {
            let start = TimeOfDay::from_hms(h, 0, 0).unwrap();
            ScheduledBlock::new(
                "bar",
                "b1",
                DaySpec::weekday(DayOfWeek::Friday),
                start,
                start.checked_add_minutes(10).unwrap(),
            )
            .with_zones(ZoneAssignments::single("spot"))
            .advertisement()
        })
        .collect();
    store.add_blocks("bar", ads);

    store
}

#[test]
fn push_then_pull_reproduces_the_schedule() {
    let mut store = local_schedule();
    let original: Vec<ScheduledBlock> = store.iter().map(|e| e.block.clone()).collect();
    assert_eq!(original.len(), 15);

    let mut server = EchoServer::default();
    let mut client = SyncClient::new(vec!["b1".into()]);

    assert_eq!(client.push(&mut server, &mut store, &ZoneModel::new()).unwrap(), 2);
    assert_eq!(store.state_counts().in_flight, 15);

    let events = deliver(&mut client, &mut server, &mut store);
    assert_eq!(
        events,
        vec![SyncEvent::Acked {
            schedule_id: Some("sch-1".into()),
            committed: 15
        }]
    );
    assert!(store.iter().all(|e| e.state == SyncState::Committed));

    // A fresh session pulls the schedule back.
    let mut fresh = SlotStore::new();
    let mut reader = SyncClient::new(vec!["b1".into()]);
    assert!(reader.pull(&mut server).unwrap());
    let events = deliver(&mut reader, &mut server, &mut fresh);
    assert!(matches!(events[0], SyncEvent::Merged { skipped: 0, .. }));
    assert_eq!(reader.schedule_id(), Some("sch-1"));

    let pulled: Vec<ScheduledBlock> = fresh.iter().map(|e| e.block.clone()).collect();
    assert_eq!(pulled.len(), original.len());
    for block in &original {
        assert!(pulled.contains(block), "lost in round trip: {block:?}");
    }

    // Replaying the same snapshot onto the pushing session changes nothing.
    client.pull(&mut server).unwrap();
    let events = deliver(&mut client, &mut server, &mut store);
    match &events[0] {
        SyncEvent::Merged { report, skipped } => {
            assert_eq!(*skipped, 0);
            assert_eq!(report.added, 0);
            assert_eq!(report.skipped, 15);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(store.len(), 15);
}

#[test]
fn snapshot_confirms_pending_blocks() {
    let mut store = local_schedule();
    let mut server = EchoServer::default();
    let mut client = SyncClient::new(vec!["b1".into()]);

    client.push(&mut server, &mut store, &ZoneModel::new()).unwrap();
    // Drop the ack on the floor; a later pull still settles the local entries.
    server.outbox.clear();

    let mut replica = local_schedule();
    client.pull(&mut server).unwrap();
    let events = deliver(&mut client, &mut server, &mut replica);
    match &events[0] {
        SyncEvent::Merged { report, .. } => {
            assert_eq!(report.confirmed, 15);
            assert_eq!(report.added, 0);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(replica.state_counts().committed, 15);
}

#[test]
fn submitted_blocks_come_back_from_the_server_unchanged() {
    let dir = Directory::new()
        .with_screen("lobby", "b1", None)
        .with_playlist("loop", 1800);
    let mut scheduler = Scheduler::new(dir.clone(), dir);
    let candidate = |start: &str, end: &str| Candidate {
        screens: ScreenSelection::Screens(vec!["lobby".into()]),
        days: DaySelection::Weekdays(vec![DayOfWeek::Monday]),
        start_time: t(start),
        end_time: Some(t(end)),
        kind: CandidateKind::Playlist {
            mode: PlaylistMode::Recurring,
            priority: 1,
        },
        zones: ZoneAssignments::single("loop"),
    };

    // Seconds cannot travel as HH:MM.
    assert!(matches!(
        scheduler.submit(&candidate("08:00:30", "09:00:30")),
        Err(ValidationError::SubMinuteTime(_))
    ));
    scheduler.submit(&candidate("08:00", "09:00")).unwrap();
    scheduler.submit(&candidate("22:00", "23:59")).unwrap();

    let (mut store, zones) = scheduler.into_parts();
    let mut server = EchoServer::default();
    let mut client = SyncClient::new(vec!["b1".into()]);
    client.push(&mut server, &mut store, &zones).unwrap();
    deliver(&mut client, &mut server, &mut store);

    client.pull(&mut server).unwrap();
    let events = deliver(&mut client, &mut server, &mut store);
    match &events[0] {
        SyncEvent::Merged { report, skipped } => {
            assert_eq!(*skipped, 0);
            assert_eq!(report.added, 0);
            assert_eq!(report.skipped, 2);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(store.len(), 2);
    assert!(store.iter().all(|e| e.state == SyncState::Committed));
}
