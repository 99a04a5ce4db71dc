use std::sync::Arc;
use std::sync::mpsc::Receiver;

use stato::auth::Caller;
use stato::config::Settings;
use stato::matches::NewMatch;
use stato::model::EventKind;
use stato::notify::{ChannelPublisher, Notification};
use stato::recordings::FsBlobStore;
use stato::{Stato, StatoError, db};

fn service() -> (Stato, Receiver<Notification>) {
    let conn = db::open_in_memory().expect("in-memory db");
    let (publisher, rx) = ChannelPublisher::new();
    let app = Stato::new(
        conn,
        Arc::new(publisher),
        Box::new(FsBlobStore::new(std::env::temp_dir().join("stato-ledger-unused"))),
        Settings::default(),
    );
    (app, rx)
}

fn manager_with_match(app: &mut Stato, club: &str) -> (Caller, i64) {
    let signup = app
        .signup(club, "First Team", &format!("coach@{club}.test"), &["Ana", "Bo"])
        .expect("signup");
    let caller = app.caller(signup.manager.id).expect("caller");
    let m = app
        .create_match(
            &caller,
            &NewMatch {
                opponent: "Rovers".to_string(),
                analyst_name: "Kim".to_string(),
                ..NewMatch::default()
            },
        )
        .expect("match");
    (caller, m.id)
}

#[test]
fn counter_grows_by_one_per_increment() {
    let (mut app, _rx) = service();
    let (caller, match_id) = manager_with_match(&mut app, "fc");

    for expected in 1..=3 {
        let inc = app
            .increment_event(&caller, match_id, "Ana", "key_passes", Some(60), None)
            .expect("increment");
        assert_eq!(inc.count, expected);
        assert!(inc.instance_id.is_some());
    }
    let other = app
        .increment_event(&caller, match_id, "Ana", "fouls", None, None)
        .expect("other event");
    assert_eq!(other.count, 1);

    let counters = app.match_counters(&caller, match_id).expect("counters");
    let passes = counters
        .iter()
        .find(|c| c.event == EventKind::KeyPasses)
        .expect("key passes counter");
    assert_eq!(passes.count, 3);
    assert_eq!(passes.player, "Ana");
    assert_eq!(app.match_instances(&caller, match_id).expect("instances").len(), 4);
}

#[test]
fn unknown_player_name_is_added_to_squad() {
    let (mut app, _rx) = service();
    let (caller, match_id) = manager_with_match(&mut app, "fc");
    let inc = app
        .increment_event(&caller, match_id, "  Cy  ", "tackles", None, None)
        .expect("increment");
    assert_eq!(inc.player, "Cy");
    let squad = app.list_squad(&caller).expect("squad");
    assert!(squad.iter().any(|p| p.name == "Cy"));
}

#[test]
fn invalid_event_is_rejected_before_any_write() {
    let (mut app, rx) = service();
    let (caller, match_id) = manager_with_match(&mut app, "fc");
    let err = app
        .increment_event(&caller, match_id, "Newcomer", "goals", None, None)
        .expect_err("unknown event");
    assert!(matches!(err, StatoError::Validation(_)));
    assert!(app.match_counters(&caller, match_id).expect("counters").is_empty());
    assert!(!app.list_squad(&caller).expect("squad").iter().any(|p| p.name == "Newcomer"));
    assert!(rx.try_recv().is_err());
}

#[test]
fn other_teams_matches_are_not_found() {
    let (mut app, _rx) = service();
    let (_, match_id) = manager_with_match(&mut app, "home");
    let (intruder, _) = manager_with_match(&mut app, "away");

    let err = app
        .increment_event(&intruder, match_id, "Ana", "blocks", None, None)
        .expect_err("foreign match");
    assert!(matches!(err, StatoError::NotFound("Match")));
    assert!(matches!(
        app.get_match(&intruder, match_id),
        Err(StatoError::NotFound(_))
    ));
    assert!(matches!(
        app.live_suggestions(&intruder, match_id),
        Err(StatoError::NotFound(_))
    ));
}

#[test]
fn callers_without_team_are_rejected() {
    let (mut app, _rx) = service();
    let (_, match_id) = manager_with_match(&mut app, "fc");
    let drifter = app.register_player("drifter@example.test").expect("player");
    let caller = app.caller(drifter.id).expect("caller");
    let err = app
        .increment_event(&caller, match_id, "Ana", "blocks", None, None)
        .expect_err("no team");
    assert!(matches!(err, StatoError::NoTeam));
}

#[test]
fn shots_refresh_match_xg() {
    let (mut app, _rx) = service();
    let (caller, match_id) = manager_with_match(&mut app, "fc");
    for zone in ["1", "4", "9"] {
        app.increment_event(&caller, match_id, "Ana", "shots_on_target", Some(100), Some(zone))
            .expect("on target");
    }
    for _ in 0..2 {
        app.increment_event(&caller, match_id, "Bo", "shots_off_target", None, None)
            .expect("off target");
    }
    let m = app.get_match(&caller, match_id).expect("match");
    assert!((m.xg - 0.70).abs() < 1e-9, "xg was {}", m.xg);

    let ranking = app.player_xg_stats(&caller, None).expect("player xg");
    assert_eq!(ranking[0].player, "Ana");
    assert!((ranking[0].xg - 0.6).abs() < 1e-9);
    assert!((ranking[1].xg - 0.1).abs() < 1e-9);
}

#[test]
fn negative_second_is_stored_without_offset() {
    let (mut app, _rx) = service();
    let (caller, match_id) = manager_with_match(&mut app, "fc");
    let inc = app
        .increment_event(&caller, match_id, "Ana", "clearances", Some(-5), Some("5"))
        .expect("increment");
    assert_eq!(inc.second, None);
    let instances = app.match_instances(&caller, match_id).expect("instances");
    assert_eq!(instances[0].second, None);
    assert_eq!(instances[0].zone.as_deref(), Some("5"));
}

#[test]
fn failed_instance_write_keeps_the_counter() {
    let (mut app, _rx) = service();
    let (caller, match_id) = manager_with_match(&mut app, "fc");
    app.connection()
        .execute_batch(
            "CREATE TRIGGER block_instances BEFORE INSERT ON event_instances
             BEGIN SELECT RAISE(ABORT, 'instances offline'); END;",
        )
        .expect("trigger");

    let inc = app
        .increment_event(&caller, match_id, "Ana", "shots_on_target", Some(10), Some("1"))
        .expect("counter still succeeds");
    assert_eq!(inc.count, 1);
    assert_eq!(inc.instance_id, None);
    assert!(app.match_instances(&caller, match_id).expect("instances").is_empty());
    assert_eq!(app.match_counters(&caller, match_id).expect("counters")[0].count, 1);
}

#[test]
fn increments_are_published_as_stat_notifications() {
    let (mut app, rx) = service();
    let (caller, match_id) = manager_with_match(&mut app, "fc");
    app.increment_event(&caller, match_id, "Bo", "duels_won", Some(30), None)
        .expect("increment");

    let note = rx.try_recv().expect("notification");
    assert_eq!(note.payload["kind"], "stat");
    assert_eq!(note.payload["data"]["event"], "duels_won");
    assert_eq!(note.payload["data"]["count"], 1);
    assert_eq!(note.payload["data"]["player"], "Bo");
    assert_eq!(note.payload["data"]["match_id"], match_id);
}

#[test]
fn publish_failures_do_not_reach_the_caller() {
    let (mut app, rx) = service();
    let (caller, match_id) = manager_with_match(&mut app, "fc");
    drop(rx);
    let inc = app
        .increment_event(&caller, match_id, "Bo", "interceptions", None, None)
        .expect("increment despite closed channel");
    assert_eq!(inc.count, 1);
}

#[test]
fn players_only_see_their_own_counters() {
    let (mut app, _rx) = service();
    let (manager, match_id) = manager_with_match(&mut app, "fc");
    app.increment_event(&manager, match_id, "Ana", "tackles", None, None)
        .expect("ana");
    app.increment_event(&manager, match_id, "Bo", "tackles", None, None)
        .expect("bo");

    let team_id = manager.team_id.expect("manager team");
    let code = stato::teams::get_team(app.connection(), team_id)
        .expect("team")
        .team_code
        .expect("team code");
    let profile = app.register_player("ana@example.test").expect("account");
    let fresh = app.caller(profile.id).expect("caller");
    app.join_team(&fresh, &code.to_lowercase(), "ana").expect("join");
    let ana = app.caller(profile.id).expect("joined caller");

    let mine = app.my_stats(&ana).expect("own stats");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].player, "Ana");
    assert!(matches!(app.my_stats(&manager), Err(StatoError::Forbidden(_))));
}
