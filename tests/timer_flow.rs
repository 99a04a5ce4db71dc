use chrono::{DateTime, TimeZone, Utc};

use stato::auth::Caller;
use stato::matches::NewMatch;
use stato::model::MatchState;
use stato::{Stato, StatoError, db};

fn kickoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 11, 15, 0, 0).unwrap()
}

fn ninety_seconds_in() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 11, 15, 1, 30).unwrap()
}

fn ten_minutes_in() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 11, 15, 10, 0).unwrap()
}

fn setup() -> (Stato, Caller, i64) {
    let conn = db::open_in_memory().expect("in-memory db");
    let mut app = Stato::quiet(conn, std::env::temp_dir().join("stato-timer-unused")).with_clock(kickoff);
    let signup = app
        .signup("Harbour FC", "U21", "coach@harbour.test", &["Ana"])
        .expect("signup");
    let caller = app.caller(signup.manager.id).expect("caller");
    let m = app
        .create_match(
            &caller,
            &NewMatch {
                opponent: "Rovers".to_string(),
                analyst_name: "Kim".to_string(),
                season: Some("2025/26".to_string()),
                ..NewMatch::default()
            },
        )
        .expect("match");
    (app, caller, m.id)
}

#[test]
fn start_pause_resume_keeps_elapsed() {
    let (app, caller, match_id) = setup();

    let started = app.control_timer(&caller, match_id, "start", None).expect("start");
    assert_eq!(started.state, MatchState::InProgress);
    assert_eq!(started.elapsed_seconds, 0);
    assert_eq!(started.timer_started_at, Some(kickoff()));

    let app = app.with_clock(ninety_seconds_in);
    let paused = app.control_timer(&caller, match_id, "pause", None).expect("pause");
    assert_eq!(paused.state, MatchState::Paused);
    assert_eq!(paused.elapsed_seconds, 90);
    assert_eq!(paused.timer_started_at, None);

    let app = app.with_clock(ten_minutes_in);
    let resumed = app.control_timer(&caller, match_id, "resume", None).expect("resume");
    assert_eq!(resumed.state, MatchState::InProgress);
    assert_eq!(resumed.elapsed_seconds, 90);
    assert_eq!(resumed.timer_started_at, Some(ten_minutes_in()));
}

#[test]
fn invalid_action_leaves_match_untouched() {
    let (app, caller, match_id) = setup();
    app.control_timer(&caller, match_id, "start", Some(120)).expect("start");

    let err = app
        .control_timer(&caller, match_id, "rewind", Some(5))
        .expect_err("unknown action");
    assert!(matches!(err, StatoError::Validation(_)));

    let err = app
        .control_timer(&caller, match_id, "resume", None)
        .expect_err("resume while running");
    assert!(matches!(err, StatoError::Validation(_)));

    let m = app.get_match(&caller, match_id).expect("match");
    assert_eq!(m.state, MatchState::InProgress);
    assert_eq!(m.elapsed_seconds, 120);
}

#[test]
fn negative_elapsed_is_rejected() {
    let (app, caller, match_id) = setup();
    let err = app
        .control_timer(&caller, match_id, "start", Some(-1))
        .expect_err("negative elapsed");
    assert!(matches!(err, StatoError::Validation(_)));
    let m = app.get_match(&caller, match_id).expect("match");
    assert_eq!(m.state, MatchState::NotStarted);
}

#[test]
fn finish_locks_in_xg_and_is_terminal() {
    let (mut app, caller, match_id) = setup();
    app.control_timer(&caller, match_id, "start", None).expect("start");
    app.increment_event(&caller, match_id, "Ana", "shots_on_target", Some(40), Some("2"))
        .expect("shot");
    app.connection()
        .execute("UPDATE matches SET xg = 0 WHERE id = ?1", [match_id])
        .expect("reset stored xg");

    let app = app.with_clock(ten_minutes_in);
    let done = app.control_timer(&caller, match_id, "finish", None).expect("finish");
    assert_eq!(done.state, MatchState::Finished);
    assert_eq!(done.elapsed_seconds, 600);
    assert!((done.xg - 0.3).abs() < 1e-9);

    let err = app
        .control_timer(&caller, match_id, "start", None)
        .expect_err("restart finished match");
    assert!(matches!(err, StatoError::Validation(_)));
}

#[test]
fn current_live_match_tracks_the_clock() {
    let (app, caller, match_id) = setup();
    assert!(app.current_live_match(&caller).expect("lookup").is_none());

    app.control_timer(&caller, match_id, "start", None).expect("start");
    app.control_timer(&caller, match_id, "pause", None).expect("pause");
    let live = app.current_live_match(&caller).expect("lookup").expect("paused counts as live");
    assert_eq!(live.id, match_id);

    app.control_timer(&caller, match_id, "finish", None).expect("finish");
    assert!(app.current_live_match(&caller).expect("lookup").is_none());
}

#[test]
fn live_suggestions_need_an_ongoing_match() {
    let (app, caller, match_id) = setup();
    let before = app.live_suggestions(&caller, match_id).expect("report");
    assert!(before.suggestions.is_empty());
    assert!(before.message.is_some());

    app.control_timer(&caller, match_id, "start", None).expect("start");
    let app = app.with_clock(ten_minutes_in);
    let during = app.live_suggestions(&caller, match_id).expect("report");
    assert_eq!(during.match_state, MatchState::InProgress);
    assert_eq!(during.elapsed_seconds, 600);
    assert_eq!(during.score, "0-0");
    assert!(during.message.is_none());
}

#[test]
fn finish_rolls_back_when_xg_cannot_be_saved() {
    let (mut app, caller, match_id) = setup();
    app.control_timer(&caller, match_id, "start", None).expect("start");
    app.increment_event(&caller, match_id, "Ana", "shots_on_target", Some(40), Some("2"))
        .expect("shot");
    app.connection()
        .execute_batch(
            "CREATE TRIGGER lock_xg BEFORE UPDATE OF xg ON matches
             BEGIN SELECT RAISE(ABORT, 'xg locked'); END;",
        )
        .expect("trigger");

    let err = app
        .control_timer(&caller, match_id, "finish", Some(600))
        .expect_err("xg write fails");
    assert!(matches!(err, StatoError::Store(_)));
    let m = app.get_match(&caller, match_id).expect("match");
    assert_eq!(m.state, MatchState::InProgress);
    assert_eq!(m.elapsed_seconds, 0);

    app.connection()
        .execute_batch("DROP TRIGGER lock_xg;")
        .expect("drop trigger");
    let done = app
        .control_timer(&caller, match_id, "finish", Some(600))
        .expect("finish after rollback");
    assert_eq!(done.state, MatchState::Finished);
    assert_eq!(done.elapsed_seconds, 600);
    assert!((done.xg - 0.3).abs() < 1e-9);
}
