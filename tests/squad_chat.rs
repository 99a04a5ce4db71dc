use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use stato::auth::Caller;
use stato::config::Settings;
use stato::matches::NewMatch;
use stato::model::Role;
use stato::notify::ChannelPublisher;
use stato::recordings::FsBlobStore;
use stato::{Stato, StatoError, db};

fn fixed_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 2, 18, 30, 0).unwrap()
}

struct Club {
    manager: Caller,
    code: String,
}

fn sign_up(app: &mut Stato, club: &str, squad: &[&str]) -> Club {
    let signup = app
        .signup(club, "First Team", &format!("coach@{club}.test"), squad)
        .expect("signup");
    Club {
        manager: app.caller(signup.manager.id).expect("caller"),
        code: signup.team.team_code.expect("team code"),
    }
}

fn quiet_app() -> Stato {
    let conn = db::open_in_memory().expect("in-memory db");
    Stato::quiet(conn, std::env::temp_dir().join("stato-squad-unused")).with_clock(fixed_clock)
}

fn new_match(app: &Stato, caller: &Caller) -> i64 {
    app.create_match(
        caller,
        &NewMatch {
            opponent: "Rovers".to_string(),
            analyst_name: "Kim".to_string(),
            ..NewMatch::default()
        },
    )
    .expect("match")
    .id
}

#[test]
fn signup_cleans_the_initial_squad() {
    let mut app = quiet_app();
    let club = sign_up(&mut app, "harbour", &[" Ana ", "ana", "", "Bo"]);
    assert_eq!(club.code.len(), 6);
    assert_eq!(club.manager.role, Role::Manager);
    let names: Vec<String> = app
        .list_squad(&club.manager)
        .expect("squad")
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, ["Ana", "Bo"]);

    let err = app
        .signup("other", "Team", "COACH@harbour.test", &["Cy"])
        .expect_err("duplicate username");
    assert!(matches!(err, StatoError::Conflict(_)));
}

#[test]
fn players_join_by_code_and_leave() {
    let mut app = quiet_app();
    let club = sign_up(&mut app, "harbour", &["Ana", "Bo"]);

    let profile = app.register_player("ana@example.test").expect("account");
    let ana = app.caller(profile.id).expect("caller");
    let joined = app
        .join_team(&ana, &format!("  {}  ", club.code.to_lowercase()), "ana")
        .expect("join");
    assert!(!joined.already_member);
    assert_eq!(joined.player.as_ref().map(|p| p.name.as_str()), Some("Ana"));

    let ana = app.caller(profile.id).expect("joined caller");
    let again = app.join_team(&ana, &club.code, "Ana").expect("rejoin");
    assert!(again.already_member);

    let rival = app.register_player("impostor@example.test").expect("account");
    let rival = app.caller(rival.id).expect("caller");
    let err = app.join_team(&rival, &club.code, "ANA").expect_err("name taken");
    assert!(matches!(err, StatoError::Conflict(_)));
    let err = app.join_team(&rival, "ZZZZZZ", "Cy").expect_err("unknown code");
    assert!(matches!(err, StatoError::NotFound("Team")));
    let err = app.join_team(&rival, &club.code, "  ").expect_err("blank name");
    assert!(matches!(err, StatoError::Validation(_)));

    let err = app.join_team(&club.manager, &club.code, "Coach").expect_err("manager");
    assert!(matches!(err, StatoError::Forbidden(_)));

    app.leave_team(&ana).expect("leave");
    let left = app.caller(profile.id).expect("caller");
    assert_eq!(left.team_id, None);
    assert_eq!(left.player_id, None);
    assert!(matches!(app.leave_team(&left), Err(StatoError::Validation(_))));
}

#[test]
fn joining_a_second_team_is_a_conflict() {
    let mut app = quiet_app();
    let home = sign_up(&mut app, "home", &["Ana"]);
    let away = sign_up(&mut app, "away", &["Bo"]);
    let profile = app.register_player("ana@example.test").expect("account");
    let ana = app.caller(profile.id).expect("caller");
    app.join_team(&ana, &home.code, "Ana").expect("join");

    let ana = app.caller(profile.id).expect("caller");
    let err = app.join_team(&ana, &away.code, "Ana").expect_err("second team");
    assert!(matches!(err, StatoError::Conflict(_)));
}

#[test]
fn squad_management_is_for_managers() {
    let mut app = quiet_app();
    let club = sign_up(&mut app, "harbour", &["Ana", "Bo"]);
    let profile = app.register_player("bo@example.test").expect("account");
    let bo = app.caller(profile.id).expect("caller");
    app.join_team(&bo, &club.code, "Bo").expect("join");
    let bo = app.caller(profile.id).expect("caller");

    let err = app.replace_squad(&bo, &["Mutiny"]).expect_err("player edit");
    assert!(matches!(err, StatoError::Forbidden(_)));

    let squad = app
        .import_squad_csv(&club.manager, "name,number\nFay,7\n\"Gus\",9\nfay,11\n")
        .expect("import");
    let names: Vec<&str> = squad.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Fay", "Gus"]);
    // Replacing the squad unlinks the old player record but keeps the account on the team.
    let bo = app.caller(profile.id).expect("caller");
    assert_eq!(bo.player_id, None);
    assert!(bo.team_id.is_some());

    let fay = squad[0].id;
    app.delete_player(&club.manager, fay).expect("delete");
    assert_eq!(app.list_squad(&club.manager).expect("squad").len(), 1);
    assert!(matches!(
        app.delete_player(&club.manager, fay),
        Err(StatoError::NotFound("Player"))
    ));
}

#[test]
fn chat_lists_recent_messages_oldest_first() {
    let conn = db::open_in_memory().expect("in-memory db");
    let (publisher, rx) = ChannelPublisher::new();
    let mut app = Stato::new(
        conn,
        Arc::new(publisher),
        Box::new(FsBlobStore::new(std::env::temp_dir().join("stato-chat-unused"))),
        Settings {
            chat_history: 2,
            ..Settings::default()
        },
    )
    .with_clock(fixed_clock);
    let club = sign_up(&mut app, "harbour", &["Ana"]);
    let match_id = new_match(&app, &club.manager);

    let err = app.post_chat(&club.manager, "   ", None).expect_err("empty");
    assert!(matches!(err, StatoError::Validation(_)));

    app.post_chat(&club.manager, "first", None).expect("first");
    app.post_chat(&club.manager, " second ", Some(match_id)).expect("second");
    app.post_chat(&club.manager, "third", Some(match_id)).expect("third");

    let recent = app.list_chat(&club.manager, None).expect("list");
    let texts: Vec<&str> = recent.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(texts, ["second", "third"]);
    assert_eq!(recent[0].sender, "coach@harbour.test");
    assert_eq!(recent[0].sender_role, Role::Manager);

    let note = rx.try_recv().expect("chat notification");
    assert_eq!(note.payload["kind"], "chat");
    assert_eq!(note.payload["data"]["message"], "first");
    assert_eq!(note.payload["data"]["sender_role"], "manager");
}

#[test]
fn chat_ignores_matches_from_other_teams() {
    let mut app = quiet_app();
    let home = sign_up(&mut app, "home", &["Ana"]);
    let away = sign_up(&mut app, "away", &["Bo"]);
    let foreign = new_match(&app, &away.manager);

    let msg = app
        .post_chat(&home.manager, "scouting note", Some(foreign))
        .expect("post");
    assert_eq!(msg.match_id, None);
    let listed = app.list_chat(&home.manager, Some(foreign)).expect("list");
    assert_eq!(listed.len(), 1);
    assert!(app.list_chat(&away.manager, None).expect("away list").is_empty());
}

#[test]
fn recordings_are_replaced_and_served_by_range() {
    let dir = tempfile::tempdir().expect("tempdir");
    let conn = db::open_in_memory().expect("in-memory db");
    let mut app = Stato::quiet(conn, dir.path()).with_clock(fixed_clock);
    let club = sign_up(&mut app, "harbour", &["Ana"]);
    let match_id = new_match(&app, &club.manager);

    let rec = app
        .attach_recording(&club.manager, match_id, "Final.MOV", b"0123456789", Some("95"))
        .expect("attach");
    assert_eq!(rec.content_type, "video/quicktime");
    assert_eq!(rec.size_bytes, 10);
    assert_eq!(rec.duration_seconds, Some(95));

    let whole = app.read_recording(&club.manager, match_id, None).expect("whole");
    assert_eq!(whole.bytes, b"0123456789");
    let part = app
        .read_recording(&club.manager, match_id, Some("bytes=2-4"))
        .expect("range");
    assert_eq!(part.bytes, b"234");
    assert_eq!(part.content_range(), "bytes 2-4/10");
    let tail = app
        .read_recording(&club.manager, match_id, Some("bytes=7-99"))
        .expect("clamped");
    assert_eq!(tail.bytes, b"789");
    assert!(matches!(
        app.read_recording(&club.manager, match_id, Some("bytes=10-")),
        Err(StatoError::Validation(_))
    ));

    let replaced = app
        .attach_recording(&club.manager, match_id, "final.webm", b"abcdef", Some("n/a"))
        .expect("replace");
    assert_eq!(replaced.id, rec.id);
    assert_eq!(replaced.content_type, "video/webm");
    assert_eq!(replaced.duration_seconds, Some(95));
    let blobs = std::fs::read_dir(dir.path()).expect("blob dir").count();
    assert_eq!(blobs, 1);

    let away = sign_up(&mut app, "away", &["Bo"]);
    assert!(matches!(
        app.recording(&away.manager, match_id),
        Err(StatoError::NotFound("Match"))
    ));
    let other_match = new_match(&app, &away.manager);
    assert!(matches!(
        app.recording(&away.manager, other_match),
        Err(StatoError::NotFound("Recording"))
    ));
}
