use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::json;

use crate::aggregate::{self, TeamPerformance};
use crate::auth::{self, Caller, Profile};
use crate::chat;
use crate::config::Settings;
use crate::error::{Result, StatoError};
use crate::ledger::{self, EventInput, Increment};
use crate::matches::{self, NewMatch};
use crate::model::{
    ChatMessage, EventCounter, EventInstance, EventKind, Match, Player, Recording, TimerAction,
    ZoneAnalysis,
};
use crate::notify::{self, NotificationKind, NullPublisher, Publisher};
use crate::recordings::{self, BlobStore, RecordingChunk};
use crate::suggestions::insights::{self, PlayerInsight};
use crate::suggestions::live::{self, LiveReport};
use crate::suggestions::player::{self, PlayerRecommendations};
use crate::suggestions::post_match::{self, PostMatchReport};
use crate::suggestions::team::{self, SeasonReport};
use crate::teams::{self, JoinOutcome, Signup};
use crate::timer::{self, TimerSnapshot};
use crate::xg::{self, PlayerXg};
use crate::zones::{self, ZoneEntry, ZoneReport};

/// Every caller-facing operation. Team scope always comes from the caller,
/// never from the request.
pub struct Stato {
    conn: Connection,
    publisher: Arc<dyn Publisher>,
    blobs: Box<dyn BlobStore>,
    settings: Settings,
    clock: fn() -> DateTime<Utc>,
}

impl Stato {
    pub fn new(
        conn: Connection,
        publisher: Arc<dyn Publisher>,
        blobs: Box<dyn BlobStore>,
        settings: Settings,
    ) -> Self {
        Stato {
            conn,
            publisher,
            blobs,
            settings,
            clock: Utc::now,
        }
    }

    /// No notifications, recordings kept under `recordings_dir`.
    pub fn quiet(conn: Connection, recordings_dir: impl Into<std::path::PathBuf>) -> Self {
        Stato::new(
            conn,
            Arc::new(NullPublisher),
            Box::new(recordings::FsBlobStore::new(recordings_dir)),
            Settings::default(),
        )
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn caller(&self, user_id: i64) -> Result<Caller> {
        auth::resolve_caller(&self.conn, user_id)
    }

    // Accounts and teams.

    pub fn signup<S: AsRef<str>>(
        &mut self,
        club_name: &str,
        team_name: &str,
        manager_username: &str,
        squad: &[S],
    ) -> Result<Signup> {
        let now = self.now();
        let signup = teams::signup(&mut self.conn, club_name, team_name, manager_username, squad, now)?;
        tracing::info!(team_id = signup.team.id, code = ?signup.team.team_code, "team signed up");
        Ok(signup)
    }

    pub fn register_player(&self, username: &str) -> Result<Profile> {
        auth::create_player_account(&self.conn, username, self.now())
    }

    pub fn my_profile(&self, caller: &Caller) -> Result<Profile> {
        auth::get_profile(&self.conn, caller.user_id)
    }

    pub fn join_team(&mut self, caller: &Caller, team_code: &str, player_name: &str) -> Result<JoinOutcome> {
        let now = self.now();
        teams::join_team(&mut self.conn, caller, team_code, player_name, now)
    }

    pub fn leave_team(&self, caller: &Caller) -> Result<()> {
        teams::leave_team(&self.conn, caller)
    }

    // Squad.

    pub fn list_squad(&self, caller: &Caller) -> Result<Vec<Player>> {
        teams::list_squad(&self.conn, caller.team_id()?)
    }

    pub fn replace_squad<S: AsRef<str>>(&mut self, caller: &Caller, names: &[S]) -> Result<Vec<Player>> {
        let team_id = caller.team_id()?;
        caller.require_manager()?;
        let now = self.now();
        teams::replace_squad(&mut self.conn, team_id, names, now)
    }

    pub fn import_squad_csv(&mut self, caller: &Caller, csv: &str) -> Result<Vec<Player>> {
        let names = teams::parse_squad_csv(csv)?;
        if names.is_empty() {
            return Err(StatoError::validation("No player names found in CSV."));
        }
        self.replace_squad(caller, &names)
    }

    pub fn delete_player(&mut self, caller: &Caller, player_id: i64) -> Result<()> {
        let team_id = caller.team_id()?;
        caller.require_manager()?;
        teams::delete_player(&mut self.conn, team_id, player_id)
    }

    // Matches.

    pub fn create_match(&self, caller: &Caller, input: &NewMatch) -> Result<Match> {
        matches::create_match(&self.conn, caller.team_id()?, Some(caller.user_id), input, self.now())
    }

    pub fn list_matches(&self, caller: &Caller, season: Option<&str>) -> Result<Vec<Match>> {
        matches::list_matches(&self.conn, caller.team_id()?, season)
    }

    pub fn get_match(&self, caller: &Caller, match_id: i64) -> Result<Match> {
        matches::get_match(&self.conn, caller.team_id()?, match_id)
    }

    pub fn current_live_match(&self, caller: &Caller) -> Result<Option<Match>> {
        matches::current_live(&self.conn, caller.team_id()?)
    }

    /// Publishes a `goal_update` stat when either side was supplied.
    pub fn update_goals(
        &self,
        caller: &Caller,
        match_id: i64,
        goals_scored: Option<i64>,
        goals_conceded: Option<i64>,
    ) -> Result<Match> {
        let team_id = caller.team_id()?;
        let m = matches::update_goals(&self.conn, team_id, match_id, goals_scored, goals_conceded)?;
        if goals_scored.is_some() || goals_conceded.is_some() {
            notify::publish_quietly(
                self.publisher.as_ref(),
                NotificationKind::Stat,
                json!({
                    "team_id": team_id,
                    "match_id": m.id,
                    "goals_scored": m.goals_scored,
                    "goals_conceded": m.goals_conceded,
                    "type": "goal_update",
                }),
            );
        }
        Ok(m)
    }

    pub fn set_xg_against(&self, caller: &Caller, match_id: i64, xg_against: f64) -> Result<Match> {
        matches::set_xg_against(&self.conn, caller.team_id()?, match_id, xg_against)
    }

    // Event ledger.

    /// Counter bump, then best-effort instance, xG refresh and notification.
    pub fn increment_event(
        &mut self,
        caller: &Caller,
        match_id: i64,
        player_name: &str,
        event: &str,
        second: Option<i64>,
        zone: Option<&str>,
    ) -> Result<Increment> {
        let team_id = caller.team_id()?;
        let player_name = player_name.trim();
        if player_name.is_empty() {
            return Err(StatoError::validation("Invalid player."));
        }
        let event: EventKind = event.parse()?;
        let now = self.now();
        let input = EventInput {
            player_name,
            event,
            second,
            zone,
        };
        let increment = ledger::record_event(&mut self.conn, team_id, match_id, &input, now)?;

        if let Err(err) = xg::recompute_xg(&self.conn, match_id) {
            tracing::warn!(team_id, match_id, error = %err, "xG refresh failed");
        }
        match serde_json::to_value(&increment) {
            Ok(data) => notify::publish_quietly(self.publisher.as_ref(), NotificationKind::Stat, data),
            Err(err) => tracing::warn!(match_id, error = %err, "could not encode stat notification"),
        }
        Ok(increment)
    }

    pub fn match_counters(&self, caller: &Caller, match_id: i64) -> Result<Vec<EventCounter>> {
        ledger::match_counters(&self.conn, caller.team_id()?, match_id)
    }

    pub fn team_counters(&self, caller: &Caller) -> Result<Vec<EventCounter>> {
        ledger::team_counters(&self.conn, caller.team_id()?)
    }

    pub fn match_instances(&self, caller: &Caller, match_id: i64) -> Result<Vec<EventInstance>> {
        ledger::match_instances(&self.conn, caller.team_id()?, match_id)
    }

    /// A player's own counters across every match.
    pub fn my_stats(&self, caller: &Caller) -> Result<Vec<EventCounter>> {
        caller.require_player()?;
        let Some(player_id) = caller.player_id else {
            return Ok(Vec::new());
        };
        ledger::player_counters(&self.conn, player_id)
    }

    // Timer.

    /// Nothing is written when the action token or the transition is rejected.
    pub fn control_timer(
        &self,
        caller: &Caller,
        match_id: i64,
        action: &str,
        elapsed_seconds: Option<i64>,
    ) -> Result<Match> {
        let team_id = caller.team_id()?;
        let action: TimerAction = action.parse()?;
        let elapsed = timer::parse_elapsed(elapsed_seconds)?;
        let now = self.now();

        // Timer state and the locked-in xG of a finish land together or not at all.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let current = matches::get_match(&tx, team_id, match_id)?;
        let transition = timer::apply_action(&TimerSnapshot::from(&current), action, elapsed, now)?;
        let next = transition.next;
        matches::save_timer(
            &tx,
            match_id,
            next.state,
            next.elapsed_seconds,
            next.timer_started_at,
        )?;
        if transition.finalize_xg {
            let final_xg = xg::compute_xg(&tx, match_id)?;
            matches::set_xg(&tx, match_id, xg::round2(final_xg))?;
        }
        tx.commit()?;
        tracing::info!(
            team_id,
            match_id,
            action = action.as_str(),
            state = next.state.as_str(),
            elapsed = next.elapsed_seconds,
            "timer updated"
        );
        matches::get_match(&self.conn, team_id, match_id)
    }

    // Suggestions and statistics.

    pub fn live_suggestions(&self, caller: &Caller, match_id: i64) -> Result<LiveReport> {
        let team_id = caller.team_id()?;
        let m = matches::get_match(&self.conn, team_id, match_id)?;
        let totals = aggregate::match_totals(&self.conn, team_id, match_id)?;
        Ok(live::live_report(&m, totals, self.settings.match_seconds(), self.now()))
    }

    pub fn post_match_suggestions(&self, caller: &Caller, match_id: i64) -> Result<PostMatchReport> {
        let team_id = caller.team_id()?;
        let m = matches::get_match(&self.conn, team_id, match_id)?;
        let totals = aggregate::match_totals(&self.conn, team_id, match_id)?;
        Ok(post_match::post_match_report(&m, totals))
    }

    pub fn team_suggestions(&self, caller: &Caller, season: Option<&str>) -> Result<SeasonReport> {
        let team_id = caller.team_id()?;
        let season = season.map(str::trim).filter(|s| !s.is_empty());
        let finished = matches::finished_matches(&self.conn, team_id, season)?;
        let events = aggregate::season_event_spread(&self.conn, team_id, season)?;
        Ok(team::season_report(season, &finished, events))
    }

    pub fn team_performance_stats(&self, caller: &Caller, season: Option<&str>) -> Result<TeamPerformance> {
        aggregate::team_performance(&self.conn, caller.team_id()?, season)
    }

    pub fn player_xg_stats(&self, caller: &Caller, season: Option<&str>) -> Result<Vec<PlayerXg>> {
        let season = season.map(str::trim).filter(|s| !s.is_empty());
        xg::player_xg(&self.conn, caller.team_id()?, season)
    }

    /// One player when `player_id` is given, otherwise every squad player with something to improve.
    pub fn player_recommendations(
        &self,
        caller: &Caller,
        player_id: Option<i64>,
        match_id: Option<i64>,
    ) -> Result<Vec<PlayerRecommendations>> {
        let team_id = caller.team_id()?;
        if let Some(match_id) = match_id {
            matches::get_match(&self.conn, team_id, match_id)?;
        }
        let single_match = match_id.is_some();
        let now = self.now();
        match player_id {
            Some(player_id) => {
                let (p, breakdown) = aggregate::player_breakdown(&self.conn, team_id, player_id, match_id)?;
                Ok(vec![player::analyze_player(&p, &breakdown, single_match, now)])
            }
            None => {
                let squad = aggregate::squad_breakdowns(&self.conn, team_id, match_id)?;
                Ok(player::analyze_squad(&squad, single_match, now))
            }
        }
    }

    pub fn squad_insights(&self, caller: &Caller, match_id: Option<i64>) -> Result<Vec<PlayerInsight>> {
        let team_id = caller.team_id()?;
        if let Some(match_id) = match_id {
            matches::get_match(&self.conn, team_id, match_id)?;
        }
        let squad = aggregate::squad_breakdowns(&self.conn, team_id, match_id)?;
        Ok(insights::squad_insights(&squad))
    }

    // Zones.

    pub fn zone_analysis(&self, caller: &Caller, season: Option<&str>) -> Result<ZoneReport> {
        zones::zone_report(&self.conn, caller.team_id()?, season)
    }

    pub fn upsert_zone(&self, caller: &Caller, entry: &ZoneEntry) -> Result<ZoneAnalysis> {
        let team_id = caller.team_id()?;
        caller.require_manager()?;
        zones::upsert_zone(&self.conn, team_id, entry, self.now())
    }

    // Chat.

    pub fn post_chat(&self, caller: &Caller, text: &str, match_id: Option<i64>) -> Result<ChatMessage> {
        let message = chat::post_message(&self.conn, caller, text, match_id, self.now())?;
        notify::publish_quietly(
            self.publisher.as_ref(),
            NotificationKind::Chat,
            chat::chat_payload(&message),
        );
        Ok(message)
    }

    pub fn list_chat(&self, caller: &Caller, match_id: Option<i64>) -> Result<Vec<ChatMessage>> {
        chat::list_messages(&self.conn, caller.team_id()?, match_id, self.settings.chat_history)
    }

    // Recordings.

    pub fn attach_recording(
        &self,
        caller: &Caller,
        match_id: i64,
        file_name: &str,
        bytes: &[u8],
        duration_seconds: Option<&str>,
    ) -> Result<Recording> {
        matches::get_match(&self.conn, caller.team_id()?, match_id)?;
        recordings::attach_recording(
            &self.conn,
            self.blobs.as_ref(),
            match_id,
            file_name,
            bytes,
            recordings::parse_duration(duration_seconds),
            self.now(),
        )
    }

    pub fn recording(&self, caller: &Caller, match_id: i64) -> Result<Recording> {
        matches::get_match(&self.conn, caller.team_id()?, match_id)?;
        recordings::get_recording(&self.conn, match_id)?.ok_or(StatoError::NotFound("Recording"))
    }

    pub fn read_recording(&self, caller: &Caller, match_id: i64, range: Option<&str>) -> Result<RecordingChunk> {
        matches::get_match(&self.conn, caller.team_id()?, match_id)?;
        recordings::read_recording(&self.conn, self.blobs.as_ref(), match_id, range)
    }
}
