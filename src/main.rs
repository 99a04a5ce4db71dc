use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};

use stato::config::{self, Config};
use stato::{Stato, db};

const USAGE: &str = "usage: stato [--db=PATH] <command>
  init                                      create the database
  signup --club=NAME --team=NAME --manager=USER [--squad=A,B,C]
  players --user=ID                         list the caller's squad
  report --user=ID [--season=YYYY/YY]       team performance and season suggestions
  live --user=ID [--match=ID]               live suggestions (defaults to the current live match)
  post-match --user=ID --match=ID           post-match suggestions
  recommendations --user=ID [--player=ID] [--match=ID]";

fn main() -> Result<()> {
    let cfg = Config::from_env();
    config::init_logging(&cfg.log_filter);

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(command) = command_arg(&args) else {
        println!("{USAGE}");
        return Ok(());
    };

    let db_path = arg_value(&args, "db").map(PathBuf::from).unwrap_or(cfg.db_path.clone());
    let conn = db::open_db(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    let mut app = Stato::quiet(conn, cfg.recordings_dir.clone());

    match command.as_str() {
        "init" => {
            println!("Database ready: {}", db_path.display());
        }
        "signup" => {
            let club = required(&args, "club")?;
            let team = required(&args, "team")?;
            let manager = required(&args, "manager")?;
            let squad = arg_value(&args, "squad")
                .map(|raw| raw.split(',').map(str::to_string).collect::<Vec<_>>())
                .unwrap_or_default();
            let signup = app.signup(&club, &team, &manager, &squad)?;
            println!("Team {} created", signup.team.id);
            println!("Join code: {}", signup.team.team_code.as_deref().unwrap_or("-"));
            println!("Manager id: {}", signup.manager.id);
            println!("Players: {}", signup.players.len());
        }
        "players" => {
            let caller = app.caller(user_id(&args)?)?;
            for player in app.list_squad(&caller)? {
                println!("{:>5}  {}", player.id, player.name);
            }
        }
        "report" => {
            let caller = app.caller(user_id(&args)?)?;
            let season = arg_value(&args, "season");
            let stats = app.team_performance_stats(&caller, season.as_deref())?;
            let report = app.team_suggestions(&caller, season.as_deref())?;
            print_json(&serde_json::json!({ "stats": stats, "suggestions": report }))?;
        }
        "live" => {
            let caller = app.caller(user_id(&args)?)?;
            let match_id = match arg_value(&args, "match") {
                Some(raw) => parse_id(&raw, "match")?,
                None => {
                    app.current_live_match(&caller)?
                        .ok_or_else(|| anyhow!("no live match"))?
                        .id
                }
            };
            print_json(&app.live_suggestions(&caller, match_id)?)?;
        }
        "post-match" => {
            let caller = app.caller(user_id(&args)?)?;
            let match_id = parse_id(&required(&args, "match")?, "match")?;
            print_json(&app.post_match_suggestions(&caller, match_id)?)?;
        }
        "recommendations" => {
            let caller = app.caller(user_id(&args)?)?;
            let player_id = arg_value(&args, "player")
                .map(|raw| parse_id(&raw, "player"))
                .transpose()?;
            let match_id = arg_value(&args, "match")
                .map(|raw| parse_id(&raw, "match"))
                .transpose()?;
            print_json(&app.player_recommendations(&caller, player_id, match_id)?)?;
        }
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// The first positional argument; values of bare `--flag value` pairs are skipped.
fn command_arg(args: &[String]) -> Option<String> {
    let mut skip_value = false;
    for arg in args {
        if arg.starts_with("--") {
            skip_value = !arg.contains('=');
            continue;
        }
        if skip_value {
            skip_value = false;
            continue;
        }
        return Some(arg.clone());
    }
    None
}

/// Accepts both `--name=value` and `--name value`.
fn arg_value(args: &[String], name: &str) -> Option<String> {
    let flag = format!("--{name}");
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn required(args: &[String], name: &str) -> Result<String> {
    arg_value(args, name).ok_or_else(|| anyhow!("--{name} is required"))
}

fn parse_id(raw: &str, name: &str) -> Result<i64> {
    raw.parse::<i64>()
        .with_context(|| format!("--{name} must be an integer id"))
}

fn user_id(args: &[String]) -> Result<i64> {
    parse_id(&required(args, "user")?, "user")
}
