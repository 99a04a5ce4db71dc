use std::path::PathBuf;

use anyhow::{Context, Result};

use stato::config::{self, Config};
use stato::{db, teams};

fn main() -> Result<()> {
    let cfg = Config::from_env();
    config::init_logging(&cfg.log_filter);

    let db_path = parse_db_path_arg().unwrap_or(cfg.db_path);
    let conn = db::open_db(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let missing = teams::teams_missing_code(&conn)?;
    for team in &missing {
        let code = teams::assign_code(&conn, team.id)
            .with_context(|| format!("assigning code to team {}", team.id))?;
        println!("team {} ({} / {}): {code}", team.id, team.club_name, team.team_name);
    }

    println!("Team code backfill complete");
    println!("DB: {}", db_path.display());
    println!("Teams updated: {}", missing.len());
    Ok(())
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
