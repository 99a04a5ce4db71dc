use std::env;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

const APP_DIR: &str = "stato";
const DB_FILE: &str = "stato.sqlite";
const RECORDINGS_DIR: &str = "recordings";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub recordings_dir: PathBuf,
    pub settings: Settings,
    pub log_filter: String,
}

/// Knobs the service reads at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub match_minutes: u32,
    pub chat_history: usize,
}

impl Settings {
    pub fn match_seconds(&self) -> u32 {
        self.match_minutes * 60
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            match_minutes: 90,
            chat_history: 50,
        }
    }
}

impl Config {
    /// Loads `.env.local` then `.env` (first value wins) and reads the process environment.
    pub fn from_env() -> Config {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let opt = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        let db_path = opt("STATO_DB")
            .map(PathBuf::from)
            .or_else(|| data_dir(&lookup).map(|dir| dir.join(DB_FILE)))
            .unwrap_or_else(|| PathBuf::from(DB_FILE));
        let recordings_dir = opt("STATO_RECORDINGS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                db_path
                    .parent()
                    .map(|dir| dir.join(RECORDINGS_DIR))
                    .unwrap_or_else(|| PathBuf::from(RECORDINGS_DIR))
            });

        let match_minutes = opt("STATO_MATCH_MINUTES")
            .and_then(|val| val.trim().parse::<u32>().ok())
            .unwrap_or(90)
            .clamp(20, 150);
        let chat_history = opt("STATO_CHAT_HISTORY")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(50)
            .clamp(1, 500);
        let log_filter = opt("STATO_LOG").unwrap_or_else(|| "info".to_string());

        Config {
            db_path,
            recordings_dir,
            settings: Settings {
                match_minutes,
                chat_history,
            },
            log_filter,
        }
    }
}

fn data_dir(lookup: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(base) = lookup("XDG_DATA_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR));
        }
    }
    let home = lookup("HOME")?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".local").join("share").join(APP_DIR))
}

/// `RUST_LOG` overrides the configured filter. Safe to call more than once.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
