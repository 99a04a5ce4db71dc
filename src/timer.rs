use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatoError};
use crate::model::{Match, MatchState, TimerAction};

/// The clock-related columns of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: MatchState,
    pub elapsed_seconds: u32,
    pub timer_started_at: Option<DateTime<Utc>>,
}

impl From<&Match> for TimerSnapshot {
    fn from(m: &Match) -> Self {
        TimerSnapshot {
            state: m.state,
            elapsed_seconds: m.elapsed_seconds,
            timer_started_at: m.timer_started_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: TimerSnapshot,
    /// Finishing a match locks in its final xG.
    pub finalize_xg: bool,
}

/// Banked seconds plus the running segment. A clock that appears to run
/// backwards contributes nothing.
pub fn live_elapsed(snapshot: &TimerSnapshot, now: DateTime<Utc>) -> u32 {
    match (snapshot.state, snapshot.timer_started_at) {
        (MatchState::InProgress, Some(started)) => {
            let running = (now - started).num_seconds().max(0);
            let running = u32::try_from(running).unwrap_or(u32::MAX);
            snapshot.elapsed_seconds.saturating_add(running)
        }
        _ => snapshot.elapsed_seconds,
    }
}

pub fn parse_elapsed(raw: Option<i64>) -> Result<Option<u32>> {
    raw.map(|value| {
        u32::try_from(value)
            .map_err(|_| StatoError::validation("elapsed_seconds must be a non-negative integer."))
    })
    .transpose()
}

fn not_allowed(action: TimerAction, state: MatchState) -> StatoError {
    StatoError::validation(format!(
        "Cannot {} a match that is {}.",
        action.as_str(),
        state.as_str()
    ))
}

/// Computes the next clock state without touching storage; an error means nothing may change.
pub fn apply_action(
    current: &TimerSnapshot,
    action: TimerAction,
    elapsed: Option<u32>,
    now: DateTime<Utc>,
) -> Result<Transition> {
    let next = match (action, current.state) {
        (TimerAction::Start, MatchState::NotStarted) => TimerSnapshot {
            state: MatchState::InProgress,
            elapsed_seconds: elapsed.unwrap_or(0),
            timer_started_at: Some(now),
        },
        (TimerAction::Pause, MatchState::InProgress) => TimerSnapshot {
            state: MatchState::Paused,
            elapsed_seconds: elapsed.unwrap_or_else(|| live_elapsed(current, now)),
            timer_started_at: None,
        },
        (TimerAction::Resume, MatchState::Paused) => TimerSnapshot {
            state: MatchState::InProgress,
            elapsed_seconds: elapsed.unwrap_or(current.elapsed_seconds),
            timer_started_at: Some(now),
        },
        (TimerAction::Finish, state) if !state.is_terminal() => TimerSnapshot {
            state: MatchState::Finished,
            elapsed_seconds: elapsed.unwrap_or_else(|| live_elapsed(current, now)),
            timer_started_at: None,
        },
        (action, state) => return Err(not_allowed(action, state)),
    };
    Ok(Transition {
        next,
        finalize_xg: matches!(action, TimerAction::Finish),
    })
}
