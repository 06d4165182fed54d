//! Status Snapshots
//!
//! Read-only, serialisable views for status displays and admin tooling.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::arena::pool::PoolStats;
use crate::game::events::PhaseTimer;
use crate::game::session::{GameSession, Phase};
use crate::game::team::{KitKind, Team, TeamCounts};
use crate::game::win::Outcome;

/// Running phase timer of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStatus {
    /// Which countdown.
    pub timer: PhaseTimer,
    /// Display label.
    pub label: String,
    /// Seconds left.
    pub remaining: u32,
    /// Full length of the countdown.
    pub duration: u32,
}

/// One roster line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStatus {
    /// Participant UUID.
    pub participant: String,
    /// Team.
    pub team: Team,
    /// Current kit.
    pub kit: KitKind,
}

/// Snapshot of one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Session UUID.
    pub session: String,
    /// Arena id.
    pub arena: String,
    /// Current phase.
    pub phase: Phase,
    /// When the current phase began.
    pub phase_since: DateTime<Utc>,
    /// Leased instance, if any.
    pub instance: Option<String>,
    /// Running phase timer, if any.
    pub timer: Option<TimerStatus>,
    /// Members in stable order.
    pub roster: Vec<MemberStatus>,
    /// Members per team.
    pub teams: TeamCounts,
    /// Roster limit.
    pub capacity: usize,
    /// Match outcome.
    pub outcome: Outcome,
    /// Outcome reason, once decided.
    pub reason: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl SessionStatus {
    /// Capture a session.
    pub fn capture(session: &GameSession, timer: Option<TimerStatus>) -> Self {
        Self {
            session: session.id.to_uuid_string(),
            arena: session.arena.to_string(),
            phase: session.phase(),
            phase_since: session.phase_changed_at(),
            instance: session.instance().map(|l| l.instance.to_string()),
            timer,
            roster: session
                .roster()
                .map(|(id, entry)| MemberStatus {
                    participant: id.to_uuid_string(),
                    team: entry.team,
                    kit: entry.kit,
                })
                .collect(),
            teams: session.team_counts(),
            capacity: session.capacity(),
            outcome: session.outcome(),
            reason: session.result().map(|r| r.reason.clone()),
            created_at: session.created_at(),
        }
    }

    /// Members of one team.
    pub fn members_of(&self, team: Team) -> impl Iterator<Item = &MemberStatus> + '_ {
        self.roster.iter().filter(move |m| m.team == team)
    }
}

/// Whole-orchestrator counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStats {
    /// Ticks processed.
    pub tick: u64,
    /// Live sessions.
    pub sessions: usize,
    /// Participants in a session.
    pub participants: usize,
    /// Running timers.
    pub timers: usize,
    /// Arena pool.
    pub pool: PoolStats,
}
