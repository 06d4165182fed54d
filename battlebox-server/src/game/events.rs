//! Game Events
//!
//! Timer identities and the events the orchestrator emits per tick.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::ids::SessionId;
use crate::game::session::Phase;
use crate::game::team::Team;
use crate::game::win::Outcome;

/// The five per-session countdowns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseTimer {
    /// Waiting for enough participants.
    Waiting,
    /// Kit selection.
    TeamSelect,
    /// Countdown before the match.
    Starting,
    /// Match clock.
    Match,
    /// Victory grace period.
    Ending,
}

impl PhaseTimer {
    /// Every timer kind. Teardown cancels all of them.
    pub const ALL: [PhaseTimer; 5] = [
        PhaseTimer::Waiting,
        PhaseTimer::TeamSelect,
        PhaseTimer::Starting,
        PhaseTimer::Match,
        PhaseTimer::Ending,
    ];

    /// Timer that runs during a phase.
    pub fn for_phase(phase: Phase) -> PhaseTimer {
        match phase {
            Phase::Waiting => PhaseTimer::Waiting,
            Phase::TeamSelect => PhaseTimer::TeamSelect,
            Phase::Starting => PhaseTimer::Starting,
            Phase::Active => PhaseTimer::Match,
            Phase::Ending => PhaseTimer::Ending,
        }
    }

    /// Title shown on the participants' display.
    pub fn label(self) -> &'static str {
        match self {
            PhaseTimer::Waiting => "WAITING FOR PLAYERS",
            PhaseTimer::TeamSelect => "KIT SELECTION",
            PhaseTimer::Starting => "GAME STARTING",
            PhaseTimer::Match => "BATTLE BOX",
            PhaseTimer::Ending => "VICTORY",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            PhaseTimer::Waiting => "waiting",
            PhaseTimer::TeamSelect => "kit",
            PhaseTimer::Starting => "starting",
            PhaseTimer::Match => "game",
            PhaseTimer::Ending => "victory",
        }
    }
}

/// Phase lengths in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseDurations {
    /// Countdown once enough participants are present.
    pub waiting: u32,
    /// Kit selection.
    pub team_select: u32,
    /// Pre-match countdown.
    pub starting: u32,
    /// Match clock.
    pub match_length: u32,
    /// Victory grace period.
    pub ending: u32,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            waiting: 30,
            team_select: 30,
            starting: 5,
            match_length: 120,
            ending: 20,
        }
    }
}

impl PhaseDurations {
    /// Length of one timer.
    pub fn get(&self, timer: PhaseTimer) -> u32 {
        match timer {
            PhaseTimer::Waiting => self.waiting,
            PhaseTimer::TeamSelect => self.team_select,
            PhaseTimer::Starting => self.starting,
            PhaseTimer::Match => self.match_length,
            PhaseTimer::Ending => self.ending,
        }
    }
}

/// Registry key for one session's timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerKey {
    /// Owning session.
    pub session: SessionId,
    /// Which countdown.
    pub timer: PhaseTimer,
}

impl TimerKey {
    /// Create a key.
    pub fn new(session: SessionId, timer: PhaseTimer) -> Self {
        Self { session, timer }
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.timer.prefix(), self.session)
    }
}

/// Work queued by timer completions, applied after the timer pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A phase countdown reached zero.
    TimerElapsed(TimerKey),
}

/// Phase transition record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    /// Session that moved.
    pub session: SessionId,
    /// Phase left.
    pub from: Phase,
    /// Phase entered.
    pub to: Phase,
}

/// Finished match record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEnded {
    /// Session that ended.
    pub session: SessionId,
    /// Frozen outcome.
    pub outcome: Outcome,
    /// Reason text.
    pub reason: String,
}

impl MatchEnded {
    /// Winning team, if any.
    pub fn winner(&self) -> Option<Team> {
        self.outcome.winner()
    }
}

/// What one scheduler tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick number (starts at 1).
    pub tick: u64,
    /// Transitions in the order they were applied.
    pub transitions: Vec<PhaseChange>,
    /// Matches that entered `Ending` this tick.
    pub ended: Vec<MatchEnded>,
    /// Sessions removed this tick.
    pub torn_down: Vec<SessionId>,
}

impl TickReport {
    /// Whether the tick changed any session.
    pub fn is_quiet(&self) -> bool {
        self.transitions.is_empty() && self.ended.is_empty() && self.torn_down.is_empty()
    }
}
