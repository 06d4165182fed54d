//! Game Session State Machine
//!
//! One match: its roster, team split, current phase and frozen result.
//! The session owns no timers and performs no I/O; the orchestrator drives it
//! and carries out the side effects of each transition.
//!
//! ```text
//! WAITING ──► TEAM_SELECT ──► STARTING ──► ACTIVE ──► ENDING
//!                                            │          ▲
//!                                            └─instant──┘
//!                                               win
//! ```

use std::collections::BTreeMap;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::geometry::CellPos;
use crate::core::ids::{ArenaId, InstanceId, ParticipantId, SessionId};
use crate::game::team::{assign_team, KitKind, Loadout, Team, TeamCounts};
use crate::game::win::{Evaluation, Outcome};

/// Hard upper bound on roster size.
pub const MAX_CAPACITY: usize = 8;

/// Session phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Gathering participants.
    Waiting,
    /// Teams fixed-ish, kits being chosen; late joins still accepted.
    TeamSelect,
    /// Participants moved to start points.
    Starting,
    /// Match clock running; markers may be placed.
    Active,
    /// Result frozen, grace period before teardown.
    Ending,
}

impl Phase {
    /// Following phase, `None` after `Ending`.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Waiting => Some(Phase::TeamSelect),
            Phase::TeamSelect => Some(Phase::Starting),
            Phase::Starting => Some(Phase::Active),
            Phase::Active => Some(Phase::Ending),
            Phase::Ending => None,
        }
    }

    /// Whether new participants may join.
    pub fn accepts_joins(self) -> bool {
        matches!(self, Phase::Waiting | Phase::TeamSelect)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Waiting => "WAITING",
            Phase::TeamSelect => "TEAM_SELECT",
            Phase::Starting => "STARTING",
            Phase::Active => "ACTIVE",
            Phase::Ending => "ENDING",
        };
        f.write_str(name)
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Session is full.
    #[error("Session is full")]
    SessionFull,

    /// Participant already in this session.
    #[error("Already in session")]
    AlreadyInSession,

    /// Joining is closed in the current phase.
    #[error("Cannot join during {0}")]
    JoinClosed(Phase),

    /// Participant is not a member.
    #[error("Participant not found")]
    ParticipantNotFound,

    /// Transition does not follow the phase order.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current phase.
        from: Phase,
        /// Requested phase.
        to: Phase,
    },

    /// Kit selection is only possible during team selection.
    #[error("Kit selection is closed during {0}")]
    KitSelectionClosed(Phase),
}

/// A roster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Assigned team.
    pub team: Team,
    /// Chosen kit.
    pub kit: KitKind,
    /// When the participant joined.
    pub joined_at: DateTime<Utc>,
}

impl RosterEntry {
    /// Current loadout.
    pub fn loadout(&self) -> Loadout {
        Loadout { team: self.team, kit: self.kit }
    }
}

/// Arena instance held by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceLease {
    /// Leased instance.
    pub instance: InstanceId,
    /// Offset of the instance from its template anchor.
    pub offset: CellPos,
}

/// Frozen match result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Final outcome.
    pub outcome: Outcome,
    /// Reason text.
    pub reason: String,
    /// Marker counts at the moment of evaluation.
    pub counts: TeamCounts,
    /// When the result was frozen.
    pub decided_at: DateTime<Utc>,
}

/// A single match.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Arena definition this match is played on.
    pub arena: ArenaId,
    phase: Phase,
    capacity: usize,
    roster: BTreeMap<ParticipantId, RosterEntry>,
    result: Option<MatchResult>,
    instance: Option<InstanceLease>,
    created_at: DateTime<Utc>,
    phase_changed_at: DateTime<Utc>,
}

impl GameSession {
    /// Create an empty session in `Waiting`.
    ///
    /// Capacity is clamped to `1..=MAX_CAPACITY`.
    pub fn new(id: SessionId, arena: ArenaId, capacity: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            arena,
            phase: Phase::Waiting,
            capacity: capacity.clamp(1, MAX_CAPACITY),
            roster: BTreeMap::new(),
            result: None,
            instance: None,
            created_at: now,
            phase_changed_at: now,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Maximum roster size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of members.
    pub fn participant_count(&self) -> usize {
        self.roster.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Whether the roster is full.
    pub fn is_full(&self) -> bool {
        self.roster.len() >= self.capacity
    }

    /// Whether a participant is a member.
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.roster.contains_key(participant)
    }

    /// Member ids in stable order.
    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> + '_ {
        self.roster.keys()
    }

    /// Roster entries in stable order.
    pub fn roster(&self) -> impl Iterator<Item = (&ParticipantId, &RosterEntry)> + '_ {
        self.roster.iter()
    }

    /// Roster entry for a participant.
    pub fn entry(&self, participant: &ParticipantId) -> Option<&RosterEntry> {
        self.roster.get(participant)
    }

    /// Team of a participant.
    pub fn team_of(&self, participant: &ParticipantId) -> Option<Team> {
        self.roster.get(participant).map(|e| e.team)
    }

    /// Members per team.
    pub fn team_counts(&self) -> TeamCounts {
        let mut counts = TeamCounts::default();
        for entry in self.roster.values() {
            counts.increment(entry.team);
        }
        counts
    }

    /// Whether a join would currently be accepted.
    pub fn check_join(&self, participant: &ParticipantId) -> Result<(), SessionError> {
        if !self.phase.accepts_joins() {
            return Err(SessionError::JoinClosed(self.phase));
        }

        if self.roster.contains_key(participant) {
            return Err(SessionError::AlreadyInSession);
        }

        if self.is_full() {
            return Err(SessionError::SessionFull);
        }

        Ok(())
    }

    /// Add a participant and assign a team.
    pub fn add_participant(&mut self, participant: ParticipantId) -> Result<Team, SessionError> {
        self.check_join(&participant)?;

        let team = assign_team(&self.team_counts());
        self.roster.insert(participant, RosterEntry {
            team,
            kit: KitKind::Base,
            joined_at: Utc::now(),
        });

        Ok(team)
    }

    /// Remove a participant. Allowed in every phase.
    pub fn remove_participant(&mut self, participant: &ParticipantId) -> Option<RosterEntry> {
        self.roster.remove(participant)
    }

    /// Record a kit choice.
    pub fn select_kit(&mut self, participant: &ParticipantId, kit: KitKind) -> Result<Loadout, SessionError> {
        if self.phase != Phase::TeamSelect {
            return Err(SessionError::KitSelectionClosed(self.phase));
        }

        let entry = self.roster
            .get_mut(participant)
            .ok_or(SessionError::ParticipantNotFound)?;
        entry.kit = kit;
        Ok(entry.loadout())
    }

    /// Move to the next phase. `to` must be exactly `phase().next()`.
    ///
    /// Entering `Ending` this way leaves the result undecided; use
    /// [`GameSession::finish`] to end with a result.
    pub fn advance(&mut self, to: Phase) -> Result<Phase, SessionError> {
        let from = self.phase;
        if from.next() != Some(to) {
            return Err(SessionError::InvalidTransition { from, to });
        }
        self.phase = to;
        self.phase_changed_at = Utc::now();
        Ok(from)
    }

    /// Enter `Ending` from `Active` with a frozen result.
    ///
    /// Returns `Ok(false)` (and changes nothing) if the session is already
    /// ending. Any earlier phase is refused.
    pub fn finish(&mut self, evaluation: Evaluation) -> Result<bool, SessionError> {
        match self.phase {
            Phase::Ending => return Ok(false),
            Phase::Active => {}
            from => return Err(SessionError::InvalidTransition { from, to: Phase::Ending }),
        }

        self.phase = Phase::Ending;
        self.phase_changed_at = Utc::now();
        self.result = Some(MatchResult {
            outcome: evaluation.outcome,
            reason: evaluation.reason,
            counts: evaluation.counts,
            decided_at: self.phase_changed_at,
        });
        Ok(true)
    }

    /// Frozen result, once ending.
    pub fn result(&self) -> Option<&MatchResult> {
        self.result.as_ref()
    }

    /// Current outcome (undecided until ending).
    pub fn outcome(&self) -> Outcome {
        self.result.as_ref().map(|r| r.outcome).unwrap_or_default()
    }

    /// Attach the leased arena instance.
    pub fn attach_instance(&mut self, lease: InstanceLease) {
        self.instance = Some(lease);
    }

    /// Leased arena instance.
    pub fn instance(&self) -> Option<&InstanceLease> {
        self.instance.as_ref()
    }

    /// Detach the arena instance. Yields it at most once.
    pub fn take_instance(&mut self) -> Option<InstanceLease> {
        self.instance.take()
    }

    /// When the session was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the current phase began.
    pub fn phase_changed_at(&self) -> DateTime<Utc> {
        self.phase_changed_at
    }
}
