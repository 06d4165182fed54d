//! Orchestrator
//!
//! Composition root. Owns the definition catalog, the arena pool, the session
//! directory and the timer registry, and drives every session through its
//! phases.
//!
//! ## Tick model
//!
//! ```text
//! run_tick()
//!   ├─ timers.tick()        countdowns publish displays, completions yield events
//!   ├─ queue.extend(events)
//!   └─ while let Some(e) = queue.pop_front()
//!        └─ apply(e)        one phase transition, schedules the next timer
//! ```
//!
//! Completions never mutate a session from inside the registry. They are
//! queued and applied in order once the timer pass is over. Stale events
//! (their session moved on or was removed) are dropped.
//!
//! The instant-win path (`place_marker`) and the match timer both end a match
//! through the same idempotent `finish_match`.

use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::arena::definition::{ArenaCatalog, ArenaDefinition, InstanceGeometry};
use crate::arena::pool::{ArenaPool, PoolError, PoolStats};
use crate::core::geometry::{CellPos, Location, Volume};
use crate::core::ids::{ArenaId, InstanceId, ParticipantId, SessionId, TemplateId};
use crate::game::events::{
    MatchEnded, PhaseChange, PhaseDurations, PhaseTimer, SessionEvent, TickReport, TimerKey,
};
use crate::game::session::{GameSession, InstanceLease, Phase, SessionError};
use crate::game::team::{KitKind, Loadout, MarkerColor, Team, TeamCounts};
use crate::game::win::{self, Evaluation, Outcome};
use crate::server::config::{ArenaSetup, ConfigError, OrchestratorConfig};
use crate::server::directory::{DirectoryError, SessionDirectory};
use crate::server::status::{OrchestratorStats, SessionStatus, TimerStatus};
use crate::timer::registry::TimerRegistry;
use crate::world::{broadcast, Messenger, WorldAccess, WorldError};

/// Declined request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// Arena id is not in the catalog.
    #[error("Unknown arena: {0}")]
    UnknownArena(ArenaId),

    /// Arena definition lacks required parts.
    #[error("Arena {arena} is incomplete, missing: {missing}")]
    ArenaIncomplete {
        /// Arena id.
        arena: ArenaId,
        /// Missing parts.
        missing: String,
    },

    /// Every instance of the arena is in use.
    #[error("No free instance of arena {0}")]
    PoolExhausted(ArenaId),

    /// Session id not known.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Participant is not in a session.
    #[error("Participant {0} is not in a session")]
    NotInSession(ParticipantId),

    /// Markers can only change while the match is running.
    #[error("Markers cannot be changed during {0}")]
    MarkersClosed(Phase),

    /// Cell lies outside the scoring volume.
    #[error("Cell {0:?} is outside the scoring area")]
    OutsideScoringArea(CellPos),

    /// Participant tried to place another team's color.
    #[error("{team} team cannot place {color:?} markers")]
    WrongColor {
        /// Participant's team.
        team: Team,
        /// Requested color.
        color: MarkerColor,
    },

    /// Arena definition vanished or the instance is missing.
    #[error("Arena geometry unavailable for session {0}")]
    GeometryUnavailable(SessionId),

    /// Session rule violation.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Directory rule violation.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Pool failure.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// World collaborator failure.
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Which per-team location.
#[derive(Clone, Copy, Debug)]
enum Spot {
    /// Kit-selection spawn.
    Spawn,
    /// Match start position.
    Start,
}

/// The orchestration core.
pub struct Orchestrator<W, M> {
    config: OrchestratorConfig,
    catalog: ArenaCatalog,
    pool: ArenaPool,
    directory: SessionDirectory,
    timers: TimerRegistry<TimerKey, SessionEvent>,
    queue: VecDeque<SessionEvent>,
    journal: TickReport,
    tick: u64,
    world: W,
    messenger: M,
}

impl<W, M> Orchestrator<W, M>
where
    W: WorldAccess,
    M: Messenger,
{
    /// Build an orchestrator and register the configured arenas.
    pub fn new(config: OrchestratorConfig, world: W, messenger: M) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut orchestrator = Self {
            pool: ArenaPool::new(config.pool),
            catalog: ArenaCatalog::new(),
            directory: SessionDirectory::new(),
            timers: TimerRegistry::new(),
            queue: VecDeque::new(),
            journal: TickReport::default(),
            tick: 0,
            world,
            messenger,
            config,
        };

        for setup in orchestrator.config.arenas.clone() {
            orchestrator.register_arena(setup)?;
        }

        info!(
            "Orchestrator ready: {} arenas, capacity {}, min players {}",
            orchestrator.catalog.len(),
            orchestrator.config.session_capacity,
            orchestrator.config.min_players
        );
        Ok(orchestrator)
    }

    /// Add an arena definition and its pool template.
    pub fn register_arena(&mut self, setup: ArenaSetup) -> Result<(), PoolError> {
        self.pool.register_template(setup.template())?;
        if !setup.definition.is_complete() {
            warn!(
                "Arena {} registered but incomplete, missing: {}",
                setup.definition.id,
                setup.definition.missing_parts().join(", ")
            );
        }
        self.catalog.insert(setup.definition);
        Ok(())
    }

    /// Retire an arena and its pool template.
    ///
    /// Refused with [`PoolError::TemplateInUse`] while any of its instances is
    /// leased to a session.
    pub fn remove_arena(&mut self, arena: &ArenaId) -> Result<ArenaDefinition, RequestError> {
        if self.catalog.get(arena).is_none() {
            return Err(RequestError::UnknownArena(arena.clone()));
        }
        self.pool.remove_template(&TemplateId::from(arena))?;
        let definition = self.catalog
            .remove(arena)
            .ok_or_else(|| RequestError::UnknownArena(arena.clone()))?;

        info!("Arena {} removed", arena);
        Ok(definition)
    }

    // =========================================================================
    // ENTRY POINTS
    // =========================================================================

    /// Create a session for an arena with `creator` as its first member.
    pub fn create_session(&mut self, creator: ParticipantId, arena: &ArenaId) -> Result<SessionId, RequestError> {
        let definition = self.catalog
            .get(arena)
            .ok_or_else(|| RequestError::UnknownArena(arena.clone()))?;
        if !definition.is_complete() {
            return Err(RequestError::ArenaIncomplete {
                arena: arena.clone(),
                missing: definition.missing_parts().join(", "),
            });
        }
        if let Some(session) = self.directory.session_of(&creator) {
            return Err(DirectoryError::AlreadyInSession { participant: creator, session }.into());
        }

        let session_id = SessionId::random();
        let lease = self.pool
            .lease(&mut self.world, &TemplateId::from(arena), session_id)
            .ok_or_else(|| RequestError::PoolExhausted(arena.clone()))?;

        let mut session = GameSession::new(session_id, arena.clone(), self.config.session_capacity);
        session.attach_instance(InstanceLease {
            instance: lease.instance.clone(),
            offset: lease.offset,
        });

        if let Err(e) = self.directory.insert(session) {
            self.release_instance(&lease.instance);
            return Err(e.into());
        }
        info!("Created session {} on {} ({})", session_id, arena, lease.instance);

        match self.admit(session_id, creator) {
            Ok(_) => Ok(session_id),
            Err(e) => {
                self.discard(session_id);
                Err(e)
            }
        }
    }

    /// Join an existing session.
    pub fn join_session(&mut self, participant: ParticipantId, session_id: SessionId) -> Result<Team, RequestError> {
        if self.directory.get(&session_id).is_none() {
            return Err(RequestError::SessionNotFound(session_id));
        }
        self.admit(session_id, participant)
    }

    /// Join the oldest joinable session of an arena, or create one.
    pub fn join_or_create(
        &mut self,
        participant: ParticipantId,
        arena: &ArenaId,
    ) -> Result<(SessionId, Team), RequestError> {
        if let Some(session_id) = self.directory.find_joinable(arena) {
            let team = self.admit(session_id, participant)?;
            return Ok((session_id, team));
        }

        let session_id = self.create_session(participant, arena)?;
        let team = self.directory
            .get(&session_id)
            .and_then(|s| s.team_of(&participant))
            .ok_or(RequestError::NotInSession(participant))?;
        Ok((session_id, team))
    }

    /// Leave the current session. Allowed in every phase.
    pub fn leave(&mut self, participant: ParticipantId) -> Result<SessionId, RequestError> {
        let (session_id, entry) = self.directory.leave(&participant)?;
        self.timers.unwatch(&mut self.messenger, &participant);
        self.restore_participant(participant);
        self.notify(participant, "You left the game.");

        let Some(session) = self.directory.get(&session_id) else {
            return Ok(session_id);
        };
        let (phase, remaining) = (session.phase(), session.participant_count());
        info!(
            "{} ({} team) left session {} during {}, {} remaining",
            participant, entry.team, session_id, phase, remaining
        );
        self.announce(session_id, &format!("{} left the game ({} remaining)", participant, remaining));

        if phase == Phase::Waiting {
            if remaining == 0 {
                self.teardown(session_id);
            } else if remaining < self.config.min_players {
                let key = TimerKey::new(session_id, PhaseTimer::Waiting);
                if self.timers.cancel(&mut self.messenger, &key) {
                    self.announce(session_id, "Not enough players, countdown stopped.");
                }
            }
        }

        Ok(session_id)
    }

    /// Choose a kit. Only during kit selection.
    pub fn select_kit(&mut self, participant: ParticipantId, kit: KitKind) -> Result<Loadout, RequestError> {
        let session_id = self.directory
            .session_of(&participant)
            .ok_or(RequestError::NotInSession(participant))?;
        let session = self.directory
            .get_mut(&session_id)
            .ok_or(RequestError::NotInSession(participant))?;

        let loadout = session.select_kit(&participant, kit)?;
        log_world_failure("Equip", participant, self.world.equip(participant, loadout));
        self.notify(participant, &format!("You selected the {} kit!", kit));
        Ok(loadout)
    }

    /// Place a marker in the scoring area and run the instant-win check.
    ///
    /// Returns the match outcome after the placement (`Undecided` while the
    /// match goes on).
    pub fn place_marker(
        &mut self,
        participant: ParticipantId,
        cell: CellPos,
        color: MarkerColor,
    ) -> Result<Outcome, RequestError> {
        let (session_id, team, geometry) = self.marker_context(participant, cell)?;
        if team.marker() != color {
            return Err(RequestError::WrongColor { team, color });
        }

        self.world.set_marker(&geometry.world, cell, Some(color))?;
        debug!("{} placed {:?} at {:?} in session {}", participant, color, cell, session_id);

        let check = win::evaluate(&geometry.scoring_volume, &geometry.world, &self.world, Phase::Active);
        if !check.outcome.is_decided() {
            return Ok(Outcome::Undecided);
        }

        info!("Instant win in session {}: {}", session_id, check.reason);
        self.finish_match(session_id);
        Ok(self.directory
            .get(&session_id)
            .map(GameSession::outcome)
            .unwrap_or(check.outcome))
    }

    /// Reset a scoring cell to neutral.
    pub fn remove_marker(&mut self, participant: ParticipantId, cell: CellPos) -> Result<(), RequestError> {
        let (session_id, _, geometry) = self.marker_context(participant, cell)?;
        self.world.set_marker(&geometry.world, cell, Some(MarkerColor::Neutral))?;
        debug!("{} cleared {:?} in session {}", participant, cell, session_id);
        Ok(())
    }

    /// End a running match now. Returns `false` if it was already ending.
    ///
    /// Only an `Active` match can end; earlier phases are refused unchanged.
    pub fn end_session(&mut self, session_id: SessionId) -> Result<bool, RequestError> {
        let phase = self
            .phase(&session_id)
            .ok_or(RequestError::SessionNotFound(session_id))?;
        match phase {
            Phase::Active => Ok(self.finish_match(session_id)),
            Phase::Ending => Ok(false),
            from => Err(SessionError::InvalidTransition { from, to: Phase::Ending }.into()),
        }
    }

    /// Advance every timer by one tick and apply the resulting transitions.
    ///
    /// The report also carries changes made by requests since the previous
    /// tick (instant wins, sessions abandoned while waiting).
    pub fn run_tick(&mut self) -> TickReport {
        self.tick += 1;

        let completed = self.timers.tick(&mut self.messenger);
        self.queue.extend(completed);
        while let Some(event) = self.queue.pop_front() {
            self.apply(event);
        }

        let mut report = std::mem::take(&mut self.journal);
        report.tick = self.tick;
        if !report.is_quiet() {
            debug!(
                "Tick {}: {} transitions, {} ended, {} torn down",
                report.tick,
                report.transitions.len(),
                report.ended.len(),
                report.torn_down.len()
            );
        }
        report
    }

    /// Tear down every session and release every instance.
    ///
    /// Returns the number of sessions closed.
    pub fn shutdown(&mut self) -> usize {
        let ids = self.directory.ids();
        for id in &ids {
            self.teardown(*id);
        }

        self.timers.cancel_all(&mut self.messenger);
        self.queue.clear();
        for instance in self.pool.leased() {
            self.release_instance(&instance);
        }

        info!("Orchestrator shut down, {} sessions closed", ids.len());
        ids.len()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Session by id.
    pub fn session(&self, session_id: &SessionId) -> Option<&GameSession> {
        self.directory.get(session_id)
    }

    /// Session a participant is in.
    pub fn session_of(&self, participant: &ParticipantId) -> Option<SessionId> {
        self.directory.session_of(participant)
    }

    /// Phase of a session.
    pub fn phase(&self, session_id: &SessionId) -> Option<Phase> {
        self.directory.get(session_id).map(GameSession::phase)
    }

    /// Whether a session's timer is running.
    pub fn is_timer_running(&self, session_id: SessionId, timer: PhaseTimer) -> bool {
        self.timers.is_running(&TimerKey::new(session_id, timer))
    }

    /// Seconds left on a session's timer.
    pub fn timer_remaining(&self, session_id: SessionId, timer: PhaseTimer) -> Option<u32> {
        self.timers.remaining(&TimerKey::new(session_id, timer))
    }

    /// Snapshot of one session.
    pub fn session_status(&self, session_id: &SessionId) -> Option<SessionStatus> {
        let session = self.directory.get(session_id)?;
        let timer = PhaseTimer::for_phase(session.phase());
        let running = self.timers
            .snapshot(&TimerKey::new(*session_id, timer))
            .map(|s| TimerStatus { timer, label: s.label, remaining: s.remaining, duration: s.duration });
        Some(SessionStatus::capture(session, running))
    }

    /// Snapshot of the participant's session.
    pub fn status_of(&self, participant: &ParticipantId) -> Option<SessionStatus> {
        self.session_status(&self.directory.session_of(participant)?)
    }

    /// Snapshots of every session.
    pub fn sessions(&self) -> Vec<SessionStatus> {
        self.directory
            .ids()
            .iter()
            .filter_map(|id| self.session_status(id))
            .collect()
    }

    /// Scoring volume of a session's instance.
    pub fn scoring_volume(&self, session_id: &SessionId) -> Option<Volume> {
        let session = self.directory.get(session_id)?;
        self.geometry(session).map(|g| g.scoring_volume)
    }

    /// Live marker counts in a session's scoring volume.
    pub fn marker_counts(&self, session_id: &SessionId) -> Result<TeamCounts, RequestError> {
        let session = self.directory
            .get(session_id)
            .ok_or(RequestError::SessionNotFound(*session_id))?;
        let geometry = self.geometry(session)
            .ok_or(RequestError::GeometryUnavailable(*session_id))?;
        Ok(win::tally(&geometry.scoring_volume, &geometry.world, &self.world)?)
    }

    /// Pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Orchestrator counters.
    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            tick: self.tick,
            sessions: self.directory.len(),
            participants: self.directory.participant_count(),
            timers: self.timers.len(),
            pool: self.pool.stats(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Definition catalog.
    pub fn catalog(&self) -> &ArenaCatalog {
        &self.catalog
    }

    /// Arena pool.
    pub fn pool(&self) -> &ArenaPool {
        &self.pool
    }

    /// World collaborator.
    pub fn world(&self) -> &W {
        &self.world
    }

    /// Mutable world collaborator.
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// Messaging collaborator.
    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    /// Mutable messaging collaborator.
    pub fn messenger_mut(&mut self) -> &mut M {
        &mut self.messenger
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    fn apply(&mut self, event: SessionEvent) {
        let SessionEvent::TimerElapsed(key) = event;

        let Some(phase) = self.phase(&key.session) else {
            debug!("Timer {} fired for a removed session", key);
            return;
        };
        if PhaseTimer::for_phase(phase) != key.timer {
            debug!("Stale timer {} ignored during {}", key, phase);
            return;
        }

        match key.timer {
            PhaseTimer::Waiting => self.enter_team_select(key.session),
            PhaseTimer::TeamSelect => self.enter_starting(key.session),
            PhaseTimer::Starting => self.enter_active(key.session),
            PhaseTimer::Match => {
                self.finish_match(key.session);
            }
            PhaseTimer::Ending => {
                self.teardown(key.session);
            }
        }
    }

    fn advance(&mut self, session_id: SessionId, to: Phase) -> bool {
        let Some(session) = self.directory.get_mut(&session_id) else {
            return false;
        };

        match session.advance(to) {
            Ok(from) => {
                info!("Session {}: {} -> {}", session_id, from, to);
                self.journal.transitions.push(PhaseChange { session: session_id, from, to });
                true
            }
            Err(e) => {
                warn!("Session {}: {}", session_id, e);
                false
            }
        }
    }

    fn enter_team_select(&mut self, session_id: SessionId) {
        if !self.advance(session_id, Phase::TeamSelect) {
            return;
        }

        for (participant, team) in self.members(session_id) {
            self.prepare_for_kit_selection(session_id, participant, team);
        }

        let kits: Vec<&str> = KitKind::SELECTABLE.iter().map(|k| k.name()).collect();
        let message = format!(
            "Select your kit! Battle starts in {} seconds. Kits: {}",
            self.durations(session_id).team_select,
            kits.join(", ")
        );
        self.announce(session_id, &message);
        self.start_phase_timer(session_id, PhaseTimer::TeamSelect);
    }

    fn enter_starting(&mut self, session_id: SessionId) {
        if !self.advance(session_id, Phase::Starting) {
            return;
        }

        for (participant, team) in self.members(session_id) {
            self.send_to(session_id, participant, team, Spot::Start);
        }

        self.announce(session_id, "Get ready! Battle starting soon...");
        self.start_phase_timer(session_id, PhaseTimer::Starting);
    }

    fn enter_active(&mut self, session_id: SessionId) {
        if !self.advance(session_id, Phase::Active) {
            return;
        }

        self.announce(session_id, "BATTLE STARTED! Fill the center with your team's markers!");
        self.start_phase_timer(session_id, PhaseTimer::Match);
    }

    /// Freeze the result and start the grace period. Idempotent.
    fn finish_match(&mut self, session_id: SessionId) -> bool {
        let Some(session) = self.directory.get(&session_id) else {
            return false;
        };
        let from = session.phase();
        if from != Phase::Active {
            debug!("Session {} cannot end during {}", session_id, from);
            return false;
        }

        let evaluation = match self.geometry(session) {
            Some(g) => win::evaluate(&g.scoring_volume, &g.world, &self.world, Phase::Ending),
            None => {
                warn!("Session {} has no arena geometry, result left undecided", session_id);
                Evaluation {
                    outcome: Outcome::Undecided,
                    reason: "Arena unavailable".to_string(),
                    counts: TeamCounts::default(),
                }
            }
        };

        for timer in PhaseTimer::ALL.into_iter().filter(|t| *t != PhaseTimer::Ending) {
            self.timers.cancel(&mut self.messenger, &TimerKey::new(session_id, timer));
        }

        let Some(session) = self.directory.get_mut(&session_id) else {
            return false;
        };
        match session.finish(evaluation.clone()) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!("Session {}: {}", session_id, e);
                return false;
            }
        }

        info!("Session {} ended: {:?} ({})", session_id, evaluation.outcome, evaluation.reason);
        self.journal.transitions.push(PhaseChange { session: session_id, from, to: Phase::Ending });
        self.journal.ended.push(MatchEnded {
            session: session_id,
            outcome: evaluation.outcome,
            reason: evaluation.reason.clone(),
        });

        let headline = match evaluation.outcome {
            Outcome::Winner(team) => format!("{} team wins!", team),
            Outcome::Draw => "It's a draw!".to_string(),
            Outcome::Undecided => "No result.".to_string(),
        };
        self.announce(session_id, "=== GAME OVER ===");
        self.announce(session_id, &headline);
        self.announce(session_id, &evaluation.reason);
        self.start_phase_timer(session_id, PhaseTimer::Ending);
        true
    }

    /// Remove a session: cancel its timers, release its instance, return its
    /// members. Returns `false` if the session was already gone.
    fn teardown(&mut self, session_id: SessionId) -> bool {
        for timer in PhaseTimer::ALL {
            self.timers.cancel(&mut self.messenger, &TimerKey::new(session_id, timer));
        }

        let Some(mut session) = self.directory.remove_session(&session_id) else {
            return false;
        };
        if let Some(lease) = session.take_instance() {
            self.release_instance(&lease.instance);
        }

        let members: Vec<ParticipantId> = session.participants().copied().collect();
        for participant in &members {
            self.restore_participant(*participant);
            self.notify(*participant, "The game has ended. Thanks for playing!");
        }

        info!("Session {} torn down, {} members returned", session_id, members.len());
        self.journal.torn_down.push(session_id);
        true
    }

    /// Drop a session that never got going.
    fn discard(&mut self, session_id: SessionId) {
        for timer in PhaseTimer::ALL {
            self.timers.cancel(&mut self.messenger, &TimerKey::new(session_id, timer));
        }
        if let Some(mut session) = self.directory.remove_session(&session_id) {
            if let Some(lease) = session.take_instance() {
                self.release_instance(&lease.instance);
            }
            warn!("Discarded session {}", session_id);
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn admit(&mut self, session_id: SessionId, participant: ParticipantId) -> Result<Team, RequestError> {
        let team = self.directory.join(session_id, participant)?;
        let Some(session) = self.directory.get(&session_id) else {
            return Err(RequestError::SessionNotFound(session_id));
        };
        let (phase, count, capacity) = (session.phase(), session.participant_count(), session.capacity());
        let arena = session.arena.clone();

        info!("{} joined session {} on {} team ({}/{})", participant, session_id, team, count, capacity);
        self.notify(participant, &format!("You joined {} on the {} team!", arena, team));
        self.announce(session_id, &format!("{} joined the {} team ({}/{})", participant, team, count, capacity));

        match phase {
            Phase::Waiting => {
                let key = TimerKey::new(session_id, PhaseTimer::Waiting);
                if self.timers.is_running(&key) {
                    self.timers.watch(&mut self.messenger, &key, participant);
                } else if count >= self.config.min_players {
                    self.announce(session_id, "Minimum players reached! Kit selection starts soon.");
                    self.start_phase_timer(session_id, PhaseTimer::Waiting);
                } else {
                    self.notify(participant, &format!(
                        "Waiting for players ({}/{})",
                        count, self.config.min_players
                    ));
                }
            }
            Phase::TeamSelect => {
                self.prepare_for_kit_selection(session_id, participant, team);
                let key = TimerKey::new(session_id, PhaseTimer::TeamSelect);
                self.timers.watch(&mut self.messenger, &key, participant);
            }
            _ => {}
        }

        Ok(team)
    }

    fn prepare_for_kit_selection(&mut self, session_id: SessionId, participant: ParticipantId, team: Team) {
        self.send_to(session_id, participant, team, Spot::Spawn);
        log_world_failure("Equip", participant, self.world.equip(participant, Loadout::base(team)));
        self.notify(participant, &format!("You are on the {} team. Pick a kit!", team));
    }

    fn send_to(&mut self, session_id: SessionId, participant: ParticipantId, team: Team, spot: Spot) {
        match self.team_location(session_id, team, spot) {
            Some((world, location)) => {
                let result = self.world.teleport(participant, &world, &location);
                log_world_failure("Teleport", participant, result);
            }
            None => warn!("No {:?} location for {} team in session {}", spot, team, session_id),
        }
    }

    fn restore_participant(&mut self, participant: ParticipantId) {
        log_world_failure("Strip", participant, self.world.strip(participant));
        if let Some(lobby) = &self.config.lobby {
            let result = self.world.teleport(participant, &lobby.world, &lobby.location);
            log_world_failure("Teleport", participant, result);
        }
    }

    fn team_location(&self, session_id: SessionId, team: Team, spot: Spot) -> Option<(String, Location)> {
        let session = self.directory.get(&session_id)?;
        let geometry = self.geometry(session)?;
        let locations = match spot {
            Spot::Spawn => &geometry.spawns,
            Spot::Start => &geometry.starts,
        };
        locations.get(team).map(|l| (geometry.world.clone(), *l))
    }

    fn geometry(&self, session: &GameSession) -> Option<InstanceGeometry> {
        let lease = session.instance()?;
        self.catalog.get(&session.arena)?.geometry(lease.offset)
    }

    fn marker_context(
        &self,
        participant: ParticipantId,
        cell: CellPos,
    ) -> Result<(SessionId, Team, InstanceGeometry), RequestError> {
        let session_id = self.directory
            .session_of(&participant)
            .ok_or(RequestError::NotInSession(participant))?;
        let session = self.directory
            .get(&session_id)
            .ok_or(RequestError::NotInSession(participant))?;

        if session.phase() != Phase::Active {
            return Err(RequestError::MarkersClosed(session.phase()));
        }
        let team = session
            .team_of(&participant)
            .ok_or(RequestError::NotInSession(participant))?;
        let geometry = self.geometry(session)
            .ok_or(RequestError::GeometryUnavailable(session_id))?;
        if !geometry.scoring_volume.contains(cell) {
            return Err(RequestError::OutsideScoringArea(cell));
        }

        Ok((session_id, team, geometry))
    }

    fn members(&self, session_id: SessionId) -> Vec<(ParticipantId, Team)> {
        self.directory
            .get(&session_id)
            .map(|s| s.roster().map(|(id, e)| (*id, e.team)).collect())
            .unwrap_or_default()
    }

    fn durations(&self, session_id: SessionId) -> PhaseDurations {
        self.directory
            .get(&session_id)
            .and_then(|s| self.catalog.get(&s.arena))
            .and_then(|d| d.durations)
            .unwrap_or(self.config.durations)
    }

    fn start_phase_timer(&mut self, session_id: SessionId, timer: PhaseTimer) {
        let Some(session) = self.directory.get(&session_id) else {
            return;
        };
        let audience: Vec<ParticipantId> = session.participants().copied().collect();
        let duration = self.durations(session_id).get(timer);
        let key = TimerKey::new(session_id, timer);

        self.timers.start(
            &mut self.messenger,
            key,
            audience,
            duration,
            timer.label(),
            SessionEvent::TimerElapsed(key),
        );
        info!("Session {}: {} timer started ({}s)", session_id, timer.label(), duration);
    }

    fn release_instance(&mut self, instance: &InstanceId) {
        if let Err(e) = self.pool.release(&mut self.world, instance) {
            warn!("Release of {} failed: {}", instance, e);
        }
    }

    fn notify(&mut self, participant: ParticipantId, text: &str) {
        if let Err(e) = self.messenger.notify(participant, text) {
            debug!("Notice to {} dropped: {}", participant, e);
        }
    }

    fn announce(&mut self, session_id: SessionId, text: &str) {
        if let Some(session) = self.directory.get(&session_id) {
            broadcast(&mut self.messenger, session.participants(), text);
        }
    }
}

fn log_world_failure(action: &str, participant: ParticipantId, result: Result<(), WorldError>) {
    match result {
        Ok(()) => {}
        Err(e @ WorldError::Unreachable(_)) => debug!("{} for {} skipped: {}", action, participant, e),
        Err(e) => warn!("{} for {} failed: {}", action, participant, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::definition::tests::complete_definition;
    use crate::arena::definition::ArenaDefinition;
    use crate::core::geometry::WorldPoint;
    use crate::core::ids::StructureRef;
    use crate::world::{neutral_footprint, MarkerReader, RecordingMessenger, SandboxWorld};

    type TestOrchestrator = Orchestrator<SandboxWorld, RecordingMessenger>;

    const ANCHOR: CellPos = CellPos::new(0, 60, 0);

    fn pid(n: u8) -> ParticipantId {
        ParticipantId::new([n; 16])
    }

    fn castle() -> ArenaId {
        ArenaId::new("castle")
    }

    fn setup(definition: ArenaDefinition, max_instances: u32) -> ArenaSetup {
        ArenaSetup {
            definition,
            structure: StructureRef::new("castle.schem"),
            anchor: ANCHOR,
            max_instances,
        }
    }

    fn create_test_orchestrator(config: OrchestratorConfig) -> TestOrchestrator {
        let volume = complete_definition("castle").scoring_volume.unwrap();
        let mut world = SandboxWorld::new();
        world.add_world("arena");
        world.add_world("lobby");
        world.add_structure(StructureRef::new("castle.schem"), neutral_footprint(&volume, ANCHOR));

        let config = OrchestratorConfig {
            lobby: Some(WorldPoint { world: "lobby".to_string(), location: Location::new(0.5, 65.0, 0.5) }),
            arenas: if config.arenas.is_empty() {
                vec![setup(complete_definition("castle"), 2)]
            } else {
                config.arenas.clone()
            },
            ..config
        };
        Orchestrator::new(config, world, RecordingMessenger::new()).unwrap()
    }

    fn default_orchestrator() -> TestOrchestrator {
        create_test_orchestrator(OrchestratorConfig::default())
    }

    /// Session with two members (Red, Blue).
    fn two_player_session(orch: &mut TestOrchestrator) -> SessionId {
        let id = orch.create_session(pid(1), &castle()).unwrap();
        assert_eq!(orch.join_session(pid(2), id), Ok(Team::Blue));
        id
    }

    fn tick_until(orch: &mut TestOrchestrator, id: SessionId, phase: Phase) -> u32 {
        let mut ticks = 0;
        while orch.phase(&id) != Some(phase) {
            orch.run_tick();
            ticks += 1;
            assert!(ticks < 1000, "never reached {}", phase);
        }
        ticks
    }

    fn fill(orch: &mut TestOrchestrator, id: SessionId, who: ParticipantId, color: MarkerColor, n: usize) -> Outcome {
        let volume = orch.scoring_volume(&id).unwrap();
        let mut last = Outcome::Undecided;
        for cell in volume.cells().take(n) {
            last = orch.place_marker(who, cell, color).unwrap();
        }
        last
    }

    #[test]
    fn test_end_to_end_instant_win() {
        let mut orch = default_orchestrator();
        let id = orch.create_session(pid(1), &castle()).unwrap();
        assert_eq!(orch.phase(&id), Some(Phase::Waiting));
        assert!(!orch.is_timer_running(id, PhaseTimer::Waiting));

        assert_eq!(orch.join_session(pid(2), id), Ok(Team::Blue));
        assert_eq!(orch.session(&id).unwrap().team_of(&pid(1)), Some(Team::Red));
        assert_eq!(orch.timer_remaining(id, PhaseTimer::Waiting), Some(30));

        assert_eq!(tick_until(&mut orch, id, Phase::TeamSelect), 30);
        assert!(orch.world().loadout(pid(1)).is_some());
        assert_eq!(orch.world().position(pid(2)).unwrap().1.x, 12.5);

        assert_eq!(tick_until(&mut orch, id, Phase::Starting), 30);
        assert_eq!(orch.world().position(pid(1)).unwrap().1.x, -4.5);

        assert_eq!(tick_until(&mut orch, id, Phase::Active), 5);
        assert_eq!(orch.timer_remaining(id, PhaseTimer::Match), Some(120));

        assert_eq!(fill(&mut orch, id, pid(1), MarkerColor::Red, 8), Outcome::Undecided);
        assert_eq!(fill(&mut orch, id, pid(1), MarkerColor::Red, 9), Outcome::Winner(Team::Red));

        assert_eq!(orch.phase(&id), Some(Phase::Ending));
        assert!(!orch.is_timer_running(id, PhaseTimer::Match));
        assert!(orch.is_timer_running(id, PhaseTimer::Ending));
        let result = orch.session(&id).unwrap().result().unwrap();
        assert!(result.reason.contains("filled"));

        let report = orch.run_tick();
        assert_eq!(report.ended.len(), 1);
        assert_eq!(report.ended[0].winner(), Some(Team::Red));

        for _ in 0..19 {
            orch.run_tick();
        }
        assert!(orch.session(&id).is_none());
        assert_eq!(orch.pool_stats().leased, 0);
        assert_eq!(orch.session_of(&pid(1)), None);
        assert_eq!(orch.world().position(pid(1)).unwrap().0, "lobby");
        assert!(orch.world().loadout(pid(2)).is_none());
        assert_eq!(orch.stats().timers, 0);
    }

    #[test]
    fn test_end_session_idempotent() {
        let mut orch = default_orchestrator();
        let id = two_player_session(&mut orch);
        tick_until(&mut orch, id, Phase::Active);
        assert_eq!(orch.world().paste_count(), 1);

        assert_eq!(orch.end_session(id), Ok(true));
        assert_eq!(orch.end_session(id), Ok(false));
        assert_eq!(orch.phase(&id), Some(Phase::Ending));

        let report = orch.run_tick();
        assert_eq!(report.ended.len(), 1);
        assert_eq!(report.transitions.iter().filter(|t| t.to == Phase::Ending).count(), 1);

        let mut torn_down = 0;
        for _ in 0..30 {
            torn_down += orch.run_tick().torn_down.len();
        }
        assert_eq!(torn_down, 1);
        assert_eq!(orch.world().paste_count(), 2);
        assert_eq!(orch.end_session(id), Err(RequestError::SessionNotFound(id)));
    }

    #[test]
    fn test_end_session_refused_before_active() {
        let mut orch = default_orchestrator();
        let id = orch.create_session(pid(1), &castle()).unwrap();

        assert_eq!(
            orch.end_session(id),
            Err(RequestError::Session(SessionError::InvalidTransition { from: Phase::Waiting, to: Phase::Ending }))
        );
        assert_eq!(orch.phase(&id), Some(Phase::Waiting));

        orch.join_session(pid(2), id).unwrap();
        tick_until(&mut orch, id, Phase::TeamSelect);
        assert_eq!(
            orch.end_session(id),
            Err(RequestError::Session(SessionError::InvalidTransition { from: Phase::TeamSelect, to: Phase::Ending }))
        );
        assert_eq!(orch.phase(&id), Some(Phase::TeamSelect));
        assert!(orch.session(&id).unwrap().result().is_none());
        assert!(orch.is_timer_running(id, PhaseTimer::TeamSelect));

        let report = orch.run_tick();
        assert!(report.ended.is_empty());
        assert!(report.transitions.iter().all(|t| t.to != Phase::Ending));
    }

    #[test]
    fn test_remove_arena() {
        let mut orch = default_orchestrator();
        let id = two_player_session(&mut orch);

        assert_eq!(
            orch.remove_arena(&castle()),
            Err(RequestError::Pool(PoolError::TemplateInUse(TemplateId::from(&castle()))))
        );
        assert!(orch.catalog().get(&castle()).is_some());

        tick_until(&mut orch, id, Phase::Active);
        orch.end_session(id).unwrap();
        for _ in 0..20 {
            orch.run_tick();
        }
        assert!(orch.session(&id).is_none());

        let removed = orch.remove_arena(&castle()).unwrap();
        assert_eq!(removed.id, castle());
        assert_eq!(orch.pool_stats().templates, 0);
        assert_eq!(
            orch.create_session(pid(1), &castle()),
            Err(RequestError::UnknownArena(castle()))
        );
        assert_eq!(orch.remove_arena(&castle()), Err(RequestError::UnknownArena(castle())));
    }

    #[test]
    fn test_instant_win_then_match_timer() {
        let config = OrchestratorConfig {
            durations: PhaseDurations { match_length: 1, ..PhaseDurations::default() },
            ..OrchestratorConfig::default()
        };
        let mut orch = create_test_orchestrator(config);
        let id = two_player_session(&mut orch);
        tick_until(&mut orch, id, Phase::Active);

        fill(&mut orch, id, pid(2), MarkerColor::Blue, 9);
        // the match timer would have fired on this tick
        let report = orch.run_tick();
        assert_eq!(report.ended.len(), 1);
        assert_eq!(orch.session(&id).unwrap().outcome(), Outcome::Winner(Team::Blue));
    }

    #[test]
    fn test_majority_at_time_up() {
        let mut orch = default_orchestrator();
        let id = two_player_session(&mut orch);
        tick_until(&mut orch, id, Phase::Active);

        let volume = orch.scoring_volume(&id).unwrap();
        let cells: Vec<CellPos> = volume.cells().collect();
        orch.place_marker(pid(1), cells[0], MarkerColor::Red).unwrap();
        orch.place_marker(pid(1), cells[1], MarkerColor::Red).unwrap();
        orch.place_marker(pid(2), cells[2], MarkerColor::Blue).unwrap();
        assert_eq!(orch.marker_counts(&id), Ok(TeamCounts::new(2, 1)));

        assert_eq!(tick_until(&mut orch, id, Phase::Ending), 120);
        let result = orch.session(&id).unwrap().result().unwrap();
        assert_eq!(result.outcome, Outcome::Winner(Team::Red));
        assert_eq!(result.reason, "Red team has majority: 2 vs 1");
    }

    #[test]
    fn test_draw_when_nothing_placed() {
        let mut orch = default_orchestrator();
        let id = two_player_session(&mut orch);
        tick_until(&mut orch, id, Phase::Ending);
        assert_eq!(orch.session(&id).unwrap().outcome(), Outcome::Draw);
    }

    #[test]
    fn test_join_refusals() {
        let config = OrchestratorConfig { session_capacity: 2, ..OrchestratorConfig::default() };
        let mut orch = create_test_orchestrator(config);

        assert_eq!(
            orch.create_session(pid(1), &ArenaId::new("nowhere")),
            Err(RequestError::UnknownArena(ArenaId::new("nowhere")))
        );

        let id = two_player_session(&mut orch);
        assert_eq!(
            orch.join_session(pid(2), id),
            Err(RequestError::Directory(DirectoryError::AlreadyInSession { participant: pid(2), session: id }))
        );
        assert_eq!(
            orch.join_session(pid(3), id),
            Err(RequestError::Directory(DirectoryError::Session(SessionError::SessionFull)))
        );
        assert!(matches!(
            orch.create_session(pid(1), &castle()),
            Err(RequestError::Directory(DirectoryError::AlreadyInSession { .. }))
        ));

        orch.leave(pid(2)).unwrap();
        tick_until(&mut orch, id, Phase::Waiting);
        assert_eq!(orch.join_session(pid(4), id), Ok(Team::Blue));
        tick_until(&mut orch, id, Phase::Starting);
        orch.leave(pid(4)).unwrap();
        assert_eq!(
            orch.join_session(pid(5), id),
            Err(RequestError::Directory(DirectoryError::Session(SessionError::JoinClosed(Phase::Starting))))
        );
        assert_eq!(orch.session(&id).unwrap().participant_count(), 1);
    }

    #[test]
    fn test_incomplete_arena_rejected() {
        let mut draft = complete_definition("draft");
        draft.scoring_volume = None;
        let config = OrchestratorConfig {
            arenas: vec![setup(complete_definition("castle"), 2), setup(draft, 2)],
            ..OrchestratorConfig::default()
        };
        let mut orch = create_test_orchestrator(config);

        let err = orch.create_session(pid(1), &ArenaId::new("draft")).unwrap_err();
        assert!(matches!(err, RequestError::ArenaIncomplete { .. }));
        assert_eq!(orch.pool_stats().instances, 0);
        assert_eq!(orch.session_of(&pid(1)), None);
    }

    #[test]
    fn test_pool_exhaustion_and_join_or_create() {
        let config = OrchestratorConfig {
            arenas: vec![setup(complete_definition("castle"), 1)],
            ..OrchestratorConfig::default()
        };
        let mut orch = create_test_orchestrator(config);

        let (first, team) = orch.join_or_create(pid(1), &castle()).unwrap();
        assert_eq!(team, Team::Red);
        assert_eq!(orch.join_or_create(pid(2), &castle()), Ok((first, Team::Blue)));

        assert_eq!(
            orch.create_session(pid(3), &castle()),
            Err(RequestError::PoolExhausted(castle()))
        );
        assert_eq!(orch.session_of(&pid(3)), None);

        tick_until(&mut orch, first, Phase::Starting);
        assert_eq!(
            orch.join_or_create(pid(3), &castle()),
            Err(RequestError::PoolExhausted(castle()))
        );
    }

    #[test]
    fn test_second_instance_is_offset() {
        let mut orch = default_orchestrator();
        let a = two_player_session(&mut orch);
        let b = orch.create_session(pid(3), &castle()).unwrap();
        orch.join_session(pid(4), b).unwrap();
        assert_eq!(orch.pool_stats().instances, 2);

        let va = orch.scoring_volume(&a).unwrap();
        let vb = orch.scoring_volume(&b).unwrap();
        assert_eq!(vb.min(), va.min().offset(CellPos::new(150, 0, 0)));

        tick_until(&mut orch, b, Phase::Active);
        assert_eq!(orch.phase(&a), Some(Phase::Active));
        assert_eq!(
            orch.place_marker(pid(3), va.min(), MarkerColor::Red),
            Err(RequestError::OutsideScoringArea(va.min()))
        );
        assert_eq!(orch.place_marker(pid(3), vb.min(), MarkerColor::Red), Ok(Outcome::Undecided));
        assert_eq!(orch.marker_counts(&b), Ok(TeamCounts::new(1, 0)));
        assert_eq!(orch.marker_counts(&a), Ok(TeamCounts::new(0, 0)));
    }

    #[test]
    fn test_leave_while_waiting() {
        let mut orch = default_orchestrator();
        let id = two_player_session(&mut orch);
        assert!(orch.is_timer_running(id, PhaseTimer::Waiting));

        orch.leave(pid(2)).unwrap();
        assert!(!orch.is_timer_running(id, PhaseTimer::Waiting));
        assert_eq!(orch.world().position(pid(2)).unwrap().0, "lobby");

        orch.join_session(pid(3), id).unwrap();
        assert_eq!(orch.timer_remaining(id, PhaseTimer::Waiting), Some(30));

        orch.leave(pid(3)).unwrap();
        orch.leave(pid(1)).unwrap();
        assert!(orch.session(&id).is_none());
        assert_eq!(orch.pool_stats().leased, 0);
        assert_eq!(orch.run_tick().torn_down, vec![id]);
        assert_eq!(orch.leave(pid(1)), Err(RequestError::Directory(DirectoryError::NotInSession(pid(1)))));
    }

    #[test]
    fn test_empty_roster_runs_to_completion() {
        let mut orch = default_orchestrator();
        let id = two_player_session(&mut orch);
        tick_until(&mut orch, id, Phase::Active);

        orch.leave(pid(1)).unwrap();
        orch.leave(pid(2)).unwrap();
        assert_eq!(orch.phase(&id), Some(Phase::Active));

        tick_until(&mut orch, id, Phase::Ending);
        for _ in 0..20 {
            orch.run_tick();
        }
        assert!(orch.session(&id).is_none());
        assert_eq!(orch.pool_stats().free, 1);
    }

    #[test]
    fn test_kit_selection() {
        let mut orch = default_orchestrator();
        let id = two_player_session(&mut orch);
        assert!(matches!(
            orch.select_kit(pid(1), KitKind::Sniper),
            Err(RequestError::Session(SessionError::KitSelectionClosed(Phase::Waiting)))
        ));

        tick_until(&mut orch, id, Phase::TeamSelect);
        assert_eq!(orch.world().loadout(pid(1)), Some(Loadout::base(Team::Red)));
        let loadout = orch.select_kit(pid(1), KitKind::Sniper).unwrap();
        assert_eq!(orch.world().loadout(pid(1)), Some(loadout));

        // late joiner goes straight to the spawn with a base kit
        assert_eq!(orch.join_session(pid(3), id), Ok(Team::Red));
        assert_eq!(orch.world().loadout(pid(3)), Some(Loadout::base(Team::Red)));
        assert_eq!(orch.world().position(pid(3)).unwrap().1.x, -10.5);
        assert!(orch.messenger().display(pid(3)).is_some());

        assert_eq!(orch.select_kit(pid(9), KitKind::Healer), Err(RequestError::NotInSession(pid(9))));
        let status = orch.session_status(&id).unwrap();
        assert_eq!(status.roster.iter().filter(|m| m.kit == KitKind::Sniper).count(), 1);
        assert_eq!(status.timer.unwrap().timer, PhaseTimer::TeamSelect);
    }

    #[test]
    fn test_marker_rules() {
        let mut orch = default_orchestrator();
        let id = two_player_session(&mut orch);
        let volume = orch.scoring_volume(&id).unwrap();
        let cell = volume.min();

        assert_eq!(
            orch.place_marker(pid(1), cell, MarkerColor::Red),
            Err(RequestError::MarkersClosed(Phase::Waiting))
        );

        tick_until(&mut orch, id, Phase::Active);
        assert_eq!(
            orch.place_marker(pid(1), cell, MarkerColor::Blue),
            Err(RequestError::WrongColor { team: Team::Red, color: MarkerColor::Blue })
        );
        let outside = volume.max().offset(CellPos::new(1, 0, 0));
        assert_eq!(
            orch.place_marker(pid(1), outside, MarkerColor::Red),
            Err(RequestError::OutsideScoringArea(outside))
        );

        orch.place_marker(pid(1), cell, MarkerColor::Red).unwrap();
        assert_eq!(orch.marker_counts(&id), Ok(TeamCounts::new(1, 0)));
        orch.remove_marker(pid(2), cell).unwrap();
        assert_eq!(orch.marker_counts(&id), Ok(TeamCounts::new(0, 0)));
        assert_eq!(orch.world().marker_at("arena", cell), Ok(Some(MarkerColor::Neutral)));
    }

    #[test]
    fn test_instance_reset_between_matches() {
        let config = OrchestratorConfig {
            arenas: vec![setup(complete_definition("castle"), 1)],
            ..OrchestratorConfig::default()
        };
        let mut orch = create_test_orchestrator(config);
        let id = two_player_session(&mut orch);
        tick_until(&mut orch, id, Phase::Active);
        fill(&mut orch, id, pid(1), MarkerColor::Red, 5);
        orch.end_session(id).unwrap();
        for _ in 0..20 {
            orch.run_tick();
        }

        let next = orch.create_session(pid(1), &castle()).unwrap();
        assert_eq!(orch.marker_counts(&next), Ok(TeamCounts::new(0, 0)));
        assert_eq!(orch.pool_stats().instances, 1);
    }

    #[test]
    fn test_unreachable_member_does_not_stall() {
        let mut orch = default_orchestrator();
        let id = two_player_session(&mut orch);
        orch.messenger_mut().set_reachable(pid(2), false);
        orch.world_mut().set_online(pid(2), false);

        tick_until(&mut orch, id, Phase::Active);
        assert_eq!(orch.session(&id).unwrap().participant_count(), 2);
        assert!(orch.world().position(pid(2)).is_none());
    }

    #[test]
    fn test_per_arena_durations() {
        let mut quick = complete_definition("castle");
        quick.durations = Some(PhaseDurations { waiting: 2, team_select: 1, starting: 1, match_length: 3, ending: 1 });
        let config = OrchestratorConfig {
            arenas: vec![setup(quick, 1)],
            ..OrchestratorConfig::default()
        };
        let mut orch = create_test_orchestrator(config);
        let id = two_player_session(&mut orch);

        assert_eq!(tick_until(&mut orch, id, Phase::Active), 4);
        assert_eq!(tick_until(&mut orch, id, Phase::Ending), 3);
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let mut orch = default_orchestrator();
        let a = two_player_session(&mut orch);
        let b = orch.create_session(pid(3), &castle()).unwrap();
        tick_until(&mut orch, a, Phase::Active);

        assert_eq!(orch.shutdown(), 2);
        assert!(orch.session(&a).is_none());
        assert!(orch.session(&b).is_none());
        let stats = orch.stats();
        assert_eq!(stats.sessions, 0);
        assert_eq!(stats.participants, 0);
        assert_eq!(stats.timers, 0);
        assert_eq!(stats.pool.leased, 0);
        assert_eq!(orch.world().position(pid(3)).unwrap().0, "lobby");
    }

    #[test]
    fn test_status_snapshot() {
        let mut orch = default_orchestrator();
        let id = two_player_session(&mut orch);
        let status = orch.status_of(&pid(2)).unwrap();
        assert_eq!(status.phase, Phase::Waiting);
        assert_eq!(status.teams, TeamCounts::new(1, 1));
        assert_eq!(status.instance.as_deref(), Some("castle_instance_1"));
        assert_eq!(status.timer.as_ref().map(|t| t.remaining), Some(30));
        assert_eq!(orch.session_status(&id), Some(status.clone()));

        orch.run_tick();
        let timer = orch.session_status(&id).unwrap().timer.unwrap();
        assert_eq!((timer.remaining, timer.duration), (29, 30));
        assert_eq!(orch.sessions().len(), 1);

        tick_until(&mut orch, id, Phase::TeamSelect);
        let later = orch.session_status(&id).unwrap();
        assert!(later.phase_since >= status.phase_since);
        assert_eq!(later.created_at, status.created_at);
    }
}
