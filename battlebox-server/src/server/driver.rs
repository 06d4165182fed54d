//! Async Driver
//!
//! Runs the orchestrator on a fixed tick interval and serialises every request
//! through one mutex, so the orchestrator itself stays single-threaded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::core::geometry::CellPos;
use crate::core::ids::{ArenaId, ParticipantId, SessionId};
use crate::game::events::TickReport;
use crate::game::team::{KitKind, Loadout, MarkerColor, Team};
use crate::game::win::Outcome;
use crate::server::orchestrator::{Orchestrator, RequestError};
use crate::server::status::{OrchestratorStats, SessionStatus};
use crate::world::{Messenger, WorldAccess};

/// Tick reports kept for slow subscribers.
const REPORT_BACKLOG: usize = 64;

/// Shared handle to a running orchestrator.
pub struct ArenaServer<W, M> {
    orchestrator: Arc<Mutex<Orchestrator<W, M>>>,
    tick_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
    stopping: Arc<AtomicBool>,
    reports_tx: broadcast::Sender<TickReport>,
}

impl<W, M> Clone for ArenaServer<W, M> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            tick_interval: self.tick_interval,
            shutdown_tx: self.shutdown_tx.clone(),
            stopping: self.stopping.clone(),
            reports_tx: self.reports_tx.clone(),
        }
    }
}

impl<W, M> ArenaServer<W, M>
where
    W: WorldAccess,
    M: Messenger,
{
    /// Wrap an orchestrator. Ticks at its configured interval.
    pub fn new(orchestrator: Orchestrator<W, M>) -> Self {
        let tick_interval = orchestrator.config().tick_interval();
        let (shutdown_tx, _) = broadcast::channel(1);
        let (reports_tx, _) = broadcast::channel(REPORT_BACKLOG);

        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            tick_interval,
            shutdown_tx,
            stopping: Arc::new(AtomicBool::new(false)),
            reports_tx,
        }
    }

    /// Pump ticks until [`ArenaServer::shutdown`] is called, then shut the
    /// orchestrator down.
    #[instrument(skip(self))]
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Arena server ticking every {:?}", self.tick_interval);

        while !self.stopping.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.orchestrator.lock().await.run_tick();
                    if !report.is_quiet() {
                        // no subscribers is fine
                        let _ = self.reports_tx.send(report);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        let closed = self.orchestrator.lock().await.shutdown();
        info!("Arena server stopped, {} sessions closed", closed);
    }

    /// Ask `run` to stop.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        if self.shutdown_tx.send(()).is_err() {
            // `run` checks the flag before its next tick
            debug!("Shutdown requested while no driver loop is listening");
        }
    }

    /// Receive the report of every tick that changed something.
    pub fn subscribe(&self) -> broadcast::Receiver<TickReport> {
        self.reports_tx.subscribe()
    }

    /// Join the oldest joinable session of an arena, or create one.
    pub async fn join_or_create(
        &self,
        participant: ParticipantId,
        arena: &ArenaId,
    ) -> Result<(SessionId, Team), RequestError> {
        self.orchestrator.lock().await.join_or_create(participant, arena)
    }

    /// Join a specific session.
    pub async fn join(&self, participant: ParticipantId, session: SessionId) -> Result<Team, RequestError> {
        self.orchestrator.lock().await.join_session(participant, session)
    }

    /// Leave the current session.
    pub async fn leave(&self, participant: ParticipantId) -> Result<SessionId, RequestError> {
        self.orchestrator.lock().await.leave(participant)
    }

    /// Choose a kit.
    pub async fn select_kit(&self, participant: ParticipantId, kit: KitKind) -> Result<Loadout, RequestError> {
        self.orchestrator.lock().await.select_kit(participant, kit)
    }

    /// Place a marker.
    pub async fn place_marker(
        &self,
        participant: ParticipantId,
        cell: CellPos,
        color: MarkerColor,
    ) -> Result<Outcome, RequestError> {
        self.orchestrator.lock().await.place_marker(participant, cell, color)
    }

    /// Clear a marker.
    pub async fn remove_marker(&self, participant: ParticipantId, cell: CellPos) -> Result<(), RequestError> {
        self.orchestrator.lock().await.remove_marker(participant, cell)
    }

    /// Snapshot of one session.
    pub async fn status(&self, session: SessionId) -> Option<SessionStatus> {
        self.orchestrator.lock().await.session_status(&session)
    }

    /// Orchestrator counters.
    pub async fn stats(&self) -> OrchestratorStats {
        self.orchestrator.lock().await.stats()
    }

    /// Run a closure against the orchestrator under the lock.
    pub async fn with<R>(&self, f: impl FnOnce(&mut Orchestrator<W, M>) -> R) -> R {
        let mut orchestrator = self.orchestrator.lock().await;
        f(&mut orchestrator)
    }
}
