//! External Collaborators
//!
//! The orchestration core never touches the world or participants directly.
//! Everything physical goes through these traits:
//!
//! - [`MarkerReader`] / [`WorldAccess`]: cell markers, structure pastes,
//!   teleports and equipment.
//! - [`Messenger`]: best-effort chat notices and display updates.
//!
//! `sandbox` provides in-memory implementations used by the demo binary and
//! the test suites.

pub mod sandbox;

use crate::core::geometry::{CellPos, Location};
use crate::core::ids::{ParticipantId, StructureRef};
use crate::game::team::{Loadout, MarkerColor};
use crate::timer::display::DisplayUpdate;

pub use sandbox::{SandboxWorld, RecordingMessenger, neutral_footprint};

/// World collaborator errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// Named world is not loaded.
    #[error("World not found: {0}")]
    WorldNotFound(String),

    /// Structure snapshot is unknown to the world.
    #[error("Unknown structure: {0}")]
    UnknownStructure(StructureRef),

    /// Participant has no presence in the world right now.
    #[error("Participant {0} is not reachable")]
    Unreachable(ParticipantId),
}

/// Messaging collaborator errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Participant is offline or otherwise unreachable.
    #[error("Participant {0} is not reachable")]
    Unreachable(ParticipantId),
}

/// Read-only access to cell markers.
pub trait MarkerReader {
    /// Marker at a cell, `None` for an empty cell.
    fn marker_at(&self, world: &str, cell: CellPos) -> Result<Option<MarkerColor>, WorldError>;
}

/// Read/write access to the world and to participants' avatars in it.
///
/// Implementations must not block; writes may be queued and applied later.
pub trait WorldAccess: MarkerReader {
    /// Write (or clear, with `None`) a cell marker.
    fn set_marker(
        &mut self,
        world: &str,
        cell: CellPos,
        marker: Option<MarkerColor>,
    ) -> Result<(), WorldError>;

    /// Paste a structure snapshot with its origin at `origin`.
    fn paste_structure(
        &mut self,
        structure: &StructureRef,
        world: &str,
        origin: CellPos,
    ) -> Result<(), WorldError>;

    /// Move a participant.
    fn teleport(
        &mut self,
        participant: ParticipantId,
        world: &str,
        location: &Location,
    ) -> Result<(), WorldError>;

    /// Replace a participant's equipment with a loadout.
    fn equip(&mut self, participant: ParticipantId, loadout: Loadout) -> Result<(), WorldError>;

    /// Remove all match equipment and effects from a participant.
    fn strip(&mut self, participant: ParticipantId) -> Result<(), WorldError>;
}

/// Best-effort participant messaging.
pub trait Messenger {
    /// Whether the participant can currently receive anything.
    fn is_reachable(&self, participant: ParticipantId) -> bool;

    /// Send a chat-style notice.
    fn notify(&mut self, participant: ParticipantId, text: &str) -> Result<(), DeliveryError>;

    /// Replace the participant's timer display.
    fn update_display(
        &mut self,
        participant: ParticipantId,
        update: &DisplayUpdate,
    ) -> Result<(), DeliveryError>;
}

/// Send a notice to every listed participant, skipping failures.
pub fn broadcast<'a, M, I>(messenger: &mut M, participants: I, text: &str)
where
    M: Messenger + ?Sized,
    I: IntoIterator<Item = &'a ParticipantId>,
{
    for participant in participants {
        if let Err(e) = messenger.notify(*participant, text) {
            tracing::debug!("Notice to {} dropped: {}", participant, e);
        }
    }
}
