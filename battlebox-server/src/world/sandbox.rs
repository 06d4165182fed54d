//! In-Memory Collaborators
//!
//! `SandboxWorld` keeps markers, pastes, positions and loadouts in maps.
//! `RecordingMessenger` keeps every notice and display update it was asked to
//! deliver. Both can mark participants unreachable to exercise the
//! best-effort paths.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::core::geometry::{CellPos, Location, Volume};
use crate::core::ids::{ParticipantId, StructureRef};
use crate::game::team::{Loadout, MarkerColor};
use crate::timer::display::DisplayUpdate;
use crate::world::{DeliveryError, MarkerReader, Messenger, WorldAccess, WorldError};

/// Cells a structure writes, relative to its paste origin.
pub type Footprint = Vec<(CellPos, Option<MarkerColor>)>;

/// A recorded structure paste.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Paste {
    /// Structure pasted.
    pub structure: StructureRef,
    /// Target world.
    pub world: String,
    /// Paste origin.
    pub origin: CellPos,
}

/// In-memory world.
#[derive(Clone, Debug, Default)]
pub struct SandboxWorld {
    worlds: BTreeSet<String>,
    markers: BTreeMap<(String, CellPos), MarkerColor>,
    structures: BTreeMap<StructureRef, Footprint>,
    pastes: Vec<Paste>,
    positions: BTreeMap<ParticipantId, (String, Location)>,
    loadouts: BTreeMap<ParticipantId, Loadout>,
    offline: BTreeSet<ParticipantId>,
}

impl SandboxWorld {
    /// Empty sandbox with no worlds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a world.
    pub fn add_world(&mut self, name: impl Into<String>) {
        self.worlds.insert(name.into());
    }

    /// Unload a world. Its markers stay in memory.
    pub fn remove_world(&mut self, name: &str) {
        self.worlds.remove(name);
    }

    /// Register a structure footprint.
    pub fn add_structure(&mut self, structure: StructureRef, footprint: Footprint) {
        self.structures.insert(structure, footprint);
    }

    /// Take a participant offline (or bring them back).
    pub fn set_online(&mut self, participant: ParticipantId, online: bool) {
        if online {
            self.offline.remove(&participant);
        } else {
            self.offline.insert(participant);
        }
    }

    /// Pastes performed so far.
    pub fn pastes(&self) -> &[Paste] {
        &self.pastes
    }

    /// Number of pastes performed.
    pub fn paste_count(&self) -> usize {
        self.pastes.len()
    }

    /// Last teleport target of a participant.
    pub fn position(&self, participant: ParticipantId) -> Option<(&str, &Location)> {
        self.positions.get(&participant).map(|(w, l)| (w.as_str(), l))
    }

    /// Current loadout of a participant.
    pub fn loadout(&self, participant: ParticipantId) -> Option<Loadout> {
        self.loadouts.get(&participant).copied()
    }

    fn check_world(&self, world: &str) -> Result<(), WorldError> {
        if self.worlds.contains(world) {
            Ok(())
        } else {
            Err(WorldError::WorldNotFound(world.to_string()))
        }
    }

    fn check_online(&self, participant: ParticipantId) -> Result<(), WorldError> {
        if self.offline.contains(&participant) {
            Err(WorldError::Unreachable(participant))
        } else {
            Ok(())
        }
    }
}

/// Footprint that resets every cell of `volume` to neutral when pasted at
/// `anchor`.
pub fn neutral_footprint(volume: &Volume, anchor: CellPos) -> Footprint {
    volume
        .cells()
        .map(|cell| (cell.delta_from(anchor), Some(MarkerColor::Neutral)))
        .collect()
}

impl MarkerReader for SandboxWorld {
    fn marker_at(&self, world: &str, cell: CellPos) -> Result<Option<MarkerColor>, WorldError> {
        self.check_world(world)?;
        Ok(self.markers.get(&(world.to_string(), cell)).copied())
    }
}

impl WorldAccess for SandboxWorld {
    fn set_marker(
        &mut self,
        world: &str,
        cell: CellPos,
        marker: Option<MarkerColor>,
    ) -> Result<(), WorldError> {
        self.check_world(world)?;
        let key = (world.to_string(), cell);
        match marker {
            Some(color) => self.markers.insert(key, color),
            None => self.markers.remove(&key),
        };
        Ok(())
    }

    fn paste_structure(
        &mut self,
        structure: &StructureRef,
        world: &str,
        origin: CellPos,
    ) -> Result<(), WorldError> {
        self.check_world(world)?;
        let footprint = self.structures
            .get(structure)
            .ok_or_else(|| WorldError::UnknownStructure(structure.clone()))?;

        for (rel, marker) in footprint {
            let key = (world.to_string(), origin.offset(*rel));
            match marker {
                Some(color) => self.markers.insert(key, *color),
                None => self.markers.remove(&key),
            };
        }

        debug!("Pasted {} at {:?} in {}", structure, origin, world);
        self.pastes.push(Paste {
            structure: structure.clone(),
            world: world.to_string(),
            origin,
        });
        Ok(())
    }

    fn teleport(
        &mut self,
        participant: ParticipantId,
        world: &str,
        location: &Location,
    ) -> Result<(), WorldError> {
        self.check_world(world)?;
        self.check_online(participant)?;
        self.positions.insert(participant, (world.to_string(), *location));
        Ok(())
    }

    fn equip(&mut self, participant: ParticipantId, loadout: Loadout) -> Result<(), WorldError> {
        self.check_online(participant)?;
        self.loadouts.insert(participant, loadout);
        Ok(())
    }

    fn strip(&mut self, participant: ParticipantId) -> Result<(), WorldError> {
        self.check_online(participant)?;
        self.loadouts.remove(&participant);
        Ok(())
    }
}

/// Messenger that records everything it delivers.
#[derive(Clone, Debug, Default)]
pub struct RecordingMessenger {
    unreachable: BTreeSet<ParticipantId>,
    notices: BTreeMap<ParticipantId, Vec<String>>,
    displays: BTreeMap<ParticipantId, Vec<DisplayUpdate>>,
}

impl RecordingMessenger {
    /// Messenger with everyone reachable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a participant reachable or not.
    pub fn set_reachable(&mut self, participant: ParticipantId, reachable: bool) {
        if reachable {
            self.unreachable.remove(&participant);
        } else {
            self.unreachable.insert(participant);
        }
    }

    /// Notices delivered to a participant.
    pub fn notices(&self, participant: ParticipantId) -> &[String] {
        self.notices.get(&participant).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Latest display state of a participant.
    pub fn display(&self, participant: ParticipantId) -> Option<&DisplayUpdate> {
        self.displays.get(&participant).and_then(|d| d.last())
    }

    /// Every display update delivered to a participant.
    pub fn display_updates(&self, participant: ParticipantId) -> &[DisplayUpdate] {
        self.displays.get(&participant).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Messenger for RecordingMessenger {
    fn is_reachable(&self, participant: ParticipantId) -> bool {
        !self.unreachable.contains(&participant)
    }

    fn notify(&mut self, participant: ParticipantId, text: &str) -> Result<(), DeliveryError> {
        if !self.is_reachable(participant) {
            return Err(DeliveryError::Unreachable(participant));
        }
        debug!("[to {}] {}", participant, text);
        self.notices.entry(participant).or_default().push(text.to_string());
        Ok(())
    }

    fn update_display(
        &mut self,
        participant: ParticipantId,
        update: &DisplayUpdate,
    ) -> Result<(), DeliveryError> {
        if !self.is_reachable(participant) {
            return Err(DeliveryError::Unreachable(participant));
        }
        self.displays.entry(participant).or_default().push(update.clone());
        Ok(())
    }
}
