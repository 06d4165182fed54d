//! Arena Definitions
//!
//! Static description of an arena: the world it lives in, the scoring volume,
//! and where each team spawns and starts the match. Coordinates describe the
//! template at its anchor; [`InstanceGeometry`] shifts them onto a leased
//! instance.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::geometry::{CellPos, Location, Volume};
use crate::core::ids::ArenaId;
use crate::game::events::PhaseDurations;
use crate::game::team::Team;

/// One location per team.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamLocations {
    /// Red team location.
    pub red: Option<Location>,
    /// Blue team location.
    pub blue: Option<Location>,
}

impl TeamLocations {
    /// Both locations set.
    pub fn new(red: Location, blue: Location) -> Self {
        Self { red: Some(red), blue: Some(blue) }
    }

    /// Location for a team.
    pub fn get(&self, team: Team) -> Option<&Location> {
        match team {
            Team::Red => self.red.as_ref(),
            Team::Blue => self.blue.as_ref(),
        }
    }

    fn is_complete(&self) -> bool {
        self.red.is_some() && self.blue.is_some()
    }
}

/// Arena setup as authored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaDefinition {
    /// Arena id.
    pub id: ArenaId,
    /// World the arena is built in.
    pub world: String,
    /// Area teams fill with markers.
    #[serde(default)]
    pub scoring_volume: Option<Volume>,
    /// Where participants wait during kit selection.
    #[serde(default)]
    pub team_spawns: TeamLocations,
    /// Where participants start the match.
    #[serde(default)]
    pub team_starts: TeamLocations,
    /// Per-arena phase lengths, overriding the global ones.
    #[serde(default)]
    pub durations: Option<PhaseDurations>,
}

impl ArenaDefinition {
    /// Empty definition (incomplete until every part is set).
    pub fn new(id: impl Into<ArenaId>, world: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            world: world.into(),
            scoring_volume: None,
            team_spawns: TeamLocations::default(),
            team_starts: TeamLocations::default(),
            durations: None,
        }
    }

    /// Whether the arena can host a match.
    pub fn is_complete(&self) -> bool {
        self.missing_parts().is_empty()
    }

    /// Names of the parts still missing.
    pub fn missing_parts(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.world.trim().is_empty() {
            missing.push("world");
        }
        if self.scoring_volume.is_none() {
            missing.push("scoring volume");
        }
        if !self.team_spawns.is_complete() {
            missing.push("team spawns");
        }
        if !self.team_starts.is_complete() {
            missing.push("team start positions");
        }
        missing
    }

    /// Geometry of an instance placed `offset` away from the template anchor.
    ///
    /// `None` if the definition is incomplete.
    pub fn geometry(&self, offset: CellPos) -> Option<InstanceGeometry> {
        let volume = self.scoring_volume?;
        let spawn = |team: Team| self.team_spawns.get(team).map(|l| l.translated(offset));
        let start = |team: Team| self.team_starts.get(team).map(|l| l.translated(offset));

        Some(InstanceGeometry {
            world: self.world.clone(),
            scoring_volume: volume.translated(offset),
            spawns: TeamLocations { red: spawn(Team::Red), blue: spawn(Team::Blue) },
            starts: TeamLocations { red: start(Team::Red), blue: start(Team::Blue) },
        })
    }
}

/// Arena geometry translated onto one instance.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceGeometry {
    /// World name.
    pub world: String,
    /// Translated scoring volume.
    pub scoring_volume: Volume,
    /// Translated kit-selection spawns.
    pub spawns: TeamLocations,
    /// Translated match start positions.
    pub starts: TeamLocations,
}

/// Arena definitions by id.
#[derive(Clone, Debug, Default)]
pub struct ArenaCatalog {
    definitions: BTreeMap<ArenaId, ArenaDefinition>,
}

impl ArenaCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, definition: ArenaDefinition) -> Option<ArenaDefinition> {
        self.definitions.insert(definition.id.clone(), definition)
    }

    /// Look up a definition.
    pub fn get(&self, id: &ArenaId) -> Option<&ArenaDefinition> {
        self.definitions.get(id)
    }

    /// Remove a definition.
    pub fn remove(&mut self, id: &ArenaId) -> Option<ArenaDefinition> {
        self.definitions.remove(id)
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Complete 3x3 arena used across the test suites.
    pub(crate) fn complete_definition(id: &str) -> ArenaDefinition {
        ArenaDefinition {
            id: ArenaId::new(id),
            world: "arena".to_string(),
            scoring_volume: Some(Volume::new(CellPos::new(0, 64, 0), CellPos::new(2, 64, 2))),
            team_spawns: TeamLocations::new(Location::new(-10.5, 65.0, 1.5), Location::new(12.5, 65.0, 1.5)),
            team_starts: TeamLocations::new(Location::new(-4.5, 65.0, 1.5), Location::new(6.5, 65.0, 1.5)),
            durations: None,
        }
    }

    #[test]
    fn test_completeness() {
        let mut def = complete_definition("castle");
        assert!(def.is_complete());

        def.team_starts.blue = None;
        assert_eq!(def.missing_parts(), vec!["team start positions"]);

        let bare = ArenaDefinition::new("bare", "arena");
        assert_eq!(bare.missing_parts().len(), 3);
        assert!(bare.geometry(CellPos::default()).is_none());
    }

    #[test]
    fn test_geometry_translates() {
        let def = complete_definition("castle");
        let geo = def.geometry(CellPos::new(150, 0, 0)).unwrap();
        assert_eq!(geo.scoring_volume.min(), CellPos::new(150, 64, 0));
        assert_eq!(geo.spawns.get(Team::Red).unwrap().x, 139.5);
        assert_eq!(geo.starts.get(Team::Blue).unwrap().x, 156.5);
    }

    #[test]
    fn test_catalog_insert_and_remove() {
        let mut catalog = ArenaCatalog::new();
        assert!(catalog.insert(complete_definition("castle")).is_none());
        assert!(catalog.insert(ArenaDefinition::new("castle", "arena")).is_some());
        assert_eq!(catalog.len(), 1);
        assert!(!catalog.get(&ArenaId::new("castle")).unwrap().is_complete());

        assert!(catalog.remove(&ArenaId::new("castle")).is_some());
        assert!(catalog.remove(&ArenaId::new("castle")).is_none());
        assert!(catalog.is_empty());
    }
}
