//! Teams, Markers and Loadouts
//!
//! Team assignment is a pure function of the current team counts so it can be
//! replayed and tested without a session.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

// =============================================================================
// TEAM
// =============================================================================

/// One of the two competing teams.
///
/// `Red` is team A and wins assignment ties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// Team A.
    Red,
    /// Team B.
    Blue,
}

impl Team {
    /// Both teams, in assignment priority order.
    pub const ALL: [Team; 2] = [Team::Red, Team::Blue];

    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Team::Red => "Red",
            Team::Blue => "Blue",
        }
    }

    /// Marker color this team places.
    pub fn marker(self) -> MarkerColor {
        match self {
            Team::Red => MarkerColor::Red,
            Team::Blue => MarkerColor::Blue,
        }
    }

    /// Team that owns a marker color, if any.
    pub fn from_marker(marker: MarkerColor) -> Option<Team> {
        match marker {
            MarkerColor::Red => Some(Team::Red),
            MarkerColor::Blue => Some(Team::Blue),
            MarkerColor::Neutral => None,
        }
    }

    /// The opposing team.
    pub fn other(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Typed cell marker read from or written to the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerColor {
    /// Red team marker.
    Red,
    /// Blue team marker.
    Blue,
    /// Unclaimed cell (the reset state of the scoring area).
    Neutral,
}

// =============================================================================
// TEAM COUNTS & ASSIGNMENT
// =============================================================================

/// Per-team tally (members or markers).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCounts {
    /// Red team count.
    pub red: u32,
    /// Blue team count.
    pub blue: u32,
}

impl TeamCounts {
    /// Create counts.
    pub const fn new(red: u32, blue: u32) -> Self {
        Self { red, blue }
    }

    /// Count for one team.
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }

    /// Increment one team's count.
    pub fn increment(&mut self, team: Team) {
        match team {
            Team::Red => self.red += 1,
            Team::Blue => self.blue += 1,
        }
    }

    /// Sum of both teams.
    pub fn total(&self) -> u32 {
        self.red + self.blue
    }
}

/// Pick the team for a new entrant.
///
/// The strictly smaller team gets the entrant; ties go to `Team::Red`.
pub fn assign_team(counts: &TeamCounts) -> Team {
    if counts.blue < counts.red {
        Team::Blue
    } else {
        Team::Red
    }
}

// =============================================================================
// LOADOUTS
// =============================================================================

/// Equipment kit a participant can pick during team selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KitKind {
    /// Granted to everyone on entering team selection.
    #[default]
    Base,
    /// Healing potions.
    Healer,
    /// Sword and chestplate.
    Fighter,
    /// Crossbow and arrows.
    Sniper,
    /// Leggings and a speed effect.
    Speedster,
}

impl KitKind {
    /// Kits a participant may choose explicitly.
    pub const SELECTABLE: [KitKind; 4] = [
        KitKind::Healer,
        KitKind::Fighter,
        KitKind::Sniper,
        KitKind::Speedster,
    ];

    /// Lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            KitKind::Base => "base",
            KitKind::Healer => "healer",
            KitKind::Fighter => "fighter",
            KitKind::Sniper => "sniper",
            KitKind::Speedster => "speedster",
        }
    }
}

impl fmt::Display for KitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown kit name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown kit: {0}")]
pub struct UnknownKit(pub String);

impl FromStr for KitKind {
    type Err = UnknownKit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        [KitKind::Base]
            .into_iter()
            .chain(KitKind::SELECTABLE)
            .find(|kit| kit.name() == lower)
            .ok_or_else(|| UnknownKit(s.to_string()))
    }
}

/// Team-colored kit handed to the equipment collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Loadout {
    /// Team colors to apply.
    pub team: Team,
    /// Kit contents.
    pub kit: KitKind,
}

impl Loadout {
    /// Base loadout for a team.
    pub fn base(team: Team) -> Self {
        Self { team, kit: KitKind::Base }
    }
}
