//! Win Evaluation
//!
//! Inspects the scoring volume and decides the match outcome.
//!
//! ## Rules
//!
//! 1. A team whose markers cover every cell wins outright, in any phase.
//! 2. While the match clock is running (`Phase::Active`) nothing else counts.
//! 3. Once the clock has ended, the strictly larger count wins; equal counts
//!    (including zero) are a draw.

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::core::geometry::Volume;
use crate::game::session::Phase;
use crate::game::team::{Team, TeamCounts};
use crate::world::{MarkerReader, WorldError};

/// Match outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "team", rename_all = "snake_case")]
pub enum Outcome {
    /// No result yet.
    #[default]
    Undecided,
    /// One team won.
    Winner(Team),
    /// Neither team won.
    Draw,
}

impl Outcome {
    /// Winning team, if any.
    pub fn winner(&self) -> Option<Team> {
        match self {
            Outcome::Winner(team) => Some(*team),
            _ => None,
        }
    }

    /// Whether a final result (win or draw) was reached.
    pub fn is_decided(&self) -> bool {
        !matches!(self, Outcome::Undecided)
    }
}

/// Result of one evaluation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Decided outcome.
    pub outcome: Outcome,
    /// Human-readable reason.
    pub reason: String,
    /// Marker counts observed (zero when the world could not be read).
    pub counts: TeamCounts,
}

impl Evaluation {
    fn undecided(reason: impl Into<String>, counts: TeamCounts) -> Self {
        Self { outcome: Outcome::Undecided, reason: reason.into(), counts }
    }
}

/// Count team markers inside a volume.
pub fn tally<R>(volume: &Volume, world: &str, reader: &R) -> Result<TeamCounts, WorldError>
where
    R: MarkerReader + ?Sized,
{
    let mut counts = TeamCounts::default();
    for cell in volume.cells() {
        if let Some(team) = reader.marker_at(world, cell)?.and_then(Team::from_marker) {
            counts.increment(team);
        }
    }
    Ok(counts)
}

/// Evaluate the scoring volume for the given phase.
///
/// Never fails: an unreadable world is logged and reported as undecided.
pub fn evaluate<R>(volume: &Volume, world: &str, reader: &R, phase: Phase) -> Evaluation
where
    R: MarkerReader + ?Sized,
{
    let counts = match tally(volume, world, reader) {
        Ok(counts) => counts,
        Err(e) => {
            warn!("Cannot evaluate scoring volume: {}", e);
            return Evaluation::undecided(format!("Arena world unavailable: {}", e), TeamCounts::default());
        }
    };

    let full = volume.cell_count();
    for team in Team::ALL {
        if u64::from(counts.get(team)) == full {
            return Evaluation {
                outcome: Outcome::Winner(team),
                reason: format!("{} team filled the area!", team),
                counts,
            };
        }
    }

    if phase == Phase::Active {
        return Evaluation::undecided("Match in progress", counts);
    }

    let (red, blue) = (counts.red, counts.blue);
    let (outcome, reason) = if red > blue {
        (Outcome::Winner(Team::Red), format!("Red team has majority: {} vs {}", red, blue))
    } else if blue > red {
        (Outcome::Winner(Team::Blue), format!("Blue team has majority: {} vs {}", blue, red))
    } else if red == 0 {
        (Outcome::Draw, "Draw! No markers placed.".to_string())
    } else {
        (Outcome::Draw, format!("Draw! Equal marker count: {} vs {}", red, blue))
    };

    Evaluation { outcome, reason, counts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use crate::core::geometry::CellPos;
    use crate::game::team::MarkerColor;

    struct Grid {
        world: &'static str,
        cells: BTreeMap<CellPos, MarkerColor>,
    }

    impl MarkerReader for Grid {
        fn marker_at(&self, world: &str, cell: CellPos) -> Result<Option<MarkerColor>, WorldError> {
            if world != self.world {
                return Err(WorldError::WorldNotFound(world.to_string()));
            }
            Ok(self.cells.get(&cell).copied())
        }
    }

    fn volume() -> Volume {
        Volume::new(CellPos::new(2, 64, 2), CellPos::new(0, 64, 0))
    }

    fn grid(red: usize, blue: usize) -> Grid {
        let mut cells = BTreeMap::new();
        let mut all = volume().cells();
        for cell in all.by_ref().take(red) {
            cells.insert(cell, MarkerColor::Red);
        }
        for cell in all.by_ref().take(blue) {
            cells.insert(cell, MarkerColor::Blue);
        }
        for cell in all {
            cells.insert(cell, MarkerColor::Neutral);
        }
        Grid { world: "arena", cells }
    }

    #[test]
    fn test_full_fill_wins_during_active() {
        let eval = evaluate(&volume(), "arena", &grid(9, 0), Phase::Active);
        assert_eq!(eval.outcome, Outcome::Winner(Team::Red));
        assert!(eval.reason.contains("filled"));
    }

    #[test]
    fn test_majority_ignored_while_active() {
        let eval = evaluate(&volume(), "arena", &grid(5, 4), Phase::Active);
        assert_eq!(eval.outcome, Outcome::Undecided);
        assert_eq!(eval.counts, TeamCounts::new(5, 4));
    }

    #[test]
    fn test_majority_counts_at_ending() {
        let eval = evaluate(&volume(), "arena", &grid(5, 4), Phase::Ending);
        assert_eq!(eval.outcome, Outcome::Winner(Team::Red));
        assert_eq!(eval.reason, "Red team has majority: 5 vs 4");

        let eval = evaluate(&volume(), "arena", &grid(2, 6), Phase::Ending);
        assert_eq!(eval.outcome, Outcome::Winner(Team::Blue));
        assert_eq!(eval.reason, "Blue team has majority: 6 vs 2");
    }

    #[test]
    fn test_draws_at_ending() {
        let empty = evaluate(&volume(), "arena", &grid(0, 0), Phase::Ending);
        assert_eq!(empty.outcome, Outcome::Draw);
        assert!(empty.reason.contains("No markers"));

        let even = evaluate(&volume(), "arena", &grid(3, 3), Phase::Ending);
        assert_eq!(even.outcome, Outcome::Draw);
        assert!(even.reason.contains("Equal"));
    }

    #[test]
    fn test_blue_fill_beats_phase_rule() {
        let eval = evaluate(&volume(), "arena", &grid(0, 9), Phase::Ending);
        assert_eq!(eval.outcome, Outcome::Winner(Team::Blue));
        assert!(eval.reason.contains("filled"));
    }

    #[test]
    fn test_missing_world_is_undecided() {
        let eval = evaluate(&volume(), "elsewhere", &grid(9, 0), Phase::Ending);
        assert_eq!(eval.outcome, Outcome::Undecided);
        assert!(!eval.outcome.is_decided());
    }

    #[test]
    fn test_multi_layer_volume() {
        let tall = Volume::new(CellPos::new(0, 0, 0), CellPos::new(1, 1, 1));
        let mut cells = BTreeMap::new();
        for cell in tall.cells() {
            cells.insert(cell, MarkerColor::Blue);
        }
        let reader = Grid { world: "arena", cells };
        let eval = evaluate(&tall, "arena", &reader, Phase::Active);
        assert_eq!(eval.outcome, Outcome::Winner(Team::Blue));
        assert_eq!(eval.counts.blue, 8);
    }
}
