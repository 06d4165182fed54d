//! Game Logic Module
//!
//! Pure match rules. Nothing here performs I/O or keeps time.
//!
//! ## Module Structure
//!
//! - `team`: Teams, marker colors, balanced assignment, kits
//! - `session`: Per-match phase machine and roster
//! - `win`: Scoring-volume evaluation
//! - `events`: Timer identities and per-tick reports

pub mod team;
pub mod session;
pub mod win;
pub mod events;

// Re-export key types
pub use team::{Team, MarkerColor, TeamCounts, KitKind, Loadout, assign_team};
pub use session::{GameSession, Phase, SessionError, RosterEntry, MatchResult, InstanceLease};
pub use win::{Outcome, Evaluation, evaluate, tally};
pub use events::{PhaseTimer, PhaseDurations, TimerKey, SessionEvent, PhaseChange, MatchEnded, TickReport};
