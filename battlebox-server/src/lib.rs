//! # BattleBox Server
//!
//! Session orchestration for BattleBox, a two-team arena minigame: teams race to
//! fill a scoring area with their colored markers before the match clock runs out.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      BATTLEBOX SERVER                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  core/            - Identifiers and cell geometry              │
//! │                                                               │
//! │  game/            - Match rules (pure)                         │
//! │  ├── team.rs      - Teams, balanced assignment, kits           │
//! │  ├── session.rs   - Phase machine and roster                   │
//! │  ├── win.rs       - Scoring-area evaluation                    │
//! │  └── events.rs    - Timer identities, tick reports             │
//! │                                                               │
//! │  timer/           - Keyed countdowns with audience displays    │
//! │  arena/           - Definitions, templates, instance pool      │
//! │  world/           - World and messaging collaborator traits    │
//! │                                                               │
//! │  server/          - Orchestration                              │
//! │  ├── orchestrator - Composition root, phase driver             │
//! │  ├── directory.rs - Sessions and participant index             │
//! │  ├── config.rs    - JSON / environment configuration           │
//! │  ├── status.rs    - Serialisable snapshots                     │
//! │  └── driver.rs    - Tokio tick loop                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Session lifecycle
//!
//! `WAITING → TEAM_SELECT → STARTING → ACTIVE → ENDING → (torn down)`
//!
//! Every transition is driven by a countdown completing, except the early end
//! of `ACTIVE` when one team fills the whole scoring area. Both paths go
//! through the same idempotent match end, so a match finishes exactly once.
//!
//! The orchestrator is single-threaded: it only moves when `run_tick` or a
//! request method is called. [`ArenaServer`] wraps it behind a tokio mutex and
//! ticks it on an interval.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod timer;
pub mod arena;
pub mod world;
pub mod server;

// Re-export commonly used types
pub use core::ids::{ParticipantId, SessionId, ArenaId};
pub use core::geometry::{CellPos, Volume, Location};
pub use game::session::Phase;
pub use game::team::{Team, MarkerColor, KitKind};
pub use game::win::Outcome;
pub use server::{Orchestrator, OrchestratorConfig, ArenaServer, RequestError};
pub use world::{WorldAccess, MarkerReader, Messenger};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
