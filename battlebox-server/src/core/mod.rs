//! Core primitives.
//!
//! Identifiers and cell geometry shared by every other module.

pub mod ids;
pub mod geometry;

// Re-export core types
pub use ids::{ParticipantId, SessionId, ArenaId, TemplateId, InstanceId, StructureRef};
pub use geometry::{CellPos, Volume, Location, WorldPoint};
