//! Server Module
//!
//! Everything above the pure game rules:
//!
//! - `config`: JSON/env configuration
//! - `directory`: live sessions and the participant index
//! - `orchestrator`: composition root and phase driver
//! - `status`: serialisable snapshots
//! - `driver`: tokio tick loop and async entry points

pub mod config;
pub mod directory;
pub mod orchestrator;
pub mod status;
pub mod driver;

pub use config::{OrchestratorConfig, ArenaSetup, ConfigError};
pub use directory::{SessionDirectory, DirectoryError};
pub use orchestrator::{Orchestrator, RequestError};
pub use status::{SessionStatus, TimerStatus, MemberStatus, OrchestratorStats};
pub use driver::ArenaServer;
