//! Orchestrator Configuration
//!
//! JSON-backed settings. Every section has defaults, so a partial file (or no
//! file at all) is valid.
//!
//! ```json
//! {
//!   "min_players": 2,
//!   "session_capacity": 8,
//!   "durations": { "waiting": 30, "team_select": 30, "starting": 5, "match_length": 120, "ending": 20 },
//!   "tick_interval_ms": 1000,
//!   "pool": { "grid_width": 5, "spacing": 150 },
//!   "lobby": { "world": "lobby", "location": { "x": 0.5, "y": 65, "z": 0.5 } },
//!   "arenas": []
//! }
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::arena::definition::ArenaDefinition;
use crate::arena::pool::{ArenaTemplate, PoolError, PoolLayout};
use crate::core::geometry::{CellPos, WorldPoint};
use crate::core::ids::{StructureRef, TemplateId};
use crate::game::events::PhaseDurations;
use crate::game::session::MAX_CAPACITY;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BATTLEBOX_CONFIG";

/// Environment variable overriding the tick interval.
pub const TICK_ENV: &str = "BATTLEBOX_TICK_MS";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Malformed JSON.
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Values out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Arena could not be registered with the pool.
    #[error("Arena registration failed: {0}")]
    Pool(#[from] PoolError),
}

/// An arena registered at start-up: its definition plus how to build it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaSetup {
    /// Arena geometry.
    pub definition: ArenaDefinition,
    /// Structure pasted for every instance.
    pub structure: StructureRef,
    /// Paste origin of the first instance.
    pub anchor: CellPos,
    /// Maximum number of concurrent instances.
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,
}

fn default_max_instances() -> u32 {
    4
}

impl ArenaSetup {
    /// Pool template for this arena.
    pub fn template(&self) -> ArenaTemplate {
        ArenaTemplate {
            id: TemplateId::from(&self.definition.id),
            structure: self.structure.clone(),
            world: self.definition.world.clone(),
            anchor: self.anchor,
            capacity: self.max_instances,
        }
    }
}

/// Orchestrator settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Members needed before the waiting countdown starts.
    pub min_players: usize,
    /// Roster limit per session.
    pub session_capacity: usize,
    /// Default phase lengths.
    pub durations: PhaseDurations,
    /// Wall-clock length of one tick.
    pub tick_interval_ms: u64,
    /// Instance grid.
    pub pool: PoolLayout,
    /// Where participants go after a match.
    pub lobby: Option<WorldPoint>,
    /// Arenas registered at start-up.
    pub arenas: Vec<ArenaSetup>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            session_capacity: MAX_CAPACITY,
            durations: PhaseDurations::default(),
            tick_interval_ms: 1000,
            pool: PoolLayout::default(),
            lobby: None,
            arenas: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse and validate JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from `BATTLEBOX_CONFIG` if set (defaults otherwise), then apply
    /// `BATTLEBOX_TICK_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(raw) = std::env::var(TICK_ENV) {
            config.tick_interval_ms = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} is not a number: {}", TICK_ENV, raw)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and arena ids.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_players == 0 {
            return Err(ConfigError::Invalid("min_players must be at least 1".into()));
        }
        if !(self.min_players..=MAX_CAPACITY).contains(&self.session_capacity) {
            return Err(ConfigError::Invalid(format!(
                "session_capacity must be between min_players ({}) and {}, got {}",
                self.min_players, MAX_CAPACITY, self.session_capacity
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.pool.grid_width == 0 || self.pool.spacing <= 0 {
            return Err(ConfigError::Invalid("pool grid_width and spacing must be positive".into()));
        }

        let mut seen = BTreeSet::new();
        for setup in &self.arenas {
            if !seen.insert(&setup.definition.id) {
                return Err(ConfigError::Invalid(format!("duplicate arena: {}", setup.definition.id)));
            }
            if setup.max_instances == 0 {
                return Err(ConfigError::Invalid(format!(
                    "arena {} needs max_instances of at least 1",
                    setup.definition.id
                )));
            }
        }
        Ok(())
    }

    /// Tick length as a `Duration`.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.session_capacity, 8);
        assert_eq!(config.durations.match_length, 120);
        assert_eq!(config.pool.spacing, 150);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = OrchestratorConfig::from_json(r#"{ "durations": { "match_length": 60 } }"#).unwrap();
        assert_eq!(config.durations.match_length, 60);
        assert_eq!(config.durations.waiting, 30);
        assert_eq!(config.session_capacity, 8);
    }

    #[test]
    fn test_invalid_capacity() {
        let err = OrchestratorConfig::from_json(r#"{ "session_capacity": 12 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = OrchestratorConfig::from_json(r#"{ "min_players": 4, "session_capacity": 3 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_arena_setup() {
        let json = r#"{
            "arenas": [{
                "definition": { "id": "castle", "world": "arena" },
                "structure": "castle.schem",
                "anchor": { "x": 1000, "y": 60, "z": 1000 }
            }]
        }"#;
        let config = OrchestratorConfig::from_json(json).unwrap();
        let template = config.arenas[0].template();
        assert_eq!(template.id.as_str(), "castle");
        assert_eq!(template.capacity, 4);
        assert_eq!(template.world, "arena");
    }

    #[test]
    fn test_missing_file() {
        let err = OrchestratorConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
