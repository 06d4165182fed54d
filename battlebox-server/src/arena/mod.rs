//! Arena Module
//!
//! - `definition`: authored arena geometry and the definition catalog
//! - `pool`: template registry and instance leasing

pub mod definition;
pub mod pool;

pub use definition::{ArenaDefinition, ArenaCatalog, InstanceGeometry, TeamLocations};
pub use pool::{ArenaPool, ArenaTemplate, ArenaInstance, Lease, LeaseState, PoolError, PoolLayout, PoolStats};
