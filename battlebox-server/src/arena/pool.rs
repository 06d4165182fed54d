//! Arena Instance Pool
//!
//! Templates are arena blueprints; instances are physical copies pasted on a
//! grid next to the template anchor. Instances are created lazily up to the
//! template capacity, leased to one session at a time, and re-pasted on
//! release so the next match starts from a clean arena.
//!
//! ```text
//! anchor ──► [0] [1] [2] [3] [4]     row = index / grid_width
//!            [5] [6] ...             col = index % grid_width
//! ```

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::core::geometry::CellPos;
use crate::core::ids::{InstanceId, SessionId, StructureRef, TemplateId};
use crate::world::WorldAccess;

// =============================================================================
// LAYOUT
// =============================================================================

/// Grid placement of instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolLayout {
    /// Instances per row.
    pub grid_width: u32,
    /// Distance between neighbouring instances, in cells.
    pub spacing: i32,
}

impl Default for PoolLayout {
    fn default() -> Self {
        Self { grid_width: 5, spacing: 150 }
    }
}

impl PoolLayout {
    /// Offset of the instance at `index` from the anchor.
    pub fn offset(&self, index: u32) -> CellPos {
        let width = self.grid_width.max(1);
        let row = (index / width) as i32;
        let col = (index % width) as i32;
        CellPos::new(col * self.spacing, 0, row * self.spacing)
    }
}

// =============================================================================
// TEMPLATES & INSTANCES
// =============================================================================

/// Arena blueprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaTemplate {
    /// Template id.
    pub id: TemplateId,
    /// Structure pasted for every instance.
    pub structure: StructureRef,
    /// World instances are pasted into.
    pub world: String,
    /// Placement of the first instance.
    pub anchor: CellPos,
    /// Maximum number of instances.
    pub capacity: u32,
}

/// Lease state of an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "session", rename_all = "snake_case")]
pub enum LeaseState {
    /// Available.
    Free,
    /// Held by a session.
    Leased(SessionId),
}

/// A physical copy of a template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArenaInstance {
    /// Instance id.
    pub id: InstanceId,
    /// Grid slot.
    pub index: u32,
    /// Paste origin.
    pub placement: CellPos,
    /// Offset from the template anchor.
    pub offset: CellPos,
    /// Current lease.
    pub state: LeaseState,
    /// When the last lease ended.
    pub last_released: Option<DateTime<Utc>>,
    /// The last reset paste failed.
    pub needs_reset: bool,
}

impl ArenaInstance {
    /// Whether a session holds the instance.
    pub fn is_leased(&self) -> bool {
        matches!(self.state, LeaseState::Leased(_))
    }

    /// Session holding the instance.
    pub fn session(&self) -> Option<SessionId> {
        match self.state {
            LeaseState::Leased(session) => Some(session),
            LeaseState::Free => None,
        }
    }
}

/// What a session receives on lease.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lease {
    /// Leased instance.
    pub instance: InstanceId,
    /// World the instance lives in.
    pub world: String,
    /// Paste origin.
    pub placement: CellPos,
    /// Offset from the template anchor.
    pub offset: CellPos,
}

/// Pool errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Template id already registered.
    #[error("Template already exists: {0}")]
    TemplateExists(TemplateId),

    /// Template id not registered.
    #[error("Unknown template: {0}")]
    UnknownTemplate(TemplateId),

    /// Instance id not known.
    #[error("Unknown instance: {0}")]
    UnknownInstance(InstanceId),

    /// Instance is already free.
    #[error("Instance is not leased: {0}")]
    NotLeased(InstanceId),

    /// Template still has leased instances.
    #[error("Template {0} has instances in use")]
    TemplateInUse(TemplateId),

    /// Capacity must be at least one.
    #[error("Template {0} needs a capacity of at least 1")]
    ZeroCapacity(TemplateId),
}

/// Pool statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Registered templates.
    pub templates: usize,
    /// Instances created so far.
    pub instances: usize,
    /// Instances held by sessions.
    pub leased: usize,
    /// Instances available.
    pub free: usize,
    /// Free instances whose last reset failed.
    pub awaiting_reset: usize,
}

#[derive(Debug)]
struct TemplateEntry {
    template: ArenaTemplate,
    instances: Vec<ArenaInstance>,
}

// =============================================================================
// POOL
// =============================================================================

/// Leasing pool over all templates.
#[derive(Debug, Default)]
pub struct ArenaPool {
    layout: PoolLayout,
    templates: BTreeMap<TemplateId, TemplateEntry>,
}

impl ArenaPool {
    /// Create an empty pool.
    pub fn new(layout: PoolLayout) -> Self {
        Self { layout, templates: BTreeMap::new() }
    }

    /// Grid layout in use.
    pub fn layout(&self) -> PoolLayout {
        self.layout
    }

    /// Register a template. Instances are created on demand.
    pub fn register_template(&mut self, template: ArenaTemplate) -> Result<(), PoolError> {
        if self.templates.contains_key(&template.id) {
            return Err(PoolError::TemplateExists(template.id));
        }
        if template.capacity == 0 {
            return Err(PoolError::ZeroCapacity(template.id));
        }

        info!(
            "Registered arena template {} (structure {}, capacity {})",
            template.id, template.structure, template.capacity
        );
        self.templates.insert(template.id.clone(), TemplateEntry {
            template,
            instances: Vec::new(),
        });
        Ok(())
    }

    /// Remove a template and all its instances. Refused while any is leased.
    pub fn remove_template(&mut self, id: &TemplateId) -> Result<ArenaTemplate, PoolError> {
        let entry = self.templates
            .get(id)
            .ok_or_else(|| PoolError::UnknownTemplate(id.clone()))?;

        if entry.instances.iter().any(ArenaInstance::is_leased) {
            return Err(PoolError::TemplateInUse(id.clone()));
        }

        let entry = self.templates
            .remove(id)
            .ok_or_else(|| PoolError::UnknownTemplate(id.clone()))?;
        info!("Removed arena template {} and {} instances", id, entry.instances.len());
        Ok(entry.template)
    }

    /// Whether a template is registered.
    pub fn has_template(&self, id: &TemplateId) -> bool {
        self.templates.contains_key(id)
    }

    /// Template by id.
    pub fn template(&self, id: &TemplateId) -> Option<&ArenaTemplate> {
        self.templates.get(id).map(|e| &e.template)
    }

    /// Instances of a template, in creation order.
    pub fn instances(&self, id: &TemplateId) -> &[ArenaInstance] {
        self.templates
            .get(id)
            .map(|e| e.instances.as_slice())
            .unwrap_or(&[])
    }

    /// Instance by id.
    pub fn instance(&self, id: &InstanceId) -> Option<&ArenaInstance> {
        self.templates
            .get(&id.template)
            .and_then(|e| e.instances.iter().find(|i| i.id == *id))
    }

    /// Lease an instance of a template to a session.
    ///
    /// Prefers existing free instances (retrying any pending reset), then
    /// creates a new one if capacity allows. `None` when the template is
    /// unknown or exhausted.
    pub fn lease<W>(&mut self, world: &mut W, template: &TemplateId, session: SessionId) -> Option<Lease>
    where
        W: WorldAccess + ?Sized,
    {
        let layout = self.layout;
        let Some(entry) = self.templates.get_mut(template) else {
            warn!("Lease requested for unknown template {}", template);
            return None;
        };
        let tpl = &entry.template;

        for instance in entry.instances.iter_mut().filter(|i| !i.is_leased()) {
            if instance.needs_reset {
                if let Err(e) = world.paste_structure(&tpl.structure, &tpl.world, instance.placement) {
                    warn!("Instance {} still cannot be reset, skipping: {}", instance.id, e);
                    continue;
                }
                instance.needs_reset = false;
                info!("Reset arena instance {} (deferred)", instance.id);
            }

            instance.state = LeaseState::Leased(session);
            info!("Leased arena instance {} to session {}", instance.id, session);
            return Some(lease_of(instance, &tpl.world));
        }

        let created = entry.instances.len() as u32;
        if created >= tpl.capacity {
            warn!("Maximum instances reached for template {}", template);
            return None;
        }

        let offset = layout.offset(created);
        let placement = tpl.anchor.offset(offset);
        if let Err(e) = world.paste_structure(&tpl.structure, &tpl.world, placement) {
            warn!("Cannot paste new instance of {}: {}", template, e);
            return None;
        }

        let instance = ArenaInstance {
            id: InstanceId::new(template.clone(), created + 1),
            index: created,
            placement,
            offset,
            state: LeaseState::Leased(session),
            last_released: None,
            needs_reset: false,
        };
        info!(
            "Created arena instance {} at {}, {}, {} for session {}",
            instance.id, placement.x, placement.y, placement.z, session
        );

        let lease = lease_of(&instance, &tpl.world);
        entry.instances.push(instance);
        Some(lease)
    }

    /// Return an instance to the pool and re-paste its structure.
    ///
    /// Fails with `NotLeased` if the instance is already free, so a double
    /// release never pastes twice.
    pub fn release<W>(&mut self, world: &mut W, id: &InstanceId) -> Result<(), PoolError>
    where
        W: WorldAccess + ?Sized,
    {
        let entry = self.templates
            .get_mut(&id.template)
            .ok_or_else(|| PoolError::UnknownInstance(id.clone()))?;
        let tpl = &entry.template;
        let instance = entry.instances
            .iter_mut()
            .find(|i| i.id == *id)
            .ok_or_else(|| PoolError::UnknownInstance(id.clone()))?;

        let LeaseState::Leased(session) = instance.state else {
            return Err(PoolError::NotLeased(id.clone()));
        };

        instance.state = LeaseState::Free;
        instance.last_released = Some(Utc::now());

        match world.paste_structure(&tpl.structure, &tpl.world, instance.placement) {
            Ok(()) => {
                instance.needs_reset = false;
                info!("Released and reset arena instance {} from session {}", id, session);
            }
            Err(e) => {
                instance.needs_reset = true;
                warn!("Released arena instance {} but reset failed: {}", id, e);
            }
        }
        Ok(())
    }

    /// Ids of every leased instance.
    pub fn leased(&self) -> Vec<InstanceId> {
        self.templates
            .values()
            .flat_map(|e| e.instances.iter())
            .filter(|i| i.is_leased())
            .map(|i| i.id.clone())
            .collect()
    }

    /// Pool statistics.
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            templates: self.templates.len(),
            ..PoolStats::default()
        };
        for instance in self.templates.values().flat_map(|e| e.instances.iter()) {
            stats.instances += 1;
            if instance.is_leased() {
                stats.leased += 1;
            } else {
                stats.free += 1;
                if instance.needs_reset {
                    stats.awaiting_reset += 1;
                }
            }
        }
        stats
    }
}

fn lease_of(instance: &ArenaInstance, world: &str) -> Lease {
    Lease {
        instance: instance.id.clone(),
        world: world.to_string(),
        placement: instance.placement,
        offset: instance.offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::SandboxWorld;

    fn template(capacity: u32) -> ArenaTemplate {
        ArenaTemplate {
            id: TemplateId::new("castle"),
            structure: StructureRef::new("castle.schem"),
            world: "arena".to_string(),
            anchor: CellPos::new(1000, 64, 1000),
            capacity,
        }
    }

    fn create_test_pool(capacity: u32) -> (ArenaPool, SandboxWorld) {
        let mut pool = ArenaPool::new(PoolLayout::default());
        pool.register_template(template(capacity)).unwrap();
        let mut world = SandboxWorld::new();
        world.add_world("arena");
        world.add_structure(StructureRef::new("castle.schem"), Vec::new());
        (pool, world)
    }

    fn sid(n: u8) -> SessionId {
        SessionId::new([n; 16])
    }

    #[test]
    fn test_layout_offsets() {
        let layout = PoolLayout::default();
        assert_eq!(layout.offset(0), CellPos::new(0, 0, 0));
        assert_eq!(layout.offset(4), CellPos::new(600, 0, 0));
        assert_eq!(layout.offset(5), CellPos::new(0, 0, 150));
        assert_eq!(layout.offset(7), CellPos::new(300, 0, 150));
    }

    #[test]
    fn test_register_duplicate() {
        let (mut pool, _) = create_test_pool(2);
        assert_eq!(
            pool.register_template(template(2)),
            Err(PoolError::TemplateExists(TemplateId::new("castle")))
        );
    }

    #[test]
    fn test_capacity_limits_leases() {
        let (mut pool, mut world) = create_test_pool(2);
        let castle = TemplateId::new("castle");

        let a = pool.lease(&mut world, &castle, sid(1)).unwrap();
        let b = pool.lease(&mut world, &castle, sid(2)).unwrap();
        assert_ne!(a.instance, b.instance);
        assert_eq!(b.placement, CellPos::new(1150, 64, 1000));
        assert!(pool.lease(&mut world, &castle, sid(3)).is_none());

        pool.release(&mut world, &a.instance).unwrap();
        let c = pool.lease(&mut world, &castle, sid(3)).unwrap();
        assert_eq!(c.instance, a.instance);
        assert_eq!(pool.stats().instances, 2);
        assert_eq!(pool.stats().leased, 2);
        assert_eq!(pool.instance(&c.instance).unwrap().session(), Some(sid(3)));
    }

    #[test]
    fn test_release_resets_once() {
        let (mut pool, mut world) = create_test_pool(1);
        let castle = TemplateId::new("castle");
        let lease = pool.lease(&mut world, &castle, sid(1)).unwrap();
        assert_eq!(world.paste_count(), 1);

        pool.release(&mut world, &lease.instance).unwrap();
        assert_eq!(world.paste_count(), 2);
        assert_eq!(
            pool.release(&mut world, &lease.instance),
            Err(PoolError::NotLeased(lease.instance.clone()))
        );
        assert_eq!(world.paste_count(), 2);
        assert!(pool.instance(&lease.instance).unwrap().last_released.is_some());
    }

    #[test]
    fn test_failed_reset_retried_on_lease() {
        let (mut pool, mut world) = create_test_pool(2);
        let castle = TemplateId::new("castle");
        let lease = pool.lease(&mut world, &castle, sid(1)).unwrap();

        world.remove_world("arena");
        pool.release(&mut world, &lease.instance).unwrap();
        assert_eq!(pool.stats().awaiting_reset, 1);

        // still broken: the instance is skipped and no new one can be pasted
        assert!(pool.lease(&mut world, &castle, sid(2)).is_none());

        world.add_world("arena");
        let again = pool.lease(&mut world, &castle, sid(2)).unwrap();
        assert_eq!(again.instance, lease.instance);
        assert_eq!(pool.stats().awaiting_reset, 0);
    }

    #[test]
    fn test_remove_template() {
        let (mut pool, mut world) = create_test_pool(2);
        let castle = TemplateId::new("castle");
        let lease = pool.lease(&mut world, &castle, sid(1)).unwrap();

        assert_eq!(pool.remove_template(&castle), Err(PoolError::TemplateInUse(castle.clone())));
        pool.release(&mut world, &lease.instance).unwrap();
        assert!(pool.remove_template(&castle).is_ok());
        assert!(!pool.has_template(&castle));
        assert!(pool.lease(&mut world, &castle, sid(2)).is_none());
    }

    #[test]
    fn test_unknown_template() {
        let (mut pool, mut world) = create_test_pool(1);
        assert!(pool.lease(&mut world, &TemplateId::new("nope"), sid(1)).is_none());
        assert_eq!(pool.stats().instances, 0);
    }
}
