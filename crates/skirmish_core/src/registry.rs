//! Entity arena.
//!
//! Owns every [`Entity`] and hands out identifiers. Ids are assigned
//! monotonically starting at 1 and are never reused, so a stale id held by
//! a collaborator can only ever resolve to "missing", never to a different
//! entity.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::components::{EntityId, EntityType};
use crate::entity::Entity;
use crate::error::{Result, SimError};

/// Storage for all entities in the simulation.
///
/// Uses a `HashMap` for O(1) lookup by id, with deterministic iteration via
/// sorted keys whenever systems process entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRegistry {
    entities: HashMap<EntityId, Entity>,
    next_id: EntityId,
    capacity: usize,
}

impl EntityRegistry {
    /// Create an empty registry holding at most `capacity` entities.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
            capacity,
        }
    }

    /// Insert an entity and return its freshly assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EntityCapReached`] when the registry is full.
    pub fn insert(&mut self, mut entity: Entity) -> Result<EntityId> {
        if self.entities.len() >= self.capacity {
            tracing::debug!(cap = self.capacity, "Entity cap reached, spawn rejected");
            return Err(SimError::EntityCapReached { cap: self.capacity });
        }
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// The id the next insert will receive.
    #[must_use]
    pub const fn peek_next_id(&self) -> EntityId {
        self.next_id
    }

    /// Remove an entity outright.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Get an entity by id, active or not.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable entity by id, active or not.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Get an entity only if it is still active.
    #[must_use]
    pub fn get_active(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id).filter(|e| e.active)
    }

    /// Get a mutable entity only if it is still active.
    pub fn get_active_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id).filter(|e| e.active)
    }

    /// Run `f` with two distinct entities borrowed mutably.
    ///
    /// Returns `None` if the ids are equal or either is missing.
    pub fn with_pair<R>(
        &mut self,
        a: EntityId,
        b: EntityId,
        f: impl FnOnce(&mut Entity, &mut Entity) -> R,
    ) -> Option<R> {
        if a == b {
            return None;
        }
        let mut first = self.entities.remove(&a)?;
        let result = self.entities.get_mut(&b).map(|second| f(&mut first, second));
        self.entities.insert(a, first);
        result
    }

    /// Whether an id is present.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of stored entities, including ones awaiting the sweep.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Maximum number of entities.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sorted ids for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted ids of active entities.
    #[must_use]
    pub fn active_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .entities
            .iter()
            .filter(|(_, e)| e.active)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Active entities in id order.
    pub fn iter_active(&self) -> impl Iterator<Item = &Entity> {
        self.active_ids()
            .into_iter()
            .filter_map(move |id| self.entities.get(&id))
    }

    /// Number of active entities of a given type.
    #[must_use]
    pub fn count_of(&self, entity_type: EntityType) -> usize {
        self.entities
            .values()
            .filter(|e| e.active && e.entity_type() == entity_type)
            .count()
    }

    /// Drop every inactive entity. Returns the removed ids in order.
    pub fn sweep_inactive(&mut self) -> Vec<EntityId> {
        let mut removed: Vec<_> = self
            .entities
            .iter()
            .filter(|(_, e)| !e.active)
            .map(|(id, _)| *id)
            .collect();
        removed.sort_unstable();
        for id in &removed {
            self.entities.remove(id);
        }
        removed
    }

    /// Remove everything matching `predicate`. Ids are not recycled.
    pub fn clear_where(&mut self, mut predicate: impl FnMut(&Entity) -> bool) -> usize {
        let before = self.entities.len();
        self.entities.retain(|_, e| !predicate(e));
        before - self.entities.len()
    }
}
