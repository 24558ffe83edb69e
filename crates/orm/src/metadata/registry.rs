//! Entity Registry - the type → metadata map built once per session factory

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use super::entity::{short_type_name, Entity, EntityMetadata};
use crate::error::{OrmError, OrmResult};

/// Registered entity metadata in registration order, indexed by type
///
/// Read-only once the session factory is built, so it is shared without locks.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<Arc<EntityMetadata>>,
    index: HashMap<TypeId, usize>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register the metadata of `T`; registering twice is a no-op
    pub fn register<T: Entity>(&mut self) -> OrmResult<Arc<EntityMetadata>> {
        if let Some(existing) = self.get(TypeId::of::<T>()) {
            return Ok(Arc::clone(existing));
        }
        self.insert(EntityMetadata::build::<T>()?)
    }

    /// Register already-built metadata
    pub fn insert(&mut self, metadata: EntityMetadata) -> OrmResult<Arc<EntityMetadata>> {
        let type_id = metadata.type_id();
        if self.index.contains_key(&type_id) {
            return Err(OrmError::mapping(
                metadata.entity_name(),
                "entity type is registered more than once",
            ));
        }
        if let Some(clash) = self
            .entities
            .iter()
            .find(|existing| existing.full_table_name().eq_ignore_ascii_case(&metadata.full_table_name()))
        {
            return Err(OrmError::mapping(
                metadata.entity_name(),
                format!(
                    "table `{}` is already mapped by `{}`",
                    metadata.full_table_name(),
                    clash.entity_name()
                ),
            ));
        }

        let metadata = Arc::new(metadata);
        self.index.insert(type_id, self.entities.len());
        self.entities.push(Arc::clone(&metadata));
        Ok(metadata)
    }

    pub fn get(&self, type_id: TypeId) -> Option<&Arc<EntityMetadata>> {
        self.index.get(&type_id).map(|&index| &self.entities[index])
    }

    /// Metadata of `T`, or a mapping error when `T` was never registered
    pub fn get_for<T: Entity>(&self) -> OrmResult<&Arc<EntityMetadata>> {
        self.get(TypeId::of::<T>()).ok_or_else(|| {
            OrmError::mapping(short_type_name::<T>(), "entity type is not registered")
        })
    }

    pub fn require(&self, type_id: TypeId, type_name: &str) -> OrmResult<&Arc<EntityMetadata>> {
        self.get(type_id)
            .ok_or_else(|| OrmError::mapping(type_name, "entity type is not registered"))
    }

    pub fn contains<T: Entity>(&self) -> bool {
        self.index.contains_key(&TypeId::of::<T>())
    }

    /// Entities in registration order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<EntityMetadata>> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
