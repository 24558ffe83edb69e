//! Entity trait, shared entity handles and the per-type metadata

use std::any::{type_name, Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::column::ColumnMetadata;
use super::mapping::EntityMapping;
use super::relationship::RelationshipMetadata;
use crate::error::{OrmError, OrmResult};

/// Type-erased shared entity instance (`Arc<RwLock<T>>` underneath)
pub type AnyRef = Arc<dyn Any + Send + Sync>;

/// A record type mapped to exactly one table
pub trait Entity: Default + Send + Sync + 'static {
    /// Declarative description of the table, columns and relationships
    fn mapping() -> EntityMapping<Self>;
}

/// Shared handle to a live entity instance
///
/// The identity cache hands out clones of the same handle, so two lookups of
/// one row observe each other's changes.
pub struct EntityRef<T>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> EntityRef<T> {
    pub fn new(entity: T) -> Self {
        Self(Arc::new(RwLock::new(entity)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    /// Whether both handles point at the same instance
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn into_any(self) -> AnyRef {
        self.0
    }

    pub fn from_any(any: AnyRef) -> Option<Self> {
        any.downcast::<RwLock<T>>().ok().map(Self)
    }
}

impl<T> Clone for EntityRef<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for EntityRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Some(guard) => f.debug_tuple("EntityRef").field(&*guard).finish(),
            None => f.write_str("EntityRef(<locked>)"),
        }
    }
}

impl<T: PartialEq> PartialEq for EntityRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0.read() == *other.0.read()
    }
}

/// Type-specific operations the engine needs without knowing `T`
pub(crate) trait EntityOps: Send + Sync {
    fn instantiate(&self) -> Box<dyn Any + Send + Sync>;

    fn share(&self, instance: Box<dyn Any + Send + Sync>) -> OrmResult<AnyRef>;

    fn with_read(
        &self,
        instance: &AnyRef,
        f: &mut dyn FnMut(&dyn Any) -> OrmResult<()>,
    ) -> OrmResult<()>;

    fn with_write(
        &self,
        instance: &AnyRef,
        f: &mut dyn FnMut(&mut dyn Any) -> OrmResult<()>,
    ) -> OrmResult<()>;
}

struct TypedOps<T>(PhantomData<fn() -> T>);

impl<T: Entity> TypedOps<T> {
    fn mismatch() -> OrmError {
        OrmError::mapping(short_type_name::<T>(), "instance belongs to another entity type")
    }
}

impl<T: Entity> EntityOps for TypedOps<T> {
    fn instantiate(&self) -> Box<dyn Any + Send + Sync> {
        Box::new(T::default())
    }

    fn share(&self, instance: Box<dyn Any + Send + Sync>) -> OrmResult<AnyRef> {
        let entity = instance.downcast::<T>().map_err(|_| Self::mismatch())?;
        Ok(EntityRef::new(*entity).into_any())
    }

    fn with_read(
        &self,
        instance: &AnyRef,
        f: &mut dyn FnMut(&dyn Any) -> OrmResult<()>,
    ) -> OrmResult<()> {
        let lock = instance
            .downcast_ref::<RwLock<T>>()
            .ok_or_else(Self::mismatch)?;
        let guard = lock.read();
        f(&*guard)
    }

    fn with_write(
        &self,
        instance: &AnyRef,
        f: &mut dyn FnMut(&mut dyn Any) -> OrmResult<()>,
    ) -> OrmResult<()> {
        let lock = instance
            .downcast_ref::<RwLock<T>>()
            .ok_or_else(Self::mismatch)?;
        let mut guard = lock.write();
        f(&mut *guard)
    }
}

/// Last path segment of a type name, without generic arguments
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Immutable mapping of one entity type
pub struct EntityMetadata {
    type_id: TypeId,
    type_name: &'static str,
    entity_name: String,
    table_name: String,
    schema: Option<String>,
    catalog: Option<String>,
    columns: Vec<ColumnMetadata>,
    primary_key: usize,
    relationships: Vec<RelationshipMetadata>,
    ops: Arc<dyn EntityOps>,
}

impl EntityMetadata {
    /// Build and validate the metadata of `T`
    pub fn build<T: Entity>() -> OrmResult<Self> {
        let mapping = T::mapping();
        let type_name = short_type_name::<T>();
        let entity_name = mapping
            .entity_name
            .clone()
            .unwrap_or_else(|| type_name.to_string());
        let table_name = mapping
            .table
            .clone()
            .unwrap_or_else(|| entity_name.clone());

        let mut primary_keys = mapping
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key)
            .map(|(index, _)| index);
        let primary_key = primary_keys
            .next()
            .ok_or_else(|| OrmError::mapping(&entity_name, "no primary key is mapped"))?;
        if primary_keys.next().is_some() {
            return Err(OrmError::mapping(
                &entity_name,
                "more than one primary key is mapped",
            ));
        }

        let mut relationships = mapping.relationships;
        for relationship in &mut relationships {
            if relationship.is_owning() && relationship.join_column.is_none() {
                relationship.join_column = Some(format!("{}_id", relationship.field));
            }
            if !relationship.is_owning() {
                relationship.join_column = None;
            }
        }

        let mut seen = HashSet::new();
        let column_names = mapping
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .chain(relationships.iter().filter_map(|r| r.join_column.as_deref()));
        for name in column_names {
            if name.trim().is_empty() {
                return Err(OrmError::mapping(&entity_name, "empty column name"));
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(OrmError::mapping(
                    &entity_name,
                    format!("column `{}` is mapped more than once", name),
                ));
            }
        }

        Ok(Self {
            type_id: TypeId::of::<T>(),
            type_name,
            entity_name,
            table_name,
            schema: mapping.schema,
            catalog: mapping.catalog,
            columns: mapping.columns,
            primary_key,
            relationships,
            ops: Arc::new(TypedOps::<T>(PhantomData)),
        })
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Unqualified table name
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    /// Table name with catalog and schema prefixes
    pub fn full_table_name(&self) -> String {
        self.catalog
            .iter()
            .chain(self.schema.iter())
            .map(String::as_str)
            .chain(std::iter::once(self.table_name.as_str()))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Every basic column, primary key included, in mapping order
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn column(&self, field: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|column| column.field == field)
    }

    pub fn primary_key(&self) -> &ColumnMetadata {
        &self.columns[self.primary_key]
    }

    /// Basic columns other than the primary key
    pub fn non_key_columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter().filter(|column| !column.primary_key)
    }

    pub fn relationships(&self) -> &[RelationshipMetadata] {
        &self.relationships
    }

    pub fn relationship(&self, field: &str) -> Option<&RelationshipMetadata> {
        self.relationships.iter().find(|r| r.field == field)
    }

    /// Relationships backed by a join column on this table
    pub fn owning_relationships(&self) -> impl Iterator<Item = &RelationshipMetadata> {
        self.relationships
            .iter()
            .filter(|r| r.join_column.is_some())
    }

    /// Column names a full-row SELECT reads: basic columns then join columns
    pub fn select_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|column| column.name.as_str())
            .chain(self.owning_relationships().filter_map(|r| r.join_column.as_deref()))
            .collect()
    }

    pub(crate) fn ops(&self) -> &dyn EntityOps {
        self.ops.as_ref()
    }
}

impl fmt::Debug for EntityMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMetadata")
            .field("entity_name", &self.entity_name)
            .field("table", &self.full_table_name())
            .field("columns", &self.columns)
            .field("relationships", &self.relationships)
            .finish()
    }
}
