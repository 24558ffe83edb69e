//! Declarative mapping input
//!
//! An entity describes itself once by returning an [`EntityMapping`] from
//! [`Entity::mapping`](super::Entity::mapping). Each field is registered
//! with a getter/setter pair, so no runtime introspection is needed:
//!
//! ```
//! use tessera_orm::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct User {
//!     id: Option<i64>,
//!     username: String,
//! }
//!
//! impl Entity for User {
//!     fn mapping() -> EntityMapping<Self> {
//!         EntityMapping::new()
//!             .table("users")
//!             .id(Column::new("id", |u: &User| u.id, |u, v| u.id = v)
//!                 .generated(GenerationType::Identity))
//!             .column(Column::new("username", |u: &User| u.username.clone(), |u, v| u.username = v)
//!                 .not_null()
//!                 .unique()
//!                 .length(50))
//!     }
//! }
//! ```

use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use super::column::{downcast_error, ColumnMetadata, GenerationType};
use super::entity::{short_type_name, Entity, EntityRef};
use super::relationship::{CascadeType, FetchType, RelationshipKind, RelationshipMetadata};
use super::value::ColumnValue;
use crate::backends::DatabaseValue;
use crate::error::OrmError;

/// Mapping description of entity type `T`
pub struct EntityMapping<T> {
    pub(crate) table: Option<String>,
    pub(crate) entity_name: Option<String>,
    pub(crate) schema: Option<String>,
    pub(crate) catalog: Option<String>,
    pub(crate) columns: Vec<ColumnMetadata>,
    pub(crate) relationships: Vec<RelationshipMetadata>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityMapping<T> {
    pub fn new() -> Self {
        Self {
            table: None,
            entity_name: None,
            schema: None,
            catalog: None,
            columns: Vec::new(),
            relationships: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Explicit table name
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = Some(name.into());
        self
    }

    /// Entity name; doubles as the table name when none is given
    pub fn entity_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = Some(name.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    /// Register the primary-key column
    pub fn id(mut self, column: Column<T>) -> Self {
        let mut meta = column.meta;
        meta.primary_key = true;
        meta.nullable = false;
        self.columns.push(meta);
        self
    }

    /// Register a basic column
    pub fn column(mut self, column: Column<T>) -> Self {
        self.columns.push(column.meta);
        self
    }

    /// Register a relationship
    pub fn relation(mut self, relation: Relation<T>) -> Self {
        self.relationships.push(relation.meta);
        self
    }
}

impl<T: Entity> Default for EntityMapping<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one basic column of entity type `T`
pub struct Column<T> {
    meta: ColumnMetadata,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Column<T> {
    /// Map `field` through a getter/setter pair; the column name defaults
    /// to the field name.
    pub fn new<V, G, S>(field: &'static str, get: G, set: S) -> Self
    where
        V: ColumnValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let getter = move |instance: &dyn Any| {
            let entity = instance
                .downcast_ref::<T>()
                .ok_or_else(|| downcast_error(short_type_name::<T>(), field))?;
            Ok(get(entity).to_value())
        };
        let setter = move |instance: &mut dyn Any, value| {
            let entity = instance
                .downcast_mut::<T>()
                .ok_or_else(|| downcast_error(short_type_name::<T>(), field))?;
            let converted = V::from_value(value).map_err(|e| {
                OrmError::mapping(
                    short_type_name::<T>(),
                    format!("cannot write field `{}`: {}", field, e),
                )
            })?;
            set(entity, converted);
            Ok(())
        };

        Self {
            meta: ColumnMetadata {
                field,
                name: field.to_string(),
                sql_type: V::SQL_TYPE,
                nullable: true,
                unique: false,
                length: 255,
                precision: 0,
                scale: 0,
                definition: None,
                primary_key: false,
                generation: None,
                generator: None,
                getter: Arc::new(getter),
                setter: Arc::new(setter),
                normalizer: Arc::new(|value: DatabaseValue| V::from_value(value).map(|v| v.to_value())),
            },
            _marker: PhantomData,
        }
    }

    /// Column name, when it differs from the field name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.meta.name = name.into();
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.meta.nullable = nullable;
        self
    }

    pub fn not_null(self) -> Self {
        self.nullable(false)
    }

    pub fn unique(mut self) -> Self {
        self.meta.unique = true;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.meta.length = length;
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.meta.precision = precision;
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.meta.scale = scale;
        self
    }

    /// Raw column type, bypassing the dialect's type mapping
    pub fn definition(mut self, definition: impl Into<String>) -> Self {
        self.meta.definition = Some(definition.into());
        self
    }

    /// Let the database generate this (primary-key) column
    pub fn generated(mut self, strategy: GenerationType) -> Self {
        self.meta.generation = Some(strategy);
        self
    }

    /// Name of the sequence or table backing the generator
    pub fn generator(mut self, name: impl Into<String>) -> Self {
        self.meta.generator = Some(name.into());
        self
    }
}

/// Builder for one relationship of entity type `T`
pub struct Relation<T> {
    meta: RelationshipMetadata,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Relation<T> {
    /// Reference to a single `U` through a foreign-key column on `T`'s table
    pub fn many_to_one<U, G, S>(field: &'static str, get: G, set: S) -> Self
    where
        U: Entity,
        G: Fn(&T) -> Option<EntityRef<U>> + Send + Sync + 'static,
        S: Fn(&mut T, Option<EntityRef<U>>) + Send + Sync + 'static,
    {
        Self::single::<U, G, S>(RelationshipKind::ManyToOne, field, get, set)
    }

    /// One-to-one reference; owning unless [`mapped_by`](Self::mapped_by) is set
    pub fn one_to_one<U, G, S>(field: &'static str, get: G, set: S) -> Self
    where
        U: Entity,
        G: Fn(&T) -> Option<EntityRef<U>> + Send + Sync + 'static,
        S: Fn(&mut T, Option<EntityRef<U>>) + Send + Sync + 'static,
    {
        Self::single::<U, G, S>(RelationshipKind::OneToOne, field, get, set)
    }

    /// Inverse side of a many-to-one held by `U`; recorded, never loaded
    pub fn one_to_many<U: Entity>(field: &'static str) -> Self {
        Self {
            meta: Self::base::<U>(RelationshipKind::OneToMany, field),
            _marker: PhantomData,
        }
    }

    fn base<U: Entity>(kind: RelationshipKind, field: &'static str) -> RelationshipMetadata {
        RelationshipMetadata {
            field,
            kind,
            target: TypeId::of::<U>(),
            target_name: short_type_name::<U>(),
            mapped_by: None,
            cascade: Vec::new(),
            fetch: FetchType::default(),
            optional: true,
            join_column: None,
            referenced_column: "id".to_string(),
            getter: None,
            setter: None,
        }
    }

    fn single<U, G, S>(kind: RelationshipKind, field: &'static str, get: G, set: S) -> Self
    where
        U: Entity,
        G: Fn(&T) -> Option<EntityRef<U>> + Send + Sync + 'static,
        S: Fn(&mut T, Option<EntityRef<U>>) + Send + Sync + 'static,
    {
        let getter = move |instance: &dyn Any| {
            let entity = instance
                .downcast_ref::<T>()
                .ok_or_else(|| downcast_error(short_type_name::<T>(), field))?;
            Ok(get(entity).map(EntityRef::into_any))
        };
        let setter = move |instance: &mut dyn Any, target: Option<super::entity::AnyRef>| {
            let entity = instance
                .downcast_mut::<T>()
                .ok_or_else(|| downcast_error(short_type_name::<T>(), field))?;
            let typed = match target {
                Some(any) => Some(EntityRef::<U>::from_any(any).ok_or_else(|| {
                    OrmError::mapping(
                        short_type_name::<T>(),
                        format!("relationship `{}` expects `{}`", field, type_name::<U>()),
                    )
                })?),
                None => None,
            };
            set(entity, typed);
            Ok(())
        };

        let mut meta = Self::base::<U>(kind, field);
        meta.getter = Some(Arc::new(getter));
        meta.setter = Some(Arc::new(setter));
        Self {
            meta,
            _marker: PhantomData,
        }
    }

    /// Foreign-key column name (default `<field>_id`)
    pub fn join_column(mut self, column: impl Into<String>) -> Self {
        self.meta.join_column = Some(column.into());
        self
    }

    /// Target column the foreign key references (default `id`)
    pub fn referenced_column(mut self, column: impl Into<String>) -> Self {
        self.meta.referenced_column = column.into();
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.meta.optional = optional;
        self
    }

    pub fn cascade(mut self, cascade: CascadeType) -> Self {
        if !self.meta.cascade.contains(&cascade) {
            self.meta.cascade.push(cascade);
        }
        self
    }

    pub fn fetch(mut self, fetch: FetchType) -> Self {
        self.meta.fetch = fetch;
        self
    }

    /// Field on the target that owns this relationship
    pub fn mapped_by(mut self, field: impl Into<String>) -> Self {
        self.meta.mapped_by = Some(field.into());
        self
    }
}
