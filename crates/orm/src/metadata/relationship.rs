//! Relationship Metadata - how one entity refers to another

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::entity::AnyRef;
use crate::error::OrmResult;

pub(crate) type RefGetter = Arc<dyn Fn(&dyn Any) -> OrmResult<Option<AnyRef>> + Send + Sync>;
pub(crate) type RefSetter = Arc<dyn Fn(&mut dyn Any, Option<AnyRef>) -> OrmResult<()> + Send + Sync>;

/// Defines the type of relationship between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    OneToOne,
    OneToMany,
    ManyToOne,
}

impl RelationshipKind {
    /// Returns true if this relationship holds a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::OneToMany)
    }
}

/// Operations propagated from an entity to its related entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CascadeType {
    All,
    Persist,
    Merge,
    Remove,
    Refresh,
    Detach,
}

/// When related entities are loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchType {
    Lazy,
    #[default]
    Eager,
}

/// Mapping of one relationship field
#[derive(Clone)]
pub struct RelationshipMetadata {
    pub(crate) field: &'static str,
    pub(crate) kind: RelationshipKind,
    pub(crate) target: TypeId,
    pub(crate) target_name: &'static str,
    pub(crate) mapped_by: Option<String>,
    pub(crate) cascade: Vec<CascadeType>,
    pub(crate) fetch: FetchType,
    pub(crate) optional: bool,
    pub(crate) join_column: Option<String>,
    pub(crate) referenced_column: String,
    pub(crate) getter: Option<RefGetter>,
    pub(crate) setter: Option<RefSetter>,
}

impl RelationshipMetadata {
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    pub fn target(&self) -> TypeId {
        self.target
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    pub fn mapped_by(&self) -> Option<&str> {
        self.mapped_by.as_deref()
    }

    pub fn cascade(&self) -> &[CascadeType] {
        &self.cascade
    }

    pub fn fetch(&self) -> FetchType {
        self.fetch
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Owning side: this entity's table holds the foreign-key column
    pub fn is_owning(&self) -> bool {
        match self.kind {
            RelationshipKind::ManyToOne => true,
            RelationshipKind::OneToOne => self.mapped_by.is_none(),
            RelationshipKind::OneToMany => false,
        }
    }

    /// Foreign-key column on this entity's table, for owning relationships
    pub fn join_column(&self) -> Option<&str> {
        self.join_column.as_deref()
    }

    /// Column on the target table the join column points at
    pub fn referenced_column(&self) -> &str {
        &self.referenced_column
    }

    /// Read the related instance, if the field holds one
    pub(crate) fn get(&self, instance: &dyn Any) -> OrmResult<Option<AnyRef>> {
        match &self.getter {
            Some(getter) => getter(instance),
            None => Ok(None),
        }
    }

    /// Store a related instance into the field
    pub(crate) fn set(&self, instance: &mut dyn Any, target: Option<AnyRef>) -> OrmResult<()> {
        match &self.setter {
            Some(setter) => setter(instance, target),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RelationshipMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipMetadata")
            .field("field", &self.field)
            .field("kind", &self.kind)
            .field("target", &self.target_name)
            .field("mapped_by", &self.mapped_by)
            .field("optional", &self.optional)
            .field("join_column", &self.join_column)
            .field("referenced_column", &self.referenced_column)
            .finish_non_exhaustive()
    }
}
