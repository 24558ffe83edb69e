//! Column metadata and type-erased field accessors

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::value::{ConversionError, IdentityKey};
use crate::backends::DatabaseValue;
use crate::dialect::{ColumnTypeSpec, SqlType};
use crate::error::{OrmError, OrmResult};

/// Reads one field from an entity instance
pub(crate) type Getter = Arc<dyn Fn(&dyn Any) -> OrmResult<DatabaseValue> + Send + Sync>;

/// Writes one field of an entity instance
pub(crate) type Setter = Arc<dyn Fn(&mut dyn Any, DatabaseValue) -> OrmResult<()> + Send + Sync>;

/// Round-trips a value through the field's own type
pub(crate) type Normalizer =
    Arc<dyn Fn(DatabaseValue) -> Result<DatabaseValue, ConversionError> + Send + Sync>;

/// Primary-key generation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationType {
    Auto,
    Identity,
    Sequence,
    Table,
}

/// Mapping of one entity field onto one column
#[derive(Clone)]
pub struct ColumnMetadata {
    pub(crate) field: &'static str,
    pub(crate) name: String,
    pub(crate) sql_type: SqlType,
    pub(crate) nullable: bool,
    pub(crate) unique: bool,
    pub(crate) length: u32,
    pub(crate) precision: u32,
    pub(crate) scale: u32,
    pub(crate) definition: Option<String>,
    pub(crate) primary_key: bool,
    pub(crate) generation: Option<GenerationType>,
    pub(crate) generator: Option<String>,
    pub(crate) getter: Getter,
    pub(crate) setter: Setter,
    pub(crate) normalizer: Normalizer,
}

impl ColumnMetadata {
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Raw column type that overrides the dialect mapping
    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn generation(&self) -> Option<GenerationType> {
        self.generation
    }

    pub fn generator(&self) -> Option<&str> {
        self.generator.as_deref()
    }

    /// Whether the database assigns this column's value on insert
    pub fn is_generated(&self) -> bool {
        self.primary_key && self.generation.is_some()
    }

    /// Type description handed to the dialect
    pub fn type_spec(&self) -> ColumnTypeSpec {
        ColumnTypeSpec {
            sql_type: self.sql_type,
            length: self.length,
            precision: self.precision,
            scale: self.scale,
            auto_increment: self.is_generated(),
        }
    }

    /// Read this column's value from an entity instance
    pub fn get(&self, instance: &dyn Any) -> OrmResult<DatabaseValue> {
        (self.getter)(instance)
    }

    /// Write a value into this column's field
    pub fn set(&self, instance: &mut dyn Any, value: DatabaseValue) -> OrmResult<()> {
        (self.setter)(instance, value)
    }

    /// Convert a driver or caller value into the representation the field
    /// itself produces, e.g. UUID text read back from SQLite into a UUID
    pub fn normalize(&self, value: DatabaseValue) -> Result<DatabaseValue, ConversionError> {
        (self.normalizer)(value)
    }

    /// Identity-cache key for a value of this column
    ///
    /// Values that do not convert into the field's type keep their raw form.
    pub fn identity_key(&self, value: &DatabaseValue) -> Option<IdentityKey> {
        if value.is_null() {
            return None;
        }
        match self.normalize(value.clone()) {
            Ok(normalized) => IdentityKey::from_value(&normalized),
            Err(_) => IdentityKey::from_value(value),
        }
    }
}

impl fmt::Debug for ColumnMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnMetadata")
            .field("field", &self.field)
            .field("name", &self.name)
            .field("sql_type", &self.sql_type)
            .field("nullable", &self.nullable)
            .field("unique", &self.unique)
            .field("primary_key", &self.primary_key)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

pub(crate) fn downcast_error(entity: &str, field: &str) -> OrmError {
    OrmError::mapping(
        entity,
        format!("field `{}` accessed on an instance of another type", field),
    )
}
