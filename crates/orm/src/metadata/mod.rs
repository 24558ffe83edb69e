//! Metadata Model
//!
//! Per-type mapping descriptions: columns, the primary key and
//! relationships, built once from each entity's [`EntityMapping`] and read
//! concurrently afterwards.

pub mod column;
pub mod entity;
pub mod mapping;
pub mod registry;
pub mod relationship;
pub mod value;

pub use column::{ColumnMetadata, GenerationType};
pub use entity::{AnyRef, Entity, EntityMetadata, EntityRef};
pub use mapping::{Column, EntityMapping, Relation};
pub use registry::EntityRegistry;
pub use relationship::{CascadeType, FetchType, RelationshipKind, RelationshipMetadata};
pub use value::{ColumnValue, ConversionError, IdentityKey};
