//! # tessera-orm: embeddable object-relational mapping
//!
//! Maps plain Rust records to relational tables across SQL dialects:
//! entity metadata built from explicit per-type mappings, DDL generation,
//! session-scoped CRUD with an identity cache and transactions, a
//! dialect-aware query builder, and tracked schema migrations.
//!
//! ```no_run
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
//!                 .unique())
//!     }
//! }
//!
//! # fn main() -> OrmResult<()> {
//! let factory = Configuration::new()
//!     .database("sqlite://app.db")
//!     .add_entity::<User>()
//!     .set_property("orm.schema.auto", "create")
//!     .build_session_factory()?;
//!
//! let mut session = factory.open_session()?;
//! let user = EntityRef::new(User { id: None, username: "alice".into() });
//! session.save(&user)?;
//! let found: Option<EntityRef<User>> = session.find_by_id(user.read().id)?;
//! assert!(found.is_some());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod dialect;
pub mod error;
pub mod metadata;
pub mod migrations;
pub mod monitor;
pub mod query;
pub mod schema;
pub mod session;

pub use backends::{ConnectionProvider, DatabaseConnection, DatabaseRow, DatabaseValue, SqliteProvider};
pub use config::{Configuration, RelationshipPolicy, SchemaAction, Settings};
pub use dialect::{Dialect, DialectKind, SqlType};
pub use error::{DatabaseError, ErrorKind, OrmError, OrmResult};
pub use metadata::{
    CascadeType, Column, Entity, EntityMapping, EntityMetadata, EntityRef, EntityRegistry, FetchType,
    GenerationType, Relation, RelationshipKind,
};
pub use migrations::{Migration, MigrationManager, MigrationRunResult, MigrationStatus, SqlMigration};
pub use monitor::{ExecutionMonitor, OperationKind, OperationStats};
pub use query::{OrderDirection, QueryBuilder, TypedQuery};
pub use schema::SchemaGenerator;
pub use session::{Session, SessionContext, SessionFactory, Transaction, TransactionStatus};

/// Everything needed to map entities and work with sessions
pub mod prelude {
    pub use crate::backends::DatabaseValue;
    pub use crate::config::{Configuration, RelationshipPolicy, SchemaAction};
    pub use crate::dialect::DialectKind;
    pub use crate::error::{OrmError, OrmResult};
    pub use crate::metadata::{
        CascadeType, Column, Entity, EntityMapping, EntityRef, FetchType, GenerationType, Relation,
    };
    pub use crate::migrations::{Migration, SqlMigration};
    pub use crate::query::{OrderDirection, QueryBuilder};
    pub use crate::session::{Session, SessionContext, SessionFactory, Transaction, TransactionStatus};
}
