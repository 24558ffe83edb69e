//! Migration Manager
//!
//! Versioned schema changes applied in registration order and recorded in
//! the `schema_migrations` tracking table. Reverse operations only run on an
//! explicit rollback.

pub mod definitions;
pub mod runner;

pub use definitions::{split_sql_statements, Migration, MigrationRunResult, MigrationStatus, SqlMigration};
pub use runner::{MigrationManager, MIGRATIONS_TABLE};
