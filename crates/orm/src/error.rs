//! Error types for the ORM engine
//!
//! Every failure the engine can surface is an [`OrmError`]. Variants carry
//! the entity type, SQL text or key that was involved so a failure can be
//! diagnosed from the error alone. [`OrmError::kind`] folds the variants into
//! the coarse categories callers usually branch on.

use std::error::Error as StdError;
use std::fmt;

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Boxed driver-level cause
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Metadata, field access or configuration problems
    Mapping,
    /// SQL failures during CRUD or DDL
    Persistence,
    /// Raw-SQL failures and single-result violations
    Query,
    /// Transaction lifecycle violations and commit/rollback failures
    Transaction,
    /// Migration failures
    Migration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Mapping => write!(f, "mapping"),
            ErrorKind::Persistence => write!(f, "persistence"),
            ErrorKind::Query => write!(f, "query"),
            ErrorKind::Transaction => write!(f, "transaction"),
            ErrorKind::Migration => write!(f, "migration"),
        }
    }
}

/// Failure reported by a connection collaborator
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DatabaseError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DatabaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error types for ORM operations
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// Entity metadata is invalid or a field could not be read or written
    #[error("mapping error on `{entity}`: {message}")]
    Mapping { entity: String, message: String },

    /// Missing or invalid configuration (dialect, connection source, properties)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// SQL failure while persisting or loading an entity, or while running DDL
    #[error("failed to {operation} `{entity}`: {source} [SQL: {sql}]")]
    Persistence {
        operation: &'static str,
        entity: String,
        sql: String,
        #[source]
        source: DatabaseError,
    },

    /// An operation needed a primary-key value and the entity had none
    #[error("cannot {operation} `{entity}` without a primary key value")]
    MissingKey {
        operation: &'static str,
        entity: String,
    },

    /// Caller-supplied SQL failed to execute
    #[error("query execution failed: {source} [SQL: {sql}]")]
    Query {
        sql: String,
        #[source]
        source: DatabaseError,
    },

    /// A named parameter referenced by the SQL was never supplied
    #[error("invalid parameter `{name}` [SQL: {sql}]")]
    InvalidParameter { name: String, sql: String },

    /// A single-result query matched no rows
    #[error("query returned no results [SQL: {sql}]")]
    NoResult { sql: String },

    /// A single-result query matched more than one row
    #[error("query returned more than one result ({count} rows) [SQL: {sql}]")]
    TooManyResults { sql: String, count: usize },

    /// Transaction lifecycle violation or commit/rollback failure
    #[error("transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Option<DatabaseError>,
    },

    /// A relationship could not be resolved while hydrating a row
    #[error("failed to resolve relationship `{entity}.{field}` (key {key}): {source}")]
    Relationship {
        entity: String,
        field: String,
        key: String,
        #[source]
        source: Box<OrmError>,
    },

    /// A migration failed; nothing after it was attempted
    #[error("migration `{version}` failed: {source}")]
    Migration {
        version: String,
        #[source]
        source: Box<OrmError>,
    },

    /// The active dialect or migration does not support the requested feature
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A connection could not be acquired from the provider
    #[error("connection error: {0}")]
    Connection(#[source] DatabaseError),

    /// The session was closed
    #[error("session is closed")]
    SessionClosed,

    /// The session factory was closed
    #[error("session factory is closed")]
    FactoryClosed,
}

impl OrmError {
    pub fn mapping(entity: impl Into<String>, message: impl Into<String>) -> Self {
        OrmError::Mapping {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn persistence(
        operation: &'static str,
        entity: impl Into<String>,
        sql: impl Into<String>,
        source: DatabaseError,
    ) -> Self {
        OrmError::Persistence {
            operation,
            entity: entity.into(),
            sql: sql.into(),
            source,
        }
    }

    pub fn query(sql: impl Into<String>, source: DatabaseError) -> Self {
        OrmError::Query {
            sql: sql.into(),
            source,
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        OrmError::Transaction {
            message: message.into(),
            source: None,
        }
    }

    pub fn transaction_failed(message: impl Into<String>, source: DatabaseError) -> Self {
        OrmError::Transaction {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrmError::Mapping { .. } | OrmError::Configuration(_) => ErrorKind::Mapping,
            OrmError::Persistence { .. }
            | OrmError::MissingKey { .. }
            | OrmError::Relationship { .. }
            | OrmError::Connection(_)
            | OrmError::Unsupported(_)
            | OrmError::SessionClosed
            | OrmError::FactoryClosed => ErrorKind::Persistence,
            OrmError::Query { .. }
            | OrmError::InvalidParameter { .. }
            | OrmError::NoResult { .. }
            | OrmError::TooManyResults { .. } => ErrorKind::Query,
            OrmError::Transaction { .. } => ErrorKind::Transaction,
            OrmError::Migration { .. } => ErrorKind::Migration,
        }
    }

    /// SQL text attached to this error, if any
    pub fn sql(&self) -> Option<&str> {
        match self {
            OrmError::Persistence { sql, .. }
            | OrmError::Query { sql, .. }
            | OrmError::InvalidParameter { sql, .. }
            | OrmError::NoResult { sql }
            | OrmError::TooManyResults { sql, .. } => Some(sql),
            OrmError::Relationship { source, .. } | OrmError::Migration { source, .. } => {
                source.sql()
            }
            _ => None,
        }
    }
}
