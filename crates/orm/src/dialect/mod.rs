//! SQL dialects
//!
//! Every piece of database-specific SQL syntax lives behind the [`Dialect`]
//! trait: pagination, identity columns and their read-back, sequences, type
//! names, quoting and the DDL keywords. The rest of the engine never asks
//! which database it is talking to.

pub mod generic;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};

pub use generic::GenericDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

/// Semantic column type, mapped to a native keyword by each dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Text,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Boolean,
    Date,
    Time,
    Timestamp,
    Uuid,
    Binary,
    Json,
}

/// Everything a dialect needs to render one column type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTypeSpec {
    pub sql_type: SqlType,
    pub length: u32,
    pub precision: u32,
    pub scale: u32,
    /// Generated primary key; dialects with serial types substitute them
    pub auto_increment: bool,
}

impl ColumnTypeSpec {
    pub fn new(sql_type: SqlType) -> Self {
        Self {
            sql_type,
            length: 255,
            precision: 0,
            scale: 0,
            auto_increment: false,
        }
    }
}

/// Built-in dialect tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Generic,
    MySql,
    PostgreSql,
    Sqlite,
}

impl DialectKind {
    pub fn name(&self) -> &'static str {
        match self {
            DialectKind::Generic => "generic",
            DialectKind::MySql => "mysql",
            DialectKind::PostgreSql => "postgresql",
            DialectKind::Sqlite => "sqlite",
        }
    }

    /// Instantiate the built-in dialect for this tag
    pub fn create(&self) -> Arc<dyn Dialect> {
        match self {
            DialectKind::Generic => Arc::new(GenericDialect),
            DialectKind::MySql => Arc::new(MySqlDialect),
            DialectKind::PostgreSql => Arc::new(PostgresDialect),
            DialectKind::Sqlite => Arc::new(SqliteDialect),
        }
    }

    /// Infer the dialect from a connection URL scheme (`jdbc:` prefix allowed)
    pub fn from_url(connection_url: &str) -> OrmResult<Self> {
        let trimmed = connection_url.strip_prefix("jdbc:").unwrap_or(connection_url);
        let scheme = match url::Url::parse(trimmed) {
            Ok(parsed) => parsed.scheme().to_string(),
            // `sqlite::memory:` and friends are not valid URLs
            Err(_) => trimmed
                .split(':')
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase(),
        };

        scheme.parse().map_err(|_| {
            OrmError::Configuration(format!(
                "cannot infer a dialect from connection url `{}`",
                connection_url
            ))
        })
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DialectKind {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" | "ansi" | "h2" => Ok(DialectKind::Generic),
            "mysql" | "mariadb" => Ok(DialectKind::MySql),
            "postgres" | "postgresql" => Ok(DialectKind::PostgreSql),
            "sqlite" | "sqlite3" => Ok(DialectKind::Sqlite),
            other => Err(OrmError::Configuration(format!("unknown dialect `{}`", other))),
        }
    }
}

/// Per-database SQL syntax rules
pub trait Dialect: Send + Sync + fmt::Debug {
    fn kind(&self) -> DialectKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Pagination fragment; empty when neither bound is given
    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!("LIMIT {} OFFSET {}", limit, offset),
            (Some(limit), None) => format!("LIMIT {}", limit),
            (None, Some(offset)) => format!("OFFSET {}", offset),
            (None, None) => String::new(),
        }
    }

    /// Append the pagination fragment to a statement
    fn apply_limit(&self, sql: &str, limit: Option<u64>, offset: Option<u64>) -> String {
        let clause = self.limit_clause(limit, offset);
        if clause.is_empty() {
            sql.to_string()
        } else {
            format!("{} {}", sql.trim_end(), clause)
        }
    }

    /// Fragment appended after the type of a generated primary key
    fn identity_column_fragment(&self) -> &'static str;

    fn supports_sequences(&self) -> bool;

    /// SQL fetching the next value of a named sequence
    fn sequence_next_value_sql(&self, sequence: &str) -> OrmResult<String> {
        if self.supports_sequences() {
            Ok(format!("SELECT nextval({})", self.escape_literal(sequence)))
        } else {
            Err(OrmError::Unsupported(format!(
                "{} has no native sequences (requested `{}`)",
                self.name(),
                sequence
            )))
        }
    }

    /// SQL reading back the key generated by the last insert on this connection
    fn identity_select_sql(&self, table: &str, column: &str) -> String;

    /// Native type keyword for a column
    fn column_type(&self, spec: &ColumnTypeSpec) -> String;

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Render a string as a quoted SQL literal
    fn escape_literal(&self, literal: &str) -> String {
        format!("'{}'", literal.replace('\'', "''"))
    }

    /// Positional parameter marker for the 1-based `index`
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// INSERT for a row where every column takes its default
    fn empty_insert_sql(&self, table: &str) -> String {
        format!("INSERT INTO {} DEFAULT VALUES", table)
    }

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn create_table_keyword(&self) -> &'static str {
        "CREATE TABLE"
    }

    fn drop_table_keyword(&self) -> &'static str {
        "DROP TABLE IF EXISTS"
    }

    fn primary_key_keyword(&self) -> &'static str {
        "PRIMARY KEY"
    }

    fn foreign_key_keyword(&self) -> &'static str {
        "FOREIGN KEY"
    }

    fn unique_keyword(&self) -> &'static str {
        "UNIQUE"
    }

    fn not_null_keyword(&self) -> &'static str {
        "NOT NULL"
    }
}
