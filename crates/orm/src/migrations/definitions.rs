//! Migration Definitions - the migration contract, SQL migrations and
//! result types

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlparser::dialect::{
    Dialect as ParserDialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::tokenizer::{Location, Token, Tokenizer};

use crate::backends::DatabaseConnection;
use crate::dialect::{Dialect, DialectKind};
use crate::error::{OrmError, OrmResult};

/// One versioned schema change
pub trait Migration: Send + Sync {
    /// Unique version; migrations apply in registration order
    fn version(&self) -> &str;

    fn description(&self) -> &str;

    /// Forward operation, run inside the migration's transaction
    fn up(&self, conn: &mut dyn DatabaseConnection, dialect: &dyn Dialect) -> OrmResult<()>;

    /// Reverse operation; only run by an explicit rollback
    fn down(&self, _conn: &mut dyn DatabaseConnection, _dialect: &dyn Dialect) -> OrmResult<()> {
        Err(OrmError::Unsupported(format!(
            "migration `{}` has no reverse operation",
            self.version()
        )))
    }

    fn is_reversible(&self) -> bool {
        false
    }
}

/// Migration made of SQL scripts
#[derive(Debug, Clone, Serialize)]
pub struct SqlMigration {
    pub version: String,
    pub description: String,
    pub up_sql: String,
    pub down_sql: Option<String>,
}

impl SqlMigration {
    pub fn new(
        version: impl Into<String>,
        description: impl Into<String>,
        up_sql: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            description: description.into(),
            up_sql: up_sql.into(),
            down_sql: None,
        }
    }

    pub fn with_down(mut self, down_sql: impl Into<String>) -> Self {
        self.down_sql = Some(down_sql.into());
        self
    }
}

fn run_script(conn: &mut dyn DatabaseConnection, dialect: &dyn Dialect, script: &str) -> OrmResult<()> {
    for statement in split_sql_statements(script, dialect.kind()) {
        conn.execute(&statement, &[])
            .map_err(|e| OrmError::query(statement.as_str(), e))?;
    }
    Ok(())
}

impl Migration for SqlMigration {
    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn up(&self, conn: &mut dyn DatabaseConnection, dialect: &dyn Dialect) -> OrmResult<()> {
        run_script(conn, dialect, &self.up_sql)
    }

    fn down(&self, conn: &mut dyn DatabaseConnection, dialect: &dyn Dialect) -> OrmResult<()> {
        match &self.down_sql {
            Some(sql) => run_script(conn, dialect, sql),
            None => Err(OrmError::Unsupported(format!(
                "migration `{}` has no reverse operation",
                self.version
            ))),
        }
    }

    fn is_reversible(&self) -> bool {
        self.down_sql.is_some()
    }
}

fn parser_dialect(kind: DialectKind) -> Box<dyn ParserDialect> {
    match kind {
        DialectKind::Generic => Box::new(GenericDialect {}),
        DialectKind::MySql => Box::new(MySqlDialect {}),
        DialectKind::PostgreSql => Box::new(PostgreSqlDialect {}),
        DialectKind::Sqlite => Box::new(SQLiteDialect {}),
    }
}

/// Split a script into statements with the tokenizer of the matching dialect
///
/// Semicolons inside literals and comments do not split. Statements are
/// sliced from the original text, so quoting and escapes survive unchanged.
/// Falls back to naive `;` splitting when the script cannot be tokenized.
pub fn split_sql_statements(sql: &str, kind: DialectKind) -> Vec<String> {
    let dialect = parser_dialect(kind);
    let tokens = match Tokenizer::new(dialect.as_ref(), sql).tokenize_with_location() {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("SQL tokenizing failed, using naive semicolon splitting: {}", e);
            return naive_split(sql);
        }
    };

    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    let mut statements = Vec::new();
    let mut start = 0;
    // comment-only segments are not statements
    let mut has_content = false;
    for token in &tokens {
        match token.token {
            Token::SemiColon => {
                let Some(offset) = byte_offset(sql, &line_starts, &token.location) else {
                    tracing::warn!("SQL token location out of range, using naive semicolon splitting");
                    return naive_split(sql);
                };
                if has_content {
                    push_statement(&mut statements, &sql[start..offset]);
                }
                start = offset + 1;
                has_content = false;
            }
            Token::Whitespace(_) | Token::EOF => {}
            _ => has_content = true,
        }
    }
    if has_content {
        push_statement(&mut statements, &sql[start..]);
    }
    statements
}

/// Byte offset of a 1-based line/column (in characters) location
fn byte_offset(sql: &str, line_starts: &[usize], location: &Location) -> Option<usize> {
    let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
    let column = usize::try_from(location.column).ok()?.checked_sub(1)?;
    let line_start = *line_starts.get(line)?;
    sql[line_start..]
        .char_indices()
        .nth(column)
        .map(|(i, _)| line_start + i)
        .filter(|&offset| sql.as_bytes().get(offset) == Some(&b';'))
}

fn naive_split(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

/// Result of running migrations
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRunResult {
    /// Number of migrations that were applied
    pub applied_count: usize,
    /// Versions applied by this run, in order
    pub applied_migrations: Vec<String>,
    /// Number of migrations that were skipped (already applied)
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Registered migration and when it was applied, if it was
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: String,
    pub description: String,
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}
