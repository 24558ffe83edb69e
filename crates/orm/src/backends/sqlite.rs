//! SQLite backend built on rusqlite and an r2d2 connection pool.

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Value, ValueRef};
use tracing::{debug, warn};

use super::core::{ConnectionProvider, DatabaseConnection, DatabaseRow, DatabaseValue};
use crate::error::DatabaseError;

/// Type alias for the SQLite connection pool.
pub type SqlitePool = Pool<SqliteConnectionManager>;

const DEFAULT_POOL_SIZE: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl From<rusqlite::Error> for DatabaseError {
    fn from(error: rusqlite::Error) -> Self {
        DatabaseError::with_source(error.to_string(), error)
    }
}

impl From<r2d2::Error> for DatabaseError {
    fn from(error: r2d2::Error) -> Self {
        DatabaseError::with_source(format!("failed to get connection from pool: {}", error), error)
    }
}

/// Pooled SQLite connection provider
#[derive(Clone)]
pub struct SqliteProvider {
    pool: SqlitePool,
    description: String,
}

impl SqliteProvider {
    /// Open (or create) a database file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        Self::open_with_size(path, DEFAULT_POOL_SIZE)
    }

    pub fn open_with_size(path: impl AsRef<Path>, max_size: u32) -> Result<Self, DatabaseError> {
        let description = format!("sqlite file {}", path.as_ref().display());
        let manager = SqliteConnectionManager::file(path.as_ref()).with_init(init_connection);
        Self::build(manager, max_size, description)
    }

    /// Create an in-memory database shared by every connection of this pool.
    ///
    /// Each call gets a uniquely named shared-cache database, so two
    /// providers never see each other's tables.
    pub fn memory() -> Result<Self, DatabaseError> {
        let uri = format!("file:memdb_{}?mode=memory&cache=shared", uuid::Uuid::new_v4().simple());
        let manager = SqliteConnectionManager::file(&uri).with_init(init_connection);
        Self::build(manager, DEFAULT_POOL_SIZE, format!("sqlite memory {}", uri))
    }

    /// Build a provider from a connection URL.
    ///
    /// Accepts `sqlite::memory:`, `sqlite://<path>`, `sqlite:<path>` and the
    /// same forms prefixed with `jdbc:`.
    pub fn from_url(url: &str) -> Result<Self, DatabaseError> {
        let trimmed = url.strip_prefix("jdbc:").unwrap_or(url);
        let rest = trimmed
            .strip_prefix("sqlite:")
            .ok_or_else(|| DatabaseError::new(format!("not a sqlite url: {}", url)))?;
        let location = rest.strip_prefix("//").unwrap_or(rest);
        let location = location.split('?').next().unwrap_or_default();

        if location.is_empty() || location == ":memory:" {
            Self::memory()
        } else {
            Self::open(location)
        }
    }

    fn build(
        manager: SqliteConnectionManager,
        max_size: u32,
        description: String,
    ) -> Result<Self, DatabaseError> {
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| DatabaseError::with_source(format!("failed to create connection pool: {}", e), e))?;
        debug!("Opened {} (pool size {})", description, max_size);
        Ok(Self { pool, description })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl std::fmt::Debug for SqliteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProvider")
            .field("description", &self.description)
            .field("max_size", &self.pool.max_size())
            .finish()
    }
}

fn init_connection(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

impl ConnectionProvider for SqliteProvider {
    fn acquire(&self) -> Result<Box<dyn DatabaseConnection>, DatabaseError> {
        let conn = self.pool.get()?;
        Ok(Box::new(SqliteConnection {
            conn,
            in_transaction: false,
        }))
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// A pooled connection; an open transaction is rolled back when dropped
pub struct SqliteConnection {
    conn: PooledConnection<SqliteConnectionManager>,
    in_transaction: bool,
}

impl DatabaseConnection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<u64, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let affected = stmt.execute(rusqlite::params_from_iter(params.iter().map(to_sqlite)))?;
        Ok(affected as u64)
    }

    fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<Vec<DatabaseRow>, DatabaseError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter().map(to_sqlite)))?;

        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                values.push(from_sqlite(row.get_ref(index)?)?);
            }
            result.push(DatabaseRow::new(columns.clone(), values));
        }
        Ok(result)
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), DatabaseError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), DatabaseError> {
        if self.in_transaction {
            return Err(DatabaseError::new("a transaction is already open on this connection"));
        }
        self.conn.execute_batch("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Err(DatabaseError::new("no transaction is open on this connection"));
        }
        let result = self.conn.execute_batch("COMMIT");
        if result.is_ok() || self.conn.is_autocommit() {
            self.in_transaction = false;
        }
        result.map_err(DatabaseError::from)
    }

    fn rollback(&mut self) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Err(DatabaseError::new("no transaction is open on this connection"));
        }
        self.in_transaction = false;
        if self.conn.is_autocommit() {
            // sqlite already rolled back, e.g. after a constraint abort
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if self.in_transaction && !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Failed to roll back abandoned transaction: {}", e);
            }
        }
    }
}

fn to_sqlite(value: &DatabaseValue) -> Value {
    match value {
        DatabaseValue::Null => Value::Null,
        DatabaseValue::Bool(b) => Value::Integer(i64::from(*b)),
        DatabaseValue::Int32(i) => Value::Integer(i64::from(*i)),
        DatabaseValue::Int64(i) => Value::Integer(*i),
        DatabaseValue::Float32(f) => Value::Real(f64::from(*f)),
        DatabaseValue::Float64(f) => Value::Real(*f),
        DatabaseValue::String(s) => Value::Text(s.clone()),
        DatabaseValue::Bytes(b) => Value::Blob(b.clone()),
        DatabaseValue::Uuid(u) => Value::Text(u.hyphenated().to_string()),
        DatabaseValue::DateTime(dt) => Value::Text(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        DatabaseValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
        DatabaseValue::Time(t) => Value::Text(t.format("%H:%M:%S%.f").to_string()),
        DatabaseValue::Json(j) => Value::Text(j.to_string()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Result<DatabaseValue, DatabaseError> {
    Ok(match value {
        ValueRef::Null => DatabaseValue::Null,
        ValueRef::Integer(i) => DatabaseValue::Int64(i),
        ValueRef::Real(f) => DatabaseValue::Float64(f),
        ValueRef::Text(bytes) => DatabaseValue::String(
            std::str::from_utf8(bytes)
                .map_err(|e| DatabaseError::with_source("text column is not valid UTF-8", e))?
                .to_string(),
        ),
        ValueRef::Blob(bytes) => DatabaseValue::Bytes(bytes.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_provider_shares_state_between_connections() {
        let provider = SqliteProvider::memory().unwrap();

        {
            let mut conn = provider.acquire().unwrap();
            conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
            conn.execute("INSERT INTO t (name) VALUES (?)", &[DatabaseValue::from("a")])
                .unwrap();
        }

        let mut conn = provider.acquire().unwrap();
        let rows = conn.fetch_all("SELECT id, name FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_by_name("name"), Some(&DatabaseValue::from("a")));
        assert_eq!(rows[0].get_by_name("id"), Some(&DatabaseValue::Int64(1)));
    }

    #[test]
    fn test_memory_providers_are_isolated() {
        let first = SqliteProvider::memory().unwrap();
        let second = SqliteProvider::memory().unwrap();

        first.acquire().unwrap().execute_batch("CREATE TABLE only_here (id INTEGER)").unwrap();
        let result = second.acquire().unwrap().fetch_all("SELECT * FROM only_here", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rollback_discards_changes() {
        let provider = SqliteProvider::memory().unwrap();
        let mut conn = provider.acquire().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();

        conn.begin().unwrap();
        assert!(conn.in_transaction());
        conn.execute("INSERT INTO t (id) VALUES (?)", &[DatabaseValue::Int64(1)]).unwrap();
        conn.rollback().unwrap();
        assert!(!conn.in_transaction());

        let rows = conn.fetch_all("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_by_index(0), Some(&DatabaseValue::Int64(0)));
    }

    #[test]
    fn test_dropping_connection_rolls_back_open_transaction() {
        let provider = SqliteProvider::memory().unwrap();
        provider
            .acquire()
            .unwrap()
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .unwrap();

        {
            let mut conn = provider.acquire().unwrap();
            conn.begin().unwrap();
            conn.execute("INSERT INTO t (id) VALUES (1)", &[]).unwrap();
        }

        let mut conn = provider.acquire().unwrap();
        let rows = conn.fetch_all("SELECT COUNT(*) AS n FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_by_name("n"), Some(&DatabaseValue::Int64(0)));
    }

    #[test]
    fn test_from_url_forms() {
        assert!(SqliteProvider::from_url("sqlite::memory:").is_ok());
        assert!(SqliteProvider::from_url("jdbc:sqlite::memory:").is_ok());
        assert!(SqliteProvider::from_url("postgres://localhost/db").is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orm.db");
        let provider = SqliteProvider::from_url(&format!("sqlite://{}", path.display())).unwrap();
        provider.acquire().unwrap().execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_values_round_trip_through_sqlite() {
        let provider = SqliteProvider::memory().unwrap();
        let mut conn = provider.acquire().unwrap();
        conn.execute_batch("CREATE TABLE v (b INTEGER, f REAL, t TEXT, x BLOB)").unwrap();
        conn.execute(
            "INSERT INTO v (b, f, t, x) VALUES (?, ?, ?, ?)",
            &[
                DatabaseValue::Bool(true),
                DatabaseValue::Float64(1.5),
                DatabaseValue::from("hi"),
                DatabaseValue::Bytes(vec![1, 2, 3]),
            ],
        )
        .unwrap();

        let rows = conn.fetch_all("SELECT b, f, t, x FROM v", &[]).unwrap();
        assert_eq!(
            rows[0].values(),
            &[
                DatabaseValue::Int64(1),
                DatabaseValue::Float64(1.5),
                DatabaseValue::from("hi"),
                DatabaseValue::Bytes(vec![1, 2, 3]),
            ]
        );
    }
}
