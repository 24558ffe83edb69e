//! Migration Runner - applies registered migrations and tracks them in
//! `schema_migrations`
//!
//! Each migration runs in its own transaction together with its tracking
//! insert. The first failure rolls that migration back and aborts the run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::definitions::{Migration, MigrationRunResult, MigrationStatus};
use crate::backends::{ConnectionProvider, DatabaseConnection, DatabaseValue};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::metadata::ColumnValue;
use crate::monitor::{ExecutionMonitor, OperationKind};

/// Name of the tracking table
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

/// Ordered set of migrations bound to a connection source
pub struct MigrationManager {
    dialect: Arc<dyn Dialect>,
    provider: Arc<dyn ConnectionProvider>,
    monitor: Arc<ExecutionMonitor>,
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationManager {
    pub fn new(
        dialect: Arc<dyn Dialect>,
        provider: Arc<dyn ConnectionProvider>,
        monitor: Arc<ExecutionMonitor>,
    ) -> Self {
        Self {
            dialect,
            provider,
            monitor,
            migrations: Vec::new(),
        }
    }

    /// Append a migration; versions must be unique
    pub fn register(&mut self, migration: impl Migration + 'static) -> OrmResult<&mut Self> {
        if self.find(migration.version()).is_some() {
            return Err(OrmError::Configuration(format!(
                "migration version `{}` is already registered",
                migration.version()
            )));
        }
        self.migrations.push(Box::new(migration));
        Ok(self)
    }

    /// Registered versions in application order
    pub fn versions(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.version()).collect()
    }

    fn find(&self, version: &str) -> Option<&dyn Migration> {
        self.migrations
            .iter()
            .find(|m| m.version() == version)
            .map(|m| m.as_ref())
    }

    fn connect(&self) -> OrmResult<Box<dyn DatabaseConnection>> {
        self.provider.acquire().map_err(OrmError::Connection)
    }

    pub fn create_migrations_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (version VARCHAR(255) PRIMARY KEY, applied_at TIMESTAMP DEFAULT {})",
            MIGRATIONS_TABLE,
            self.dialect.current_timestamp()
        )
    }

    fn ensure_table(&self, conn: &mut dyn DatabaseConnection) -> OrmResult<()> {
        let sql = self.create_migrations_table_sql();
        self.monitor
            .time(OperationKind::Ddl, &sql, || conn.execute(&sql, &[]))
            .map_err(|e| OrmError::query(sql.as_str(), e))?;
        Ok(())
    }

    fn load_applied(&self, conn: &mut dyn DatabaseConnection) -> OrmResult<HashMap<String, Option<DateTime<Utc>>>> {
        let sql = format!("SELECT version, applied_at FROM {}", MIGRATIONS_TABLE);
        let rows = self
            .monitor
            .time(OperationKind::Select, &sql, || conn.fetch_all(&sql, &[]))
            .map_err(|e| OrmError::query(sql.as_str(), e))?;

        let mut applied = HashMap::with_capacity(rows.len());
        for row in rows {
            let Some(version) = row.get_by_index(0).and_then(|v| v.as_str()).map(str::to_string) else {
                continue;
            };
            let applied_at = row
                .get_by_index(1)
                .cloned()
                .and_then(|value| Option::<DateTime<Utc>>::from_value(value).ok().flatten());
            applied.insert(version, applied_at);
        }
        Ok(applied)
    }

    /// Apply every registered migration not yet recorded
    pub fn migrate(&self) -> OrmResult<MigrationRunResult> {
        let started = Instant::now();
        let mut conn = self.connect()?;
        self.ensure_table(conn.as_mut())?;
        let applied: HashSet<String> = self.load_applied(conn.as_mut())?.into_keys().collect();

        let mut applied_migrations = Vec::new();
        let mut skipped_count = 0;
        for migration in &self.migrations {
            if applied.contains(migration.version()) {
                skipped_count += 1;
                continue;
            }
            info!(
                "Applying migration: {} - {}",
                migration.version(),
                migration.description()
            );
            self.apply(conn.as_mut(), migration.as_ref())?;
            applied_migrations.push(migration.version().to_string());
        }

        if !applied_migrations.is_empty() {
            info!("Applied {} migrations", applied_migrations.len());
        }
        Ok(MigrationRunResult {
            applied_count: applied_migrations.len(),
            applied_migrations,
            skipped_count,
            execution_time_ms: started.elapsed().as_millis(),
        })
    }

    fn apply(&self, conn: &mut dyn DatabaseConnection, migration: &dyn Migration) -> OrmResult<()> {
        let version = migration.version();
        let insert = format!(
            "INSERT INTO {} (version) VALUES ({})",
            MIGRATIONS_TABLE,
            self.dialect.placeholder(1)
        );
        self.in_transaction(conn, version, |conn| {
            migration.up(conn, self.dialect.as_ref())?;
            conn.execute(&insert, &[DatabaseValue::from(version)])
                .map_err(|e| OrmError::query(insert.as_str(), e))?;
            Ok(())
        })
    }

    /// Run `work` in a transaction; any failure rolls back and is reported
    /// against `version`
    fn in_transaction(
        &self,
        conn: &mut dyn DatabaseConnection,
        version: &str,
        work: impl FnOnce(&mut dyn DatabaseConnection) -> OrmResult<()>,
    ) -> OrmResult<()> {
        let failed = |source: OrmError| OrmError::Migration {
            version: version.to_string(),
            source: Box::new(source),
        };

        conn.begin()
            .map_err(|e| failed(OrmError::transaction_failed("failed to begin", e)))?;

        let outcome = self
            .monitor
            .time(OperationKind::Migration, version, || work(&mut *conn));
        match outcome {
            Ok(()) => conn
                .commit()
                .map_err(|e| failed(OrmError::transaction_failed("failed to commit", e))),
            Err(e) => {
                if let Err(rollback) = conn.rollback() {
                    warn!("Failed to roll back migration {}: {}", version, rollback);
                }
                Err(failed(e))
            }
        }
    }

    /// Every registered migration with its applied-at timestamp
    pub fn status(&self) -> OrmResult<Vec<MigrationStatus>> {
        let mut conn = self.connect()?;
        self.ensure_table(conn.as_mut())?;
        let mut applied = self.load_applied(conn.as_mut())?;
        Ok(self
            .migrations
            .iter()
            .map(|m| MigrationStatus {
                version: m.version().to_string(),
                description: m.description().to_string(),
                applied_at: applied.remove(m.version()).flatten(),
            })
            .collect())
    }

    /// Recorded versions, in registration order for registered ones
    pub fn applied_versions(&self) -> OrmResult<Vec<String>> {
        let mut conn = self.connect()?;
        self.ensure_table(conn.as_mut())?;
        let applied = self.load_applied(conn.as_mut())?;

        let mut versions: Vec<String> = self
            .migrations
            .iter()
            .map(|m| m.version())
            .filter(|v| applied.contains_key(*v))
            .map(str::to_string)
            .collect();
        let mut unknown: Vec<String> = applied
            .into_keys()
            .filter(|v| self.find(v).is_none())
            .collect();
        unknown.sort();
        versions.extend(unknown);
        Ok(versions)
    }

    /// Run the reverse operation of an applied migration and forget it
    pub fn rollback(&self, version: &str) -> OrmResult<()> {
        let migration = self.find(version).ok_or_else(|| {
            OrmError::Configuration(format!("migration version `{}` is not registered", version))
        })?;
        if !migration.is_reversible() {
            return Err(OrmError::Unsupported(format!(
                "migration `{}` has no reverse operation",
                version
            )));
        }

        let mut conn = self.connect()?;
        self.ensure_table(conn.as_mut())?;
        if !self.load_applied(conn.as_mut())?.contains_key(version) {
            return Err(OrmError::Migration {
                version: version.to_string(),
                source: Box::new(OrmError::Configuration("migration is not applied".to_string())),
            });
        }

        let delete = format!(
            "DELETE FROM {} WHERE version = {}",
            MIGRATIONS_TABLE,
            self.dialect.placeholder(1)
        );
        self.in_transaction(conn.as_mut(), version, |conn| {
            migration.down(conn, self.dialect.as_ref())?;
            conn.execute(&delete, &[DatabaseValue::from(version)])
                .map_err(|e| OrmError::query(delete.as_str(), e))?;
            Ok(())
        })?;
        info!("Rolled back migration {}", version);
        Ok(())
    }

    /// Roll back the latest-registered applied migration, if any
    pub fn rollback_last(&self) -> OrmResult<Option<String>> {
        let applied = self.applied_versions()?;
        let last = self
            .migrations
            .iter()
            .rev()
            .map(|m| m.version())
            .find(|v| applied.iter().any(|a| a.as_str() == *v));
        match last {
            Some(version) => {
                self.rollback(version)?;
                Ok(Some(version.to_string()))
            }
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for MigrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationManager")
            .field("dialect", &self.dialect.name())
            .field("migrations", &self.versions())
            .finish()
    }
}
