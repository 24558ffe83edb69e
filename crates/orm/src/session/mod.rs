//! Session / Transaction Engine
//!
//! A [`Session`] is one unit of work bound to one connection, acquired
//! lazily from the factory's provider on first use. Every mutation executes
//! immediately; the per-session identity cache guarantees one live instance
//! per row for the session's lifetime.

pub mod context;
pub mod factory;
mod hydration;
mod identity;
mod statements;
pub mod transaction;

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backends::{DatabaseConnection, DatabaseRow, DatabaseValue};
use crate::config::RelationshipPolicy;
use crate::dialect::Dialect;
use crate::error::{DatabaseError, OrmError, OrmResult};
use crate::metadata::{
    AnyRef, Entity, EntityMetadata, EntityRef, GenerationType, RelationshipMetadata,
};
use crate::monitor::OperationKind;
use crate::query::{bind_named, QueryBuilder, TypedQuery};

pub use context::SessionContext;
pub use factory::SessionFactory;
pub use transaction::{Transaction, TransactionStatus};

use factory::FactoryInner;
use identity::IdentityCache;
use statements::EntityStatements;

/// Connection and transaction state shared with [`Transaction`] handles
pub(crate) struct CoreState {
    pub(crate) connection: Option<Box<dyn DatabaseConnection>>,
    pub(crate) open: bool,
    pub(crate) transaction: Option<Arc<Mutex<TransactionStatus>>>,
}

pub(crate) struct SessionCore {
    pub(crate) id: Uuid,
    pub(crate) state: Mutex<CoreState>,
}

impl SessionCore {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(CoreState {
                connection: None,
                open: true,
                transaction: None,
            }),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Roll back any active transaction and release the connection
    ///
    /// Returns false when the session was already closed.
    pub(crate) fn shutdown(&self) -> bool {
        let mut state = self.state.lock();
        if !state.open {
            return false;
        }
        state.open = false;

        if let Some(status) = state.transaction.take() {
            let mut status = status.lock();
            if *status == TransactionStatus::Active {
                if let Some(connection) = state.connection.as_mut() {
                    if let Err(e) = connection.rollback() {
                        warn!("Session {} failed to roll back on close: {}", self.id, e);
                    }
                }
                *status = TransactionStatus::RolledBack;
                debug!("Session {} rolled back its active transaction on close", self.id);
            }
        }

        state.connection = None;
        true
    }
}

/// One unit of work against the database
pub struct Session {
    core: Arc<SessionCore>,
    shared: Arc<FactoryInner>,
    cache: IdentityCache,
}

impl Session {
    pub(crate) fn new(core: Arc<SessionCore>, shared: Arc<FactoryInner>) -> Self {
        Self {
            core,
            shared,
            cache: IdentityCache::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    pub fn is_open(&self) -> bool {
        self.core.is_open()
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.shared.dialect
    }

    pub(crate) fn belongs_to(&self, factory: &Arc<FactoryInner>) -> bool {
        Arc::ptr_eq(&self.shared, factory)
    }

    /// Metadata of a registered entity type
    pub fn metadata<T: Entity>(&self) -> OrmResult<Arc<EntityMetadata>> {
        self.shared.registry.get_for::<T>().cloned()
    }

    fn statements<'a>(&'a self, meta: &'a EntityMetadata) -> EntityStatements<'a> {
        EntityStatements::new(meta, self.shared.dialect.as_ref(), self.shared.settings.quote_identifiers)
    }

    fn connect<'s>(&self, state: &'s mut CoreState) -> OrmResult<&'s mut Box<dyn DatabaseConnection>> {
        if !state.open {
            return Err(OrmError::SessionClosed);
        }
        if state.connection.is_none() {
            let connection = self
                .shared
                .provider
                .acquire()
                .map_err(OrmError::Connection)?;
            debug!(
                "Session {} acquired a connection from {}",
                self.core.id,
                self.shared.provider.describe()
            );
            state.connection = Some(connection);
        }
        state.connection.as_mut().ok_or(OrmError::SessionClosed)
    }

    /// Run one statement on the session's connection, timed by the monitor
    fn execute_on<R>(
        &self,
        kind: OperationKind,
        sql: &str,
        op: impl FnOnce(&mut dyn DatabaseConnection) -> Result<R, DatabaseError>,
        on_error: impl FnOnce(DatabaseError) -> OrmError,
    ) -> OrmResult<R> {
        let mut state = self.core.state.lock();
        let connection = self.connect(&mut state)?;
        self.shared
            .monitor
            .time(kind, sql, || op(connection.as_mut()))
            .map_err(on_error)
    }

    fn fetch(
        &self,
        kind: OperationKind,
        sql: &str,
        params: &[DatabaseValue],
        on_error: impl FnOnce(DatabaseError) -> OrmError,
    ) -> OrmResult<Vec<DatabaseRow>> {
        self.execute_on(kind, sql, |conn| conn.fetch_all(sql, params), on_error)
    }

    fn execute(
        &self,
        kind: OperationKind,
        sql: &str,
        params: &[DatabaseValue],
        on_error: impl FnOnce(DatabaseError) -> OrmError,
    ) -> OrmResult<u64> {
        self.execute_on(kind, sql, |conn| conn.execute(sql, params), on_error)
    }

    /// Insert a new row for `entity` and cache it under its key
    ///
    /// Generated keys are left out of the INSERT and written back into the
    /// entity afterwards.
    pub fn save<T: Entity>(&mut self, entity: &EntityRef<T>) -> OrmResult<()> {
        let shared = Arc::clone(&self.shared);
        let meta = shared.registry.get_for::<T>()?;
        self.save_erased(meta, &entity.clone().into_any())
    }

    fn save_erased(&mut self, meta: &EntityMetadata, instance: &AnyRef) -> OrmResult<()> {
        let shared = Arc::clone(&self.shared);
        let mut state = hydration::read_state(meta, &shared.registry, instance)?;
        let pk = meta.primary_key();
        let entity = meta.entity_name();

        let post_insert_key = match pk.generation() {
            Some(GenerationType::Sequence) if state.key.is_null() => {
                let sequence = pk
                    .generator()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}_seq", meta.table_name()));
                let sql = shared.dialect.sequence_next_value_sql(&sequence)?;
                let rows = self.fetch(OperationKind::Select, &sql, &[], |e| {
                    OrmError::persistence("generate key for", entity, sql.as_str(), e)
                })?;
                let key = first_value(rows).ok_or_else(|| {
                    OrmError::mapping(entity, format!("sequence `{}` returned no value", sequence))
                })?;
                hydration::write_key(meta, instance, key.clone())?;
                state.key = key;
                false
            }
            Some(GenerationType::Sequence) => false,
            Some(_) => true,
            None if state.key.is_null() => {
                return Err(OrmError::MissingKey {
                    operation: "save",
                    entity: entity.to_string(),
                });
            }
            None => false,
        };

        let mut columns = Vec::new();
        let mut values = Vec::new();
        if !post_insert_key {
            columns.push(pk.name().to_string());
            values.push(state.key.clone());
        }
        for (column, value) in state.columns.into_iter().chain(state.joins) {
            columns.push(column);
            values.push(value);
        }

        let statements = self.statements(meta);
        let sql = statements.insert(&columns);
        self.execute(OperationKind::Insert, &sql, &values, |e| {
            OrmError::persistence("save", entity, sql.as_str(), e)
        })?;

        let key = if post_insert_key {
            let sql = statements.identity_select();
            let rows = self.fetch(OperationKind::Select, &sql, &[], |e| {
                OrmError::persistence("read generated key of", entity, sql.as_str(), e)
            })?;
            let key = first_value(rows)
                .filter(|value| !value.is_null())
                .ok_or_else(|| OrmError::mapping(entity, "database returned no generated key"))?;
            hydration::write_key(meta, instance, key.clone())?;
            key
        } else {
            state.key
        };

        debug!("Saved {} with key {}", entity, key);
        if let Some(key) = pk.identity_key(&key) {
            self.cache.insert(meta.type_id(), key, Arc::clone(instance));
        }
        Ok(())
    }

    /// Write every non-key column and foreign key of `entity` to its row
    pub fn update<T: Entity>(&mut self, entity: &EntityRef<T>) -> OrmResult<()> {
        let shared = Arc::clone(&self.shared);
        let meta = shared.registry.get_for::<T>()?;
        self.update_erased(meta, &entity.clone().into_any())
    }

    fn update_erased(&mut self, meta: &EntityMetadata, instance: &AnyRef) -> OrmResult<()> {
        let state = hydration::read_state(meta, &self.shared.registry, instance)?;
        let entity = meta.entity_name();
        if state.key.is_null() {
            return Err(OrmError::MissingKey {
                operation: "update",
                entity: entity.to_string(),
            });
        }

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (column, value) in state.columns.into_iter().chain(state.joins) {
            columns.push(column);
            values.push(value);
        }
        if columns.is_empty() {
            debug!("{} has no columns besides its key; nothing to update", entity);
            return Ok(());
        }
        values.push(state.key.clone());

        let sql = self.statements(meta).update(&columns);
        let affected = self.execute(OperationKind::Update, &sql, &values, |e| {
            OrmError::persistence("update", entity, sql.as_str(), e)
        })?;
        if affected == 0 {
            debug!("Update of {} with key {} matched no row", entity, state.key);
        }
        Ok(())
    }

    /// Update when a row with the entity's key exists, otherwise save
    pub fn save_or_update<T: Entity>(&mut self, entity: &EntityRef<T>) -> OrmResult<()> {
        let shared = Arc::clone(&self.shared);
        let meta = shared.registry.get_for::<T>()?;
        let instance = entity.clone().into_any();
        let key = hydration::read_key(meta, &instance)?;
        if key.is_null() {
            return self.save_erased(meta, &instance);
        }

        let sql = self.statements(meta).count_by_id();
        let rows = self.fetch(OperationKind::Select, &sql, std::slice::from_ref(&key), |e| {
            OrmError::persistence("check existence of", meta.entity_name(), sql.as_str(), e)
        })?;
        let exists = first_value(rows)
            .and_then(|count| count.as_i64())
            .unwrap_or(0)
            > 0;

        if exists {
            self.update_erased(meta, &instance)
        } else {
            self.save_erased(meta, &instance)
        }
    }

    /// Delete the entity's row and evict it from the cache
    pub fn delete<T: Entity>(&mut self, entity: &EntityRef<T>) -> OrmResult<()> {
        let shared = Arc::clone(&self.shared);
        let meta = shared.registry.get_for::<T>()?;
        let key = hydration::read_key(meta, &entity.clone().into_any())?;
        if key.is_null() {
            return Err(OrmError::MissingKey {
                operation: "delete",
                entity: meta.entity_name().to_string(),
            });
        }

        let sql = self.statements(meta).delete();
        self.execute(OperationKind::Delete, &sql, std::slice::from_ref(&key), |e| {
            OrmError::persistence("delete", meta.entity_name(), sql.as_str(), e)
        })?;

        if let Some(key) = meta.primary_key().identity_key(&key) {
            self.cache.remove(meta.type_id(), &key);
        }
        debug!("Deleted {} with key {}", meta.entity_name(), key);
        Ok(())
    }

    /// Load one entity by primary key; `None` when no row matches
    pub fn find_by_id<T: Entity>(&mut self, id: impl Into<DatabaseValue>) -> OrmResult<Option<EntityRef<T>>> {
        let shared = Arc::clone(&self.shared);
        let meta = shared.registry.get_for::<T>()?;
        self.find_erased(meta, id.into())?
            .map(|any| downcast::<T>(meta, any))
            .transpose()
    }

    fn find_erased(&mut self, meta: &EntityMetadata, id: DatabaseValue) -> OrmResult<Option<AnyRef>> {
        if id.is_null() {
            return Ok(None);
        }
        if let Some(key) = meta.primary_key().identity_key(&id) {
            if let Some(hit) = self.cache.get(meta.type_id(), &key) {
                return Ok(Some(hit));
            }
        }

        let sql = self.statements(meta).select_by_id();
        let rows = self.fetch(OperationKind::Select, &sql, std::slice::from_ref(&id), |e| {
            OrmError::persistence("load", meta.entity_name(), sql.as_str(), e)
        })?;
        match rows.into_iter().next() {
            Some(row) => self.hydrate_row(meta, &row, true).map(Some),
            None => Ok(None),
        }
    }

    /// Load one entity by an arbitrary column, through the cache
    fn find_by_column(
        &mut self,
        meta: &EntityMetadata,
        column: &str,
        value: DatabaseValue,
    ) -> OrmResult<Option<AnyRef>> {
        if meta.primary_key().name().eq_ignore_ascii_case(column) {
            return self.find_erased(meta, value);
        }
        let sql = self.statements(meta).select_by(column);
        let rows = self.fetch(OperationKind::Select, &sql, std::slice::from_ref(&value), |e| {
            OrmError::persistence("load", meta.entity_name(), sql.as_str(), e)
        })?;
        match rows.into_iter().next() {
            Some(row) => self.hydrate_row(meta, &row, true).map(Some),
            None => Ok(None),
        }
    }

    /// Map one row onto an instance and resolve its owning relationships
    ///
    /// With `use_cache` an existing instance for the row's key wins, and a new
    /// one is cached before its relationships are resolved so cycles end in
    /// cache hits.
    fn hydrate_row(&mut self, meta: &EntityMetadata, row: &DatabaseRow, use_cache: bool) -> OrmResult<AnyRef> {
        let key = row
            .get_by_name(meta.primary_key().name())
            .and_then(|value| meta.primary_key().identity_key(value));
        if use_cache {
            if let Some(hit) = key.as_ref().and_then(|key| self.cache.get(meta.type_id(), key)) {
                return Ok(hit);
            }
        }

        let instance = hydration::instantiate(meta, row)?;
        let cached_key = match key {
            Some(key) if use_cache => {
                self.cache.insert(meta.type_id(), key.clone(), Arc::clone(&instance));
                Some(key)
            }
            _ => None,
        };

        for relationship in meta.owning_relationships() {
            if let Err(e) = self.resolve_relationship(meta, relationship, row, &instance) {
                match self.shared.settings.relationship_policy {
                    RelationshipPolicy::BestEffort => {
                        warn!("Leaving relationship unset: {}", e);
                    }
                    RelationshipPolicy::FailFast => {
                        if let Some(key) = &cached_key {
                            self.cache.remove(meta.type_id(), key);
                        }
                        return Err(e);
                    }
                }
            }
        }
        Ok(instance)
    }

    fn resolve_relationship(
        &mut self,
        meta: &EntityMetadata,
        relationship: &RelationshipMetadata,
        row: &DatabaseRow,
        instance: &AnyRef,
    ) -> OrmResult<()> {
        let Some(join_column) = relationship.join_column() else {
            return Ok(());
        };
        let foreign_key = match row.get_by_name(join_column) {
            Some(value) if !value.is_null() => value.clone(),
            _ => return Ok(()),
        };

        let failed = |source: OrmError| OrmError::Relationship {
            entity: meta.entity_name().to_string(),
            field: relationship.field().to_string(),
            key: foreign_key.to_string(),
            source: Box::new(source),
        };

        let shared = Arc::clone(&self.shared);
        let target_meta = shared
            .registry
            .require(relationship.target(), relationship.target_name())
            .map_err(failed)?;
        let target = self
            .find_by_column(target_meta, relationship.referenced_column(), foreign_key.clone())
            .map_err(failed)?;

        match target {
            Some(target) => {
                hydration::write_relationship(meta, relationship, instance, target).map_err(failed)
            }
            None => {
                warn!(
                    "{}.{} references missing {} with key {}",
                    meta.entity_name(),
                    relationship.field(),
                    target_meta.entity_name(),
                    foreign_key
                );
                Ok(())
            }
        }
    }

    /// Load every row of an entity's table, warming the cache
    pub fn find_all<T: Entity>(&mut self) -> OrmResult<Vec<EntityRef<T>>> {
        let shared = Arc::clone(&self.shared);
        let meta = shared.registry.get_for::<T>()?;
        let sql = self.statements(meta).select_all();
        let rows = self.fetch(OperationKind::Select, &sql, &[], |e| {
            OrmError::persistence("load all", meta.entity_name(), sql.as_str(), e)
        })?;
        rows.iter()
            .map(|row| self.hydrate_row(meta, row, true).and_then(|any| downcast::<T>(meta, any)))
            .collect()
    }

    /// Run caller-supplied SQL and map every row onto `T`, bypassing the cache
    pub fn create_query<T: Entity>(&mut self, sql: &str) -> OrmResult<Vec<EntityRef<T>>> {
        self.create_query_with_params(sql, &[])
    }

    /// [`Session::create_query`] with positionally bound parameters
    pub fn create_query_with_params<T: Entity>(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Vec<EntityRef<T>>> {
        let shared = Arc::clone(&self.shared);
        let meta = shared.registry.get_for::<T>()?;
        let rows = self.fetch(OperationKind::Query, sql, params, |e| OrmError::query(sql, e))?;
        rows.iter()
            .map(|row| self.hydrate_row(meta, row, false).and_then(|any| downcast::<T>(meta, any)))
            .collect()
    }

    /// Run arbitrary SQL and return the affected-row count
    pub fn execute_update(&mut self, sql: &str) -> OrmResult<u64> {
        self.execute_update_with_params(sql, &[])
    }

    pub fn execute_update_with_params(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        self.execute(OperationKind::ExecuteUpdate, sql, params, |e| OrmError::query(sql, e))
    }

    /// Typed query over caller-supplied SQL with `:name` parameters
    pub fn query<T: Entity>(&mut self, sql: impl Into<String>) -> TypedQuery<'_, T> {
        TypedQuery::new(self, sql.into())
    }

    /// Query builder over the entity's table and mapped columns
    pub fn query_builder<T: Entity>(&self) -> OrmResult<QueryBuilder> {
        let meta = self.shared.registry.get_for::<T>()?;
        Ok(QueryBuilder::for_entity(Arc::clone(&self.shared.dialect), meta))
    }

    /// Run a built query, binding its named parameters
    pub fn execute_builder<T: Entity>(&mut self, builder: &QueryBuilder) -> OrmResult<Vec<EntityRef<T>>> {
        let bound = bind_named(&builder.build(), builder.parameters(), self.shared.dialect.as_ref())?;
        self.create_query_with_params(&bound.sql, &bound.values)
    }

    /// Start a transaction; fails while another one is active
    pub fn begin_transaction(&mut self) -> OrmResult<Transaction> {
        let mut state = self.core.state.lock();
        if !state.open {
            return Err(OrmError::SessionClosed);
        }
        if let Some(status) = &state.transaction {
            if *status.lock() == TransactionStatus::Active {
                return Err(OrmError::transaction("a transaction is already active"));
            }
        }

        let connection = self.connect(&mut state)?;
        let started = Instant::now();
        let result = connection.begin();
        self.shared
            .monitor
            .record(OperationKind::Transaction, "BEGIN", started.elapsed());
        result.map_err(|e| OrmError::transaction_failed("failed to begin", e))?;

        let status = Arc::new(Mutex::new(TransactionStatus::Active));
        state.transaction = Some(Arc::clone(&status));
        debug!("Session {} began a transaction", self.core.id);
        Ok(Transaction::new(
            Arc::clone(&self.core),
            status,
            Arc::clone(&self.shared.monitor),
        ))
    }

    /// Handle to the active transaction, if any
    pub fn transaction(&self) -> Option<Transaction> {
        let state = self.core.state.lock();
        state.transaction.as_ref().map(|status| {
            Transaction::new(
                Arc::clone(&self.core),
                Arc::clone(status),
                Arc::clone(&self.shared.monitor),
            )
        })
    }

    /// Mutations are applied immediately, so there is nothing to flush
    pub fn flush(&self) -> OrmResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(OrmError::SessionClosed)
        }
    }

    /// Empty the identity cache
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Whether an instance of `T` with key `id` is cached
    pub fn contains<T: Entity>(&self, id: impl Into<DatabaseValue>) -> bool {
        let Ok(meta) = self.shared.registry.get_for::<T>() else {
            return false;
        };
        meta.primary_key()
            .identity_key(&id.into())
            .is_some_and(|key| self.cache.contains(meta.type_id(), &key))
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Roll back any active transaction, release the connection and drop the cache
    pub fn close(&mut self) {
        if self.core.shutdown() {
            debug!("Session {} closed", self.core.id);
        }
        self.cache.clear();
        self.shared.sessions.remove(&self.core.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.core.id)
            .field("open", &self.is_open())
            .field("cached", &self.cache.len())
            .finish()
    }
}

fn first_value(rows: Vec<DatabaseRow>) -> Option<DatabaseValue> {
    rows.into_iter()
        .next()
        .and_then(|row| row.into_values().into_iter().next())
}

fn downcast<T: Entity>(meta: &EntityMetadata, any: AnyRef) -> OrmResult<EntityRef<T>> {
    EntityRef::from_any(any)
        .ok_or_else(|| OrmError::mapping(meta.entity_name(), "instance belongs to another entity type"))
}
