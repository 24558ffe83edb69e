//! Session factory
//!
//! Holds everything sessions share: the metadata registry, the dialect, the
//! connection provider, the execution monitor and the typed settings. Open
//! sessions are tracked weakly so [`SessionFactory::close`] can force them
//! closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Session, SessionContext, SessionCore};
use crate::backends::ConnectionProvider;
use crate::config::Settings;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::metadata::{Entity, EntityMetadata, EntityRegistry};
use crate::migrations::MigrationManager;
use crate::monitor::ExecutionMonitor;
use crate::schema::SchemaGenerator;

pub(crate) struct FactoryInner {
    pub(crate) registry: Arc<EntityRegistry>,
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) provider: Arc<dyn ConnectionProvider>,
    pub(crate) monitor: Arc<ExecutionMonitor>,
    pub(crate) settings: Settings,
    pub(crate) sessions: DashMap<Uuid, Weak<SessionCore>>,
    closed: AtomicBool,
}

/// Thread-safe source of sessions
#[derive(Clone)]
pub struct SessionFactory {
    inner: Arc<FactoryInner>,
}

impl SessionFactory {
    pub fn new(
        registry: Arc<EntityRegistry>,
        dialect: Arc<dyn Dialect>,
        provider: Arc<dyn ConnectionProvider>,
        monitor: Arc<ExecutionMonitor>,
        settings: Settings,
    ) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                registry,
                dialect,
                provider,
                monitor,
                settings,
                sessions: DashMap::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Open a new session; its connection is acquired on first use
    pub fn open_session(&self) -> OrmResult<Session> {
        if self.is_closed() {
            return Err(OrmError::FactoryClosed);
        }
        let core = Arc::new(SessionCore::new());
        self.inner.sessions.insert(core.id, Arc::downgrade(&core));

        // lost a race with close()
        if self.is_closed() {
            core.shutdown();
            self.inner.sessions.remove(&core.id);
            return Err(OrmError::FactoryClosed);
        }

        debug!("Opened session {}", core.id);
        Ok(Session::new(core, Arc::clone(&self.inner)))
    }

    /// The context's session, opening one if it has none or its session is closed
    pub fn current_session<'c>(&self, context: &'c mut SessionContext) -> OrmResult<&'c mut Session> {
        let reusable = context
            .session
            .as_ref()
            .is_some_and(|session| session.is_open() && session.belongs_to(&self.inner));
        if !reusable {
            context.session = Some(self.open_session()?);
        }
        context
            .session
            .as_mut()
            .ok_or_else(|| OrmError::Configuration("session context is empty".to_string()))
    }

    /// Close the factory and every session still open on it
    ///
    /// Active transactions are rolled back. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let cores: Vec<_> = self
            .inner
            .sessions
            .iter()
            .filter_map(|entry| entry.value().upgrade())
            .collect();
        self.inner.sessions.clear();

        let closed = cores.iter().filter(|core| core.shutdown()).count();
        info!("Session factory closed ({} open sessions force-closed)", closed);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet closed
    pub fn open_session_count(&self) -> usize {
        self.inner
            .sessions
            .iter()
            .filter(|entry| entry.value().upgrade().is_some_and(|core| core.is_open()))
            .count()
    }

    pub fn schema(&self) -> SchemaGenerator {
        SchemaGenerator::new(
            Arc::clone(&self.inner.registry),
            Arc::clone(&self.inner.dialect),
            Arc::clone(&self.inner.provider),
            Arc::clone(&self.inner.monitor),
            self.inner.settings.quote_identifiers,
        )
    }

    /// A fresh migration manager on this factory's connection source
    pub fn migrations(&self) -> MigrationManager {
        MigrationManager::new(
            Arc::clone(&self.inner.dialect),
            Arc::clone(&self.inner.provider),
            Arc::clone(&self.inner.monitor),
        )
    }

    pub fn metadata<T: Entity>(&self) -> OrmResult<Arc<EntityMetadata>> {
        self.inner.registry.get_for::<T>().cloned()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.inner.registry
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.inner.dialect
    }

    pub fn monitor(&self) -> &Arc<ExecutionMonitor> {
        &self.inner.monitor
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("dialect", &self.inner.dialect.name())
            .field("provider", &self.inner.provider.describe())
            .field("entities", &self.inner.registry.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
