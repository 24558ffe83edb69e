//! Transaction Management
//!
//! A [`Transaction`] is a handle onto the single transaction a session may
//! have open. It shares the session's connection; commit and rollback are
//! only valid while the transaction is active.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::SessionCore;
use crate::error::{OrmError, OrmResult};
use crate::monitor::{ExecutionMonitor, OperationKind};

/// Transaction lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionStatus {
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "active"),
            TransactionStatus::Committed => write!(f, "committed"),
            TransactionStatus::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// Handle to a session's transaction
#[derive(Clone)]
pub struct Transaction {
    core: Arc<SessionCore>,
    status: Arc<Mutex<TransactionStatus>>,
    monitor: Arc<ExecutionMonitor>,
}

impl Transaction {
    pub(crate) fn new(
        core: Arc<SessionCore>,
        status: Arc<Mutex<TransactionStatus>>,
        monitor: Arc<ExecutionMonitor>,
    ) -> Self {
        Self {
            core,
            status,
            monitor,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        *self.status.lock()
    }

    pub fn is_active(&self) -> bool {
        self.status() == TransactionStatus::Active
    }

    /// Commit and restore auto-commit
    pub fn commit(&self) -> OrmResult<()> {
        self.finish(TransactionStatus::Committed)
    }

    /// Roll back and restore auto-commit
    pub fn rollback(&self) -> OrmResult<()> {
        self.finish(TransactionStatus::RolledBack)
    }

    fn finish(&self, outcome: TransactionStatus) -> OrmResult<()> {
        let verb = match outcome {
            TransactionStatus::Committed => "commit",
            _ => "roll back",
        };
        let mut state = self.core.state.lock();
        let mut status = self.status.lock();
        if *status != TransactionStatus::Active {
            return Err(OrmError::transaction(format!(
                "cannot {} a transaction that is already {}",
                verb, *status
            )));
        }

        let connection = state.connection.as_mut().ok_or_else(|| {
            OrmError::transaction(format!("cannot {}: the session has no connection", verb))
        })?;

        let started = Instant::now();
        let result = match outcome {
            TransactionStatus::Committed => connection.commit(),
            _ => connection.rollback(),
        };
        let statement = if outcome == TransactionStatus::Committed { "COMMIT" } else { "ROLLBACK" };
        self.monitor
            .record(OperationKind::Transaction, statement, started.elapsed());

        match result {
            Ok(()) => {
                *status = outcome;
                state.transaction = None;
                debug!("Session {} transaction {}", self.core.id, outcome);
                Ok(())
            }
            Err(e) => {
                // a failed commit leaves the transaction open on the connection
                if !connection.in_transaction() {
                    *status = TransactionStatus::RolledBack;
                    state.transaction = None;
                }
                Err(OrmError::transaction_failed(format!("failed to {}", verb), e))
            }
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("session", &self.core.id)
            .field("status", &self.status())
            .finish()
    }
}
