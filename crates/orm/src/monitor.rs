//! Statement execution monitoring
//!
//! Every statement the engine issues is reported here with its kind, SQL
//! text and duration. The monitor logs it through `tracing` and keeps
//! per-kind statistics that callers can snapshot.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Kind of statement being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Select,
    Query,
    ExecuteUpdate,
    Ddl,
    Migration,
    Transaction,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Select => "select",
            OperationKind::Query => "query",
            OperationKind::ExecuteUpdate => "execute_update",
            OperationKind::Ddl => "ddl",
            OperationKind::Migration => "migration",
            OperationKind::Transaction => "transaction",
        };
        f.write_str(name)
    }
}

/// Aggregated timings for one operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl OperationStats {
    fn first(elapsed: Duration) -> Self {
        Self {
            count: 1,
            total: elapsed,
            min: elapsed,
            max: elapsed,
        }
    }

    fn add(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }

    pub fn average(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Shared sink for statement timings
#[derive(Debug)]
pub struct ExecutionMonitor {
    enabled: AtomicBool,
    show_sql: bool,
    slow_threshold: Option<Duration>,
    stats: DashMap<OperationKind, OperationStats>,
    slow_statements: AtomicU64,
}

impl Default for ExecutionMonitor {
    fn default() -> Self {
        Self::new(true, false, None)
    }
}

impl ExecutionMonitor {
    pub fn new(enabled: bool, show_sql: bool, slow_threshold: Option<Duration>) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            show_sql,
            slow_threshold,
            stats: DashMap::new(),
            slow_statements: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Report one executed statement
    pub fn record(&self, kind: OperationKind, sql: &str, elapsed: Duration) {
        if self.show_sql {
            info!(operation = %kind, elapsed_us = elapsed.as_micros() as u64, "{}", sql);
        } else {
            debug!(operation = %kind, elapsed_us = elapsed.as_micros() as u64, "{}", sql);
        }

        if let Some(threshold) = self.slow_threshold {
            if elapsed >= threshold {
                self.slow_statements.fetch_add(1, Ordering::Relaxed);
                warn!(
                    operation = %kind,
                    "Slow statement took {:?} (threshold {:?}): {}",
                    elapsed, threshold, sql
                );
            }
        }

        if !self.is_enabled() {
            return;
        }
        self.stats
            .entry(kind)
            .and_modify(|stats| stats.add(elapsed))
            .or_insert_with(|| OperationStats::first(elapsed));
    }

    /// Run `f`, timing it and reporting the statement
    pub fn time<R>(&self, kind: OperationKind, sql: &str, f: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let result = f();
        self.record(kind, sql, started.elapsed());
        result
    }

    pub fn stats(&self, kind: OperationKind) -> Option<OperationStats> {
        self.stats.get(&kind).map(|entry| *entry.value())
    }

    /// Copy of every statistic, ordered by operation kind
    pub fn snapshot(&self) -> Vec<(OperationKind, OperationStats)> {
        let mut all: Vec<_> = self
            .stats
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        all.sort_by_key(|(kind, _)| *kind);
        all
    }

    pub fn total_statements(&self) -> u64 {
        self.stats.iter().map(|entry| entry.value().count).sum()
    }

    /// Statements that exceeded the slow threshold
    pub fn slow_statements(&self) -> u64 {
        self.slow_statements.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.stats.clear();
        self.slow_statements.store(0, Ordering::Relaxed);
    }
}
