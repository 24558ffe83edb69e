//! Database Backend Abstractions
//!
//! The engine is written against the traits in [`core`]; [`sqlite`] is the
//! bundled implementation. Other databases plug in by implementing
//! [`ConnectionProvider`] and handing it to the configuration.

pub mod core;
pub mod sqlite;

// Re-export core traits and types
pub use self::core::*;
pub use sqlite::{SqliteConnection, SqlitePool, SqliteProvider};
