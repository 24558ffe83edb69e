//! Query Builder Module - dialect-aware SELECT assembly, named parameter
//! binding and typed raw-SQL queries

pub mod builder;
pub mod ordering;
pub mod pagination;
pub mod params;
pub mod select;
pub mod sql_generation;
pub mod typed;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use params::{bind_named, BoundStatement};
pub use typed::TypedQuery;
pub use types::{OrderClause, OrderDirection, WhereFragment};
