//! Query Builder - Core builder implementation
//!
//! The builder only assembles SQL text; it never touches a connection.
//! Named parameter values are collected alongside for the caller to bind.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::types::*;
use crate::backends::DatabaseValue;
use crate::dialect::Dialect;
use crate::metadata::EntityMetadata;

/// Dialect-aware SELECT builder
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) table: String,
    pub(crate) alias: Option<String>,
    pub(crate) mapped_columns: Vec<String>,
    pub(crate) select_fields: Vec<String>,
    pub(crate) distinct: bool,
    pub(crate) where_fragments: Vec<WhereFragment>,
    pub(crate) order_by: Vec<OrderClause>,
    pub(crate) limit_count: Option<u64>,
    pub(crate) offset_value: Option<u64>,
    pub(crate) parameters: BTreeMap<String, DatabaseValue>,
}

impl QueryBuilder {
    /// Builder over a plain table; an omitted column list selects `*`
    pub fn new(dialect: Arc<dyn Dialect>, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
            alias: None,
            mapped_columns: Vec::new(),
            select_fields: Vec::new(),
            distinct: false,
            where_fragments: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
            parameters: BTreeMap::new(),
        }
    }

    /// Builder over an entity's table; an omitted column list selects every
    /// mapped column
    pub fn for_entity(dialect: Arc<dyn Dialect>, meta: &EntityMetadata) -> Self {
        let mut builder = Self::new(dialect, meta.full_table_name());
        builder.mapped_columns = meta
            .select_column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        builder
    }

    /// Record a named parameter value for a `:name` placeholder
    pub fn set_parameter(mut self, name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Collected named parameters
    pub fn parameters(&self) -> &BTreeMap<String, DatabaseValue> {
        &self.parameters
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}
