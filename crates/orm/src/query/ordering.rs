//! Query Builder ORDER BY operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add ORDER BY clause with an explicit direction
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push(OrderClause {
            column: column.to_string(),
            direction,
        });
        self
    }

    /// Add ORDER BY clause (ascending)
    pub fn order_by_asc(self, column: &str) -> Self {
        self.order_by(column, OrderDirection::Asc)
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, OrderDirection::Desc)
    }
}
