//! Query Builder SELECT operations

use super::builder::QueryBuilder;

impl QueryBuilder {
    /// Add SELECT fields to the query (comma-separated)
    pub fn select(mut self, fields: &str) -> Self {
        self.select_fields.extend(
            fields
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(str::to_string),
        );
        self
    }

    /// Add SELECT DISTINCT to the query
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Alias for the table; default columns are qualified with it
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}
