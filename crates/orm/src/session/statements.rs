//! CRUD statement text for one entity

use crate::dialect::Dialect;
use crate::metadata::EntityMetadata;
use crate::schema::{identifier, qualified_table};

/// Renders the statements the session issues against one entity table
pub(crate) struct EntityStatements<'a> {
    meta: &'a EntityMetadata,
    dialect: &'a dyn Dialect,
    quote: bool,
}

impl<'a> EntityStatements<'a> {
    pub(crate) fn new(meta: &'a EntityMetadata, dialect: &'a dyn Dialect, quote: bool) -> Self {
        Self {
            meta,
            dialect,
            quote,
        }
    }

    fn ident(&self, name: &str) -> String {
        identifier(self.dialect, name, self.quote)
    }

    fn table(&self) -> String {
        qualified_table(self.meta, self.dialect, self.quote)
    }

    fn key(&self) -> String {
        self.ident(self.meta.primary_key().name())
    }

    fn select_list(&self) -> String {
        self.meta
            .select_column_names()
            .into_iter()
            .map(|name| self.ident(name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn insert(&self, columns: &[String]) -> String {
        if columns.is_empty() {
            return self.dialect.empty_insert_sql(&self.table());
        }
        let names = columns.iter().map(|c| self.ident(c)).collect::<Vec<_>>();
        let markers = (1..=columns.len())
            .map(|index| self.dialect.placeholder(index))
            .collect::<Vec<_>>();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            names.join(", "),
            markers.join(", ")
        )
    }

    /// UPDATE of `columns`; the key is bound last
    pub(crate) fn update(&self, columns: &[String]) -> String {
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                format!("{} = {}", self.ident(column), self.dialect.placeholder(index + 1))
            })
            .collect::<Vec<_>>();
        format!(
            "UPDATE {} SET {} WHERE {} = {}",
            self.table(),
            assignments.join(", "),
            self.key(),
            self.dialect.placeholder(columns.len() + 1)
        )
    }

    pub(crate) fn delete(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} = {}",
            self.table(),
            self.key(),
            self.dialect.placeholder(1)
        )
    }

    pub(crate) fn select_all(&self) -> String {
        format!("SELECT {} FROM {}", self.select_list(), self.table())
    }

    /// Full-row SELECT filtered on one column
    pub(crate) fn select_by(&self, column: &str) -> String {
        format!(
            "{} WHERE {} = {}",
            self.select_all(),
            self.ident(column),
            self.dialect.placeholder(1)
        )
    }

    pub(crate) fn select_by_id(&self) -> String {
        self.select_by(self.meta.primary_key().name())
    }

    pub(crate) fn count_by_id(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM {} WHERE {} = {}",
            self.table(),
            self.key(),
            self.dialect.placeholder(1)
        )
    }

    /// Read back the key generated by the last insert
    pub(crate) fn identity_select(&self) -> String {
        self.dialect
            .identity_select_sql(&self.meta.full_table_name(), self.meta.primary_key().name())
    }
}
