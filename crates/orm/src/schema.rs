//! Schema Generator - DDL from entity metadata
//!
//! Emits one `CREATE TABLE` per registered entity (registration order) and
//! one `DROP TABLE IF EXISTS` per entity (reverse order). Statements run one
//! by one on a single connection; the first failure aborts the call and the
//! tables created before it are left in place.

use std::sync::Arc;

use tracing::info;

use crate::backends::ConnectionProvider;
use crate::config::SchemaAction;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::metadata::{EntityMetadata, EntityRegistry};
use crate::monitor::{ExecutionMonitor, OperationKind};

/// Render an identifier, quoted through the dialect when enabled
pub(crate) fn identifier(dialect: &dyn Dialect, name: &str, quote: bool) -> String {
    if quote {
        dialect.quote_identifier(name)
    } else {
        name.to_string()
    }
}

/// Catalog/schema-qualified table name of an entity
pub(crate) fn qualified_table(meta: &EntityMetadata, dialect: &dyn Dialect, quote: bool) -> String {
    if !quote {
        return meta.full_table_name();
    }
    meta.catalog()
        .into_iter()
        .chain(meta.schema())
        .chain(std::iter::once(meta.table_name()))
        .map(|part| dialect.quote_identifier(part))
        .collect::<Vec<_>>()
        .join(".")
}

/// Generates and runs DDL for every registered entity
#[derive(Clone)]
pub struct SchemaGenerator {
    registry: Arc<EntityRegistry>,
    dialect: Arc<dyn Dialect>,
    provider: Arc<dyn ConnectionProvider>,
    monitor: Arc<ExecutionMonitor>,
    quote_identifiers: bool,
}

impl SchemaGenerator {
    pub fn new(
        registry: Arc<EntityRegistry>,
        dialect: Arc<dyn Dialect>,
        provider: Arc<dyn ConnectionProvider>,
        monitor: Arc<ExecutionMonitor>,
        quote_identifiers: bool,
    ) -> Self {
        Self {
            registry,
            dialect,
            provider,
            monitor,
            quote_identifiers,
        }
    }

    fn ident(&self, name: &str) -> String {
        identifier(self.dialect.as_ref(), name, self.quote_identifiers)
    }

    /// `CREATE TABLE` statement for one entity
    pub fn create_table_sql(&self, meta: &EntityMetadata) -> String {
        let dialect = self.dialect.as_ref();
        let mut definitions = Vec::new();

        for column in meta.columns() {
            let mut definition = format!(
                "{} {}",
                self.ident(column.name()),
                column
                    .definition()
                    .map(str::to_string)
                    .unwrap_or_else(|| dialect.column_type(&column.type_spec()))
            );
            if column.is_generated() {
                let fragment = dialect.identity_column_fragment();
                if !fragment.is_empty() {
                    definition.push(' ');
                    definition.push_str(fragment);
                }
            }
            if !column.is_nullable() {
                definition.push(' ');
                definition.push_str(dialect.not_null_keyword());
            }
            definitions.push(definition);
        }

        for relationship in meta.owning_relationships() {
            let Some(join_column) = relationship.join_column() else {
                continue;
            };
            let column_type = self
                .registry
                .get(relationship.target())
                .map(|target| {
                    let mut spec = target.primary_key().type_spec();
                    spec.auto_increment = false;
                    match target.primary_key().definition() {
                        Some(definition) => definition.to_string(),
                        None => dialect.column_type(&spec),
                    }
                })
                .unwrap_or_else(|| {
                    dialect.column_type(&crate::dialect::ColumnTypeSpec::new(
                        crate::dialect::SqlType::BigInt,
                    ))
                });

            let mut definition = format!("{} {}", self.ident(join_column), column_type);
            if !relationship.is_optional() {
                definition.push(' ');
                definition.push_str(dialect.not_null_keyword());
            }
            definitions.push(definition);
        }

        definitions.push(format!(
            "{} ({})",
            dialect.primary_key_keyword(),
            self.ident(meta.primary_key().name())
        ));

        for column in meta.non_key_columns().filter(|column| column.is_unique()) {
            definitions.push(format!(
                "{} ({})",
                dialect.unique_keyword(),
                self.ident(column.name())
            ));
        }

        format!(
            "{} {} ({})",
            dialect.create_table_keyword(),
            qualified_table(meta, dialect, self.quote_identifiers),
            definitions.join(", ")
        )
    }

    /// `DROP TABLE IF EXISTS` statement for one entity
    pub fn drop_table_sql(&self, meta: &EntityMetadata) -> String {
        format!(
            "{} {}",
            self.dialect.drop_table_keyword(),
            qualified_table(meta, self.dialect.as_ref(), self.quote_identifiers)
        )
    }

    /// Every `CREATE TABLE` statement, in registration order
    pub fn create_schema_sql(&self) -> Vec<String> {
        self.registry.iter().map(|meta| self.create_table_sql(meta)).collect()
    }

    /// Every `DROP TABLE` statement, in reverse registration order
    pub fn drop_schema_sql(&self) -> Vec<String> {
        self.registry
            .iter()
            .rev()
            .map(|meta| self.drop_table_sql(meta))
            .collect()
    }

    /// Create a table for every registered entity
    pub fn create_schema(&self) -> OrmResult<()> {
        let statements: Vec<_> = self
            .registry
            .iter()
            .map(|meta| (meta.entity_name().to_string(), self.create_table_sql(meta)))
            .collect();
        self.run("create table", statements)?;
        info!("Created schema for {} entities", self.registry.len());
        Ok(())
    }

    /// Drop the table of every registered entity
    pub fn drop_schema(&self) -> OrmResult<()> {
        let statements: Vec<_> = self
            .registry
            .iter()
            .rev()
            .map(|meta| (meta.entity_name().to_string(), self.drop_table_sql(meta)))
            .collect();
        self.run("drop table", statements)?;
        info!("Dropped schema for {} entities", self.registry.len());
        Ok(())
    }

    /// Drop then create
    pub fn recreate_schema(&self) -> OrmResult<()> {
        self.drop_schema()?;
        self.create_schema()
    }

    /// Apply a configured schema action
    pub fn apply(&self, action: SchemaAction) -> OrmResult<()> {
        match action {
            SchemaAction::None => Ok(()),
            SchemaAction::Create => self.create_schema(),
            SchemaAction::Recreate => self.recreate_schema(),
            SchemaAction::Drop => self.drop_schema(),
        }
    }

    fn run(&self, operation: &'static str, statements: Vec<(String, String)>) -> OrmResult<()> {
        if statements.is_empty() {
            return Ok(());
        }
        let mut conn = self.provider.acquire().map_err(OrmError::Connection)?;
        for (entity, sql) in statements {
            self.monitor
                .time(OperationKind::Ddl, &sql, || conn.execute(&sql, &[]))
                .map_err(|e| OrmError::persistence(operation, entity, sql.as_str(), e))?;
        }
        Ok(())
    }
}
