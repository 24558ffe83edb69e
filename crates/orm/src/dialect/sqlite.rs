//! SQLite dialect

use super::{ColumnTypeSpec, Dialect, DialectKind, SqlType};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!("LIMIT {} OFFSET {}", limit, offset),
            (Some(limit), None) => format!("LIMIT {}", limit),
            // sqlite only accepts OFFSET after a LIMIT
            (None, Some(offset)) => format!("LIMIT -1 OFFSET {}", offset),
            (None, None) => String::new(),
        }
    }

    /// An `INTEGER` column in the table's primary key aliases the rowid,
    /// which sqlite fills in on insert.
    fn identity_column_fragment(&self) -> &'static str {
        ""
    }

    fn supports_sequences(&self) -> bool {
        false
    }

    fn identity_select_sql(&self, _table: &str, _column: &str) -> String {
        "SELECT last_insert_rowid()".to_string()
    }

    fn column_type(&self, spec: &ColumnTypeSpec) -> String {
        match spec.sql_type {
            SqlType::SmallInt | SqlType::Integer | SqlType::BigInt | SqlType::Boolean => {
                "INTEGER".to_string()
            }
            SqlType::Float | SqlType::Double => "REAL".to_string(),
            SqlType::Binary => "BLOB".to_string(),
            SqlType::Text
            | SqlType::Date
            | SqlType::Time
            | SqlType::Timestamp
            | SqlType::Uuid
            | SqlType::Json => "TEXT".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_classes() {
        let mut id = ColumnTypeSpec::new(SqlType::BigInt);
        id.auto_increment = true;
        assert_eq!(SqliteDialect.column_type(&id), "INTEGER");
        assert_eq!(SqliteDialect.column_type(&ColumnTypeSpec::new(SqlType::Text)), "TEXT");
        assert_eq!(SqliteDialect.column_type(&ColumnTypeSpec::new(SqlType::Double)), "REAL");
        assert_eq!(SqliteDialect.column_type(&ColumnTypeSpec::new(SqlType::Boolean)), "INTEGER");
    }

    #[test]
    fn test_offset_requires_limit() {
        assert_eq!(SqliteDialect.limit_clause(None, Some(4)), "LIMIT -1 OFFSET 4");
        assert_eq!(SqliteDialect.identity_select_sql("users", "id"), "SELECT last_insert_rowid()");
    }
}
