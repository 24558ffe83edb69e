//! MySQL / MariaDB dialect

use super::{ColumnTypeSpec, Dialect, DialectKind, SqlType};

/// Largest row count MySQL accepts; used when only an offset is given
const MAX_ROWS: u64 = 18_446_744_073_709_551_615;

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) => format!("LIMIT {}, {}", offset, limit),
            (Some(limit), None) => format!("LIMIT {}", limit),
            (None, Some(offset)) => format!("LIMIT {}, {}", offset, MAX_ROWS),
            (None, None) => String::new(),
        }
    }

    fn identity_column_fragment(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn supports_sequences(&self) -> bool {
        false
    }

    fn identity_select_sql(&self, _table: &str, _column: &str) -> String {
        "SELECT LAST_INSERT_ID()".to_string()
    }

    fn column_type(&self, spec: &ColumnTypeSpec) -> String {
        match spec.sql_type {
            SqlType::Text => format!("VARCHAR({})", spec.length),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INT".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Float => "FLOAT".to_string(),
            SqlType::Double if spec.precision > 0 => {
                format!("DECIMAL({},{})", spec.precision, spec.scale)
            }
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Uuid => "CHAR(36)".to_string(),
            SqlType::Binary => "BLOB".to_string(),
            SqlType::Json => "JSON".to_string(),
        }
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("`{}`", identifier.replace('`', "``"))
    }

    fn empty_insert_sql(&self, table: &str) -> String {
        format!("INSERT INTO {} () VALUES ()", table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_comes_first() {
        assert_eq!(MySqlDialect.limit_clause(Some(10), Some(30)), "LIMIT 30, 10");
        assert_eq!(
            MySqlDialect.limit_clause(None, Some(30)),
            "LIMIT 30, 18446744073709551615"
        );
    }

    #[test]
    fn test_mysql_specifics() {
        assert_eq!(MySqlDialect.quote_identifier("order"), "`order`");
        assert_eq!(MySqlDialect.column_type(&ColumnTypeSpec::new(SqlType::Integer)), "INT");
        assert_eq!(MySqlDialect.column_type(&ColumnTypeSpec::new(SqlType::Uuid)), "CHAR(36)");
        assert_eq!(MySqlDialect.identity_select_sql("users", "id"), "SELECT LAST_INSERT_ID()");
        assert_eq!(MySqlDialect.empty_insert_sql("t"), "INSERT INTO t () VALUES ()");
    }
}
