//! PostgreSQL dialect

use super::{ColumnTypeSpec, Dialect, DialectKind, SqlType};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::PostgreSql
    }

    /// Generated keys use the SERIAL family instead of a column suffix
    fn identity_column_fragment(&self) -> &'static str {
        ""
    }

    fn supports_sequences(&self) -> bool {
        true
    }

    fn identity_select_sql(&self, table: &str, column: &str) -> String {
        format!(
            "SELECT currval(pg_get_serial_sequence({}, {}))",
            self.escape_literal(table),
            self.escape_literal(column)
        )
    }

    fn column_type(&self, spec: &ColumnTypeSpec) -> String {
        match spec.sql_type {
            SqlType::Text => format!("VARCHAR({})", spec.length),
            SqlType::SmallInt if spec.auto_increment => "SMALLSERIAL".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer if spec.auto_increment => "SERIAL".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt if spec.auto_increment => "BIGSERIAL".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Float => "REAL".to_string(),
            SqlType::Double if spec.precision > 0 => {
                format!("NUMERIC({},{})", spec.precision, spec.scale)
            }
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Binary => "BYTEA".to_string(),
            SqlType::Json => "JSONB".to_string(),
        }
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_substitution() {
        let mut id = ColumnTypeSpec::new(SqlType::BigInt);
        assert_eq!(PostgresDialect.column_type(&id), "BIGINT");
        id.auto_increment = true;
        assert_eq!(PostgresDialect.column_type(&id), "BIGSERIAL");

        let mut small = ColumnTypeSpec::new(SqlType::Integer);
        small.auto_increment = true;
        assert_eq!(PostgresDialect.column_type(&small), "SERIAL");
    }

    #[test]
    fn test_identity_readback_and_placeholders() {
        assert_eq!(
            PostgresDialect.identity_select_sql("users", "id"),
            "SELECT currval(pg_get_serial_sequence('users', 'id'))"
        );
        assert_eq!(PostgresDialect.placeholder(3), "$3");
    }
}
