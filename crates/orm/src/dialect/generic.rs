//! Generic ANSI-like dialect (H2-compatible)

use super::{ColumnTypeSpec, Dialect, DialectKind, SqlType};

#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl Dialect for GenericDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Generic
    }

    fn identity_column_fragment(&self) -> &'static str {
        "GENERATED BY DEFAULT AS IDENTITY"
    }

    fn supports_sequences(&self) -> bool {
        true
    }

    fn identity_select_sql(&self, _table: &str, _column: &str) -> String {
        "SELECT IDENTITY()".to_string()
    }

    fn column_type(&self, spec: &ColumnTypeSpec) -> String {
        match spec.sql_type {
            SqlType::Text => format!("VARCHAR({})", spec.length),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Float => "REAL".to_string(),
            SqlType::Double if spec.precision > 0 => {
                format!("DECIMAL({},{})", spec.precision, spec.scale)
            }
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Uuid => "UUID".to_string(),
            SqlType::Binary => "BLOB".to_string(),
            SqlType::Json => "CLOB".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping() {
        let dialect = GenericDialect;
        let mut text = ColumnTypeSpec::new(SqlType::Text);
        text.length = 50;
        assert_eq!(dialect.column_type(&text), "VARCHAR(50)");

        let mut money = ColumnTypeSpec::new(SqlType::Double);
        assert_eq!(dialect.column_type(&money), "DOUBLE");
        money.precision = 10;
        money.scale = 2;
        assert_eq!(dialect.column_type(&money), "DECIMAL(10,2)");

        let mut id = ColumnTypeSpec::new(SqlType::BigInt);
        id.auto_increment = true;
        assert_eq!(dialect.column_type(&id), "BIGINT");
        assert_eq!(dialect.identity_column_fragment(), "GENERATED BY DEFAULT AS IDENTITY");
    }

    #[test]
    fn test_offset_without_limit() {
        assert_eq!(GenericDialect.limit_clause(None, Some(5)), "OFFSET 5");
    }
}
