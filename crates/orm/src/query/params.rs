//! Named parameter binding
//!
//! Rewrites `:name` placeholders into the dialect's positional markers and
//! collects the values in binding order. Values are never spliced into the
//! SQL text. Quoted strings, quoted identifiers, comments and `::` casts
//! are skipped.

use std::collections::BTreeMap;

use crate::backends::DatabaseValue;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};

/// SQL rewritten for positional binding plus the values to bind
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<DatabaseValue>,
}

/// Bind `:name` placeholders in `sql` from `parameters`
pub fn bind_named(
    sql: &str,
    parameters: &BTreeMap<String, DatabaseValue>,
    dialect: &dyn Dialect,
) -> OrmResult<BoundStatement> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                // copy the quoted section verbatim; doubled quotes stay inside
                out.push(c);
                i += 1;
                while i < chars.len() {
                    out.push(chars[i]);
                    if chars[i] == c {
                        if i + 1 < chars.len() && chars[i + 1] == c {
                            out.push(c);
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            '-' if i + 1 < chars.len() && chars[i + 1] == '-' => {
                while i < chars.len() && chars[i] != '\n' {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            '/' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                out.push_str("/*");
                i += 2;
                while i < chars.len() {
                    if chars[i] == '*' && i + 1 < chars.len() && chars[i + 1] == '/' {
                        out.push_str("*/");
                        i += 2;
                        break;
                    }
                    out.push(chars[i]);
                    i += 1;
                }
            }
            ':' if i + 1 < chars.len() && chars[i + 1] == ':' => {
                out.push_str("::");
                i += 2;
            }
            ':' if i + 1 < chars.len() && (chars[i + 1].is_ascii_alphabetic() || chars[i + 1] == '_') => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let value = parameters.get(&name).ok_or_else(|| OrmError::InvalidParameter {
                    name: name.clone(),
                    sql: sql.to_string(),
                })?;
                values.push(value.clone());
                out.push_str(&dialect.placeholder(values.len()));
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(BoundStatement { sql: out, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{GenericDialect, PostgresDialect};

    fn params(pairs: &[(&str, DatabaseValue)]) -> BTreeMap<String, DatabaseValue> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_named_parameters_become_positional() {
        let bound = bind_named(
            "SELECT * FROM users WHERE username = :name AND age > :age",
            &params(&[("name", "alice".into()), ("age", 21.into())]),
            &GenericDialect,
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM users WHERE username = ? AND age > ?");
        assert_eq!(bound.values, vec![DatabaseValue::from("alice"), DatabaseValue::Int32(21)]);
    }

    #[test]
    fn test_repeated_parameter_is_bound_twice() {
        let bound = bind_named(
            "SELECT * FROM t WHERE a = :v OR b = :v",
            &params(&[("v", 1.into())]),
            &PostgresDialect,
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM t WHERE a = $1 OR b = $2");
        assert_eq!(bound.values.len(), 2);
    }

    #[test]
    fn test_literals_and_casts_are_untouched() {
        let bound = bind_named(
            "SELECT ':not_a_param', 'it''s :x', created::date FROM t WHERE id = :id",
            &params(&[("id", 5.into())]),
            &GenericDialect,
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT ':not_a_param', 'it''s :x', created::date FROM t WHERE id = ?"
        );
        assert_eq!(bound.values, vec![DatabaseValue::Int32(5)]);
    }

    #[test]
    fn test_comments_are_copied_verbatim() {
        let bound = bind_named(
            "SELECT * FROM t -- filter by :ignored\nWHERE a = :a /* not :this */ AND b = :b",
            &params(&[("a", 1.into()), ("b", 2.into())]),
            &PostgresDialect,
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT * FROM t -- filter by :ignored\nWHERE a = $1 /* not :this */ AND b = $2"
        );
        assert_eq!(bound.values, vec![DatabaseValue::Int32(1), DatabaseValue::Int32(2)]);
    }

    #[test]
    fn test_unterminated_block_comment_runs_to_end() {
        let bound = bind_named("SELECT 1 /* :open", &BTreeMap::new(), &GenericDialect).unwrap();
        assert_eq!(bound.sql, "SELECT 1 /* :open");
        assert!(bound.values.is_empty());
    }

    #[test]
    fn test_injection_attempt_stays_a_value() {
        let hostile = "x'; DROP TABLE users; --";
        let bound = bind_named(
            "SELECT * FROM users WHERE username = :name",
            &params(&[("name", hostile.into())]),
            &GenericDialect,
        )
        .unwrap();
        assert!(!bound.sql.contains("DROP"));
        assert_eq!(bound.values, vec![DatabaseValue::from(hostile)]);
    }

    #[test]
    fn test_missing_parameter_is_reported() {
        let err = bind_named("SELECT * FROM t WHERE a = :missing", &BTreeMap::new(), &GenericDialect)
            .unwrap_err();
        match err {
            OrmError::InvalidParameter { name, sql } => {
                assert_eq!(name, "missing");
                assert!(sql.contains(":missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
