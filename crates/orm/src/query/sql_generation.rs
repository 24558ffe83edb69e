//! Query Builder SQL generation

use super::builder::QueryBuilder;

impl QueryBuilder {
    /// Render the SELECT statement; named placeholders are left in place
    pub fn build(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.select_list());

        sql.push_str(" FROM ");
        sql.push_str(&self.table);
        if let Some(alias) = &self.alias {
            sql.push(' ');
            sql.push_str(alias);
        }

        self.build_where_clause(&mut sql);
        self.build_order_clause(&mut sql);

        self.dialect
            .apply_limit(&sql, self.limit_count, self.offset_value)
    }

    fn select_list(&self) -> String {
        if !self.select_fields.is_empty() {
            return self.select_fields.join(", ");
        }
        let qualify = |column: &str| match &self.alias {
            Some(alias) => format!("{}.{}", alias, column),
            None => column.to_string(),
        };
        if self.mapped_columns.is_empty() {
            qualify("*")
        } else {
            self.mapped_columns
                .iter()
                .map(|column| qualify(column))
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    fn build_where_clause(&self, sql: &mut String) {
        for (index, fragment) in self.where_fragments.iter().enumerate() {
            if index == 0 {
                sql.push_str(" WHERE ");
            } else {
                sql.push(' ');
                sql.push_str(fragment.connective.trim());
                sql.push(' ');
            }
            sql.push_str(&fragment.condition);
        }
    }

    fn build_order_clause(&self, sql: &mut String) {
        if self.order_by.is_empty() {
            return;
        }
        let entries: Vec<String> = self
            .order_by
            .iter()
            .map(|order| format!("{} {}", order.column, order.direction))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&entries.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::backends::DatabaseValue;
    use crate::dialect::{Dialect, DialectKind};
    use crate::query::{OrderDirection, QueryBuilder};

    fn dialect(kind: DialectKind) -> Arc<dyn Dialect> {
        kind.create()
    }

    #[test]
    fn test_select_star_without_columns() {
        let sql = QueryBuilder::new(dialect(DialectKind::Generic), "users").build();
        assert_eq!(sql, "SELECT * FROM users");
    }

    #[test]
    fn test_full_statement() {
        let builder = QueryBuilder::new(dialect(DialectKind::Generic), "users")
            .select("id, username")
            .distinct()
            .alias("u")
            .where_clause("u.age > :min_age")
            .or("u.username = :name")
            .order_by("u.username", OrderDirection::Asc)
            .order_by_desc("u.id")
            .limit(10)
            .offset(20)
            .set_parameter("min_age", 18)
            .set_parameter("name", "alice");

        assert_eq!(
            builder.build(),
            "SELECT DISTINCT id, username FROM users u WHERE u.age > :min_age OR u.username = :name \
             ORDER BY u.username ASC, u.id DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(builder.parameters().get("min_age"), Some(&DatabaseValue::Int32(18)));
        assert_eq!(builder.parameters().len(), 2);
    }

    #[test]
    fn test_mysql_pagination_goes_through_dialect() {
        let sql = QueryBuilder::new(dialect(DialectKind::MySql), "posts")
            .paginate(25, 3)
            .build();
        assert_eq!(sql, "SELECT * FROM posts LIMIT 50, 25");
    }

    #[test]
    fn test_custom_connectives_are_emitted_verbatim() {
        let sql = QueryBuilder::new(dialect(DialectKind::Sqlite), "t")
            .where_clause("a = 1")
            .connect("AND NOT", "(b = 2 OR c = 3)")
            .build();
        assert_eq!(sql, "SELECT * FROM t WHERE a = 1 AND NOT (b = 2 OR c = 3)");
    }

    #[test]
    fn test_alias_qualifies_default_star() {
        let sql = QueryBuilder::new(dialect(DialectKind::Sqlite), "t").alias("x").build();
        assert_eq!(sql, "SELECT x.* FROM t x");
    }
}
