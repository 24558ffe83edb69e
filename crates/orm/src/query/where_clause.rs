//! Query Builder WHERE clause operations

use super::builder::QueryBuilder;
use super::types::WhereFragment;
use crate::backends::DatabaseValue;

impl QueryBuilder {
    /// Add a WHERE fragment, joined to the previous one with AND
    pub fn where_clause(self, condition: impl Into<String>) -> Self {
        self.connect("AND", condition)
    }

    /// Add a WHERE fragment carrying one value under a generated `paramN` name
    ///
    /// The first `?` outside quotes marks where the value goes. A condition
    /// without one is treated as a column compared for equality.
    ///
    /// ```ignore
    /// builder.where_value("age > ?", 21);   // age > :param0
    /// builder.where_value("username", "bob"); // username = :param1
    /// ```
    pub fn where_value(mut self, condition: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        let name = self.next_parameter_name();
        let condition = bind_slot(&condition.into(), &name);
        self.parameters.insert(name, value.into());
        self.connect("AND", condition)
    }

    pub fn and(self, condition: impl Into<String>) -> Self {
        self.connect("AND", condition)
    }

    pub fn or(self, condition: impl Into<String>) -> Self {
        self.connect("OR", condition)
    }

    /// Add a WHERE fragment joined by an arbitrary connective
    pub fn connect(mut self, connective: impl Into<String>, condition: impl Into<String>) -> Self {
        self.where_fragments.push(WhereFragment {
            connective: connective.into(),
            condition: condition.into(),
        });
        self
    }

    fn next_parameter_name(&self) -> String {
        let mut index = self.parameters.len();
        loop {
            let name = format!("param{}", index);
            if !self.parameters.contains_key(&name) {
                return name;
            }
            index += 1;
        }
    }
}

fn bind_slot(condition: &str, name: &str) -> String {
    let mut quote: Option<char> = None;
    for (offset, c) in condition.char_indices() {
        match (quote, c) {
            (Some(open), _) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '?') => {
                return format!("{}:{}{}", &condition[..offset], name, &condition[offset + 1..]);
            }
            _ => {}
        }
    }
    format!("{} = :{}", condition.trim(), name)
}

#[cfg(test)]
mod tests {
    use crate::backends::DatabaseValue;
    use crate::dialect::{DialectKind, GenericDialect};
    use crate::query::{bind_named, QueryBuilder};

    #[test]
    fn test_where_value_generates_parameter_names() {
        let builder = QueryBuilder::new(DialectKind::Generic.create(), "users")
            .where_value("age > ?", 21)
            .where_value("username", "bob")
            .or("role = 'admin?'");

        assert_eq!(
            builder.build(),
            "SELECT * FROM users WHERE age > :param0 AND username = :param1 OR role = 'admin?'"
        );
        assert_eq!(builder.parameters().get("param0"), Some(&DatabaseValue::Int32(21)));
        assert_eq!(builder.parameters().get("param1"), Some(&DatabaseValue::from("bob")));

        let bound = bind_named(&builder.build(), builder.parameters(), &GenericDialect).unwrap();
        assert_eq!(bound.values, vec![DatabaseValue::Int32(21), DatabaseValue::from("bob")]);
    }

    #[test]
    fn test_where_value_skips_quoted_marks_and_taken_names() {
        let builder = QueryBuilder::new(DialectKind::Generic.create(), "t")
            .set_parameter("param1", 7)
            .where_value("note <> 'why?' AND score >= ?", 3);

        assert_eq!(builder.build(), "SELECT * FROM t WHERE note <> 'why?' AND score >= :param2");
        assert_eq!(builder.parameters().len(), 2);
    }
}
