//! Typed queries over caller-supplied SQL
//!
//! `:name` placeholders are bound through the dialect's positional markers;
//! result bounds are rendered with the dialect's LIMIT/OFFSET syntax.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use super::params::bind_named;
use crate::backends::DatabaseValue;
use crate::error::{OrmError, OrmResult};
use crate::metadata::{Entity, EntityRef};
use crate::session::Session;

/// A query whose rows map onto `T`
pub struct TypedQuery<'s, T> {
    session: &'s mut Session,
    sql: String,
    parameters: BTreeMap<String, DatabaseValue>,
    max_results: Option<u64>,
    first_result: Option<u64>,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, T: Entity> TypedQuery<'s, T> {
    pub(crate) fn new(session: &'s mut Session, sql: String) -> Self {
        Self {
            session,
            sql,
            parameters: BTreeMap::new(),
            max_results: None,
            first_result: None,
            _entity: PhantomData,
        }
    }

    pub fn set_parameter(mut self, name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn set_max_results(mut self, max: u64) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn set_first_result(mut self, first: u64) -> Self {
        self.first_result = Some(first);
        self
    }

    /// SQL text with the dialect's pagination applied, placeholders unbound
    pub fn query_string(&self) -> String {
        let body = self.sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
        self.session
            .dialect()
            .apply_limit(body, self.max_results, self.first_result)
    }

    pub fn result_list(self) -> OrmResult<Vec<EntityRef<T>>> {
        let sql = self.query_string();
        let bound = bind_named(&sql, &self.parameters, self.session.dialect().as_ref())?;
        self.session.create_query_with_params(&bound.sql, &bound.values)
    }

    /// Exactly one row
    pub fn single_result(self) -> OrmResult<EntityRef<T>> {
        let sql = self.query_string();
        let mut results = self.result_list()?;
        match results.len() {
            0 => Err(OrmError::NoResult { sql }),
            1 => results.pop().ok_or(OrmError::NoResult { sql }),
            count => Err(OrmError::TooManyResults { sql, count }),
        }
    }

    /// At most one row
    pub fn single_result_optional(self) -> OrmResult<Option<EntityRef<T>>> {
        let sql = self.query_string();
        let mut results = self.result_list()?;
        match results.len() {
            0 | 1 => Ok(results.pop()),
            count => Err(OrmError::TooManyResults { sql, count }),
        }
    }
}
