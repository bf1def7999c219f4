//! Read queries.

use crate::error::QueryError;
use crate::types::Value;

use super::{validate_arguments, validate_table};

/// A validated read request.
///
/// `limit` is passed to the store as text, either `"N"` or `"offset, N"`;
/// malformed limits surface as store errors at execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    columns: Vec<String>,
    where_clause: Option<String>,
    where_args: Vec<Value>,
    group_by: Option<String>,
    having: Option<String>,
    order_by: Option<String>,
    limit: Option<String>,
    distinct: bool,
}

impl Query {
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// A builder pre-filled with this query's fields.
    pub fn to_builder(&self) -> QueryBuilder {
        QueryBuilder {
            table: Some(self.table.clone()),
            columns: self.columns.clone(),
            where_clause: self.where_clause.clone(),
            where_args: self.where_args.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit.clone(),
            distinct: self.distinct,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Projected columns. Empty means all columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    pub fn where_args(&self) -> &[Value] {
        &self.where_args
    }

    pub fn group_by(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    pub fn having(&self) -> Option<&str> {
        self.having.as_deref()
    }

    pub fn order_by(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    pub fn limit(&self) -> Option<&str> {
        self.limit.as_deref()
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }
}

/// Accumulates optional fields for a [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    table: Option<String>,
    columns: Vec<String>,
    where_clause: Option<String>,
    where_args: Vec<Value>,
    group_by: Option<String>,
    having: Option<String>,
    order_by: Option<String>,
    limit: Option<String>,
    distinct: bool,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn where_clause(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }

    pub fn where_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn having(mut self, having: impl Into<String>) -> Self {
        self.having = Some(having.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Raw limit text: `"N"` or `"offset, N"`.
    pub fn limit(mut self, limit: impl Into<String>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn limit_offset(self, offset: usize, count: usize) -> Self {
        self.limit(format!("{offset}, {count}"))
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn build(&self) -> Result<Query, QueryError> {
        let table = validate_table(self.table.as_deref())?;
        validate_arguments(self.where_clause.as_deref(), &self.where_args)?;
        if self.having.is_some() && self.group_by.is_none() {
            return Err(QueryError::HavingWithoutGroupBy);
        }

        Ok(Query {
            table,
            columns: self.columns.clone(),
            where_clause: self.where_clause.clone(),
            where_args: self.where_args.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit.clone(),
            distinct: self.distinct,
        })
    }
}
