//! Insert, update and delete queries.

use crate::error::QueryError;
use crate::types::Value;

use super::{validate_arguments, validate_table};

// ============================================================================
// InsertQuery
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertQuery {
    table: String,
    null_column_hack: Option<String>,
}

impl InsertQuery {
    pub fn builder() -> InsertQueryBuilder {
        InsertQueryBuilder::default()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column that receives an explicit NULL when the inserted row is empty.
    pub fn null_column_hack(&self) -> Option<&str> {
        self.null_column_hack.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InsertQueryBuilder {
    table: Option<String>,
    null_column_hack: Option<String>,
}

impl InsertQueryBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn null_column_hack(mut self, column: impl Into<String>) -> Self {
        self.null_column_hack = Some(column.into());
        self
    }

    pub fn build(&self) -> Result<InsertQuery, QueryError> {
        Ok(InsertQuery {
            table: validate_table(self.table.as_deref())?,
            null_column_hack: self.null_column_hack.clone(),
        })
    }
}

// ============================================================================
// UpdateQuery
// ============================================================================

/// Update target. Without a predicate every row of the table is updated.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    table: String,
    where_clause: Option<String>,
    where_args: Vec<Value>,
}

impl UpdateQuery {
    pub fn builder() -> UpdateQueryBuilder {
        UpdateQueryBuilder::default()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    pub fn where_args(&self) -> &[Value] {
        &self.where_args
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateQueryBuilder {
    table: Option<String>,
    where_clause: Option<String>,
    where_args: Vec<Value>,
}

impl UpdateQueryBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
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

    pub fn build(&self) -> Result<UpdateQuery, QueryError> {
        let table = validate_table(self.table.as_deref())?;
        validate_arguments(self.where_clause.as_deref(), &self.where_args)?;
        Ok(UpdateQuery {
            table,
            where_clause: self.where_clause.clone(),
            where_args: self.where_args.clone(),
        })
    }
}

// ============================================================================
// DeleteQuery
// ============================================================================

/// Delete target. Without a predicate every row of the table is deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    table: String,
    where_clause: Option<String>,
    where_args: Vec<Value>,
}

impl DeleteQuery {
    pub fn builder() -> DeleteQueryBuilder {
        DeleteQueryBuilder::default()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    pub fn where_args(&self) -> &[Value] {
        &self.where_args
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteQueryBuilder {
    table: Option<String>,
    where_clause: Option<String>,
    where_args: Vec<Value>,
}

impl DeleteQueryBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
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

    pub fn build(&self) -> Result<DeleteQuery, QueryError> {
        let table = validate_table(self.table.as_deref())?;
        validate_arguments(self.where_clause.as_deref(), &self.where_args)?;
        Ok(DeleteQuery {
            table,
            where_clause: self.where_clause.clone(),
            where_args: self.where_args.clone(),
        })
    }
}
