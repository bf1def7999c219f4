//! Immutable query values and their builders.
//!
//! - [`select`]: [`Query`] / [`QueryBuilder`] for reads.
//! - [`mutation`]: [`InsertQuery`], [`UpdateQuery`], [`DeleteQuery`] and builders.
//!
//! Builders are `Clone` and `build()` borrows, so a builder can serve as a
//! template that is specialized and built many times. Validation happens once
//! in `build()`; the built values are never re-validated.

pub mod mutation;
pub mod select;

use std::collections::HashSet;
use std::sync::OnceLock;

pub use mutation::{
    DeleteQuery, DeleteQueryBuilder, InsertQuery, InsertQueryBuilder, UpdateQuery,
    UpdateQueryBuilder,
};
pub use select::{Query, QueryBuilder};

use crate::error::QueryError;
use crate::types::Value;

// ============================================================================
// Validation helpers
// ============================================================================

static TABLE_NAME_REGEX: OnceLock<regex::Regex> = OnceLock::new();

fn table_name_regex() -> &'static regex::Regex {
    TABLE_NAME_REGEX.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("table name regex is valid")
    })
}

/// Check that a table name is present and is a plain identifier.
pub(crate) fn validate_table(table: Option<&str>) -> Result<String, QueryError> {
    let table = table.ok_or(QueryError::MissingTable)?;
    if table.is_empty() {
        return Err(QueryError::MissingTable);
    }
    if !table_name_regex().is_match(table) {
        return Err(QueryError::InvalidTableName(table.to_string()));
    }
    Ok(table.to_string())
}

/// Check that the number of parameters in `predicate` equals `args.len()`.
pub(crate) fn validate_arguments(
    predicate: Option<&str>,
    args: &[Value],
) -> Result<(), QueryError> {
    let placeholders = predicate.map_or(0, count_placeholders);
    if placeholders != args.len() {
        return Err(QueryError::ArgumentCountMismatch {
            placeholders,
            arguments: args.len(),
        });
    }
    Ok(())
}

/// Count the parameters a predicate binds, ignoring anything inside quoted
/// literals or identifiers.
///
/// Follows SQLite numbering: a bare `?` takes the next index, `?NNN` takes
/// index `NNN`, and each distinct `:name`, `@name` or `$name` takes the next
/// index on first use. The result is the highest index used.
pub fn count_placeholders(sql: &str) -> usize {
    let mut highest = 0;
    let mut names: HashSet<String> = HashSet::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' | '`' => quote = Some(ch),
                '?' => {
                    let mut digits = String::new();
                    while let Some(d) = chars.next_if(char::is_ascii_digit) {
                        digits.push(d);
                    }
                    match digits.parse::<usize>() {
                        Ok(index) => highest = highest.max(index),
                        Err(_) => highest += 1,
                    }
                }
                ':' | '@' | '$' => {
                    let mut name = String::new();
                    while let Some(c) = chars.next_if(|c| c.is_alphanumeric() || *c == '_') {
                        name.push(c);
                    }
                    if !name.is_empty() && names.insert(name) {
                        highest += 1;
                    }
                }
                _ => {}
            },
        }
    }
    highest
}

/// Quote an identifier for interpolation into SQL (`"col"`, inner quotes doubled).
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
