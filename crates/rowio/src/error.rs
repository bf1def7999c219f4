use thiserror::Error;

// ---------------------------------------------------------------------------
// QueryError
// ---------------------------------------------------------------------------

/// Malformed builder input, rejected before anything reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Table name is required. Call table() before build().")]
    MissingTable,

    #[error("Invalid table name \"{0}\"")]
    InvalidTableName(String),

    #[error("Predicate has {placeholders} placeholder(s) but {arguments} argument(s) were given")]
    ArgumentCountMismatch { placeholders: usize, arguments: usize },

    #[error("HAVING clauses are only permitted together with GROUP BY")]
    HavingWithoutGroupBy,

    #[error("Object for table \"{table}\" has no value in identifier column \"{column}\"")]
    MissingIdentifier { table: String, column: String },
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// The row store rejected an operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Transaction error: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failure reported by a non-SQLite store implementation.
    #[error("Store error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }
}

// ---------------------------------------------------------------------------
// MappingError
// ---------------------------------------------------------------------------

/// A row could not be turned into a typed object.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Column \"{0}\" is not present in the row")]
    MissingColumn(String),

    #[error("Column \"{column}\": expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl MappingError {
    pub fn custom(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Custom(error.into())
    }
}

// ---------------------------------------------------------------------------
// RowioError: top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RowioError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to map row {row} from \"{table}\": {source}")]
    Mapping {
        table: String,
        row: usize,
        #[source]
        source: MappingError,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl RowioError {
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping { .. })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for RowioError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(e))
    }
}

/// Convenience alias: the default error type is `RowioError`.
pub type Result<T, E = RowioError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
