use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{entity}: field `{field}` not found")]
    FieldNotFound { entity: String, field: String },

    #[error("{entity}: Forbidden! Use getter `{getter}` for field `{field}`")]
    ForbiddenGetter {
        entity: String,
        field: String,
        getter: String,
    },

    #[error("{entity}: set('{field}') is forbidden")]
    ForbiddenSetter { entity: String, field: String },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unknown transformer `{0}`")]
    UnknownTransformer(String),

    #[error("Model not found in table '{table}': {query}")]
    NotFound { table: String, query: String },

    #[error("Unknown event name `{0}`")]
    InvalidEvent(String),

    #[error("Mapper '{0}' is not registered")]
    UnknownMapper(String),

    #[error("Mapping error: {0}")]
    MappingError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// The table a `NotFound` error originated from.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::NotFound { table, .. } => Some(table),
            _ => None,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
