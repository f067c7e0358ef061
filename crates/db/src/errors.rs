#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("query error: {0}")]
    Query(#[source] sqlx::Error),
    /// A field-level constraint rejected the record. Callers treat this as
    /// a per-record skip, not an infrastructure failure.
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("not found")]
    NotFound,
}

impl DbError {
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint(message.into())
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, DbError::Constraint(_))
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
