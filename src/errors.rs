use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntitySyncError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("relation type mismatch: {0}")]
    TypeMismatch(String),
    #[error("dangling reference: {0}")]
    DanglingReference(String),
    #[error("duplicate relation: {0}")]
    Duplicate(String),
    #[error("projection error: {0}")]
    ProjectionError(String),
}

impl EntitySyncError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        EntitySyncError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        EntitySyncError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        EntitySyncError::QueryError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        EntitySyncError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        EntitySyncError::InvalidInput(msg.into())
    }

    pub fn type_mismatch<T: Into<String>>(msg: T) -> Self {
        EntitySyncError::TypeMismatch(msg.into())
    }

    pub fn dangling<T: Into<String>>(msg: T) -> Self {
        EntitySyncError::DanglingReference(msg.into())
    }

    pub fn duplicate<T: Into<String>>(msg: T) -> Self {
        EntitySyncError::Duplicate(msg.into())
    }

    pub fn projection<T: Into<String>>(msg: T) -> Self {
        EntitySyncError::ProjectionError(msg.into())
    }

    /// Validation errors surface synchronously to the caller; everything else
    /// is an infrastructure failure handled at the dispatch boundary.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EntitySyncError::NotFound(_)
                | EntitySyncError::InvalidInput(_)
                | EntitySyncError::TypeMismatch(_)
                | EntitySyncError::DanglingReference(_)
                | EntitySyncError::Duplicate(_)
        )
    }
}
