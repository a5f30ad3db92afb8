use thiserror::Error;
use uuid::Uuid;

/// Failures of the underlying store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A write would violate a uniqueness or reference constraint
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Map Postgres constraint violations to `Conflict`, everything else to `Database`.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // 23505 unique_violation, 23503 foreign_key_violation, 23514 check_violation
            if matches!(db_err.code().as_deref(), Some("23505" | "23503" | "23514")) {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

/// Errors surfaced by every service operation.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("access to {entity} {id} denied")]
    Forbidden { entity: &'static str, id: Uuid },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("cannot {action} {entity} {id} while it is {state}")]
    InvalidState {
        entity: &'static str,
        id: Uuid,
        state: String,
        action: &'static str,
    },
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
    /// Stored reference data is inconsistent
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
    /// The external plan generator failed or returned unusable output
    #[error("Plan generator error: {0}")]
    Generator(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        ServiceError::NotFound { entity, id }
    }

    pub fn forbidden(entity: &'static str, id: Uuid) -> Self {
        ServiceError::Forbidden { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn invalid_state(
        entity: &'static str,
        id: Uuid,
        state: impl ToString,
        action: &'static str,
    ) -> Self {
        ServiceError::InvalidState {
            entity,
            id,
            state: state.to_string(),
            action,
        }
    }

    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::Forbidden { .. } => "forbidden",
            ServiceError::Validation(_) => "validation_error",
            ServiceError::InvalidState { .. } => "invalid_state",
            ServiceError::Persistence(_) => "persistence_error",
            ServiceError::DataIntegrity(_) => "data_integrity",
            ServiceError::Generator(_) => "generator_error",
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(errors.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
