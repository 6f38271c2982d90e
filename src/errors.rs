use sea_orm::error::DbErr;
use serde::Serialize;
use uuid::Uuid;

/// Error type shared by every workflow engine in this crate.
///
/// Each variant carries a stable machine-readable reason code (see
/// [`ServiceError::reason_code`]) so callers can branch on failures without
/// parsing messages, and a human-readable message that never exposes
/// internal state.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Unauthorized actor: {0}")]
    UnauthorizedActor(String),

    #[error("Duplicate submission: {0}")]
    DuplicateSubmission(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Price has not been set for spare part request {0}")]
    PriceNotSet(Uuid),

    #[error("Offer {0} is no longer editable")]
    OfferNotEditable(Uuid),

    #[error("Concurrent modification of entity {0}")]
    ConcurrencyConflict(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Maps a write-path database error, surfacing stale updates as
    /// [`ServiceError::ConcurrencyConflict`] for the given entity.
    pub fn from_write_err(error: DbErr, entity_id: Uuid) -> Self {
        match error {
            DbErr::RecordNotUpdated => ServiceError::ConcurrencyConflict(entity_id),
            other => ServiceError::DatabaseError(other),
        }
    }

    /// Stable reason code for this error.
    /// This is the single source of truth for error classification.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidStateTransition(_) => "invalid_state_transition",
            Self::UnauthorizedActor(_) => "unauthorized_actor",
            Self::DuplicateSubmission(_) => "duplicate_submission",
            Self::ValidationError(_) => "validation_error",
            Self::PriceNotSet(_) => "price_not_set",
            Self::OfferNotEditable(_) => "offer_not_editable",
            Self::ConcurrencyConflict(_) => "concurrency_conflict",
            Self::EventError(_) => "event_error",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// Returns the error message suitable for caller-facing responses.
    /// Internal errors return generic messages to avoid leaking details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(
            ServiceError::NotFound("deal".into()).reason_code(),
            "not_found"
        );
        assert_eq!(
            ServiceError::PriceNotSet(Uuid::new_v4()).reason_code(),
            "price_not_set"
        );
        assert_eq!(
            ServiceError::OfferNotEditable(Uuid::new_v4()).reason_code(),
            "offer_not_editable"
        );
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = ServiceError::DatabaseError(DbErr::Custom("password=hunter2".into()));
        assert_eq!(err.response_message(), "Database error");
    }

    #[test]
    fn stale_update_maps_to_concurrency_conflict() {
        let id = Uuid::new_v4();
        let err = ServiceError::from_write_err(DbErr::RecordNotUpdated, id);
        assert_eq!(err.reason_code(), "concurrency_conflict");
    }
}
