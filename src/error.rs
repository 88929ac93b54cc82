use thiserror::Error;

use crate::db::store::StoreError;

/// Errors surfaced by the telemetry, settings and status services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request is well-formed but carries nothing usable (empty batch, empty patch, bad range).
    #[error("{0}")]
    InvalidInput(String),

    /// A recognised field was present with a value it cannot take.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    /// The settings singleton could neither be read nor created.
    #[error("settings not found and could not be created")]
    SettingsUnavailable,

    #[error("database commit failed: {0}")]
    Storage(#[from] StoreError),
}

impl ServiceError {
    pub(crate) fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
