use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::ServiceError;

#[derive(Debug)]
pub struct AppError(pub ServiceError);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidField { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::SettingsUnavailable => StatusCode::NOT_FOUND,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}
