use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;
use waypoint_admin::AdminError;
use waypoint_core::StorageError;

use crate::model::ErrorResponse;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Admin(#[from] AdminError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Admin(AdminError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Admin(AdminError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Admin(AdminError::Storage(err)) => match err {
                StorageError::Conflict(_) => StatusCode::CONFLICT,
                StorageError::Unavailable(_) | StorageError::Timeout(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                StorageError::Query(_)
                | StorageError::InvalidData(_)
                | StorageError::Operation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Admin(AdminError::Validation(_)) => "validation_failed",
            AppError::Admin(AdminError::NotFound(_)) => "not_found",
            AppError::Admin(AdminError::Storage(StorageError::Conflict(_))) => "conflict",
            AppError::Admin(AdminError::Storage(_)) => "storage_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "management request failed");
        }

        let violations = match &self {
            AppError::Admin(AdminError::Validation(err)) => Some(err.violations.clone()),
            _ => None,
        };
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            violations,
        };

        (status, Json(body)).into_response()
    }
}
