use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use campus_core::{CoreError, ErrorKind};

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    Core(CoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Core(err) => {
                let status = match err.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
                    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "internal server error");
                    (status, "Internal Server Error".to_string())
                } else {
                    (status, err.to_string())
                }
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}
