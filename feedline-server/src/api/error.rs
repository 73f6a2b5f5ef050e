use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use feedline_types::ApiResponse;

use crate::pipeline::PipelineError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Pipeline(err) => {
                tracing::error!(phase = err.phase().as_str(), "Pipeline error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{} phase failed: {}", err.phase().as_str(), err),
                )
            }
        };

        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}
