use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use canopy_forest::ForestError;
use canopy_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Forest(#[from] ForestError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The request itself was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Forest(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Forest(ForestError::InvalidInput(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Forest(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(err = %self, "internal server error");
            String::from("internal server error, see logs for details")
        } else {
            tracing::info!(%status, "returning error to client: {self}");
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
