use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use colorful_core::AnalysisError;
use serde_json::json;

/// Error returned by every route handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        ApiError::BadRequest("Invalid request body.".to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected query string");
        ApiError::BadRequest("Invalid query parameters.".to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Analysis(e) => match e {
                AnalysisError::Validation(_) => StatusCode::BAD_REQUEST,
                AnalysisError::NotFound(_) => StatusCode::NOT_FOUND,
                AnalysisError::StoreUnavailable(_) | AnalysisError::NotConfigured(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                AnalysisError::UpstreamService(_)
                | AnalysisError::InvalidResponseFormat { .. }
                | AnalysisError::InvalidAnalysisStructure { .. }
                | AnalysisError::Network(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Analysis(e) => {
                if status.is_server_error() {
                    tracing::error!("{}: {:?}", status, e);
                }
                e.user_message()
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
