use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures while proxying a request to one of the upstream control planes.
#[derive(Debug, Error)]
pub enum FacadeError {
    /// The upstream could not be reached at all.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The upstream answered with a non-success status; it is passed through.
    #[error("{message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for FacadeError {
    fn into_response(self) -> Response {
        let status = match &self {
            FacadeError::Upstream(_) => StatusCode::BAD_GATEWAY,
            FacadeError::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            FacadeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            FacadeError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Passes a successful upstream response through, otherwise turns it into an
/// error that carries the upstream status and message. Both Docker and
/// Kubernetes wrap errors in a JSON body with a `message` field.
pub(crate) async fn check_upstream(
    response: reqwest::Response,
) -> Result<reqwest::Response, FacadeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v["message"].as_str().map(|m| m.to_string()))
        .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });

    Err(FacadeError::UpstreamStatus {
        status: status.as_u16(),
        message,
    })
}
