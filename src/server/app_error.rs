use axum::{Json, http::StatusCode, response::IntoResponse};
use tracing::warn;

/// Error type for the webhook API.
///
/// This error type is used to convert errors into HTTP responses.
/// The standard error response looks like this:
///
/// ```json
/// {
///     "error": "ERROR_CODE",
///     "message": "Error message"
/// }
/// ```
#[derive(Debug, thiserror::Error, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AppError {
    #[error("Webhook token missing or mismatched")]
    InvalidToken,
}

/// Converts errors into HTTP responses.
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // Error code is the enum variant name in SCREAMING_SNAKE_CASE.
        let error_code = self.as_ref();
        let message = self.to_string();
        let status_code = match self {
            AppError::InvalidToken => StatusCode::FORBIDDEN,
        };
        let json = serde_json::json!({ "error": error_code, "message": message });

        warn!("Returning error {error_code}: {message}");
        (status_code, Json(json)).into_response()
    }
}
