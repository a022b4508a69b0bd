use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::{
    normalize::normalize,
    server::{AppState, app_error::AppError},
};

/// Header carrying the shared webhook secret.
const TOKEN_HEADER: &str = "X-Gitlab-Token";

/// Ingests one raw webhook body and fans the canonical event out.
///
/// Always acknowledges with `200 "OK"` once the body has been read, even
/// when normalization fails; a non-success response here would only trigger
/// provider-side retry storms. Failures are observable in the logs.
#[axum::debug_handler]
#[instrument(skip_all)]
pub async fn post_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    if let Some(expected) = &state.webhook_secret {
        let provided = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(AppError::InvalidToken);
        }
    }

    match normalize(&body) {
        Ok(event) => {
            debug!("Accepted pipeline {} event: {}", event.pipeline_id, event.status);
            state.registry.broadcast(&event).await;
            state.notifier.notify(&event).await;
        }
        Err(err) => warn!("Dropping webhook payload: {err}"),
    }
    Ok("OK")
}

/// Liveness probe for external uptime monitors.
#[axum::debug_handler]
pub async fn ping() -> &'static str {
    "OK"
}
