mod app_error;
mod handlers;
mod ws;

use anyhow::{Context, Result};
use axum::{Router, routing::get, routing::post};
use std::sync::Arc;

use crate::{
    config::Config,
    notify::{HttpNotifier, Notify},
    registry::SubscriberRegistry,
    server::handlers::{ping, post_webhook},
    server::ws::ws_upgrade,
};

/// Shared application state.
pub struct AppState {
    pub registry: Arc<SubscriberRegistry>,
    pub notifier: Arc<dyn Notify + Send + Sync>,
    pub webhook_secret: Option<String>,
}

/// Creates the router over the given state. Used for testing, too.
pub fn make_server(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(post_webhook))
        .route("/ping", get(ping))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// Starts the server on the configured port.
pub async fn serve(config: Config) -> Result<()> {
    let state = Arc::new(AppState {
        registry: Arc::new(SubscriberRegistry::new()),
        notifier: Arc::new(HttpNotifier::new(config.notify_url)?),
        webhook_secret: config.webhook_secret,
    });
    let app = make_server(state);

    println!("Listening on http://localhost:{}", config.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind to port {}", config.port))?;

    axum::serve(listener, app)
        .await
        .with_context(|| "Failed to start server")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};
    use axum_test::TestServer;
    use std::sync::Mutex;
    use tokio::sync::mpsc::error::TryRecvError;

    use crate::event::PipelineEvent;

    /// Records every notified event instead of performing I/O.
    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<PipelineEvent>>,
    }

    #[async_trait::async_trait]
    impl Notify for RecordingNotifier {
        async fn notify(&self, event: &PipelineEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    struct TestContext {
        server: TestServer,
        registry: Arc<SubscriberRegistry>,
        notifier: Arc<RecordingNotifier>,
    }

    fn make_test_server(webhook_secret: Option<&str>) -> TestContext {
        let registry = Arc::new(SubscriberRegistry::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = Arc::new(AppState {
            registry: registry.clone(),
            notifier: notifier.clone(),
            webhook_secret: webhook_secret.map(str::to_string),
        });
        TestContext {
            server: TestServer::new(make_server(state)).unwrap(),
            registry,
            notifier,
        }
    }

    fn pipeline_body() -> serde_json::Value {
        serde_json::json!({
            "object_kind": "pipeline",
            "object_attributes": {
                "id": 42,
                "ref": "main",
                "status": "success",
                "finished_at": "2025-10-19 21:55:41 UTC",
                "source": "push"
            }
        })
    }

    fn token_header() -> HeaderName {
        HeaderName::from_static("x-gitlab-token")
    }

    #[tokio::test]
    async fn test_webhook_fans_out() {
        let ctx = make_test_server(None);
        let (_id, mut rx) = ctx.registry.connect().await;

        let response = ctx.server.post("/webhook").json(&pipeline_body()).await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.text(), "OK");

        let event: PipelineEvent = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(event.pipeline_id, 42);
        assert_eq!(event.updated_at, "2025-10-19T21:55:41Z");
        assert_eq!(*ctx.notifier.events.lock().unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn test_webhook_with_valid_token() {
        let ctx = make_test_server(Some("s3cret"));
        let response = ctx
            .server
            .post("/webhook")
            .add_header(token_header(), HeaderValue::from_static("s3cret"))
            .json(&pipeline_body())
            .await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(ctx.notifier.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_with_wrong_token_has_no_side_effects() {
        let ctx = make_test_server(Some("s3cret"));
        let (_id, mut rx) = ctx.registry.connect().await;

        let response = ctx
            .server
            .post("/webhook")
            .add_header(token_header(), HeaderValue::from_static("wrong"))
            .json(&pipeline_body())
            .await;
        assert_eq!(response.status_code(), 403);
        assert_eq!(response.json::<serde_json::Value>()["error"], "INVALID_TOKEN");

        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(ctx.notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_with_missing_token_is_rejected() {
        let ctx = make_test_server(Some("s3cret"));
        let response = ctx.server.post("/webhook").json(&pipeline_body()).await;
        assert_eq!(response.status_code(), 403);
    }

    #[tokio::test]
    async fn test_malformed_body_is_acknowledged_but_dropped() {
        let ctx = make_test_server(None);
        let (_id, mut rx) = ctx.registry.connect().await;

        let response = ctx.server.post("/webhook").text("{not json").await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.text(), "OK");

        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(ctx.notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_acknowledged_but_dropped() {
        let ctx = make_test_server(None);
        let response = ctx
            .server
            .post("/webhook")
            .json(&serde_json::json!({ "object_kind": "merge_request" }))
            .await;
        assert_eq!(response.status_code(), 200);
        assert!(ctx.notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ping() {
        let ctx = make_test_server(None);
        let response = ctx.server.get("/ping").await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.text(), "OK");
    }

    #[tokio::test]
    async fn test_wrong_method_is_rejected() {
        let ctx = make_test_server(None);
        assert_eq!(ctx.server.post("/ping").await.status_code(), 405);
        assert_eq!(ctx.server.get("/webhook").await.status_code(), 405);
    }
}
