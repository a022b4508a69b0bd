use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::event::PipelineEvent;

/// Cap on concurrently in-flight notification requests. Excess
/// notifications are dropped, not queued.
const MAX_IN_FLIGHT: usize = 8;

/// Outbound request timeout. A hung endpoint must not pin tasks forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatches a canonical event to an external notification endpoint.
///
/// Fire-and-forget: implementations must return promptly and keep the
/// outcome of the dispatch out of the caller's path.
#[async_trait::async_trait]
pub trait Notify {
    async fn notify(&self, event: &PipelineEvent);
}

/// Posts `{"content": "<summary>"}` to a chat webhook URL.
pub struct HttpNotifier {
    client: reqwest::Client,
    url: Option<String>,
    in_flight: Arc<Semaphore>,
}

impl HttpNotifier {
    /// With no URL configured, every notification is a no-op.
    pub fn new(url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build notification HTTP client")?;
        Ok(Self {
            client,
            url,
            in_flight: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
        })
    }
}

#[async_trait::async_trait]
impl Notify for HttpNotifier {
    async fn notify(&self, event: &PipelineEvent) {
        let Some(url) = self.url.clone() else {
            return;
        };
        let permit = match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Too many notifications in flight, dropping one");
                return;
            }
        };
        let client = self.client.clone();
        let body = serde_json::json!({ "content": summary(event) });
        let pipeline_id = event.pipeline_id;
        tokio::spawn(async move {
            let _permit = permit;
            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Notification for pipeline {pipeline_id} delivered");
                }
                Ok(response) => {
                    warn!(
                        "Notification endpoint rejected pipeline {pipeline_id}: {}",
                        response.status()
                    );
                }
                Err(err) => {
                    warn!("Notification for pipeline {pipeline_id} failed: {err}");
                }
            }
        });
    }
}

/// Human-readable multi-line summary of a canonical event.
pub fn summary(event: &PipelineEvent) -> String {
    let mut text = format!(
        "Pipeline #{} on `{}`\nStatus: {}\nUpdated: {}",
        event.pipeline_id, event.ref_name, event.status, event.updated_at
    );
    if let Some(source) = &event.source {
        text.push_str(&format!("\nSource: {source}"));
    }
    text
}
