use serde::{Deserialize, Serialize};

/// Discriminator on the canonical event. Job webhooks are reconciled into
/// pipeline events, so this is the only kind subscribers ever see.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Pipeline,
}

/// The single normalized shape pushed to all downstream consumers.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineEvent {
    pub kind: EventKind,
    pub pipeline_id: i64,
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// Provider status token, passed through verbatim.
    pub status: String,
    /// RFC3339 UTC timestamp, always ending in `Z`.
    pub updated_at: String,
    /// Trigger origin; only pipeline-kind raw payloads carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}
