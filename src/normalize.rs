use chrono::{SecondsFormat, Utc};
use serde::Deserialize;

use crate::event::{EventKind, PipelineEvent};
use crate::timestamp;

/// Reasons a raw webhook body does not yield a canonical event.
///
/// These are never surfaced to the webhook caller; the ingestion endpoint
/// logs them and acknowledges the request anyway.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Body is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing or unknown object_kind: '{0}'")]
    UnknownKind(String),

    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Job event carries no pipeline object")]
    DetachedJob,
}

/// Pipeline webhook: attributes live under `object_attributes`.
#[derive(Deserialize, Debug)]
struct RawAttributes {
    id: Option<i64>,
    #[serde(rename = "ref")]
    ref_name: Option<String>,
    status: Option<String>,
    finished_at: Option<String>,
    created_at: Option<String>,
    source: Option<String>,
}

/// Job webhook: the pipeline is nested inside a `build` wrapper, and the
/// job-level timestamps are the freshness signal.
#[derive(Deserialize, Debug)]
struct RawBuild {
    finished_at: Option<String>,
    started_at: Option<String>,
    pipeline: Option<RawNestedPipeline>,
}

#[derive(Deserialize, Debug)]
struct RawNestedPipeline {
    id: Option<i64>,
    #[serde(rename = "ref")]
    ref_name: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawWebhook {
    object_kind: Option<String>,
    object_attributes: Option<RawAttributes>,
    build: Option<RawBuild>,
}

/// Classifies a raw webhook body and produces the canonical event.
///
/// Job events are reclassified as pipeline events: the nested pipeline
/// supplies identity and status, while the job's own timestamps supply
/// `updated_at`, since job completion is usually the true freshness signal
/// for the pipeline's displayed status.
pub fn normalize(body: &[u8]) -> Result<PipelineEvent, NormalizeError> {
    let raw: RawWebhook = serde_json::from_slice(body)?;
    match raw.object_kind.as_deref() {
        Some("pipeline") => {
            let attrs = raw
                .object_attributes
                .ok_or(NormalizeError::MissingField("object_attributes"))?;
            let updated_at =
                derive_updated_at(attrs.finished_at.as_deref(), attrs.created_at.as_deref());
            Ok(PipelineEvent {
                kind: EventKind::Pipeline,
                pipeline_id: attrs.id.ok_or(NormalizeError::MissingField("id"))?,
                ref_name: attrs.ref_name.ok_or(NormalizeError::MissingField("ref"))?,
                status: attrs.status.ok_or(NormalizeError::MissingField("status"))?,
                updated_at,
                source: attrs.source,
            })
        }
        Some("job") => {
            let build = raw.build.ok_or(NormalizeError::MissingField("build"))?;
            let pipeline = build.pipeline.ok_or(NormalizeError::DetachedJob)?;
            let updated_at =
                derive_updated_at(build.finished_at.as_deref(), build.started_at.as_deref());
            Ok(PipelineEvent {
                kind: EventKind::Pipeline,
                pipeline_id: pipeline.id.ok_or(NormalizeError::MissingField("id"))?,
                ref_name: pipeline.ref_name.ok_or(NormalizeError::MissingField("ref"))?,
                status: pipeline.status.ok_or(NormalizeError::MissingField("status"))?,
                updated_at,
                source: None,
            })
        }
        other => Err(NormalizeError::UnknownKind(
            other.unwrap_or("<missing>").to_string(),
        )),
    }
}

/// Picks the freshest available timestamp and normalizes it, falling back to
/// the current wall-clock time when the payload carries none.
fn derive_updated_at(first: Option<&str>, second: Option<&str>) -> String {
    first
        .and_then(timestamp::normalize)
        .or_else(|| second.and_then(timestamp::normalize))
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
}
