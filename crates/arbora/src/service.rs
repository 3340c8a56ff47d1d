//! Generate/sync boundary.
//!
//! A [`DiagramService`] turns a prompt into a document and persists documents on a best-effort
//! basis. [`LocalService`] runs the parser and layout in-process; remote implementations
//! answer with the same document shape and go through [`GenerateResponse::from_remote_json`]
//! so downstream code never cares where a document came from. Nothing here retries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::render::{HeadlessError, LayoutOptions, LayoutSettings, layout_text_sync};
use arbora_core::{
    DEFAULT_CANVAS_PADDING, DiagramDocument, ParserKind, RenderConfig, UnzoomedRenderConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Headless(#[from] HeadlessError),
    #[error("service unavailable: {message}")]
    Unavailable { message: String },
    #[error("invalid service response: {message}")]
    InvalidResponse { message: String },
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateMode {
    Ai,
    #[default]
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    pub mode: GenerateMode,
    #[serde(default)]
    pub parser_kind: ParserKind,
    pub render_config: UnzoomedRenderConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_options: Option<LayoutSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub source: ResultSource,
    pub document: DiagramDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GenerateResponse {
    /// Decodes a remote answer, repairing clampable geometry and rejecting documents that
    /// still break the model invariants.
    pub fn from_remote_json(json: &str) -> Result<Self> {
        let mut response: GenerateResponse =
            serde_json::from_str(json).map_err(|err| ServiceError::InvalidResponse {
                message: err.to_string(),
            })?;
        let corrected = response.document.sanitize(DEFAULT_CANVAS_PADDING);
        if corrected > 0 {
            tracing::warn!(corrected, "repaired node geometry in remote document");
        }
        response
            .document
            .validate()
            .map_err(|err| ServiceError::InvalidResponse {
                message: err.to_string(),
            })?;
        Ok(response)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub tool_id: String,
    pub input: String,
    pub mode: GenerateMode,
    pub config: RenderConfig,
    pub document: DiagramDocument,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub source: ResultSource,
    pub synced_at: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<String>,
}

pub trait DiagramService {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;
    fn sync(&self, request: &SyncRequest) -> Result<SyncResponse>;
}

/// Async front for any service; completes without an executor of its own.
pub async fn generate_async(
    service: &(dyn DiagramService + Sync),
    request: GenerateRequest,
) -> Result<GenerateResponse> {
    service.generate(&request)
}

pub async fn sync_async(
    service: &(dyn DiagramService + Sync),
    request: SyncRequest,
) -> Result<SyncResponse> {
    service.sync(&request)
}

/// In-process service: parser + layout for `generate`, an acknowledgement for `sync`.
#[derive(Clone, Default)]
pub struct LocalService {
    /// Template for text measurement and timestamps; gaps and sizes come from each request.
    pub layout: LayoutOptions,
}

impl LocalService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: LayoutOptions) -> Self {
        Self { layout }
    }
}

impl DiagramService for LocalService {
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let config = request.render_config.clone().into_render_config(1.0);
        let mut options = LayoutOptions::from_render_config(&config)
            .with_text_measurer(self.layout.text_measurer.clone())
            .with_settings(
                request
                    .layout_options
                    .clone()
                    .unwrap_or_else(|| self.layout.settings.clone()),
            );
        options.generated_at = self.layout.generated_at;

        let document = layout_text_sync(request.parser_kind, &request.prompt, &options)?;
        let message = match request.mode {
            GenerateMode::Ai => {
                Some("AI generation runs remotely; parsed the prompt locally".to_string())
            }
            GenerateMode::Manual => None,
        };
        Ok(GenerateResponse {
            source: ResultSource::Local,
            document,
            message,
        })
    }

    fn sync(&self, request: &SyncRequest) -> Result<SyncResponse> {
        request
            .document
            .validate()
            .map_err(|err| ServiceError::Headless(err.into()))?;
        let sync_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(
            tool = request.tool_id.as_str(),
            sync_id = sync_id.as_str(),
            "recorded local sync"
        );
        Ok(SyncResponse {
            source: ResultSource::Local,
            synced_at: Utc::now(),
            message: "Saved locally".to_string(),
            sync_id: Some(sync_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.to_string(),
            mode: GenerateMode::Manual,
            parser_kind: ParserKind::Hierarchy,
            render_config: UnzoomedRenderConfig::default(),
            layout_options: None,
        }
    }

    #[test]
    fn request_json_omits_zoom() {
        let json = serde_json::to_value(generate_request("a")).unwrap();
        assert_eq!(json["mode"], "manual");
        assert_eq!(json["parserKind"], "hierarchy");
        assert!(json["renderConfig"].get("zoom").is_none());
        assert_eq!(json["renderConfig"]["nodeGapX"], 32.0);
        assert!(json.get("layoutOptions").is_none());
    }

    #[test]
    fn local_generate_matches_direct_layout() {
        let at = Utc::now();
        let service = LocalService::with_layout(LayoutOptions::default().with_generated_at(at));
        let response = service.generate(&generate_request("a\n  b\n  c")).unwrap();
        assert_eq!(response.source, ResultSource::Local);
        assert_eq!(response.message, None);

        let direct = layout_text_sync(
            ParserKind::Hierarchy,
            "a\n  b\n  c",
            &LayoutOptions::default().with_generated_at(at),
        )
        .unwrap();
        assert_eq!(response.document, direct);
    }

    #[test]
    fn request_layout_options_apply() {
        let service = LocalService::new();
        let mut request = generate_request("订单支付");
        request.layout_options = Some(LayoutSettings {
            single_char_per_line: true,
            ..LayoutSettings::default()
        });
        let response = service.generate(&request).unwrap();
        assert_eq!(response.document.nodes[0].label, "订\n单\n支\n付");
    }

    #[test]
    fn local_sync_acknowledges_with_an_id() {
        let service = LocalService::new();
        let document = service.generate(&generate_request("a")).unwrap().document;
        let response = service
            .sync(&SyncRequest {
                tool_id: "feature-structure".to_string(),
                input: "a".to_string(),
                mode: GenerateMode::Manual,
                config: RenderConfig::default(),
                document,
                synced_at: Utc::now(),
            })
            .unwrap();
        assert_eq!(response.source, ResultSource::Local);
        assert!(response.sync_id.is_some_and(|id| uuid::Uuid::parse_str(&id).is_ok()));
    }

    #[test]
    fn remote_json_is_repaired_or_rejected() {
        let service = LocalService::new();
        let mut response = service.generate(&generate_request("a\n  b")).unwrap();
        response.source = ResultSource::Remote;
        let mut value = serde_json::to_value(&response).unwrap();
        value["document"]["nodes"][1]["height"] = serde_json::json!(-3.0);
        value["document"]["width"] = serde_json::json!(1.0);

        let repaired = GenerateResponse::from_remote_json(&value.to_string()).unwrap();
        assert_eq!(repaired.source, ResultSource::Remote);
        repaired.document.validate().unwrap();

        value["document"]["nodes"][1]["id"] = serde_json::json!("node-0");
        assert!(matches!(
            GenerateResponse::from_remote_json(&value.to_string()),
            Err(ServiceError::InvalidResponse { .. })
        ));
        assert!(matches!(
            GenerateResponse::from_remote_json("not json"),
            Err(ServiceError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn async_front_delegates() {
        let service = LocalService::new();
        let response =
            futures::executor::block_on(generate_async(&service, generate_request("x"))).unwrap();
        assert_eq!(response.document.nodes.len(), 1);

        let request = SyncRequest {
            tool_id: "mind-map".to_string(),
            input: "x".to_string(),
            mode: GenerateMode::Manual,
            config: RenderConfig::default(),
            document: response.document,
            synced_at: Utc::now(),
        };
        let ack = futures::executor::block_on(sync_async(&service, request)).unwrap();
        assert_eq!(ack.source, ResultSource::Local);
        assert!(ack.sync_id.is_some());
    }
}
