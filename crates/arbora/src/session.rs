//! Per-tool editing session.
//!
//! A [`Session`] owns everything one diagram tool needs between user actions: the source text,
//! the render config, the current document and its undo history. Every operation leaves the
//! session with a valid document (or none, before the first layout); failures surface as
//! [`Notice`]s instead of tearing the document down.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::draft::{self, Draft, DraftStore};
use crate::export::{ExportArtifact, ExportFormat, ExportRequest, export_document};
use crate::history::History;
use crate::render::{
    DeterministicTextMeasurer, HeadlessError, LayoutOptions, LayoutSettings, ResizeHandle,
    TextMeasurer, layout_text_sync, primary_root_handle_at, render_document_svg,
    resize_primary_root,
};
use crate::service::{DiagramService, GenerateMode, GenerateRequest, SyncRequest, SyncResponse};
use arbora_core::geom::{Point, Vector};
use arbora_core::{DiagramDocument, ParserKind, RenderConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

pub struct Session {
    tool_id: String,
    parser_kind: ParserKind,
    input: String,
    mode: GenerateMode,
    config: RenderConfig,
    settings: LayoutSettings,
    text_measurer: Arc<dyn TextMeasurer + Send + Sync>,
    generated_at: Option<DateTime<Utc>>,
    document: Option<DiagramDocument>,
    history: History<DiagramDocument>,
    notices: Vec<Notice>,
    last_sync: Option<SyncResponse>,
}

impl Session {
    pub fn new(tool_id: impl Into<String>, parser_kind: ParserKind) -> Self {
        Self {
            tool_id: tool_id.into(),
            parser_kind,
            input: String::new(),
            mode: GenerateMode::default(),
            config: RenderConfig::default(),
            settings: LayoutSettings::default(),
            text_measurer: Arc::new(DeterministicTextMeasurer::default()),
            generated_at: None,
            document: None,
            history: History::default(),
            notices: Vec::new(),
            last_sync: None,
        }
    }

    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer + Send + Sync>) -> Self {
        self.text_measurer = measurer;
        self
    }

    /// Stamps every document produced by this session with `at` instead of the clock.
    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    pub fn parser_kind(&self) -> ParserKind {
        self.parser_kind
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn mode(&self) -> GenerateMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: GenerateMode) {
        self.mode = mode;
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    pub fn document(&self) -> Option<&DiagramDocument> {
        self.document.as_ref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn last_sync(&self) -> Option<&SyncResponse> {
        self.last_sync.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn layout_options(&self) -> LayoutOptions {
        self.options_for(&self.config, &self.settings)
    }

    fn options_for(&self, config: &RenderConfig, settings: &LayoutSettings) -> LayoutOptions {
        let mut options = LayoutOptions::from_render_config(config)
            .with_text_measurer(self.text_measurer.clone())
            .with_settings(settings.clone());
        options.generated_at = self.generated_at;
        options
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice::new(level, message));
    }

    /// Replaces the current document, recording the old one for undo.
    fn replace_document(&mut self, next: DiagramDocument) {
        if let Some(previous) = self.document.replace(next) {
            self.history.push(previous);
        }
    }

    /// Lays out `input` without touching session state. A failure is recorded as a notice.
    fn try_layout(
        &mut self,
        kind: ParserKind,
        input: &str,
        options: &LayoutOptions,
    ) -> Result<DiagramDocument, HeadlessError> {
        layout_text_sync(kind, input, options).map_err(|err| {
            tracing::warn!(
                tool = self.tool_id.as_str(),
                %err,
                "layout failed; keeping previous document"
            );
            self.notify(NoticeLevel::Error, format!("Layout failed: {err}"));
            err
        })
    }

    /// Stores new source text and lays it out again. The text is kept even when layout
    /// fails so the editor still shows what was typed.
    pub fn set_input(&mut self, input: impl Into<String>) -> Result<(), HeadlessError> {
        self.input = input.into();
        let input = self.input.clone();
        let doc = self.try_layout(self.parser_kind, &input, &self.layout_options())?;
        self.replace_document(doc);
        Ok(())
    }

    pub fn set_parser_kind(&mut self, kind: ParserKind) -> Result<(), HeadlessError> {
        if kind == self.parser_kind && self.document.is_some() {
            return Ok(());
        }
        let input = self.input.clone();
        let doc = self.try_layout(kind, &input, &self.layout_options())?;
        self.parser_kind = kind;
        self.replace_document(doc);
        Ok(())
    }

    /// Applies a new config. Returns `true` when the change required a fresh layout. If that
    /// layout fails, the previous config and document stay in place.
    pub fn set_config(&mut self, config: RenderConfig) -> Result<bool, HeadlessError> {
        let config = config.sanitized();
        if !(self.config.affects_layout(&config) && self.document.is_some()) {
            self.config = config;
            return Ok(false);
        }
        let input = self.input.clone();
        let options = self.options_for(&config, &self.settings);
        let doc = self.try_layout(self.parser_kind, &input, &options)?;
        self.config = config;
        self.replace_document(doc);
        Ok(true)
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.config = self.config.clone().with_zoom(zoom).sanitized();
    }

    pub fn set_settings(&mut self, settings: LayoutSettings) -> Result<(), HeadlessError> {
        if settings == self.settings {
            return Ok(());
        }
        if self.document.is_some() {
            let input = self.input.clone();
            let options = self.options_for(&self.config, &settings);
            let doc = self.try_layout(self.parser_kind, &input, &options)?;
            self.replace_document(doc);
        }
        self.settings = settings;
        Ok(())
    }

    /// SVG for the current document at the current zoom.
    pub fn render_svg(&self) -> Result<Option<String>, HeadlessError> {
        self.document
            .as_ref()
            .map(|doc| render_document_svg(doc, &self.config))
            .transpose()
    }

    /// Asks `service` for a document built from the current input. On failure the previous
    /// document stays in place and an error notice is recorded. Returns whether a new
    /// document was installed.
    pub fn generate(&mut self, service: &dyn DiagramService, mode: GenerateMode) -> bool {
        self.mode = mode;
        let request = GenerateRequest {
            prompt: self.input.clone(),
            mode,
            parser_kind: self.parser_kind,
            render_config: self.config.without_zoom(),
            layout_options: Some(self.settings.clone()),
        };
        match service.generate(&request) {
            Ok(response) => {
                let source = response.source;
                self.replace_document(response.document);
                let message = response
                    .message
                    .unwrap_or_else(|| "Diagram generated".to_string());
                tracing::info!(tool = self.tool_id.as_str(), ?source, "generated document");
                self.notify(NoticeLevel::Success, message);
                true
            }
            Err(err) => {
                tracing::warn!(tool = self.tool_id.as_str(), %err, "generation failed");
                let kept = if self.document.is_some() {
                    "; kept the previous diagram"
                } else {
                    ""
                };
                self.notify(NoticeLevel::Error, format!("Generation failed: {err}{kept}"));
                false
            }
        }
    }

    /// Best-effort sync of the current document. Failure only adds a notice.
    pub fn sync(&mut self, service: &dyn DiagramService) -> Option<&SyncResponse> {
        let Some(document) = self.document.clone() else {
            self.notify(NoticeLevel::Info, "Nothing to sync yet");
            return None;
        };
        let request = SyncRequest {
            tool_id: self.tool_id.clone(),
            input: self.input.clone(),
            mode: self.mode,
            config: self.config.clone(),
            document,
            synced_at: Utc::now(),
        };
        match service.sync(&request) {
            Ok(response) => {
                self.notify(NoticeLevel::Success, response.message.clone());
                self.last_sync = Some(response);
                self.last_sync.as_ref()
            }
            Err(err) => {
                tracing::warn!(tool = self.tool_id.as_str(), %err, "sync failed");
                self.notify(NoticeLevel::Error, format!("Sync failed: {err}"));
                None
            }
        }
    }

    /// The resize handle of the primary root under a screen-space point.
    pub fn handle_at(&self, at: Point) -> Option<ResizeHandle> {
        primary_root_handle_at(self.document.as_ref()?, self.config.zoom, at)
    }

    /// Drags a handle of the primary root by a screen-space `delta`. Returns `true` when the
    /// document changed.
    pub fn resize_primary_root(
        &mut self,
        handle: ResizeHandle,
        delta: Vector,
    ) -> arbora_core::Result<bool> {
        let Some(doc) = self.document.as_mut() else {
            return Ok(false);
        };
        let snapshot = doc.clone();
        match resize_primary_root(doc, handle, delta, self.config.zoom, self.settings.padding)? {
            Some(_) if *doc != snapshot => {
                self.history.push(snapshot);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn undo(&mut self) -> bool {
        let Some(current) = self.document.take() else {
            return false;
        };
        match self.history.undo(current.clone()) {
            Some(previous) => {
                self.document = Some(previous);
                true
            }
            None => {
                self.document = Some(current);
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        let Some(current) = self.document.take() else {
            return false;
        };
        match self.history.redo(current.clone()) {
            Some(next) => {
                self.document = Some(next);
                true
            }
            None => {
                self.document = Some(current);
                false
            }
        }
    }

    /// Exports a snapshot of the current document. The document is never touched, whatever
    /// the outcome.
    pub fn export(&mut self, format: ExportFormat, file_name: &str) -> Option<ExportArtifact> {
        let Some(document) = self.document.clone() else {
            self.notify(NoticeLevel::Info, "Nothing to export yet");
            return None;
        };
        let request = ExportRequest {
            document,
            format,
            file_name: file_name.to_string(),
            config: self.config.clone(),
        };
        match export_document(&request) {
            Ok(artifact) => {
                self.notify(
                    NoticeLevel::Success,
                    format!("Exported {}", artifact.file_name),
                );
                Some(artifact)
            }
            Err(err) => {
                tracing::warn!(tool = self.tool_id.as_str(), %format, %err, "export failed");
                self.notify(NoticeLevel::Error, format!("Export failed: {err}"));
                None
            }
        }
    }

    pub fn draft(&self) -> Draft {
        Draft {
            input: self.input.clone(),
            mode: self.mode,
            config: self.config.clone(),
            parser_kind: self.parser_kind,
            document: self.document.clone(),
        }
    }

    pub fn save_draft(&mut self, store: &mut dyn DraftStore) -> bool {
        let draft = self.draft();
        match draft::save_draft(store, &self.tool_id, &draft) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(tool = self.tool_id.as_str(), %err, "could not save draft");
                self.notify(NoticeLevel::Error, format!("Could not save draft: {err}"));
                false
            }
        }
    }

    /// Restores this tool's draft, if any. A stored document that no longer validates is
    /// rebuilt from the stored input. History starts empty. When the rebuild fails the
    /// session is left exactly as it was.
    pub fn restore_draft(&mut self, store: &dyn DraftStore) -> bool {
        let Some(draft) = draft::load_draft(store, &self.tool_id) else {
            return false;
        };
        let config = draft.config.sanitized();
        let document = match draft.document.filter(|doc| doc.validate().is_ok()) {
            Some(doc) => Some(doc),
            None if !draft.input.is_empty() => {
                let options = self.options_for(&config, &self.settings);
                match self.try_layout(draft.parser_kind, &draft.input, &options) {
                    Ok(doc) => Some(doc),
                    Err(_) => return false,
                }
            }
            None => None,
        };

        self.input = draft.input;
        self.mode = draft.mode;
        self.config = config;
        self.parser_kind = draft.parser_kind;
        self.history.clear();
        self.document = document;
        self.notify(NoticeLevel::Info, "Restored draft");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::MemoryDraftStore;
    use crate::service::{GenerateResponse, LocalService, ServiceError};
    use arbora_core::geom::{point, vector};
    use chrono::TimeZone;

    struct Offline;

    impl DiagramService for Offline {
        fn generate(&self, _: &GenerateRequest) -> crate::service::Result<GenerateResponse> {
            Err(ServiceError::Unavailable {
                message: "offline".to_string(),
            })
        }

        fn sync(&self, _: &SyncRequest) -> crate::service::Result<SyncResponse> {
            Err(ServiceError::Unavailable {
                message: "offline".to_string(),
            })
        }
    }

    fn session() -> Session {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Session::new("feature-structure", ParserKind::Hierarchy).with_generated_at(at)
    }

    #[test]
    fn set_input_lays_out_and_records_history() {
        let mut s = session();
        s.set_input("系统\n  商品模块").unwrap();
        assert_eq!(s.document().unwrap().nodes.len(), 2);
        assert!(!s.can_undo());

        s.set_input("系统\n  商品模块\n  订单模块").unwrap();
        assert_eq!(s.document().unwrap().nodes.len(), 3);
        assert!(s.undo());
        assert_eq!(s.document().unwrap().nodes.len(), 2);
        assert!(s.redo());
        assert_eq!(s.document().unwrap().nodes.len(), 3);
    }

    #[test]
    fn render_only_config_changes_skip_layout() {
        let mut s = session();
        s.set_input("a\n  b").unwrap();
        let before = s.document().cloned();

        let relaid = s
            .set_config(RenderConfig {
                shadow: true,
                zoom: 2.0,
                ..RenderConfig::default()
            })
            .unwrap();
        assert!(!relaid);
        assert_eq!(s.document().cloned(), before);
        assert!(!s.can_undo());

        let relaid = s
            .set_config(RenderConfig {
                node_gap_y: 120.0,
                ..s.config().clone()
            })
            .unwrap();
        assert!(relaid);
        assert!(s.document().unwrap().height > before.unwrap().height);
    }

    #[test]
    fn failed_generation_keeps_last_good_document() {
        let mut s = session();
        s.set_input("a\n  b").unwrap();
        let before = s.document().cloned();

        assert!(!s.generate(&Offline, GenerateMode::Ai));
        assert_eq!(s.document().cloned(), before);
        let notice = s.notices().last().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("offline"));
        assert!(notice.message.contains("kept the previous diagram"));
        assert_eq!(s.mode(), GenerateMode::Ai);
    }

    #[test]
    fn local_generation_installs_a_document() {
        let mut s = session();
        s.set_input("root\n  child").unwrap();
        let service = LocalService::with_layout(s.layout_options());
        assert!(s.generate(&service, GenerateMode::Manual));
        assert_eq!(s.notices().last().unwrap().level, NoticeLevel::Success);
        assert!(s.can_undo());
    }

    #[test]
    fn sync_failure_is_only_a_notice() {
        let mut s = session();
        assert!(s.sync(&LocalService::new()).is_none());
        assert_eq!(s.take_notices()[0].level, NoticeLevel::Info);

        s.set_input("a").unwrap();
        assert!(s.sync(&Offline).is_none());
        assert_eq!(s.notices().last().unwrap().level, NoticeLevel::Error);
        assert!(s.document().is_some());

        let response = s.sync(&LocalService::new()).cloned().unwrap();
        assert!(response.sync_id.is_some());
        assert_eq!(s.last_sync(), Some(&response));
    }

    #[test]
    fn resizing_the_root_is_undoable() {
        let mut s = session();
        s.set_input("系统\n  商品模块\n  订单模块").unwrap();
        s.set_zoom(2.0);
        let root = s.document().unwrap().primary_root().unwrap().clone();

        let corner = point((root.x + root.width) * 2.0, (root.y + root.height) * 2.0);
        assert_eq!(s.handle_at(corner), Some(ResizeHandle::SouthEast));

        assert!(s.resize_primary_root(ResizeHandle::SouthEast, vector(40.0, 20.0)).unwrap());
        let resized = s.document().unwrap().node(&root.id).unwrap().clone();
        assert_eq!(resized.width, root.width + 20.0);
        assert_eq!(resized.height, root.height + 10.0);
        s.document().unwrap().validate().unwrap();

        assert!(s.undo());
        assert_eq!(s.document().unwrap().node(&root.id).unwrap().width, root.width);
    }

    #[test]
    fn export_never_discards_the_document() {
        let mut s = session();
        assert!(s.export(ExportFormat::Svg, "x").is_none());

        s.set_input("a\n  b").unwrap();
        let artifact = s.export(ExportFormat::Svg, "tree").unwrap();
        assert_eq!(artifact.file_name, "tree.svg");

        s.document.as_mut().unwrap().nodes[0].width = f64::NAN;
        assert!(s.export(ExportFormat::Svg, "broken").is_none());
        assert_eq!(s.notices().last().unwrap().level, NoticeLevel::Error);
        assert!(s.document().unwrap().nodes[0].width.is_nan());
    }

    #[test]
    fn drafts_restore_per_tool() {
        let mut store = MemoryDraftStore::new();
        let mut s = session();
        s.set_input("a\n  b").unwrap();
        s.set_zoom(1.5);
        assert!(s.save_draft(&mut store));

        let mut restored = session();
        assert!(restored.restore_draft(&store));
        assert_eq!(restored.input(), "a\n  b");
        assert_eq!(restored.config().zoom, 1.5);
        assert_eq!(restored.document(), s.document());
        assert!(!restored.can_undo());

        let mut other = Session::new("mind-map", ParserKind::Mind);
        assert!(!other.restore_draft(&store));
        assert!(other.document().is_none());
    }

    #[test]
    fn invalid_stored_document_is_rebuilt_from_input() {
        let mut store = MemoryDraftStore::new();
        let mut s = session();
        s.set_input("a\n  b").unwrap();
        let mut draft = s.draft();
        if let Some(doc) = draft.document.as_mut() {
            doc.nodes[1].id = doc.nodes[0].id.clone();
        }
        draft::save_draft(&mut store, s.tool_id(), &draft).unwrap();

        let mut restored = session();
        assert!(restored.restore_draft(&store));
        assert_eq!(restored.document(), s.document());
    }

    fn overflowing_gaps() -> RenderConfig {
        RenderConfig {
            node_gap_x: 1e308,
            ..RenderConfig::default()
        }
    }

    #[test]
    fn unusable_draft_leaves_the_session_untouched() {
        let mut store = MemoryDraftStore::new();
        let draft = Draft {
            input: "a\n  b\n  c\n  d".to_string(),
            mode: GenerateMode::Ai,
            config: overflowing_gaps(),
            parser_kind: ParserKind::Hierarchy,
            document: None,
        };
        draft::save_draft(&mut store, "feature-structure", &draft).unwrap();

        let mut s = session();
        s.set_input("keep\n  me").unwrap();
        s.set_input("keep\n  me\n  too").unwrap();
        let before = s.document().cloned();

        assert!(!s.restore_draft(&store));
        assert_eq!(s.document().cloned(), before);
        assert_eq!(s.input(), "keep\n  me\n  too");
        assert_eq!(s.config(), &RenderConfig::default());
        assert_eq!(s.mode(), GenerateMode::Manual);
        assert!(s.can_undo());
        assert_eq!(s.notices().last().unwrap().level, NoticeLevel::Error);
    }

    #[test]
    fn failed_relayout_keeps_config_and_document() {
        let mut s = session();
        s.set_input("a\n  b\n  c\n  d").unwrap();
        let before = s.document().cloned();

        assert!(s.set_config(overflowing_gaps()).is_err());
        assert_eq!(s.config(), &RenderConfig::default());
        assert_eq!(s.document().cloned(), before);
        assert!(!s.can_undo());
    }
}
