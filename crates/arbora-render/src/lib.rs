#![forbid(unsafe_code)]

//! Headless layout + SVG rendering for arbora diagram documents.
//!
//! `layout_parsed` turns parser output into a positioned [`DiagramDocument`]; `svg::render_svg`
//! turns a document into markup. Both are pure: identical inputs give identical outputs,
//! except for `generatedAt`, which can be pinned through [`LayoutOptions::generated_at`].

pub mod handles;
pub mod layout;
pub mod svg;
pub mod text;

use crate::text::{DeterministicTextMeasurer, TextMeasurer};
use arbora_core::{
    DEFAULT_CANVAS_PADDING, DiagramDocument, IndentOptions, ParsedDiagram, ParserKind,
    RenderConfig,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] arbora_core::Error),
    #[error("document JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Layout switches that are not part of [`RenderConfig`]. Serializable so that a generate
/// request can carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutSettings {
    pub single_char_per_line: bool,
    pub avoid_crossing: bool,
    pub tab_width: usize,
    pub padding: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            single_char_per_line: false,
            avoid_crossing: false,
            tab_width: arbora_core::parser::DEFAULT_TAB_WIDTH,
            padding: DEFAULT_CANVAS_PADDING,
        }
    }
}

#[derive(Clone)]
pub struct LayoutOptions {
    pub text_measurer: Arc<dyn TextMeasurer + Send + Sync>,
    pub node_gap_x: f64,
    pub node_gap_y: f64,
    pub font_size: f64,
    pub node_width: f64,
    pub compact_rows: bool,
    pub settings: LayoutSettings,
    /// Fixed timestamp for reproducible documents; `None` reads the clock.
    pub generated_at: Option<DateTime<Utc>>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self::from_render_config(&RenderConfig::default())
    }
}

impl LayoutOptions {
    /// Takes the layout-affecting subset of `config`.
    pub fn from_render_config(config: &RenderConfig) -> Self {
        let config = config.sanitized();
        Self {
            text_measurer: Arc::new(DeterministicTextMeasurer::default()),
            node_gap_x: config.node_gap_x,
            node_gap_y: config.node_gap_y,
            font_size: config.font_size,
            node_width: config.node_width,
            compact_rows: config.compact_rows,
            settings: LayoutSettings::default(),
            generated_at: None,
        }
    }

    pub fn with_settings(mut self, settings: LayoutSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer + Send + Sync>) -> Self {
        self.text_measurer = measurer;
        self
    }

    pub fn indent_options(&self) -> IndentOptions {
        IndentOptions {
            tab_width: self.settings.tab_width,
        }
    }

    pub(crate) fn padding(&self) -> f64 {
        arbora_core::canvas_padding(self.settings.padding)
    }
}

pub fn layout_parsed(parsed: &ParsedDiagram, options: &LayoutOptions) -> Result<DiagramDocument> {
    let doc = match parsed {
        ParsedDiagram::Hierarchy(items) => {
            layout::tree::layout_tree(items, ParserKind::Hierarchy, options)
        }
        ParsedDiagram::Mind(items) => layout::tree::layout_tree(items, ParserKind::Mind, options),
        ParsedDiagram::EntityRelation(graph) => {
            layout::graph::layout_graph(graph, ParserKind::EntityRelation, options)
        }
        ParsedDiagram::Flow(graph) => layout::graph::layout_graph(graph, ParserKind::Flow, options),
    };
    doc.validate()?;
    tracing::debug!(
        kind = %doc.parser_kind,
        nodes = doc.nodes.len(),
        edges = doc.edges.len(),
        width = doc.width,
        height = doc.height,
        "laid out document"
    );
    Ok(doc)
}

/// Parses and lays out `text` in one step.
pub fn layout_text(kind: ParserKind, text: &str, options: &LayoutOptions) -> Result<DiagramDocument> {
    let parsed = arbora_core::parse(kind, text, &options.indent_options());
    layout_parsed(&parsed, options)
}

/// Reads a document produced elsewhere (a remote service, a saved file), repairs clampable
/// geometry and checks the remaining invariants.
pub fn document_from_json(json: &str, padding: f64) -> Result<DiagramDocument> {
    let mut doc: DiagramDocument = serde_json::from_str(json)?;
    let corrected = doc.sanitize(padding);
    if corrected > 0 {
        tracing::warn!(corrected, "repaired node geometry in incoming document");
    }
    doc.validate()?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn options_take_layout_fields_from_config() {
        let cfg = RenderConfig {
            node_gap_x: 10.0,
            zoom: 3.0,
            ..RenderConfig::default()
        };
        let opts = LayoutOptions::from_render_config(&cfg);
        assert_eq!(opts.node_gap_x, 10.0);
        assert_eq!(opts.font_size, cfg.font_size);
        assert_eq!(opts.settings, LayoutSettings::default());
    }

    #[test]
    fn layout_text_pins_generated_at() {
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        let opts = LayoutOptions::default().with_generated_at(at);
        let doc = layout_text(ParserKind::Hierarchy, "a\n  b", &opts).unwrap();
        assert_eq!(doc.generated_at, at);
        assert_eq!(doc.title, "a");
    }

    #[test]
    fn document_from_json_repairs_and_rejects() {
        let opts = LayoutOptions::default();
        let doc = layout_text(ParserKind::Flow, "a -> b", &opts).unwrap();
        let mut value = serde_json::to_value(&doc).unwrap();
        value["nodes"][0]["width"] = serde_json::json!(0.0);
        let repaired = document_from_json(&value.to_string(), 48.0).unwrap();
        assert!(repaired.nodes[0].width > 0.0);

        value["nodes"][1]["id"] = value["nodes"][0]["id"].clone();
        assert!(matches!(
            document_from_json(&value.to_string(), 48.0),
            Err(Error::Core(arbora_core::Error::DuplicateNode { .. }))
        ));
        assert!(matches!(
            document_from_json("{", 48.0),
            Err(Error::Json(_))
        ));
    }
}
