#![forbid(unsafe_code)]

//! `arbora` is a headless text-to-diagram compiler.
//!
//! Indented text (or a small relation/flow grammar) is parsed, laid out into a positioned
//! [`DiagramDocument`], and rendered to SVG. PNG is always derived from that SVG.
//!
//! # Features
//!
//! - `render` (default): layout + SVG (`arbora::render`), export, drafts, sessions
//! - `raster`: PNG output via pure-Rust SVG rasterization (`arbora::render::raster`)

pub use arbora_core::*;

pub mod history;

#[cfg(feature = "render")]
pub mod draft;
#[cfg(feature = "render")]
pub mod export;
#[cfg(feature = "render")]
pub mod service;
#[cfg(feature = "render")]
pub mod session;

#[cfg(feature = "render")]
pub mod render {
    pub use arbora_render::handles::{
        DEFAULT_HANDLE_SIZE, HandleBox, ResizeHandle, apply_drag, handle_boxes, hit_test,
        primary_root_handle_at, resize_primary_root,
    };
    pub use arbora_render::text::{DeterministicTextMeasurer, TextMeasurer, TextMetrics, TextStyle};
    pub use arbora_render::{LayoutOptions, LayoutSettings, document_from_json, layout_parsed};

    use arbora_core::{DiagramDocument, ParserKind, RenderConfig};

    #[cfg(feature = "raster")]
    pub mod raster;

    #[derive(Debug, thiserror::Error)]
    pub enum HeadlessError {
        #[error(transparent)]
        Parse(#[from] arbora_core::Error),
        #[error(transparent)]
        Render(#[from] arbora_render::Error),
    }

    pub type Result<T> = std::result::Result<T, HeadlessError>;

    /// Synchronous layout helper (executor-free).
    pub fn layout_text_sync(
        kind: ParserKind,
        text: &str,
        options: &LayoutOptions,
    ) -> Result<DiagramDocument> {
        Ok(arbora_render::layout_text(kind, text, options)?)
    }

    pub async fn layout_text(
        kind: ParserKind,
        text: &str,
        options: &LayoutOptions,
    ) -> Result<DiagramDocument> {
        layout_text_sync(kind, text, options)
    }

    pub fn render_document_svg(doc: &DiagramDocument, config: &RenderConfig) -> Result<String> {
        Ok(arbora_render::svg::render_svg(doc, config)?)
    }

    /// Synchronous text-to-SVG helper (executor-free).
    pub fn render_svg_sync(
        kind: ParserKind,
        text: &str,
        options: &LayoutOptions,
        config: &RenderConfig,
    ) -> Result<String> {
        let doc = layout_text_sync(kind, text, options)?;
        render_document_svg(&doc, config)
    }

    pub async fn render_svg(
        kind: ParserKind,
        text: &str,
        options: &LayoutOptions,
        config: &RenderConfig,
    ) -> Result<String> {
        render_svg_sync(kind, text, options, config)
    }

    /// Bundles layout options and a render config so UI integrations pass one value around.
    ///
    /// Layout options are derived from the config; change layout-affecting fields through
    /// [`HeadlessRenderer::with_config`] so both stay in step.
    #[derive(Clone)]
    pub struct HeadlessRenderer {
        pub layout: LayoutOptions,
        pub config: RenderConfig,
    }

    impl Default for HeadlessRenderer {
        fn default() -> Self {
            Self::with_config(RenderConfig::default())
        }
    }

    impl HeadlessRenderer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_config(config: RenderConfig) -> Self {
            Self {
                layout: LayoutOptions::from_render_config(&config),
                config,
            }
        }

        pub fn with_settings(mut self, settings: LayoutSettings) -> Self {
            self.layout = self.layout.with_settings(settings);
            self
        }

        pub fn layout_sync(&self, kind: ParserKind, text: &str) -> Result<DiagramDocument> {
            layout_text_sync(kind, text, &self.layout)
        }

        pub fn render_svg_sync(&self, kind: ParserKind, text: &str) -> Result<String> {
            render_svg_sync(kind, text, &self.layout, &self.config)
        }

        #[cfg(feature = "raster")]
        pub fn render_png_sync(&self, kind: ParserKind, text: &str) -> raster::Result<Vec<u8>> {
            let doc = self.layout_sync(kind, text)?;
            raster::render_png(&doc, &self.config, &raster::RasterOptions::default())
        }
    }

}
