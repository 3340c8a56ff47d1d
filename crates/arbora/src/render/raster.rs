#![forbid(unsafe_code)]

use crate::render::{HeadlessError, render_document_svg};
use arbora_core::{DiagramDocument, RenderConfig};

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error(transparent)]
    Headless(#[from] HeadlessError),
    #[error("no drawing surface available for a {width}x{height} raster")]
    NoDrawingSurface { width: u32, height: u32 },
    #[error("SVG rendering failed")]
    SvgRendering,
    #[error("failed to encode PNG")]
    PngEncode,
}

pub type Result<T> = std::result::Result<T, RasterError>;

#[derive(Debug, Clone)]
pub struct RasterOptions {
    pub scale: f32,
    /// Fill applied before drawing; `None` keeps the surface transparent.
    pub background: Option<String>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            background: Some("white".to_string()),
        }
    }
}

/// Rasterizes `doc` at its declared size. The SVG is rendered at zoom 1 so the image does not
/// depend on the current on-screen zoom.
pub fn render_png(
    doc: &DiagramDocument,
    config: &RenderConfig,
    options: &RasterOptions,
) -> Result<Vec<u8>> {
    let unzoomed = config.clone().with_zoom(1.0);
    let svg = render_document_svg(doc, &unzoomed)?;
    svg_to_png(&svg, doc.width, doc.height, options)
}

/// Owns its snapshot so that later edits to the caller's document cannot leak into the image.
pub async fn render_png_async(
    doc: DiagramDocument,
    config: RenderConfig,
    options: RasterOptions,
) -> Result<Vec<u8>> {
    render_png(&doc, &config, &options)
}

pub fn svg_to_png(svg: &str, width: f64, height: f64, options: &RasterOptions) -> Result<Vec<u8>> {
    let pixmap = svg_to_pixmap(svg, width, height, options)?;
    pixmap.encode_png().map_err(|_| RasterError::PngEncode)
}

fn pixel_extent(v: f64, scale: f32) -> u32 {
    let px = (v * f64::from(scale)).ceil();
    if px.is_finite() && px > 0.0 {
        px.min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn svg_to_pixmap(
    svg: &str,
    width: f64,
    height: f64,
    options: &RasterOptions,
) -> Result<tiny_skia::Pixmap> {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    opt.font_family = "Arial".to_string();

    let tree = usvg::Tree::from_str(svg, &opt).map_err(|err| {
        tracing::warn!(%err, "svg re-parse failed during rasterization");
        RasterError::SvgRendering
    })?;

    let scale = if options.scale.is_finite() && options.scale > 0.0 {
        options.scale
    } else {
        1.0
    };
    let width_px = pixel_extent(width, scale);
    let height_px = pixel_extent(height, scale);
    let mut pixmap = tiny_skia::Pixmap::new(width_px, height_px).ok_or(
        RasterError::NoDrawingSurface {
            width: width_px,
            height: height_px,
        },
    )?;

    if let Some(color) = options.background.as_deref().and_then(parse_tiny_skia_color) {
        pixmap.fill(color);
    }

    let size = tree.size();
    let transform = tiny_skia::Transform::from_scale(
        width_px as f32 / size.width().max(1.0),
        height_px as f32 / size.height().max(1.0),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());
    tracing::debug!(width_px, height_px, "rasterized svg");
    Ok(pixmap)
}

fn parse_tiny_skia_color(text: &str) -> Option<tiny_skia::Color> {
    let s = text.trim().to_ascii_lowercase();
    match s.as_str() {
        "white" => return Some(tiny_skia::Color::WHITE),
        "black" => return Some(tiny_skia::Color::BLACK),
        "transparent" => return Some(tiny_skia::Color::TRANSPARENT),
        _ => {}
    }

    let hex = s.strip_prefix('#')?;
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        6 => Some(tiny_skia::Color::from_rgba8(
            channel(0)?,
            channel(2)?,
            channel(4)?,
            255,
        )),
        8 => Some(tiny_skia::Color::from_rgba8(
            channel(0)?,
            channel(2)?,
            channel(4)?,
            channel(6)?,
        )),
        _ => None,
    }
}
