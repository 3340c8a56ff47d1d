//! Document export: one SVG source feeding every output format.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::render::{HeadlessError, render_document_svg};
use arbora_core::{DiagramDocument, RenderConfig};

pub const DEFAULT_FILE_STEM: &str = "diagram";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Render(#[from] HeadlessError),
    #[cfg(feature = "raster")]
    #[error(transparent)]
    Raster(#[from] crate::render::raster::RasterError),
    #[error("PNG export requires the `raster` feature")]
    RasterUnavailable,
    #[error("unknown export format: {0}")]
    UnknownFormat(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Svg,
    Png,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Svg => "svg",
            ExportFormat::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub document: DiagramDocument,
    pub format: ExportFormat,
    pub file_name: String,
    #[serde(default)]
    pub config: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Writes the artifact into `dir` under its file name and returns the full path.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = self.bytes.len(), "saved export");
        Ok(path)
    }
}

/// Reduces a user-supplied name to a safe file stem. Path separators and control characters
/// become `-`; an extension matching `format` is dropped; empty input falls back to
/// [`DEFAULT_FILE_STEM`].
pub fn sanitize_file_stem(raw: &str, format: ExportFormat) -> String {
    let raw = raw.trim();
    let raw = raw
        .rsplit_once('.')
        .filter(|(_, ext)| ext.eq_ignore_ascii_case(format.extension()))
        .map_or(raw, |(stem, _)| stem);

    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        let bad = ch.is_control() || matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|');
        out.push(if bad || ch.is_whitespace() { '-' } else { ch });
    }
    while out.contains("--") {
        out = out.replace("--", "-");
    }
    let out = out.trim_matches(|c| c == '-' || c == '.');
    if out.is_empty() {
        DEFAULT_FILE_STEM.to_string()
    } else {
        out.to_string()
    }
}

pub fn export_document(request: &ExportRequest) -> Result<ExportArtifact> {
    let stem = sanitize_file_stem(&request.file_name, request.format);
    let bytes = match request.format {
        ExportFormat::Svg => render_document_svg(&request.document, &request.config)?.into_bytes(),
        ExportFormat::Png => png_bytes(&request.document, &request.config)?,
    };
    let artifact = ExportArtifact {
        file_name: format!("{stem}.{}", request.format.extension()),
        mime_type: request.format.mime_type(),
        bytes,
    };
    tracing::debug!(
        file = artifact.file_name.as_str(),
        bytes = artifact.bytes.len(),
        "exported document"
    );
    Ok(artifact)
}

/// Takes the request by value: the document is a snapshot, so edits made while the export
/// is in flight do not reach the artifact.
pub async fn export_document_async(request: ExportRequest) -> Result<ExportArtifact> {
    export_document(&request)
}

#[cfg(feature = "raster")]
fn png_bytes(doc: &DiagramDocument, config: &RenderConfig) -> Result<Vec<u8>> {
    use crate::render::raster::{RasterOptions, render_png};
    Ok(render_png(doc, config, &RasterOptions::default())?)
}

#[cfg(not(feature = "raster"))]
fn png_bytes(_doc: &DiagramDocument, _config: &RenderConfig) -> Result<Vec<u8>> {
    Err(ExportError::RasterUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{LayoutOptions, layout_text_sync};
    use arbora_core::ParserKind;

    fn request(format: ExportFormat, name: &str) -> ExportRequest {
        ExportRequest {
            document: layout_text_sync(
                ParserKind::Hierarchy,
                "系统\n  商品模块\n  订单模块\n    订单支付",
                &LayoutOptions::default(),
            )
            .unwrap(),
            format,
            file_name: name.to_string(),
            config: RenderConfig::default(),
        }
    }

    #[test]
    fn file_stems_are_sanitized() {
        assert_eq!(sanitize_file_stem("  ", ExportFormat::Svg), "diagram");
        assert_eq!(sanitize_file_stem("my chart.svg", ExportFormat::Svg), "my-chart");
        assert_eq!(sanitize_file_stem("a.svg", ExportFormat::Png), "a.svg");
        assert_eq!(sanitize_file_stem("../../etc/passwd", ExportFormat::Svg), "etc-passwd");
        assert_eq!(sanitize_file_stem("系统 结构", ExportFormat::Png), "系统-结构");
    }

    #[test]
    fn svg_export_is_well_formed() {
        let artifact = export_document(&request(ExportFormat::Svg, "tree")).unwrap();
        assert_eq!(artifact.file_name, "tree.svg");
        assert_eq!(artifact.mime_type, "image/svg+xml");
        let text = String::from_utf8(artifact.bytes).unwrap();
        let tree = roxmltree::Document::parse(&text).unwrap();
        assert_eq!(tree.root_element().tag_name().name(), "svg");
    }

    #[cfg(feature = "raster")]
    #[test]
    fn png_export_has_mime_type_and_bytes() {
        let artifact = export_document(&request(ExportFormat::Png, "")).unwrap();
        assert_eq!(artifact.file_name, "diagram.png");
        assert_eq!(artifact.mime_type, "image/png");
        assert!(!artifact.bytes.is_empty());
    }

    #[cfg(not(feature = "raster"))]
    #[test]
    fn png_export_without_raster_is_an_error() {
        let err = export_document(&request(ExportFormat::Png, "x")).unwrap_err();
        assert!(matches!(err, ExportError::RasterUnavailable));
    }

    #[test]
    fn async_export_owns_its_snapshot() {
        let mut req = request(ExportFormat::Svg, "snap");
        let pending = export_document_async(req.clone());
        req.document.nodes[0].label = "changed".to_string();
        let artifact = futures::executor::block_on(pending).unwrap();
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.contains("系统"));
        assert!(!text.contains("changed"));
    }

    #[test]
    fn invalid_documents_fail_without_output() {
        let mut req = request(ExportFormat::Svg, "bad");
        req.document.nodes[0].width = f64::NAN;
        assert!(matches!(
            export_document(&req),
            Err(ExportError::Render(_))
        ));
    }

    #[test]
    fn save_in_writes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = export_document(&request(ExportFormat::Svg, "saved")).unwrap();
        let path = artifact.save_in(dir.path()).unwrap();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("saved.svg"));
        assert_eq!(std::fs::read(&path).unwrap(), artifact.bytes);
    }

    #[test]
    fn formats_parse_from_strings() {
        assert_eq!("SVG".parse::<ExportFormat>().unwrap(), ExportFormat::Svg);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(ExportError::UnknownFormat(f)) if f == "pdf"
        ));
    }
}
