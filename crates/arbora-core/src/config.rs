use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Curve,
    Orthogonal,
}

/// Caller-supplied visual parameters. Not persisted as part of a document.
///
/// `node_gap_x`, `node_gap_y`, `font_size`, `node_width` and `compact_rows` change node sizing
/// or placement and therefore require a fresh layout; the remaining fields only affect the
/// SVG markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub zoom: f64,
    pub node_radius: f64,
    pub node_gap_x: f64,
    pub node_gap_y: f64,
    pub font_size: f64,
    pub node_width: f64,
    pub line_style: LineStyle,
    pub shadow: bool,
    pub compact_rows: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            node_radius: 8.0,
            node_gap_x: 32.0,
            node_gap_y: 56.0,
            font_size: 14.0,
            node_width: 120.0,
            line_style: LineStyle::Curve,
            shadow: false,
            compact_rows: true,
        }
    }
}

impl RenderConfig {
    /// Returns `true` when switching from `self` to `other` invalidates an existing layout.
    pub fn affects_layout(&self, other: &RenderConfig) -> bool {
        self.node_gap_x != other.node_gap_x
            || self.node_gap_y != other.node_gap_y
            || self.font_size != other.font_size
            || self.node_width != other.node_width
            || self.compact_rows != other.compact_rows
    }

    /// Clamps every field into a renderable range. Non-finite values fall back to defaults.
    pub fn sanitized(&self) -> RenderConfig {
        let d = RenderConfig::default();
        let finite_or = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };
        RenderConfig {
            zoom: finite_or(self.zoom, d.zoom).clamp(MIN_ZOOM, MAX_ZOOM),
            node_radius: finite_or(self.node_radius, d.node_radius).max(0.0),
            node_gap_x: finite_or(self.node_gap_x, d.node_gap_x).max(0.0),
            node_gap_y: finite_or(self.node_gap_y, d.node_gap_y).max(0.0),
            font_size: finite_or(self.font_size, d.font_size).max(1.0),
            node_width: finite_or(self.node_width, d.node_width).max(1.0),
            line_style: self.line_style,
            shadow: self.shadow,
            compact_rows: self.compact_rows,
        }
    }

    pub fn without_zoom(&self) -> UnzoomedRenderConfig {
        UnzoomedRenderConfig {
            node_radius: self.node_radius,
            node_gap_x: self.node_gap_x,
            node_gap_y: self.node_gap_y,
            font_size: self.font_size,
            node_width: self.node_width,
            line_style: self.line_style,
            shadow: self.shadow,
            compact_rows: self.compact_rows,
        }
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }
}

/// [`RenderConfig`] as sent to a generation service: zoom is a view concern and stays local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnzoomedRenderConfig {
    pub node_radius: f64,
    pub node_gap_x: f64,
    pub node_gap_y: f64,
    pub font_size: f64,
    pub node_width: f64,
    pub line_style: LineStyle,
    pub shadow: bool,
    pub compact_rows: bool,
}

impl Default for UnzoomedRenderConfig {
    fn default() -> Self {
        RenderConfig::default().without_zoom()
    }
}

impl UnzoomedRenderConfig {
    pub fn into_render_config(self, zoom: f64) -> RenderConfig {
        RenderConfig {
            zoom,
            node_radius: self.node_radius,
            node_gap_x: self.node_gap_x,
            node_gap_y: self.node_gap_y,
            font_size: self.font_size,
            node_width: self.node_width,
            line_style: self.line_style,
            shadow: self.shadow,
            compact_rows: self.compact_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_and_style_changes_do_not_affect_layout() {
        let base = RenderConfig::default();
        let mut other = base.clone();
        other.zoom = 2.5;
        other.shadow = true;
        other.node_radius = 0.0;
        other.line_style = LineStyle::Orthogonal;
        assert!(!base.affects_layout(&other));
    }

    #[test]
    fn gap_and_font_changes_affect_layout() {
        let base = RenderConfig::default();
        let edits: [fn(&mut RenderConfig); 5] = [
            |c: &mut RenderConfig| c.node_gap_x += 1.0,
            |c: &mut RenderConfig| c.node_gap_y += 1.0,
            |c: &mut RenderConfig| c.font_size += 1.0,
            |c: &mut RenderConfig| c.node_width += 1.0,
            |c: &mut RenderConfig| c.compact_rows = !c.compact_rows,
        ];
        for edit in edits {
            let mut other = base.clone();
            edit(&mut other);
            assert!(base.affects_layout(&other));
        }
    }

    #[test]
    fn sanitized_clamps_out_of_range_values() {
        let cfg = RenderConfig {
            zoom: f64::NAN,
            font_size: 0.0,
            node_gap_x: -4.0,
            node_width: f64::INFINITY,
            ..RenderConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.zoom, 1.0);
        assert_eq!(cfg.font_size, 1.0);
        assert_eq!(cfg.node_gap_x, 0.0);
        assert_eq!(cfg.node_width, 120.0);
    }

    #[test]
    fn camel_case_json_with_missing_fields_uses_defaults() {
        let cfg: RenderConfig =
            serde_json::from_str(r#"{"nodeGapX": 10, "lineStyle": "orthogonal"}"#).unwrap();
        assert_eq!(cfg.node_gap_x, 10.0);
        assert_eq!(cfg.line_style, LineStyle::Orthogonal);
        assert_eq!(cfg.font_size, 14.0);
    }

    #[test]
    fn unzoomed_config_omits_zoom_on_the_wire() {
        let json = serde_json::to_value(RenderConfig::default().without_zoom()).unwrap();
        assert!(json.get("zoom").is_none());
        assert_eq!(json["nodeGapY"], 56.0);
    }
}
