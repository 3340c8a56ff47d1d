use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: Option<String>,
    pub font_size: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: 14.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
    pub line_count: usize,
}

pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;
}

/// Splits a label into display lines on explicit `\n` breaks.
pub fn label_lines(label: &str) -> Vec<&str> {
    label.split('\n').collect()
}

/// Rewrites a label so that every non-whitespace character sits on its own line.
pub fn one_char_per_line(label: &str) -> String {
    let mut out = String::with_capacity(label.len() * 2);
    for ch in label.chars().filter(|c| !c.is_whitespace()) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push(ch);
    }
    out
}

/// Font-free measurer: a line is as wide as its terminal display width (East Asian wide
/// characters count two cells) times `char_width_factor` em.
#[derive(Debug, Clone, Default)]
pub struct DeterministicTextMeasurer {
    pub char_width_factor: f64,
    pub line_height_factor: f64,
}

impl DeterministicTextMeasurer {
    pub fn line_height(&self, style: &TextStyle) -> f64 {
        let factor = if self.line_height_factor == 0.0 {
            1.4
        } else {
            self.line_height_factor
        };
        style.font_size.max(1.0) * factor
    }
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let char_width_factor = if self.char_width_factor == 0.0 {
            0.6
        } else {
            self.char_width_factor
        };

        let lines = label_lines(text);
        let font_size = style.font_size.max(1.0);
        let max_cells = lines.iter().map(|l| l.width()).max().unwrap_or(0);

        TextMetrics {
            width: max_cells as f64 * font_size * char_width_factor,
            height: lines.len() as f64 * self.line_height(style),
            line_count: lines.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_characters_measure_double() {
        let m = DeterministicTextMeasurer::default();
        let style = TextStyle::default();
        let ascii = m.measure("ab", &style);
        let cjk = m.measure("商品", &style);
        assert_eq!(cjk.width, ascii.width * 2.0);
        assert_eq!(cjk.line_count, 1);
    }

    #[test]
    fn height_grows_with_lines() {
        let m = DeterministicTextMeasurer::default();
        let style = TextStyle::default();
        let one = m.measure("订单", &style);
        let two = m.measure("订\n单", &style);
        assert_eq!(two.line_count, 2);
        assert_eq!(two.height, one.height * 2.0);
        assert!(two.width < one.width);
    }

    #[test]
    fn one_char_per_line_drops_whitespace() {
        assert_eq!(one_char_per_line("订单 支付"), "订\n单\n支\n付");
        assert_eq!(one_char_per_line(""), "");
    }
}
