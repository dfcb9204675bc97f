use unicode_width::UnicodeWidthStr;

/// Approximate text extents for a proportional sans-serif face.
///
/// Widths are counted in terminal cells (a CJK glyph counts as two), then
/// scaled by the font size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    /// Width of one cell as a fraction of the font size.
    pub cell_ratio: f64,
    pub line_ratio: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            cell_ratio: 0.55,
            line_ratio: 1.25,
        }
    }
}

impl TextMetrics {
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        UnicodeWidthStr::width(text) as f64 * self.cell_ratio * size
    }

    pub fn line_height(&self, size: f64) -> f64 {
        self.line_ratio * size
    }

    /// Shorten `text` with a trailing ellipsis until it fits in `max_width`.
    pub fn fit(&self, text: &str, max_width: f64, size: f64) -> String {
        if self.text_width(text, size) <= max_width {
            return text.to_string();
        }
        let budget = max_width - self.text_width("…", size);
        let mut out = String::new();
        let mut used = 0.0;
        for ch in text.chars() {
            let mut buf = [0u8; 4];
            let w = self.text_width(ch.encode_utf8(&mut buf), size);
            if used + w > budget {
                break;
            }
            used += w;
            out.push(ch);
        }
        out.push('…');
        out
    }

    /// Split `text` into lines no wider than `max_width`, breaking at spaces.
    pub fn wrap(&self, text: &str, max_width: f64, size: f64) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if !current.is_empty() && self.text_width(&candidate, size) > max_width {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> TextMetrics {
        TextMetrics {
            cell_ratio: 0.5,
            line_ratio: 1.0,
        }
    }

    #[test]
    fn test_ascii_width() {
        assert_eq!(metrics().text_width("Rendang", 10.0), 7.0 * 5.0);
    }

    #[test]
    fn test_wide_glyphs_count_double() {
        assert_eq!(metrics().text_width("ルンダン", 10.0), 8.0 * 5.0);
        assert_eq!(metrics().text_width("Sateサテ", 10.0), 8.0 * 5.0);
    }

    #[test]
    fn test_fit_keeps_short_text() {
        assert_eq!(metrics().fit("Perkedel", 100.0, 10.0), "Perkedel");
    }

    #[test]
    fn test_fit_truncates_with_ellipsis() {
        // 30 units hold six cells: five letters plus the ellipsis.
        assert_eq!(metrics().fit("Dendeng Balado", 30.0, 10.0), "Dende…");
    }

    #[test]
    fn test_wrap_breaks_at_spaces() {
        let lines = metrics().wrap("Bar chart shows revenue per menu item", 80.0, 10.0);
        assert_eq!(lines, vec!["Bar chart shows", "revenue per menu", "item"]);
    }
}
