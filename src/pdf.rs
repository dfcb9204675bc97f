//! Minimal PDF 1.4 writer: US Letter pages, the two standard Helvetica faces
//! and vector drawing only.
//!
//! Output depends on nothing but the pages, so equal input gives equal bytes.

use crate::chart::Plot;
use crate::measure::TextMetrics;
use crate::scene::{sector_outline, Anchor, Color, Mark};

pub const PAGE_WIDTH: f64 = 612.0;
pub const PAGE_HEIGHT: f64 = 792.0;

/// Bezier handle length for a quarter circle.
const KAPPA: f64 = 0.552_284_75;
const ARC_STEPS: usize = 96;

/// Content stream of one page, addressed with a top-left origin like the
/// chart canvas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    ops: String,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blank(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn text(&mut self, at: (f64, f64), content: &str, size: f64, anchor: Anchor, bold: bool, fill: Color) {
        let width = TextMetrics::default().text_width(content, size);
        let x = match anchor {
            Anchor::Start => at.0,
            Anchor::Middle => at.0 - width / 2.0,
            Anchor::End => at.0 - width,
        };
        let font = if bold { "F2" } else { "F1" };
        let (r, g, b) = fill.unit();
        self.ops.push_str(&format!(
            "BT /{} {} Tf {} {} {} rg {} {} Td ({}) Tj ET\n",
            font,
            num(size),
            num(r),
            num(g),
            num(b),
            num(x),
            num(PAGE_HEIGHT - at.1),
            pdf_string(content)
        ));
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: Color) {
        self.fill_color(fill);
        self.ops.push_str(&format!(
            "{} {} {} {} re f\n",
            num(x),
            num(PAGE_HEIGHT - y - height),
            num(width),
            num(height)
        ));
    }

    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: Color, width: f64) {
        self.polyline(&[from, to], stroke, width);
    }

    pub fn polyline(&mut self, points: &[(f64, f64)], stroke: Color, width: f64) {
        if points.len() < 2 {
            return;
        }
        let (r, g, b) = stroke.unit();
        self.ops
            .push_str(&format!("{} {} {} RG {} w 1 J 1 j\n", num(r), num(g), num(b), num(width)));
        self.path(points);
        self.ops.push_str("S\n");
    }

    pub fn polygon(&mut self, points: &[(f64, f64)], fill: Color) {
        if points.len() < 3 {
            return;
        }
        self.fill_color(fill);
        self.path(points);
        self.ops.push_str("h f\n");
    }

    pub fn circle(&mut self, center: (f64, f64), radius: f64, fill: Color) {
        let (cx, cy) = (center.0, PAGE_HEIGHT - center.1);
        let k = radius * KAPPA;
        self.fill_color(fill);
        self.ops.push_str(&format!("{} {} m\n", num(cx + radius), num(cy)));
        let quarters = [
            ((cx + radius, cy + k), (cx + k, cy + radius), (cx, cy + radius)),
            ((cx - k, cy + radius), (cx - radius, cy + k), (cx - radius, cy)),
            ((cx - radius, cy - k), (cx - k, cy - radius), (cx, cy - radius)),
            ((cx + k, cy - radius), (cx + radius, cy - k), (cx + radius, cy)),
        ];
        for (a, b, c) in quarters {
            self.ops.push_str(&format!(
                "{} {} {} {} {} {} c\n",
                num(a.0),
                num(a.1),
                num(b.0),
                num(b.1),
                num(c.0),
                num(c.1)
            ));
        }
        self.ops.push_str("f\n");
    }

    /// Draw a chart with its top-left corner at `origin`, scaled by `scale`.
    pub fn chart(&mut self, plot: &Plot, origin: (f64, f64), scale: f64) {
        let at = |p: (f64, f64)| (origin.0 + p.0 * scale, origin.1 + p.1 * scale);
        let all = |ps: &[(f64, f64)]| ps.iter().map(|p| at(*p)).collect::<Vec<_>>();
        for mark in &plot.marks {
            match mark {
                Mark::Rect {
                    x,
                    y,
                    width,
                    height,
                    fill,
                    ..
                } => {
                    let (px, py) = at((*x, *y));
                    self.fill_rect(px, py, width * scale, height * scale, *fill);
                }
                Mark::Line { from, to, stroke, width } => self.line(at(*from), at(*to), *stroke, width * scale),
                Mark::Polyline { points, stroke, width } => self.polyline(&all(points), *stroke, width * scale),
                Mark::Area {
                    points,
                    baseline,
                    fill,
                    opacity,
                } => {
                    let (Some(first), Some(last)) = (points.first(), points.last()) else {
                        continue;
                    };
                    let mut outline = all(points);
                    outline.push(at((last.0, *baseline)));
                    outline.push(at((first.0, *baseline)));
                    // No transparency groups: blend against the white page instead.
                    self.polygon(&outline, Color::WHITE.mix(*fill, *opacity));
                }
                Mark::Circle {
                    center, radius, fill, ..
                } => self.circle(at(*center), radius * scale, *fill),
                Mark::Sector {
                    center,
                    inner_radius,
                    outer_radius,
                    start_angle,
                    end_angle,
                    fill,
                    ..
                } => {
                    let outline = sector_outline(
                        *center,
                        *inner_radius,
                        *outer_radius,
                        *start_angle,
                        *end_angle,
                        ARC_STEPS,
                    );
                    self.polygon(&all(&outline), *fill);
                }
                Mark::Text {
                    at: pos,
                    text,
                    size,
                    anchor,
                    bold,
                    fill,
                } => self.text(at(*pos), text, size * scale, *anchor, *bold, *fill),
            }
        }
    }

    fn fill_color(&mut self, fill: Color) {
        let (r, g, b) = fill.unit();
        self.ops.push_str(&format!("{} {} {} rg\n", num(r), num(g), num(b)));
    }

    fn path(&mut self, points: &[(f64, f64)]) {
        for (i, (x, y)) in points.iter().enumerate() {
            let op = if i == 0 { "m" } else { "l" };
            self.ops
                .push_str(&format!("{} {} {}\n", num(*x), num(PAGE_HEIGHT - y), op));
        }
    }
}

/// Serialize `pages` into a complete PDF file.
pub fn write_pdf(title: &str, pages: &[Page]) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::new();
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 6 + 2 * i).collect();
    let kids = page_ids
        .iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ");

    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 {} {}] >>",
        kids,
        pages.len(),
        num(PAGE_WIDTH),
        num(PAGE_HEIGHT)
    ));
    objects.push(font("Helvetica"));
    objects.push(font("Helvetica-Bold"));
    objects.push(format!(
        "<< /Title ({}) /Producer (tallyboard) >>",
        pdf_string(title)
    ));
    for (page, id) in pages.iter().zip(&page_ids) {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
            id + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            page.ops.len(),
            page.ops
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }
    let xref = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref
    ));
    out.into_bytes()
}

fn font(name: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        name
    )
}

/// Body of a literal string in WinAnsi, kept 7-bit by octal escapes.
/// Characters the encoding lacks become `?`.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let byte = match ch {
            '…' => Some(0x85),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            '€' => Some(0x80),
            c if (c as u32) < 0x80 => None,
            c if (0xa0..=0xff).contains(&(c as u32)) => Some(c as u32 as u8),
            _ => Some(b'?'),
        };
        match (ch, byte) {
            ('(' | ')' | '\\', _) => {
                out.push('\\');
                out.push(ch);
            }
            ('\n' | '\r' | '\t', _) => out.push(' '),
            (_, None) => out.push(ch),
            (_, Some(b'?')) => out.push('?'),
            (_, Some(b)) => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

fn num(v: f64) -> String {
    let text = format!("{:.2}", v);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        t => t.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Page> {
        let mut cover = Page::new();
        cover.text((306.0, 200.0), "Laporan (Padang)", 20.0, Anchor::Middle, true, Color::BLACK);
        let mut second = Page::new();
        second.fill_rect(72.0, 72.0, 100.0, 50.0, Color(0x2b, 0x8c, 0xbe));
        second.circle((200.0, 200.0), 5.0, Color::BLACK);
        vec![cover, second]
    }

    #[test]
    fn test_document_structure() {
        let bytes = write_pdf("Report", &sample());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("/Count 2"));
        assert!(text.contains("/MediaBox [0 0 612 792]"));
        assert_eq!(text.matches("/Type /Page ").count(), 2);
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let bytes = write_pdf("Report", &sample());
        let text = String::from_utf8(bytes).unwrap();
        let start: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|tail| tail.lines().next())
            .unwrap()
            .parse()
            .unwrap();
        assert!(text[start..].starts_with("xref"));
        let entries: Vec<usize> = text[start..]
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .map(|l| l[..10].parse().unwrap())
            .collect();
        assert_eq!(entries.len(), 9);
        for (i, offset) in entries.iter().enumerate() {
            assert!(text[*offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn test_output_is_deterministic() {
        assert_eq!(write_pdf("Report", &sample()), write_pdf("Report", &sample()));
    }

    #[test]
    fn test_text_is_flipped_and_escaped() {
        let mut page = Page::new();
        page.text((10.0, 92.0), "a(b)\\ é…ル", 10.0, Anchor::Start, false, Color::BLACK);
        assert!(page.ops.contains("10 700 Td"));
        assert!(page.ops.contains(r"(a\(b\)\\ \351\205?) Tj"));
    }

    #[test]
    fn test_rect_uses_bottom_left_origin() {
        let mut page = Page::new();
        page.fill_rect(10.0, 20.0, 30.0, 40.0, Color::BLACK);
        assert!(page.ops.contains("10 732 30 40 re f"));
    }

    #[test]
    fn test_num() {
        assert_eq!(num(612.0), "612");
        assert_eq!(num(0.5), "0.5");
        assert_eq!(num(-0.004), "0");
    }
}
