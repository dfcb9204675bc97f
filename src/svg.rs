use crate::chart::{ChartArtifact, Plot};
use crate::scene::{polar, Anchor, Color, Mark};
use std::fmt::{self, Write};

const FONT: &str = "Helvetica, Arial, sans-serif";

pub struct SvgRenderer {
    /// Canvas size used for [`ChartArtifact::Empty`], which carries none.
    pub empty_size: (f64, f64),
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self {
            empty_size: (720.0, 405.0),
        }
    }
}

impl SvgRenderer {
    pub fn render(&self, chart: &ChartArtifact) -> String {
        let mut svg = String::new();
        // Writing into a String cannot fail.
        let _ = self.write(&mut svg, chart);
        svg
    }

    pub fn write(&self, out: &mut impl Write, chart: &ChartArtifact) -> fmt::Result {
        match chart {
            ChartArtifact::Plot(plot) => self.write_plot(out, plot),
            ChartArtifact::Empty { title } => {
                let (w, h) = self.empty_size;
                open(out, w, h)?;
                text(out, (w / 2.0, 28.0), title, 16.0, Anchor::Middle, true, Color::BLACK)?;
                text(out, (w / 2.0, h / 2.0), "No data to show", 12.0, Anchor::Middle, false, Color::AXIS)?;
                writeln!(out, "</svg>")
            }
        }
    }

    fn write_plot(&self, out: &mut impl Write, plot: &Plot) -> fmt::Result {
        open(out, plot.width, plot.height)?;
        for mark in &plot.marks {
            write_mark(out, mark)?;
        }
        writeln!(out, "</svg>")
    }
}

fn open(out: &mut impl Write, w: f64, h: f64) -> fmt::Result {
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = num(w),
        h = num(h)
    )?;
    writeln!(out, r#"<rect width="100%" height="100%" fill="{}" />"#, Color::WHITE.hex())
}

fn write_mark(out: &mut impl Write, mark: &Mark) -> fmt::Result {
    match mark {
        Mark::Rect {
            x,
            y,
            width,
            height,
            fill,
            tooltip,
        } => {
            write!(
                out,
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}""#,
                num(*x),
                num(*y),
                num(*width),
                num(*height),
                fill.hex()
            )?;
            close(out, "rect", tooltip.as_deref())
        }
        Mark::Line { from, to, stroke, width } => writeln!(
            out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{}" />"#,
            num(from.0),
            num(from.1),
            num(to.0),
            num(to.1),
            stroke.hex(),
            num(*width)
        ),
        Mark::Polyline { points, stroke, width } => writeln!(
            out,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linejoin="round" />"#,
            point_list(points.iter().copied()),
            stroke.hex(),
            num(*width)
        ),
        Mark::Area {
            points,
            baseline,
            fill,
            opacity,
        } => {
            let (Some(first), Some(last)) = (points.first(), points.last()) else {
                return Ok(());
            };
            let outline = points
                .iter()
                .copied()
                .chain([(last.0, *baseline), (first.0, *baseline)]);
            writeln!(
                out,
                r#"<polygon points="{}" fill="{}" fill-opacity="{}" />"#,
                point_list(outline),
                fill.hex(),
                num(*opacity)
            )
        }
        Mark::Circle {
            center,
            radius,
            fill,
            tooltip,
        } => {
            write!(
                out,
                r#"<circle cx="{}" cy="{}" r="{}" fill="{}""#,
                num(center.0),
                num(center.1),
                num(*radius),
                fill.hex()
            )?;
            close(out, "circle", tooltip.as_deref())
        }
        Mark::Sector {
            center,
            inner_radius,
            outer_radius,
            start_angle,
            end_angle,
            fill,
            tooltip,
        } => {
            write!(
                out,
                r#"<path d="{}" fill="{}" stroke="{}" stroke-width="1""#,
                sector_path(*center, *inner_radius, *outer_radius, *start_angle, *end_angle),
                fill.hex(),
                Color::WHITE.hex()
            )?;
            close(out, "path", tooltip.as_deref())
        }
        Mark::Text {
            at,
            text: content,
            size,
            anchor,
            bold,
            fill,
        } => text(out, *at, content, *size, *anchor, *bold, *fill),
    }
}

/// Finish an element opened without its closing bracket, nesting a
/// `<title>` when there is a tooltip.
fn close(out: &mut impl Write, tag: &str, tooltip: Option<&str>) -> fmt::Result {
    match tooltip {
        Some(tip) => writeln!(out, "><title>{}</title></{}>", escape_xml(tip), tag),
        None => writeln!(out, " />"),
    }
}

fn text(
    out: &mut impl Write,
    at: (f64, f64),
    content: &str,
    size: f64,
    anchor: Anchor,
    bold: bool,
    fill: Color,
) -> fmt::Result {
    let anchor = match anchor {
        Anchor::Start => "start",
        Anchor::Middle => "middle",
        Anchor::End => "end",
    };
    let weight = if bold { r#" font-weight="bold""# } else { "" };
    writeln!(
        out,
        r#"<text x="{}" y="{}" font-family="{}" font-size="{}" text-anchor="{}" fill="{}"{}>{}</text>"#,
        num(at.0),
        num(at.1),
        FONT,
        num(size),
        anchor,
        fill.hex(),
        weight,
        escape_xml(content)
    )
}

/// Path for a wedge or ring slice. Each arc is drawn as two halves so no
/// half exceeds a semicircle, which also covers a full turn.
fn sector_path(center: (f64, f64), inner: f64, outer: f64, start: f64, end: f64) -> String {
    let mid = (start + end) / 2.0;
    let p = |r: f64, a: f64| {
        let (x, y) = polar(center, r, a);
        format!("{} {}", num(x), num(y))
    };
    let r_out = num(outer);
    let mut d = format!(
        "M {} A {r} {r} 0 0 1 {} A {r} {r} 0 0 1 {}",
        p(outer, start),
        p(outer, mid),
        p(outer, end),
        r = r_out
    );
    if inner > 0.0 {
        let r_in = num(inner);
        d.push_str(&format!(
            " L {} A {r} {r} 0 0 0 {} A {r} {r} 0 0 0 {}",
            p(inner, end),
            p(inner, mid),
            p(inner, start),
            r = r_in
        ));
    } else {
        d.push_str(&format!(" L {} {}", num(center.0), num(center.1)));
    }
    d.push_str(" Z");
    d
}

fn point_list(points: impl Iterator<Item = (f64, f64)>) -> String {
    points
        .map(|(x, y)| format!("{},{}", num(x), num(y)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Two decimals at most, trailing zeros dropped.
fn num(v: f64) -> String {
    let text = format!("{:.2}", v);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" => "0".to_string(),
        t => t.to_string(),
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{render, ChartKind, ChartSpec};
    use crate::table::Table;
    use crate::value::Value;

    fn menu() -> Table {
        Table::from_rows(
            &["item", "revenue"],
            vec![
                vec!["Rendang".into(), Value::Int(5_400_000)],
                vec!["Sate & Lontong".into(), Value::Int(1_500_000)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_render_bar() {
        let spec = ChartSpec::new(ChartKind::Bar, "Revenue per Menu").x("item").y("revenue");
        let svg = SvgRenderer::default().render(&render(&menu(), &spec).unwrap());
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("Revenue per Menu"));
        assert!(svg.contains("<title>Rendang: 5,400,000</title>"));
        assert!(svg.contains("Sate &amp; Lontong"));
    }

    #[test]
    fn test_render_pie_uses_paths() {
        let spec = ChartSpec::new(ChartKind::Doughnut, "Share").x("item").y("revenue");
        let svg = SvgRenderer::default().render(&render(&menu(), &spec).unwrap());
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains("78.26%"));
    }

    #[test]
    fn test_render_empty() {
        let chart = ChartArtifact::Empty {
            title: "Orders <today>".to_string(),
        };
        let svg = SvgRenderer::default().render(&chart);
        assert!(svg.contains("Orders &lt;today&gt;"));
        assert!(svg.contains("No data to show"));
    }

    #[test]
    fn test_full_turn_sector_path_is_closed() {
        let d = sector_path((50.0, 50.0), 0.0, 10.0, 0.0, std::f64::consts::TAU);
        assert_eq!(d, "M 50 40 A 10 10 0 0 1 50 60 A 10 10 0 0 1 50 40 L 50 50 Z");
    }

    #[test]
    fn test_num_trims() {
        assert_eq!(num(12.0), "12");
        assert_eq!(num(12.5), "12.5");
        assert_eq!(num(1.0 / 3.0), "0.33");
        assert_eq!(num(-0.001), "0");
    }
}
