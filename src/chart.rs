//! Turn a table and a chart description into drawing marks.

use crate::layout::{BandScale, Frame, LinearScale, Margins, PointScale};
use crate::measure::TextMetrics;
use crate::metrics::format_grouped;
use crate::scene::{palette, polar, Anchor, Color, LegendEntry, Mark};
use crate::table::Table;
use crate::value::{round2, Value};
use std::f64::consts::TAU;

pub const DEFAULT_BINS: usize = 15;

const TITLE_SIZE: f64 = 16.0;
const LABEL_SIZE: f64 = 10.0;
const TICKS: usize = 5;
const MAP_MARKER: Color = Color(0xff, 0x8c, 0x00);
const COLOR_LOW: Color = Color(0xde, 0xeb, 0xf7);
const COLOR_HIGH: Color = Color(0x08, 0x30, 0x6b);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Area,
    Pie,
    /// Pie with a hole; the cutout is half the outer radius.
    Doughnut,
    Scatter,
    Histogram,
    /// Longitude on `x`, latitude on `y`.
    PointMap,
}

impl ChartKind {
    pub const ALL: [ChartKind; 8] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Area,
        ChartKind::Pie,
        ChartKind::Doughnut,
        ChartKind::Scatter,
        ChartKind::Histogram,
        ChartKind::PointMap,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bar" => Some(ChartKind::Bar),
            "line" => Some(ChartKind::Line),
            "area" => Some(ChartKind::Area),
            "pie" => Some(ChartKind::Pie),
            "doughnut" | "donut" => Some(ChartKind::Doughnut),
            "scatter" => Some(ChartKind::Scatter),
            "histogram" | "hist" => Some(ChartKind::Histogram),
            "map" | "point-map" | "pointmap" => Some(ChartKind::PointMap),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Area => "area",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
            ChartKind::PointMap => "point-map",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ChartError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    #[error("Column {column} holds non-numeric value {value:?}")]
    NotNumeric { column: String, value: String },
    #[error("Column {column} holds negative value {value} and cannot be drawn as a slice")]
    NegativeSlice { column: String, value: f64 },
    #[error("A {kind} chart needs {what}")]
    MissingField { kind: &'static str, what: &'static str },
    #[error("A histogram needs at least one bin")]
    NoBins,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x: String,
    /// One column per series; pie-like charts use the first only.
    pub y: Vec<String>,
    /// Numeric column driving a sequential color scale (scatter).
    pub color: Option<String>,
    /// Columns listed in each marker's tooltip (point map).
    pub tooltip: Vec<String>,
    pub bins: usize,
    pub y_label: Option<String>,
    /// Overrides the first palette color for single-series charts.
    pub fill: Option<Color>,
    pub width: f64,
    pub height: f64,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, title: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            x: String::new(),
            y: Vec::new(),
            color: None,
            tooltip: Vec::new(),
            bins: DEFAULT_BINS,
            y_label: None,
            fill: None,
            width: 720.0,
            height: 405.0,
        }
    }

    pub fn x(mut self, column: &str) -> Self {
        self.x = column.to_string();
        self
    }

    pub fn y(mut self, column: &str) -> Self {
        self.y.push(column.to_string());
        self
    }

    pub fn color(mut self, column: &str) -> Self {
        self.color = Some(column.to_string());
        self
    }

    pub fn tooltip(mut self, columns: &[&str]) -> Self {
        self.tooltip = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    pub fn y_label(mut self, label: &str) -> Self {
        self.y_label = Some(label.to_string());
        self
    }

    pub fn fill(mut self, color: Color) -> Self {
        self.fill = Some(color);
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub width: f64,
    pub height: f64,
    pub title: String,
    pub marks: Vec<Mark>,
    /// Series or slice names; their swatches are already among `marks`.
    pub legend: Vec<LegendEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartArtifact {
    /// Nothing to draw; the surface shows an empty-state message instead.
    Empty { title: String },
    Plot(Plot),
}

impl ChartArtifact {
    pub fn title(&self) -> &str {
        match self {
            ChartArtifact::Empty { title } => title,
            ChartArtifact::Plot(plot) => &plot.title,
        }
    }

    pub fn plot(&self) -> Option<&Plot> {
        match self {
            ChartArtifact::Plot(plot) => Some(plot),
            ChartArtifact::Empty { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ChartArtifact::Empty { .. })
    }
}

/// Draw `table` as described by `spec`.
///
/// Column names are checked before anything else, so a misspelt column is an
/// error even when the table has no rows. A table without rows renders as
/// [`ChartArtifact::Empty`].
pub fn render(table: &Table, spec: &ChartSpec) -> Result<ChartArtifact, ChartError> {
    let empty = || ChartArtifact::Empty {
        title: spec.title.clone(),
    };
    if table.columns().is_empty() {
        return Ok(empty());
    }
    check_fields(table, spec)?;
    if table.is_empty() {
        return Ok(empty());
    }

    let canvas = Canvas::new(spec);
    let drawn = match spec.kind {
        ChartKind::Bar => bar(canvas, table, spec)?,
        ChartKind::Line => line(canvas, table, spec, false)?,
        ChartKind::Area => line(canvas, table, spec, true)?,
        ChartKind::Pie => pie(canvas, table, spec, 0.0)?,
        ChartKind::Doughnut => pie(canvas, table, spec, 0.5)?,
        ChartKind::Scatter => scatter(canvas, table, spec)?,
        ChartKind::Histogram => histogram(canvas, table, spec)?,
        ChartKind::PointMap => point_map(canvas, table, spec)?,
    };
    Ok(drawn.map_or_else(empty, ChartArtifact::Plot))
}

fn check_fields(table: &Table, spec: &ChartSpec) -> Result<(), ChartError> {
    let kind = spec.kind.name();
    if spec.x.is_empty() {
        return Err(ChartError::MissingField { kind, what: "an x column" });
    }
    let needs_y = !matches!(spec.kind, ChartKind::Histogram);
    if needs_y && spec.y.is_empty() {
        return Err(ChartError::MissingField { kind, what: "a y column" });
    }
    if spec.kind == ChartKind::Histogram && spec.bins == 0 {
        return Err(ChartError::NoBins);
    }
    let names = std::iter::once(&spec.x)
        .chain(&spec.y)
        .chain(&spec.color)
        .chain(&spec.tooltip);
    for name in names {
        column(table, name)?;
    }
    Ok(())
}

fn column<'t>(table: &'t Table, name: &str) -> Result<&'t [Value], ChartError> {
    table
        .column(name)
        .map(|c| c.values.as_slice())
        .ok_or_else(|| ChartError::UnknownColumn(name.to_string()))
}

/// Cells of a numeric column, `None` for nulls.
fn numeric(table: &Table, name: &str) -> Result<Vec<Option<f64>>, ChartError> {
    column(table, name)?
        .iter()
        .map(|v| match v {
            Value::Null => Ok(None),
            v => v.as_f64().map(Some).ok_or_else(|| ChartError::NotNumeric {
                column: name.to_string(),
                value: v.to_string(),
            }),
        })
        .collect()
}

fn labels(table: &Table, name: &str) -> Result<Vec<String>, ChartError> {
    Ok(column(table, name)?.iter().map(Value::to_string).collect())
}

fn tick_label(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format_grouped(v, 0);
    }
    let text = format!("{:.4}", v);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn value_label(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format_grouped(v, 0)
    } else {
        format_grouped(v, 2)
    }
}

/// Marks under construction plus the frame they are laid out in.
struct Canvas<'a> {
    spec: &'a ChartSpec,
    frame: Frame,
    metrics: TextMetrics,
    marks: Vec<Mark>,
    legend: Vec<LegendEntry>,
}

impl<'a> Canvas<'a> {
    fn new(spec: &'a ChartSpec) -> Self {
        let mut margins = Margins::default();
        if matches!(spec.kind, ChartKind::Pie | ChartKind::Doughnut) {
            margins.left = 24.0;
            margins.bottom = 24.0;
        }
        let marks = vec![Mark::Text {
            at: (spec.width / 2.0, 28.0),
            text: spec.title.clone(),
            size: TITLE_SIZE,
            anchor: Anchor::Middle,
            bold: true,
            fill: Color::BLACK,
        }];
        Self {
            spec,
            frame: Frame::inset(spec.width, spec.height, margins),
            metrics: TextMetrics::default(),
            marks,
            legend: Vec::new(),
        }
    }

    fn finish(self) -> Option<Plot> {
        Some(Plot {
            width: self.spec.width,
            height: self.spec.height,
            title: self.spec.title.clone(),
            marks: self.marks,
            legend: self.legend,
        })
    }

    fn series_color(&self, index: usize) -> Color {
        match (index, self.spec.fill) {
            (0, Some(fill)) => fill,
            _ => palette(index),
        }
    }

    fn y_axis(&mut self, scale: &LinearScale) {
        let f = self.frame;
        for t in scale.ticks(TICKS) {
            let y = scale.map(t);
            if y < f.top - 0.5 || y > f.bottom() + 0.5 {
                continue;
            }
            self.marks.push(Mark::Line {
                from: (f.left, y),
                to: (f.right(), y),
                stroke: Color::GRID,
                width: 1.0,
            });
            self.marks
                .push(Mark::label((f.left - 8.0, y + 3.5), tick_label(t), LABEL_SIZE, Anchor::End));
        }
        self.marks.push(Mark::Line {
            from: (f.left, f.top),
            to: (f.left, f.bottom()),
            stroke: Color::AXIS,
            width: 1.0,
        });
        if let Some(label) = &self.spec.y_label {
            self.marks
                .push(Mark::label((f.left, f.top - 10.0), label.clone(), LABEL_SIZE, Anchor::Start));
        }
    }

    fn x_axis(&mut self, scale: &LinearScale) {
        let f = self.frame;
        for t in scale.ticks(TICKS) {
            let x = scale.map(t);
            if x < f.left - 0.5 || x > f.right() + 0.5 {
                continue;
            }
            self.marks.push(Mark::Line {
                from: (x, f.bottom()),
                to: (x, f.bottom() + 4.0),
                stroke: Color::AXIS,
                width: 1.0,
            });
            self.marks
                .push(Mark::label((x, f.bottom() + 16.0), tick_label(t), LABEL_SIZE, Anchor::Middle));
        }
        self.baseline(f.bottom());
    }

    fn baseline(&mut self, y: f64) {
        let f = self.frame;
        self.marks.push(Mark::Line {
            from: (f.left, y),
            to: (f.right(), y),
            stroke: Color::AXIS,
            width: 1.0,
        });
    }

    /// Category names under the frame; staggered over two rows when they
    /// would collide, truncated when even that is too narrow.
    fn category_labels(&mut self, names: &[String], centers: &[f64], step: f64) {
        let bottom = self.frame.bottom();
        let widest = names
            .iter()
            .map(|n| self.metrics.text_width(n, LABEL_SIZE))
            .fold(0.0, f64::max);
        let stagger = widest > step - 4.0;
        let room = if stagger { 2.0 * step - 6.0 } else { step - 4.0 };
        for (i, (name, &x)) in names.iter().zip(centers).enumerate() {
            let row = if stagger && i % 2 == 1 { 14.0 } else { 0.0 };
            let text = self.metrics.fit(name, room.max(0.0), LABEL_SIZE);
            self.marks
                .push(Mark::label((x, bottom + 16.0 + row), text, LABEL_SIZE, Anchor::Middle));
        }
    }

    /// Swatch-and-name list starting at `(x, y)`, one entry per line.
    fn legend(&mut self, entries: Vec<LegendEntry>, x: f64, y: f64) {
        let line = self.metrics.line_height(LABEL_SIZE) + 4.0;
        for (i, entry) in entries.iter().enumerate() {
            let top = y + line * i as f64;
            self.marks.push(Mark::Rect {
                x,
                y: top,
                width: 10.0,
                height: 10.0,
                fill: entry.color,
                tooltip: None,
            });
            self.marks.push(Mark::label(
                (x + 16.0, top + 9.0),
                entry.label.clone(),
                LABEL_SIZE,
                Anchor::Start,
            ));
        }
        self.legend = entries;
    }

    fn legend_width(&self, names: &[String]) -> f64 {
        names
            .iter()
            .map(|n| self.metrics.text_width(n, LABEL_SIZE))
            .fold(0.0, f64::max)
            + 28.0
    }

    /// Legend for several series, placed in the frame's top-right corner.
    fn series_legend(&mut self, names: &[String]) {
        if names.len() < 2 {
            return;
        }
        let entries = names
            .iter()
            .enumerate()
            .map(|(i, n)| LegendEntry {
                label: n.clone(),
                color: self.series_color(i),
            })
            .collect();
        let x = self.frame.right() - self.legend_width(names);
        self.legend(entries, x, self.frame.top + 4.0);
    }
}

fn series(table: &Table, spec: &ChartSpec) -> Result<Vec<(String, Vec<Option<f64>>)>, ChartError> {
    spec.y
        .iter()
        .map(|name| Ok((name.clone(), numeric(table, name)?)))
        .collect()
}

fn bar(mut canvas: Canvas<'_>, table: &Table, spec: &ChartSpec) -> Result<Option<Plot>, ChartError> {
    let names = labels(table, &spec.x)?;
    let series = series(table, spec)?;
    let f = canvas.frame;
    let values = series.iter().flat_map(|(_, v)| v.iter().flatten().copied());
    let y = LinearScale::covering(values, true, (f.bottom(), f.top)).nice(TICKS);
    let band = BandScale::new((f.left, f.right()), names.len());
    let width = band.band_width() / series.len() as f64;

    canvas.y_axis(&y);
    let zero = y.map(0.0);
    for (s, (_, cells)) in series.iter().enumerate() {
        let fill = canvas.series_color(s);
        for (i, cell) in cells.iter().enumerate() {
            let Some(v) = cell else { continue };
            let top = y.map(*v);
            canvas.marks.push(Mark::Rect {
                x: band.start(i) + width * s as f64,
                y: top.min(zero),
                width,
                height: (top - zero).abs(),
                fill,
                tooltip: Some(format!("{}: {}", names[i], value_label(*v))),
            });
        }
    }
    canvas.baseline(zero);

    let centers: Vec<f64> = (0..names.len()).map(|i| band.center(i)).collect();
    let step = band.band_width() * 1.2;
    canvas.category_labels(&names, &centers, step);
    let series_names: Vec<String> = series.into_iter().map(|(n, _)| n).collect();
    canvas.series_legend(&series_names);
    Ok(canvas.finish())
}

/// Runs of consecutive non-null points; a null breaks the line.
fn segments(cells: &[Option<f64>], x: impl Fn(usize) -> f64, y: &LinearScale) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut run = Vec::new();
    for (i, cell) in cells.iter().enumerate() {
        match cell {
            Some(v) => run.push((x(i), y.map(*v))),
            None if !run.is_empty() => out.push(std::mem::take(&mut run)),
            None => {}
        }
    }
    if !run.is_empty() {
        out.push(run);
    }
    out
}

fn line(mut canvas: Canvas<'_>, table: &Table, spec: &ChartSpec, filled: bool) -> Result<Option<Plot>, ChartError> {
    let names = labels(table, &spec.x)?;
    let series = series(table, spec)?;
    let f = canvas.frame;
    let values = series.iter().flat_map(|(_, v)| v.iter().flatten().copied());
    let y = LinearScale::covering(values, filled, (f.bottom(), f.top)).nice(TICKS);
    let xs = PointScale::new((f.left, f.right()), names.len());

    canvas.y_axis(&y);
    let floor = y.map(y.domain().0.max(0.0).min(y.domain().1));
    for (s, (_, cells)) in series.iter().enumerate() {
        let color = canvas.series_color(s);
        for run in segments(cells, |i| xs.map(i), &y) {
            if filled {
                canvas.marks.push(Mark::Area {
                    points: run.clone(),
                    baseline: floor,
                    fill: color,
                    opacity: 0.6,
                });
            }
            canvas.marks.push(Mark::Polyline {
                points: run,
                stroke: color,
                width: 2.0,
            });
        }
        for (i, cell) in cells.iter().enumerate() {
            if let Some(v) = cell {
                canvas.marks.push(Mark::Circle {
                    center: (xs.map(i), y.map(*v)),
                    radius: 3.0,
                    fill: color,
                    tooltip: Some(format!("{}: {}", names[i], value_label(*v))),
                });
            }
        }
    }
    canvas.baseline(f.bottom());

    let centers: Vec<f64> = (0..names.len()).map(|i| xs.map(i)).collect();
    canvas.category_labels(&names, &centers, xs.step());
    let series_names: Vec<String> = series.into_iter().map(|(n, _)| n).collect();
    canvas.series_legend(&series_names);
    Ok(canvas.finish())
}

/// Slices clockwise from twelve o'clock, labelled with their percentage.
///
/// Returns `None` when every value is null or zero, since there is no whole
/// to divide.
fn pie(mut canvas: Canvas<'_>, table: &Table, spec: &ChartSpec, cutout: f64) -> Result<Option<Plot>, ChartError> {
    let names = labels(table, &spec.x)?;
    let value_column = &spec.y[0];
    let cells = numeric(table, value_column)?;
    if let Some(v) = cells.iter().flatten().find(|v| **v < 0.0) {
        return Err(ChartError::NegativeSlice {
            column: value_column.clone(),
            value: *v,
        });
    }
    let total: f64 = cells.iter().flatten().sum();
    if total == 0.0 {
        return Ok(None);
    }

    let f = canvas.frame;
    let legend_width = canvas.legend_width(&names);
    let plot_width = (f.width - legend_width).max(f.width / 2.0);
    let outer = (plot_width.min(f.height) / 2.0 - 4.0).max(1.0);
    let inner = outer * cutout;
    let center = (f.left + plot_width / 2.0, f.top + f.height / 2.0);
    let label_radius = if cutout > 0.0 { (inner + outer) / 2.0 } else { outer * 0.65 };

    let mut angle = 0.0;
    let mut entries = Vec::new();
    for (i, (name, cell)) in names.iter().zip(&cells).enumerate() {
        let Some(v) = cell else { continue };
        let color = palette(i);
        entries.push(LegendEntry {
            label: name.clone(),
            color,
        });
        if *v == 0.0 {
            continue;
        }
        let share = round2(v / total * 100.0);
        let sweep = v / total * TAU;
        canvas.marks.push(Mark::Sector {
            center,
            inner_radius: inner,
            outer_radius: outer,
            start_angle: angle,
            end_angle: angle + sweep,
            fill: color,
            tooltip: Some(format!("{}: {} ({:.2}%)", name, value_label(*v), share)),
        });
        let (lx, ly) = polar(center, label_radius, angle + sweep / 2.0);
        canvas.marks.push(Mark::Text {
            at: (lx, ly + 3.5),
            text: format!("{:.2}%", share),
            size: LABEL_SIZE,
            anchor: Anchor::Middle,
            bold: false,
            fill: Color::WHITE,
        });
        angle += sweep;
    }

    let legend_x = f.left + plot_width + 8.0;
    canvas.legend(entries, legend_x, f.top + 4.0);
    Ok(canvas.finish())
}

fn scatter(mut canvas: Canvas<'_>, table: &Table, spec: &ChartSpec) -> Result<Option<Plot>, ChartError> {
    let xs = numeric(table, &spec.x)?;
    let ys = numeric(table, &spec.y[0])?;
    let shades = match &spec.color {
        Some(name) => Some((name.clone(), numeric(table, name)?)),
        None => None,
    };
    let f = canvas.frame;
    let x = LinearScale::covering(xs.iter().flatten().copied(), false, (f.left, f.right())).nice(TICKS);
    let y = LinearScale::covering(ys.iter().flatten().copied(), false, (f.bottom(), f.top)).nice(TICKS);
    canvas.y_axis(&y);
    canvas.x_axis(&x);

    let range = shades.as_ref().map(|(_, cells)| {
        cells
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
    });
    for (i, (px, py)) in xs.iter().zip(&ys).enumerate() {
        let (Some(px), Some(py)) = (px, py) else { continue };
        let fill = match (&shades, range) {
            (Some((_, cells)), Some((lo, hi))) => match cells[i] {
                Some(c) if hi > lo => COLOR_LOW.mix(COLOR_HIGH, (c - lo) / (hi - lo)),
                Some(_) => COLOR_HIGH,
                None => Color::AXIS,
            },
            _ => canvas.series_color(0),
        };
        canvas.marks.push(Mark::Circle {
            center: (x.map(*px), y.map(*py)),
            radius: 4.0,
            fill,
            tooltip: Some(format!("{}, {}", value_label(*px), value_label(*py))),
        });
    }

    if let (Some((name, _)), Some((lo, hi))) = (&shades, range) {
        if lo <= hi {
            let entries = vec![
                LegendEntry {
                    label: format!("{} {}", name, value_label(lo)),
                    color: COLOR_LOW,
                },
                LegendEntry {
                    label: format!("{} {}", name, value_label(hi)),
                    color: COLOR_HIGH,
                },
            ];
            let labels: Vec<String> = entries.iter().map(|e| e.label.clone()).collect();
            let lx = f.right() - canvas.legend_width(&labels);
            canvas.legend(entries, lx, f.top + 4.0);
        }
    }
    Ok(canvas.finish())
}

/// Equal-width bins over `[min, max]` of `values`; the last bin is closed.
///
/// Returns the `bins + 1` edges and the count per bin.
pub fn histogram_counts(values: &[f64], bins: usize) -> (Vec<f64>, Vec<usize>) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if bins == 0 || finite.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0; bins];
    for v in finite {
        let slot = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[slot] += 1;
    }
    (edges, counts)
}

fn histogram(mut canvas: Canvas<'_>, table: &Table, spec: &ChartSpec) -> Result<Option<Plot>, ChartError> {
    let values: Vec<f64> = numeric(table, &spec.x)?.into_iter().flatten().collect();
    let (edges, counts) = histogram_counts(&values, spec.bins);
    // Nothing finite to bin.
    if edges.is_empty() {
        return Ok(None);
    }
    let f = canvas.frame;
    let x = LinearScale::new((edges[0], edges[edges.len() - 1]), (f.left, f.right()));
    let y = LinearScale::covering(counts.iter().map(|c| *c as f64), true, (f.bottom(), f.top)).nice(TICKS);
    canvas.y_axis(&y);
    canvas.x_axis(&x);

    let fill = canvas.series_color(0);
    let zero = y.map(0.0);
    for (i, count) in counts.iter().enumerate() {
        if *count == 0 {
            continue;
        }
        let (a, b) = (edges[i], edges[i + 1]);
        let top = y.map(*count as f64);
        canvas.marks.push(Mark::Rect {
            x: x.map(a),
            y: top,
            width: (x.map(b) - x.map(a) - 1.0).max(0.5),
            height: zero - top,
            fill,
            tooltip: Some(format!("{} to {}: {}", tick_label(a), tick_label(b), count)),
        });
    }
    Ok(canvas.finish())
}

fn point_map(mut canvas: Canvas<'_>, table: &Table, spec: &ChartSpec) -> Result<Option<Plot>, ChartError> {
    let lon = numeric(table, &spec.x)?;
    let lat = numeric(table, &spec.y[0])?;
    let f = canvas.frame;
    let padded = |cells: &[Option<f64>], range: (f64, f64)| {
        let s = LinearScale::covering(cells.iter().flatten().copied(), false, range);
        let (lo, hi) = s.domain();
        let pad = ((hi - lo) * 0.1).max(0.001);
        LinearScale::new((lo - pad, hi + pad), range)
    };
    let x = padded(&lon[..], (f.left, f.right()));
    let y = padded(&lat[..], (f.bottom(), f.top));

    canvas.marks.push(Mark::Rect {
        x: f.left,
        y: f.top,
        width: f.width,
        height: f.height,
        fill: Color(0xf4, 0xf1, 0xea),
        tooltip: None,
    });
    canvas.y_axis(&y);
    canvas.x_axis(&x);

    let tooltip_columns = spec
        .tooltip
        .iter()
        .map(|name| column(table, name).map(|values| (name.as_str(), values)))
        .collect::<Result<Vec<_>, _>>()?;
    for (i, (px, py)) in lon.iter().zip(&lat).enumerate() {
        let (Some(px), Some(py)) = (px, py) else { continue };
        let tooltip = tooltip_columns
            .iter()
            .map(|(name, values)| format!("{}: {}", name, values[i]))
            .collect::<Vec<_>>()
            .join("\n");
        canvas.marks.push(Mark::Circle {
            center: (x.map(*px), y.map(*py)),
            radius: 6.0,
            fill: spec.fill.unwrap_or(MAP_MARKER),
            tooltip: (!tooltip.is_empty()).then_some(tooltip),
        });
    }
    Ok(canvas.finish())
}
