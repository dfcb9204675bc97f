//! Drawing marks: the back-end neutral vocabulary charts are made of.
//!
//! Coordinates are canvas units with the origin at the top-left corner and
//! y growing downward. Angles are radians measured clockwise from twelve
//! o'clock.

use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const BLACK: Color = Color(0x22, 0x22, 0x22);
    pub const GRID: Color = Color(0xdd, 0xdd, 0xdd);
    pub const AXIS: Color = Color(0x66, 0x66, 0x66);
    pub const WHITE: Color = Color(0xff, 0xff, 0xff);

    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    /// Channels as fractions in `[0, 1]`.
    pub fn unit(self) -> (f64, f64, f64) {
        (
            f64::from(self.0) / 255.0,
            f64::from(self.1) / 255.0,
            f64::from(self.2) / 255.0,
        )
    }

    /// Linear blend; `t = 0` gives `self`, `t = 1` gives `other`.
    pub fn mix(self, other: Color, t: f64) -> Color {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Color(lerp(self.0, other.0), lerp(self.1, other.1), lerp(self.2, other.2))
    }
}

/// Categorical palette cycled by series and slice index.
pub const PALETTE: [Color; 10] = [
    Color(0x2b, 0x8c, 0xbe),
    Color(0xf5, 0x85, 0x18),
    Color(0x2c, 0xa0, 0x2c),
    Color(0xd6, 0x27, 0x28),
    Color(0x94, 0x67, 0xbd),
    Color(0x8c, 0x56, 0x4b),
    Color(0xe3, 0x77, 0xc2),
    Color(0x7f, 0x7f, 0x7f),
    Color(0xbc, 0xbd, 0x22),
    Color(0x17, 0xbe, 0xcf),
];

pub fn palette(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: Color,
        tooltip: Option<String>,
    },
    Line {
        from: (f64, f64),
        to: (f64, f64),
        stroke: Color,
        width: f64,
    },
    Polyline {
        points: Vec<(f64, f64)>,
        stroke: Color,
        width: f64,
    },
    /// Closed region between `points` and the horizontal line at `baseline`.
    Area {
        points: Vec<(f64, f64)>,
        baseline: f64,
        fill: Color,
        opacity: f64,
    },
    Circle {
        center: (f64, f64),
        radius: f64,
        fill: Color,
        tooltip: Option<String>,
    },
    /// Ring or pie slice; `inner_radius == 0` draws a plain wedge.
    Sector {
        center: (f64, f64),
        inner_radius: f64,
        outer_radius: f64,
        start_angle: f64,
        end_angle: f64,
        fill: Color,
        tooltip: Option<String>,
    },
    Text {
        at: (f64, f64),
        text: String,
        size: f64,
        anchor: Anchor,
        bold: bool,
        fill: Color,
    },
}

impl Mark {
    pub fn label(at: (f64, f64), text: impl Into<String>, size: f64, anchor: Anchor) -> Self {
        Mark::Text {
            at,
            text: text.into(),
            size,
            anchor,
            bold: false,
            fill: Color::BLACK,
        }
    }

    pub fn tooltip(&self) -> Option<&str> {
        match self {
            Mark::Rect { tooltip, .. } | Mark::Circle { tooltip, .. } | Mark::Sector { tooltip, .. } => {
                tooltip.as_deref()
            }
            _ => None,
        }
    }
}

/// Point on the circle of `radius` around `center` at `angle`.
pub fn polar(center: (f64, f64), radius: f64, angle: f64) -> (f64, f64) {
    (center.0 + radius * angle.sin(), center.1 - radius * angle.cos())
}

/// Outline of a sector as straight segments, `steps` per full turn.
///
/// Back ends without native arcs fill this polygon instead.
pub fn sector_outline(
    center: (f64, f64),
    inner_radius: f64,
    outer_radius: f64,
    start_angle: f64,
    end_angle: f64,
    steps: usize,
) -> Vec<(f64, f64)> {
    let sweep = end_angle - start_angle;
    let n = ((sweep.abs() / TAU) * steps as f64).ceil().max(1.0) as usize;
    let arc = |r: f64| -> Vec<(f64, f64)> {
        (0..=n)
            .map(|i| polar(center, r, start_angle + sweep * i as f64 / n as f64))
            .collect()
    };
    let mut points = arc(outer_radius);
    if inner_radius > 0.0 {
        let mut inner = arc(inner_radius);
        inner.reverse();
        points.extend(inner);
    } else {
        points.push(center);
    }
    points
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Color,
}
