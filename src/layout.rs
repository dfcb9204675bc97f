//! Plot frames and the scales that place data inside them.

/// Space reserved around the plot area for the title, axes and legend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 48.0,
            right: 24.0,
            bottom: 72.0,
            left: 80.0,
        }
    }
}

/// The rectangle data is drawn into, in canvas units (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn inset(width: f64, height: f64, margins: Margins) -> Self {
        Self {
            left: margins.left,
            top: margins.top,
            width: (width - margins.left - margins.right).max(1.0),
            height: (height - margins.top - margins.bottom).max(1.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Continuous scale mapping a numeric domain linearly onto a pixel range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// Domain spanning `values`, widened to include `0` when `zero` is set.
    pub fn covering(values: impl IntoIterator<Item = f64>, zero: bool, range: (f64, f64)) -> Self {
        let (mut lo, mut hi) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo > hi {
            lo = 0.0;
            hi = 1.0;
        }
        if zero {
            lo = lo.min(0.0);
            hi = hi.max(0.0);
        }
        if lo == hi {
            hi = lo + 1.0;
        }
        Self::new((lo, hi), range)
    }

    /// Extend the domain outward to the enclosing tick boundaries.
    pub fn nice(self, count: usize) -> Self {
        let ticks = self.ticks(count);
        match (ticks.first(), ticks.last()) {
            (Some(&lo), Some(&hi)) if lo < hi => Self::new((lo, hi), self.range),
            _ => self,
        }
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn map(&self, x: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = d1 - d0;
        if span == 0.0 {
            return r0;
        }
        r0 + (x - d0) / span * (r1 - r0)
    }

    pub fn ticks(&self, count: usize) -> Vec<f64> {
        nice_ticks(self.domain.0, self.domain.1, count)
    }
}

/// Round tick values covering `[min, max]`, roughly `count` intervals apart.
pub fn nice_ticks(mut min: f64, mut max: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    if min == max {
        return vec![min];
    }
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    let step = nice_step((max - min) / count as f64);
    if step == 0.0 {
        return vec![min, max];
    }
    let start = (min / step).floor() * step;
    let stop = (max / step).ceil() * step;
    let n = ((stop - start) / step).round().clamp(0.0, 10_000.0) as usize;
    (0..=n)
        // Snap away float noise like 0.30000000000000004.
        .map(|i| snap(start + step * i as f64, step))
        .collect()
}

fn nice_step(step: f64) -> f64 {
    if !step.is_finite() || step <= 0.0 {
        return 0.0;
    }
    let base = 10_f64.powf(step.log10().floor());
    let error = step / base;
    let nice = if error >= 7.5 {
        10.0
    } else if error >= 3.5 {
        5.0
    } else if error >= 1.5 {
        2.0
    } else {
        1.0
    };
    nice * base
}

fn snap(value: f64, step: f64) -> f64 {
    let digits = (-step.log10().floor()).max(0.0) as i32 + 1;
    let factor = 10_f64.powi(digits);
    (value * factor).round() / factor
}

/// Discrete scale giving each category an equal band with padding between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandScale {
    range: (f64, f64),
    count: usize,
    padding: f64,
}

impl BandScale {
    pub fn new(range: (f64, f64), count: usize) -> Self {
        Self {
            range,
            count,
            padding: 0.2,
        }
    }

    pub fn band_width(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let span = (self.range.1 - self.range.0).abs();
        span / (n + self.padding * (n - 1.0) + 2.0 * self.padding)
    }

    /// Left edge of band `index`.
    pub fn start(&self, index: usize) -> f64 {
        let bw = self.band_width();
        let origin = self.range.0.min(self.range.1);
        origin + bw * self.padding + bw * (1.0 + self.padding) * index as f64
    }

    pub fn center(&self, index: usize) -> f64 {
        self.start(index) + self.band_width() / 2.0
    }
}

/// Discrete scale placing each category on an evenly spaced point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointScale {
    range: (f64, f64),
    count: usize,
}

impl PointScale {
    pub fn new(range: (f64, f64), count: usize) -> Self {
        Self { range, count }
    }

    /// Distance between neighbouring points; half a step pads each end.
    pub fn step(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.range.1 - self.range.0).abs() / self.count as f64
    }

    pub fn map(&self, index: usize) -> f64 {
        let origin = self.range.0.min(self.range.1);
        origin + self.step() * (index as f64 + 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_map() {
        let s = LinearScale::new((0.0, 100.0), (300.0, 0.0));
        assert_eq!(s.map(0.0), 300.0);
        assert_eq!(s.map(50.0), 150.0);
        assert_eq!(s.map(100.0), 0.0);
    }

    #[test]
    fn test_degenerate_domain_maps_to_range_start() {
        let s = LinearScale::new((5.0, 5.0), (10.0, 20.0));
        assert_eq!(s.map(5.0), 10.0);
    }

    #[test]
    fn test_nice_ticks() {
        assert_eq!(nice_ticks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(nice_ticks(0.0, 0.9, 3), vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
        assert_eq!(nice_ticks(3.0, 3.0, 5), vec![3.0]);
        assert!(nice_ticks(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_covering_includes_zero_and_nices() {
        let s = LinearScale::covering([1200.0, 5400.0], true, (0.0, 1.0)).nice(5);
        assert_eq!(s.domain(), (0.0, 6000.0));
    }

    #[test]
    fn test_covering_without_values() {
        let s = LinearScale::covering(std::iter::empty(), true, (0.0, 1.0));
        assert_eq!(s.domain(), (0.0, 1.0));
    }

    #[test]
    fn test_band_scale_fills_range() {
        let b = BandScale::new((0.0, 100.0), 4);
        let last_end = b.start(3) + b.band_width();
        assert!((last_end + b.band_width() * 0.2 - 100.0).abs() < 1e-9);
        assert!(b.start(0) > 0.0);
        assert!(b.center(1) > b.center(0));
    }

    #[test]
    fn test_point_scale_pads_half_a_step() {
        let p = PointScale::new((0.0, 100.0), 4);
        assert_eq!(p.step(), 25.0);
        assert_eq!(p.map(0), 12.5);
        assert_eq!(p.map(3), 87.5);
    }
}
