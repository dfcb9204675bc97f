//! Headline numbers shown above tables and charts.

use crate::table::Table;
use crate::view::ViewError;

/// Count, sum and mean of a numeric column, nulls skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub sum: f64,
    /// `None` when the column has no values.
    pub mean: Option<f64>,
}

impl Summary {
    pub fn of(table: &Table, column: &str) -> Result<Self, ViewError> {
        let col = table
            .column(column)
            .ok_or_else(|| ViewError::UnknownColumn(column.to_string()))?;
        let mut count = 0;
        let mut sum = 0.0;
        for v in col.values.iter().filter(|v| !v.is_null()) {
            let x = v.as_f64().ok_or_else(|| ViewError::NotNumeric {
                column: column.to_string(),
                value: v.to_string(),
            })?;
            count += 1;
            sum += x;
        }
        Ok(Self {
            count,
            sum,
            mean: (count > 0).then(|| sum / count as f64),
        })
    }
}

/// A labelled value, optionally compared against a target.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub label: String,
    pub value: f64,
    /// `value - target` when a target is known.
    pub delta: Option<f64>,
    target: Option<f64>,
}

impl Metric {
    pub fn new(label: &str, value: f64) -> Self {
        Self {
            label: label.to_string(),
            value,
            delta: None,
            target: None,
        }
    }

    pub fn against_target(label: &str, value: f64, target: f64) -> Self {
        Self {
            label: label.to_string(),
            value,
            delta: Some(value - target),
            target: Some(target),
        }
    }

    pub fn target(&self) -> Option<f64> {
        self.target
    }

    /// Fraction of the target reached, clamped to `[0, 1]`.
    pub fn progress(&self) -> Option<f64> {
        match self.target {
            Some(t) if t != 0.0 => Some((self.value / t).clamp(0.0, 1.0)),
            _ => None,
        }
    }
}

/// Format with thousands separators, e.g. `1,234,567.89`.
pub fn format_grouped(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value.abs());
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (text.as_str(), None),
    };
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && text.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match frac {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}
