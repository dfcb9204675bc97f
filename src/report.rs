//! Multi-page reports: a cover, a page of steps, then one page per chart.

use crate::chart::{render, ChartArtifact, ChartKind, ChartSpec};
use crate::datasets::simulated_trend;
use crate::measure::TextMetrics;
use crate::pdf::{Page, PAGE_HEIGHT, PAGE_WIDTH};
use crate::scene::{Anchor, Color};
use crate::table::Table;
use crate::view::ViewError;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

const MARGIN: f64 = 72.0;

/// Where a document is in its one-way construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    Empty,
    ClaimedCover,
    StepsAdded,
    /// Number of chart pages so far, at least one.
    ChartsAdded(usize),
    Finalized,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReportError {
    #[error("Cannot {action} while the report is in state {state:?}")]
    OutOfOrder {
        action: &'static str,
        state: ReportState,
    },
    #[error("Report generation failed at chart {index} ({label}): {reason}")]
    GenerationFailed {
        index: usize,
        label: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportPage {
    Cover {
        title: String,
        subtitle: String,
        blurb: String,
    },
    Steps {
        heading: String,
        steps: Vec<String>,
    },
    Chart {
        title: String,
        chart: ChartArtifact,
        caption: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    state: ReportState,
    pages: Vec<ReportPage>,
}

impl Default for ReportDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportDocument {
    pub fn new() -> Self {
        Self {
            state: ReportState::Empty,
            pages: Vec::new(),
        }
    }

    pub fn state(&self) -> ReportState {
        self.state
    }

    pub fn pages(&self) -> &[ReportPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.state == ReportState::Finalized
    }

    fn advance(&mut self, action: &'static str, allowed: bool, next: ReportState) -> Result<(), ReportError> {
        if !allowed {
            return Err(ReportError::OutOfOrder {
                action,
                state: self.state,
            });
        }
        debug!(from = ?self.state, to = ?next, "report state");
        self.state = next;
        Ok(())
    }

    pub fn add_cover(&mut self, title: &str, subtitle: &str, blurb: &str) -> Result<(), ReportError> {
        let allowed = self.state == ReportState::Empty;
        self.advance("add a cover", allowed, ReportState::ClaimedCover)?;
        self.pages.push(ReportPage::Cover {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            blurb: blurb.to_string(),
        });
        Ok(())
    }

    pub fn add_steps(&mut self, heading: &str, steps: &[String]) -> Result<(), ReportError> {
        let allowed = self.state == ReportState::ClaimedCover;
        self.advance("add steps", allowed, ReportState::StepsAdded)?;
        self.pages.push(ReportPage::Steps {
            heading: heading.to_string(),
            steps: steps.to_vec(),
        });
        Ok(())
    }

    pub fn add_chart(&mut self, title: &str, chart: ChartArtifact, caption: &str) -> Result<(), ReportError> {
        let next = match self.state {
            ReportState::StepsAdded => Some(ReportState::ChartsAdded(1)),
            ReportState::ChartsAdded(n) => Some(ReportState::ChartsAdded(n + 1)),
            _ => None,
        };
        self.advance("add a chart", next.is_some(), next.unwrap_or(self.state))?;
        self.pages.push(ReportPage::Chart {
            title: title.to_string(),
            chart,
            caption: caption.to_string(),
        });
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), ReportError> {
        let allowed = matches!(self.state, ReportState::ChartsAdded(_));
        self.advance("finalize", allowed, ReportState::Finalized)
    }

    /// Lay every page out for the PDF writer.
    pub(crate) fn layout(&self) -> Vec<Page> {
        self.pages.iter().map(layout_page).collect()
    }
}

fn layout_page(page: &ReportPage) -> Page {
    let metrics = TextMetrics::default();
    let mut out = Page::new();
    match page {
        ReportPage::Cover {
            title,
            subtitle,
            blurb,
        } => {
            let mid = PAGE_WIDTH / 2.0;
            out.text((mid, PAGE_HEIGHT * 0.3), title, 20.0, Anchor::Middle, true, Color::BLACK);
            out.text((mid, PAGE_HEIGHT * 0.38), subtitle, 12.0, Anchor::Middle, false, Color::BLACK);
            let mut y = PAGE_HEIGHT * 0.56;
            for line in metrics.wrap(blurb, PAGE_WIDTH - 2.0 * MARGIN, 10.0) {
                out.text((MARGIN, y), &line, 10.0, Anchor::Start, false, Color::BLACK);
                y += metrics.line_height(10.0);
            }
        }
        ReportPage::Steps { heading, steps } => {
            out.text((MARGIN, PAGE_HEIGHT * 0.1), heading, 14.0, Anchor::Start, true, Color::BLACK);
            let mut y = PAGE_HEIGHT * 0.18;
            for step in steps {
                for line in metrics.wrap(step, PAGE_WIDTH - 2.0 * MARGIN, 10.0) {
                    out.text((MARGIN, y), &line, 10.0, Anchor::Start, false, Color::BLACK);
                    y += metrics.line_height(10.0);
                }
                y += PAGE_HEIGHT * 0.06 - metrics.line_height(10.0);
            }
        }
        ReportPage::Chart {
            title,
            chart,
            caption,
        } => {
            out.text((PAGE_WIDTH / 2.0, MARGIN), title, 14.0, Anchor::Middle, true, Color::BLACK);
            match chart {
                ChartArtifact::Plot(plot) => {
                    let scale = (PAGE_WIDTH - 2.0 * MARGIN) / plot.width;
                    out.chart(plot, (MARGIN, MARGIN + 24.0), scale);
                }
                ChartArtifact::Empty { .. } => {
                    out.text(
                        (PAGE_WIDTH / 2.0, PAGE_HEIGHT * 0.35),
                        "No data to show",
                        12.0,
                        Anchor::Middle,
                        false,
                        Color::AXIS,
                    );
                }
            }
            let mut y = PAGE_HEIGHT * 0.95 - metrics.line_height(10.0);
            for line in metrics.wrap(caption, PAGE_WIDTH - 2.0 * MARGIN, 10.0) {
                out.text((MARGIN, y), &line, 10.0, Anchor::Start, false, Color::BLACK);
                y += metrics.line_height(10.0);
            }
        }
    }
    out
}

/// Turns the source table into the table one chart draws.
pub type Prepare = Box<dyn Fn(&Table) -> Result<Table, ViewError>>;

pub struct ChartPlan {
    /// Name shown in chart pickers, e.g. `Bar - Revenue`.
    pub label: String,
    /// An empty `y` plots every column of the prepared table except `x`.
    pub spec: ChartSpec,
    pub caption: String,
    pub prepare: Option<Prepare>,
}

impl ChartPlan {
    pub fn new(label: &str, spec: ChartSpec, caption: &str) -> Self {
        Self {
            label: label.to_string(),
            spec,
            caption: caption.to_string(),
            prepare: None,
        }
    }

    pub fn prepared(mut self, prepare: Prepare) -> Self {
        self.prepare = Some(prepare);
        self
    }

    /// Draw this chart from `source`.
    pub fn draw(&self, source: &Table) -> Result<ChartArtifact, String> {
        let prepared;
        let table = match &self.prepare {
            Some(prepare) => {
                prepared = prepare(source).map_err(|e| e.to_string())?;
                &prepared
            }
            None => source,
        };
        let mut spec = self.spec.clone();
        if spec.y.is_empty() && spec.kind != ChartKind::Histogram {
            spec.y = table
                .column_names()
                .into_iter()
                .filter(|name| *name != spec.x)
                .map(String::from)
                .collect();
        }
        render(table, &spec).map_err(|e| e.to_string())
    }
}

/// Everything needed to build one report from one table.
pub struct ReportPlan {
    pub title: String,
    pub subtitle: String,
    pub blurb: String,
    pub steps_heading: String,
    pub steps: Vec<String>,
    pub charts: Vec<ChartPlan>,
}

impl ReportPlan {
    pub fn chart(&self, label: &str) -> Option<&ChartPlan> {
        self.charts.iter().find(|c| c.label == label)
    }

    /// Build and finalize the whole document, or nothing at all: the first
    /// chart that fails aborts the report.
    pub fn build(&self, source: &Table) -> Result<ReportDocument, ReportError> {
        let mut doc = ReportDocument::new();
        doc.add_cover(&self.title, &self.subtitle, &self.blurb)?;
        doc.add_steps(&self.steps_heading, &self.steps)?;
        for (i, plan) in self.charts.iter().enumerate() {
            let chart = plan.draw(source).map_err(|reason| {
                warn!(chart = %plan.label, %reason, "report chart failed");
                ReportError::GenerationFailed {
                    index: i + 1,
                    label: plan.label.clone(),
                    reason,
                }
            })?;
            let title = chart.title().to_string();
            doc.add_chart(&title, chart, &plan.caption)?;
        }
        doc.finalize()?;
        info!(title = %self.title, pages = doc.page_count(), "report built");
        Ok(doc)
    }
}

/// The restaurant report: revenue bars, revenue shares, a simulated daily
/// trend for the three best earners, and monthly order volume.
pub fn menu_report_plan(today: NaiveDate) -> ReportPlan {
    let charts = vec![
        ChartPlan::new(
            "Bar - Revenue",
            ChartSpec::new(ChartKind::Bar, "Revenue per Menu")
                .x("item")
                .y("revenue")
                .y_label("Revenue (IDR)")
                .fill(Color(0x2b, 0x8c, 0xbe)),
            "The bar chart shows how much revenue each menu item contributes.",
        ),
        ChartPlan::new(
            "Pie - Share",
            ChartSpec::new(ChartKind::Pie, "Revenue Composition")
                .x("item")
                .y("revenue"),
            "The pie chart shows each menu item's percentage of total revenue.",
        ),
        ChartPlan::new(
            "Line - Top 3 Trend",
            ChartSpec::new(ChartKind::Line, "Simulated Daily Trend - Top 3")
                .x("day")
                .y_label("Simulated daily sales"),
            "A simulated daily trend for the three menu items with the highest revenue.",
        )
        .prepared(Box::new(move |menu: &Table| simulated_trend(menu, 3, today))),
        ChartPlan::new(
            "Area - Orders",
            ChartSpec::new(ChartKind::Area, "Order Volume per Menu")
                .x("item")
                .y("sold_month")
                .y_label("Units sold (month)")
                .fill(Color(0xfb, 0x9a, 0x99)),
            "The area chart shows monthly order volume per menu item.",
        ),
    ];
    ReportPlan {
        title: "Warung Nasi Padang Report".to_string(),
        subtitle: "10 popular menu items".to_string(),
        blurb: "This report contains visualizations (bar, pie, line, area) and a summary of the \
                Warung Nasi Padang menu data."
            .to_string(),
        steps_heading: "Steps:".to_string(),
        steps: vec![
            "1. Prepare the menu dataset (item, price, sold_month, rating, lat, lon).".to_string(),
            "2. Use the filters to choose a subset of the menu.".to_string(),
            "3. Pick a visualization and interpret the result.".to_string(),
            "4. Export the PDF report with charts and explanations.".to_string(),
        ],
        charts,
    }
}
