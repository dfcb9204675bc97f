pub mod aggregate;
pub mod catalog;
pub mod chart;
pub mod config;
pub mod datasets;
pub mod export;
pub mod layout;
pub mod measure;
pub mod metrics;
pub mod pdf;
pub mod query;
pub mod report;
pub mod scene;
pub mod sql;
pub mod store;
pub mod svg;
pub mod table;
pub mod value;
pub mod view;

use wasm_bindgen::prelude::*;

use chart::{ChartKind, ChartSpec};
use export::{from_csv_bytes, Download};
use report::menu_report_plan;
use svg::SvgRenderer;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Chart CSV text as SVG. `y` may name several series, comma-separated.
#[wasm_bindgen(js_name = "csvToSvg")]
pub fn csv_to_svg(csv: &str, kind: &str, x: &str, y: &str) -> Result<String, String> {
    let kind = ChartKind::from_str(kind).ok_or_else(|| format!("Unknown chart kind: {}", kind))?;
    let table = from_csv_bytes(csv.as_bytes()).map_err(|e| e.to_string())?;
    let spec = y
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .fold(ChartSpec::new(kind, y).x(x), |spec, column| spec.y(column));
    let chart = chart::render(&table, &spec).map_err(|e| e.to_string())?;
    Ok(SvgRenderer::default().render(&chart))
}

/// The restaurant report over the built-in menu, as PDF bytes.
#[wasm_bindgen(js_name = "menuReportPdf")]
pub fn menu_report_pdf() -> Result<Vec<u8>, String> {
    let menu = datasets::menu().map_err(|e| e.to_string())?;
    let document = menu_report_plan(view::today()).build(&menu).map_err(|e| e.to_string())?;
    let download = Download::pdf(&document, "report_warung_padang.pdf").map_err(|e| e.to_string())?;
    Ok(download.bytes)
}
