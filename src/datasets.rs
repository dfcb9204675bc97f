//! Built-in sample data for the dashboards that run without a store.

use crate::metrics::Metric;
use crate::table::{Column, Table, TableError};
use crate::value::Value;
use crate::view::{compute_derived, top_n, DerivedRule, ViewError};
use chrono::{Duration, NaiveDate};

pub const TREND_DAYS: usize = 14;

/// Names accepted by [`sample`].
pub const SAMPLES: [&str; 4] = ["menu", "campaigns", "campaign_targets", "campaign_locations"];

/// A built-in table by name, or `None` for an unknown name.
pub fn sample(name: &str) -> Option<Result<Table, ViewError>> {
    let table = match name {
        "menu" => menu(),
        "campaigns" => campaign_totals().map_err(ViewError::from),
        "campaign_targets" => campaign_targets().map_err(ViewError::from),
        "campaign_locations" => campaign_locations().map_err(ViewError::from),
        _ => return None,
    };
    Some(table)
}

/// Ten menu items of a Padang restaurant in Balikpapan, with
/// `revenue = price * sold_month`.
pub fn menu() -> Result<Table, ViewError> {
    let items = [
        ("Rendang", 45000, 120, 4.8, -1.267, 116.832),
        ("Dendeng Balado", 35000, 80, 4.6, -1.268, 116.835),
        ("Gulai Ayam", 30000, 95, 4.5, -1.266, 116.829),
        ("Sambal Ijo", 8000, 200, 4.1, -1.265, 116.828),
        ("Gulai Kikil", 32000, 70, 4.4, -1.269, 116.834),
        ("Perkedel", 8000, 150, 4.0, -1.270, 116.836),
        ("Sate Padang", 25000, 60, 4.3, -1.271, 116.838),
        ("Sayur Nangka", 12000, 90, 4.2, -1.264, 116.831),
        ("Ayam Pop", 28000, 110, 4.5, -1.262, 116.830),
        ("Paru Goreng", 10000, 180, 3.9, -1.263, 116.833),
    ];
    let rows = items
        .iter()
        .map(|&(item, price, sold, rating, lat, lon)| {
            vec![
                Value::from(item),
                Value::Int(price),
                Value::Int(sold),
                Value::Float(rating),
                Value::Float(lat),
                Value::Float(lon),
            ]
        })
        .collect();
    let table = Table::from_rows(&["item", "price", "sold_month", "rating", "lat", "lon"], rows)?;
    compute_derived(
        &table,
        &DerivedRule::Product {
            left: "price".to_string(),
            right: "sold_month".to_string(),
            target: "revenue".to_string(),
        },
    )
}

/// Donation totals per campaign, in millions.
pub fn campaign_totals() -> Result<Table, TableError> {
    Table::from_rows(
        &["campaign", "donations"],
        vec![
            vec!["Campaign A".into(), Value::Int(50)],
            vec!["Campaign B".into(), Value::Int(70)],
            vec!["Campaign C".into(), Value::Int(200)],
        ],
    )
}

/// Raised amount against target per campaign, in millions.
pub fn campaign_targets() -> Result<Table, TableError> {
    Table::from_rows(
        &["campaign", "raised", "target"],
        vec![
            vec!["Mangrove Balikpapan".into(), Value::Int(120), Value::Int(150)],
            vec!["Pantai Samboja".into(), Value::Int(85), Value::Int(100)],
            vec!["Delta Mahakam".into(), Value::Int(60), Value::Int(90)],
        ],
    )
}

/// One metric per campaign: amount raised against its target.
pub fn campaign_progress() -> Result<Vec<Metric>, ViewError> {
    let table = campaign_targets()?;
    table
        .rows()
        .map(|row| {
            let number = |column: &str| {
                let cell = row.get(column).cloned().unwrap_or(Value::Null);
                cell.as_f64().ok_or_else(|| ViewError::NotNumeric {
                    column: column.to_string(),
                    value: cell.to_string(),
                })
            };
            let label = row.get("campaign").map(Value::to_string).unwrap_or_default();
            Ok(Metric::against_target(&label, number("raised")?, number("target")?))
        })
        .collect()
}

pub fn campaign_locations() -> Result<Table, TableError> {
    Table::from_rows(
        &["location", "lat", "lon"],
        vec![
            vec!["Balikpapan".into(), Value::Float(-1.27), Value::Float(116.83)],
            vec!["Samboja".into(), Value::Float(-1.10), Value::Float(117.00)],
            vec!["Mahakam".into(), Value::Float(-0.50), Value::Float(117.25)],
        ],
    )
}

/// Simulated daily sales for the `n` best-earning items over the
/// [`TREND_DAYS`] days ending at `today`.
///
/// Each item starts at a fourteenth of its monthly units and drifts by a
/// step in `[-2, 4]` per day, never below zero. Steps come from a generator
/// seeded by the item name, so the same menu always yields the same trend.
/// Output columns: `day`, then one column per item in revenue order.
pub fn simulated_trend(menu: &Table, n: usize, today: NaiveDate) -> Result<Table, ViewError> {
    let top = top_n(menu, "revenue", n, Some("item"))?;
    let days: Vec<Value> = (0..TREND_DAYS)
        .rev()
        .map(|back| Value::Date(today - Duration::days(back as i64)))
        .collect();
    let mut columns = vec![Column::new("day", days)];
    for row in top.rows() {
        let item = row.get("item").map(Value::to_string).unwrap_or_default();
        let sold = row.get("sold_month").cloned().unwrap_or(Value::Null);
        let monthly = sold.as_f64().ok_or_else(|| ViewError::NotNumeric {
            column: "sold_month".to_string(),
            value: sold.to_string(),
        })?;
        let base = (monthly / TREND_DAYS as f64).floor() as i64;
        let mut rng = SplitMix::seeded(&item);
        let mut walk = 0;
        let series = (0..TREND_DAYS)
            .map(|_| {
                walk += rng.below(7) as i64 - 2;
                Value::Int((base + walk).max(0))
            })
            .collect();
        columns.push(Column::new(item, series));
    }
    Ok(Table::from_columns(columns)?)
}

/// SplitMix64; small, seedable and stable across platforms.
struct SplitMix(u64);

impl SplitMix {
    fn seeded(name: &str) -> Self {
        // FNV-1a over the name.
        let seed = name
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3));
        SplitMix(seed)
    }

    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_revenue() {
        let menu = menu().unwrap();
        assert_eq!(menu.row_count(), 10);
        assert_eq!(menu.value(0, "revenue"), Some(&Value::Int(5_400_000)));
        assert_eq!(menu.value(3, "revenue"), Some(&Value::Int(1_600_000)));
        assert_eq!(
            menu.column_names(),
            vec!["item", "price", "sold_month", "rating", "lat", "lon", "revenue"]
        );
    }

    #[test]
    fn test_trend_picks_top_three_by_revenue() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let trend = simulated_trend(&menu().unwrap(), 3, today).unwrap();
        // Rendang 5.4M, Ayam Pop 3.08M, Gulai Ayam 2.85M.
        assert_eq!(
            trend.column_names(),
            vec!["day", "Rendang", "Ayam Pop", "Gulai Ayam"]
        );
        assert_eq!(trend.row_count(), TREND_DAYS);
        assert_eq!(trend.value(0, "day"), Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())));
        assert_eq!(trend.value(13, "day"), Some(&Value::Date(today)));
    }

    #[test]
    fn test_trend_is_deterministic_and_non_negative() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let menu = menu().unwrap();
        let a = simulated_trend(&menu, 3, today).unwrap();
        let b = simulated_trend(&menu, 3, today).unwrap();
        assert_eq!(a, b);
        for column in &a.columns()[1..] {
            assert!(column.numbers().all(|v| v >= 0.0));
        }
    }

    #[test]
    fn test_trend_steps_stay_in_range() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let trend = simulated_trend(&menu().unwrap(), 1, today).unwrap();
        let values: Vec<f64> = trend.column("Rendang").unwrap().numbers().collect();
        // Rendang sells 120 a month, so the walk starts one step away from 8.
        assert!(values[0] >= 6.0 && values[0] <= 12.0);
        for pair in values.windows(2).filter(|p| p[0] > 0.0) {
            let step = pair[1] - pair[0];
            assert!((-2.0..=4.0).contains(&step));
        }
    }

    #[test]
    fn test_samples_by_name() {
        for name in SAMPLES {
            assert!(sample(name).unwrap().unwrap().row_count() > 0, "{}", name);
        }
        assert_eq!(
            sample("campaign_targets").unwrap().unwrap().column_names(),
            vec!["campaign", "raised", "target"]
        );
        assert!(sample("orders").is_none());
    }

    #[test]
    fn test_campaign_progress() {
        let metrics = campaign_progress().unwrap();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].label, "Mangrove Balikpapan");
        assert_eq!(metrics[0].delta, Some(-30.0));
        assert_eq!(metrics[0].progress(), Some(0.8));
        assert_eq!(metrics[1].progress(), Some(0.85));
    }
}
