//! Byte streams handed to the surface for download.

use crate::pdf::write_pdf;
use crate::report::{ReportDocument, ReportPage};
use crate::table::{Column, Table, TableError};
use crate::value::{Value, ValueType};
use tracing::debug;
use unicode_width::UnicodeWidthStr;

pub const MIME_CSV: &str = "text/csv";
pub const MIME_PDF: &str = "application/pdf";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("Only a finalized report can be exported")]
    NotFinalized,
}

/// A file ready to hand to the browser or write to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl Download {
    pub fn csv(table: &Table, file_name: &str) -> Result<Self, ExportError> {
        Ok(Self {
            file_name: file_name.to_string(),
            mime: MIME_CSV,
            bytes: to_csv_bytes(table)?,
        })
    }

    pub fn pdf(document: &ReportDocument, file_name: &str) -> Result<Self, ExportError> {
        Ok(Self {
            file_name: file_name.to_string(),
            mime: MIME_PDF,
            bytes: to_pdf_bytes(document)?,
        })
    }
}

/// Header row then one record per row, UTF-8, quoting only where needed.
/// Nulls are written as empty fields.
///
/// [`from_csv_bytes`] reads the output back to an equal table with one
/// exception: an empty text value is indistinguishable from null and reads
/// back as null.
pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.column_names())?;
    for row in table.rows() {
        writer.write_record(row.values().iter().map(Value::to_string))?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    debug!(rows = table.row_count(), bytes = bytes.len(), "wrote csv");
    Ok(bytes)
}

/// Parse CSV with a header row, inferring one type per column.
///
/// Empty fields read as null. Cells are only read as numbers, dates or
/// timestamps when they are written exactly as this crate writes them, so
/// `08123` stays text. A column mixing ints and floats keeps each cell's own
/// kind; any other mix stays text.
pub fn from_csv_bytes(bytes: &[u8]) -> Result<Table, ExportError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record?;
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            column.push(field.to_string());
        }
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, texts)| {
            let dtype = texts
                .iter()
                .fold(ValueType::Null, |acc, t| acc.unify(Value::infer(t).value_type()));
            let values = texts
                .iter()
                .map(|t| match dtype {
                    ValueType::Text | ValueType::Null if t.is_empty() => Value::Null,
                    ValueType::Text | ValueType::Null => Value::Text(t.clone()),
                    _ => Value::infer(t),
                })
                .collect();
            Column::new(name, values)
        })
        .collect();
    Ok(Table::from_columns(columns)?)
}

/// Plain-text grid for terminals. Numeric columns are right-aligned; widths
/// count display cells, so wide glyphs line up.
pub fn to_text(table: &Table) -> String {
    let cells: Vec<Vec<String>> = table
        .columns()
        .iter()
        .map(|c| c.values.iter().map(Value::to_string).collect())
        .collect();
    let widths: Vec<usize> = table
        .columns()
        .iter()
        .zip(&cells)
        .map(|(c, texts)| {
            texts
                .iter()
                .map(|t| t.width())
                .chain(std::iter::once(c.name.width()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let pad = |text: &str, width: usize, right: bool| {
        let fill = " ".repeat(width.saturating_sub(text.width()));
        if right {
            format!("{}{}", fill, text)
        } else {
            format!("{}{}", text, fill)
        }
    };
    let line = |texts: Vec<String>| texts.join("  ").trim_end().to_string();

    let mut out = Vec::with_capacity(table.row_count() + 2);
    out.push(line(
        table
            .columns()
            .iter()
            .zip(&widths)
            .map(|(c, &w)| pad(&c.name, w, c.dtype.is_numeric()))
            .collect(),
    ));
    out.push(line(widths.iter().map(|&w| "-".repeat(w)).collect()));
    for row in 0..table.row_count() {
        out.push(line(
            table
                .columns()
                .iter()
                .zip(&cells)
                .zip(&widths)
                .map(|((c, texts), &w)| pad(&texts[row], w, c.dtype.is_numeric()))
                .collect(),
        ));
    }
    out.join("\n") + "\n"
}

/// Render a finalized report as a PDF, one US Letter page per report page.
pub fn to_pdf_bytes(document: &ReportDocument) -> Result<Vec<u8>, ExportError> {
    if !document.is_finalized() {
        return Err(ExportError::NotFinalized);
    }
    let title = document
        .pages()
        .iter()
        .find_map(|p| match p {
            ReportPage::Cover { title, .. } => Some(title.as_str()),
            _ => None,
        })
        .unwrap_or("Report");
    let bytes = write_pdf(title, &document.layout());
    debug!(pages = document.page_count(), bytes = bytes.len(), "wrote pdf");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartArtifact;
    use chrono::NaiveDate;

    fn orders() -> Table {
        Table::from_rows(
            &["order_id", "customer", "order_date", "total_amount"],
            vec![
                vec![
                    Value::Int(1),
                    "Siti, \"Ibu\" Aminah".into(),
                    Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
                    Value::Float(150000.5),
                ],
                vec![
                    Value::Int(2),
                    "Budi".into(),
                    Value::Null,
                    Value::Float(3.0),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_csv_quotes_and_nulls() {
        let text = String::from_utf8(to_csv_bytes(&orders()).unwrap()).unwrap();
        assert_eq!(
            text,
            "order_id,customer,order_date,total_amount\n\
             1,\"Siti, \"\"Ibu\"\" Aminah\",2024-01-05,150000.5\n\
             2,Budi,,3.0\n"
        );
    }

    #[test]
    fn test_csv_round_trip() {
        let table = orders();
        let back = from_csv_bytes(&to_csv_bytes(&table).unwrap()).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.column("total_amount").unwrap().dtype, ValueType::Float);
    }

    #[test]
    fn test_header_only_csv_is_an_empty_table() {
        let table = from_csv_bytes(b"a,b\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_mixed_numbers_keep_their_kind() {
        let table = from_csv_bytes(b"x\n1\n2.5\n").unwrap();
        let column = table.column("x").unwrap();
        assert_eq!(column.dtype, ValueType::Float);
        assert_eq!(column.values, vec![Value::Int(1), Value::Float(2.5)]);
    }

    #[test]
    fn test_phone_numbers_round_trip_as_text() {
        let table = Table::from_rows(
            &["name", "phone"],
            vec![
                vec!["Ayu".into(), "08123".into()],
                vec!["Budi".into(), "+62".into()],
            ],
        )
        .unwrap();
        let back = from_csv_bytes(&to_csv_bytes(&table).unwrap()).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.value(0, "phone"), Some(&Value::from("08123")));
    }

    #[test]
    fn test_mixed_int_float_column_round_trips() {
        let table = Table::from_rows(
            &["group", "total"],
            vec![
                vec!["a".into(), Value::Int(1)],
                vec!["b".into(), Value::Float(2.5)],
                vec!["c".into(), Value::Null],
            ],
        )
        .unwrap();
        let back = from_csv_bytes(&to_csv_bytes(&table).unwrap()).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_non_finite_cells_read_as_text() {
        let table = from_csv_bytes(b"x\ninf\nNaN\n").unwrap();
        assert_eq!(table.column("x").unwrap().dtype, ValueType::Text);
        assert_eq!(table.value(1, "x"), Some(&Value::from("NaN")));
    }

    #[test]
    fn test_empty_text_reads_back_as_null() {
        let table = Table::from_rows(&["note"], vec![vec!["".into()], vec!["x".into()]]).unwrap();
        let back = from_csv_bytes(&to_csv_bytes(&table).unwrap()).unwrap();
        assert_eq!(back.value(0, "note"), Some(&Value::Null));
        assert_eq!(back.value(1, "note"), Some(&Value::from("x")));
    }

    #[test]
    fn test_mixed_kinds_stay_text() {
        let table = from_csv_bytes(b"x\n1\nabc\n").unwrap();
        assert_eq!(
            table.column("x").unwrap().values,
            vec![Value::from("1"), Value::from("abc")]
        );
    }

    #[test]
    fn test_text_grid_alignment() {
        let table = Table::from_rows(
            &["name", "n"],
            vec![vec!["ab".into(), Value::Int(5)], vec!["日本".into(), Value::Int(120)]],
        )
        .unwrap();
        assert_eq!(to_text(&table), "name    n\n----  ---\nab      5\n日本  120\n");
    }

    #[test]
    fn test_unfinished_report_cannot_be_exported() {
        let mut doc = ReportDocument::new();
        doc.add_cover("t", "s", "b").unwrap();
        assert!(matches!(to_pdf_bytes(&doc), Err(ExportError::NotFinalized)));
    }

    #[test]
    fn test_pdf_download() {
        let mut doc = ReportDocument::new();
        doc.add_cover("Laporan", "s", "b").unwrap();
        doc.add_steps("Steps", &["1. one".to_string()]).unwrap();
        doc.add_chart("c", ChartArtifact::Empty { title: "c".to_string() }, "none")
            .unwrap();
        doc.finalize().unwrap();
        let download = Download::pdf(&doc, "report.pdf").unwrap();
        assert_eq!(download.mime, "application/pdf");
        assert!(download.bytes.starts_with(b"%PDF-1.4"));
        assert!(String::from_utf8_lossy(&download.bytes).contains("/Count 3"));
        assert!(String::from_utf8_lossy(&download.bytes).contains("/Title (Laporan)"));
    }
}
