use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tallyboard::aggregate::QueryParams;
use tallyboard::catalog::Catalog;
use tallyboard::chart::{render, ChartError, ChartSpec};
use tallyboard::config::{Command, Config, ConfigError, USAGE};
use tallyboard::datasets;
use tallyboard::export::{to_text, Download, ExportError};
use tallyboard::metrics::format_grouped;
use tallyboard::query::{QueryError, QueryLayer};
use tallyboard::report::{menu_report_plan, ReportError};
use tallyboard::sql::{compile, Dialect};
use tallyboard::store::{MemoryStore, Store, StoreError};
use tallyboard::svg::SvgRenderer;
use tallyboard::table::Table;
use tallyboard::view::{self, ViewError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("Unknown query: {0}")]
    UnknownQuery(String),
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),
    #[error("{0}: DuckDB files need the duckdb feature")]
    NoDuckDb(PathBuf),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error(transparent)]
    View(#[from] ViewError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!();
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    if let Err(e) = run(config) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn run(config: Config) -> Result<(), CliError> {
    match config.command {
        Command::List => {
            for spec in Catalog::standard().specs() {
                println!("{:<32} {}", spec.name, spec.output_columns().join(", "));
            }
            Ok(())
        }
        Command::Query { source, name, limit, csv } => {
            let table = fetch(&source, &name, limit)?;
            match csv {
                Some(path) => {
                    let download = Download::csv(&table, &file_name(&path))?;
                    write(&path, &download.bytes)?;
                    info!(path = %path.display(), rows = table.row_count(), "csv written");
                }
                None if table.is_empty() => println!("No data to show for {}", name),
                None => print!("{}", to_text(&table)),
            }
            Ok(())
        }
        Command::Chart { source, name, kind, x, y, limit, output } => {
            let table = fetch(&source, &name, limit)?;
            let spec = y
                .iter()
                .fold(ChartSpec::new(kind, &name).x(&x), |spec, column| spec.y(column));
            emit_svg(&table, &spec, output)
        }
        Command::Sample { dataset, kind, x, y, output } => {
            let table = datasets::sample(&dataset).ok_or_else(|| CliError::UnknownDataset(dataset.clone()))??;
            if let (Some(kind), Some(x)) = (kind, x) {
                let spec = y
                    .iter()
                    .fold(ChartSpec::new(kind, &dataset).x(&x), |spec, column| spec.y(column));
                return emit_svg(&table, &spec, output);
            }
            print!("{}", to_text(&table));
            if dataset == "campaign_targets" {
                println!();
                for metric in datasets::campaign_progress()? {
                    println!(
                        "{}: {} of {} ({:.0}%)",
                        metric.label,
                        format_grouped(metric.value, 0),
                        format_grouped(metric.target().unwrap_or_default(), 0),
                        metric.progress().unwrap_or_default() * 100.0
                    );
                }
            }
            Ok(())
        }
        Command::Report { output } => {
            let menu = datasets::menu()?;
            let document = menu_report_plan(view::today()).build(&menu)?;
            let download = Download::pdf(&document, &file_name(&output))?;
            write(&output, &download.bytes)?;
            println!("Wrote {} ({} pages)", output.display(), document.page_count());
            Ok(())
        }
        Command::Sql { name, dialect, limit } => {
            let catalog = Catalog::standard();
            let spec = catalog.get(&name).ok_or_else(|| CliError::UnknownQuery(name.clone()))?;
            let compiled = compile(spec, &params(limit), dialect);
            println!("{};", compiled.sql);
            if !compiled.params.is_empty() {
                let bound: Vec<String> = compiled.params.iter().map(|v| v.to_string()).collect();
                println!("-- params: {}", bound.join(", "));
            }
            Ok(())
        }
    }
}

fn emit_svg(table: &Table, spec: &ChartSpec, output: Option<PathBuf>) -> Result<(), CliError> {
    let svg = SvgRenderer::default().render(&render(table, spec)?);
    match output {
        Some(path) => write(&path, svg.as_bytes()),
        None => {
            print!("{}", svg);
            Ok(())
        }
    }
}

fn params(limit: Option<u64>) -> QueryParams {
    limit.map(QueryParams::with_limit).unwrap_or_default()
}

fn fetch(source: &Path, name: &str, limit: Option<u64>) -> Result<Table, CliError> {
    let mut layer = QueryLayer::new(open_store(source)?, Catalog::standard());
    Ok(layer.fetch(name, &params(limit))?)
}

fn open_store(source: &Path) -> Result<Box<dyn Store>, CliError> {
    if source.extension().is_some_and(|ext| ext == "duckdb") {
        #[cfg(feature = "duckdb")]
        return Ok(Box::new(tallyboard::store::DuckStore::open(source)?));
        #[cfg(not(feature = "duckdb"))]
        return Err(CliError::NoDuckDb(source.to_path_buf()));
    }
    let script = fs::read_to_string(source).map_err(|e| CliError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    Ok(Box::new(MemoryStore::from_sql(&script, Dialect::Auto)?))
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    fs::write(path, bytes).map_err(|e| CliError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
