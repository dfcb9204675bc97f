//! Command-line configuration for the `tallyboard` binary.

use crate::chart::ChartKind;
use crate::sql::Dialect;
use std::path::PathBuf;

pub const SOURCE_VAR: &str = "TALLYBOARD_SOURCE";
pub const DIALECT_VAR: &str = "TALLYBOARD_DIALECT";

pub const USAGE: &str = "\
Usage:
  tallyboard list
  tallyboard query [source] <name> [--limit N] [--csv FILE]
  tallyboard chart [source] <name> --kind K --x COL --y COL [--y COL ...] [--limit N] [-o FILE]
  tallyboard report [-o FILE]
  tallyboard sample <dataset> [--kind K --x COL --y COL ...] [-o FILE]
  tallyboard sql <name> [--dialect D] [--limit N]

  [source] is a .sql fixture, or a .duckdb file when built with the duckdb
  feature; it defaults to $TALLYBOARD_SOURCE.
  Datasets: menu, campaigns, campaign_targets, campaign_locations.
  Chart kinds: bar, line, area, pie, doughnut, scatter, histogram, map.
  Dialects: generic, postgres, mysql, duckdb (default $TALLYBOARD_DIALECT).";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("No command given")]
    MissingCommand,
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("Option {0} needs a value")]
    MissingValue(String),
    #[error("Unknown option: {0}")]
    UnknownOption(String),
    #[error("Invalid value for {flag}: {value}")]
    InvalidValue { flag: String, value: String },
    #[error("Unexpected argument: {0}")]
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Query {
        source: PathBuf,
        name: String,
        limit: Option<u64>,
        csv: Option<PathBuf>,
    },
    Chart {
        source: PathBuf,
        name: String,
        kind: ChartKind,
        x: String,
        y: Vec<String>,
        limit: Option<u64>,
        output: Option<PathBuf>,
    },
    Report {
        output: PathBuf,
    },
    /// A built-in dataset, printed or charted when `kind` is set.
    Sample {
        dataset: String,
        kind: Option<ChartKind>,
        x: Option<String>,
        y: Vec<String>,
        output: Option<PathBuf>,
    },
    Sql {
        name: String,
        dialect: Dialect,
        limit: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub command: Command,
}

/// Flags and positionals of one invocation, before they are checked
/// against what the command accepts.
#[derive(Default)]
struct Parsed {
    positional: Vec<String>,
    limit: Option<u64>,
    csv: Option<PathBuf>,
    output: Option<PathBuf>,
    kind: Option<ChartKind>,
    x: Option<String>,
    y: Vec<String>,
    dialect: Option<Dialect>,
}

impl Config {
    /// Read the process arguments and environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_args(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    /// Parse `args` (without the program name), consulting `env` for
    /// fallbacks.
    pub fn from_args<I, E>(args: I, env: E) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
        E: Fn(&str) -> Option<String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        let (command, rest) = args.split_first().ok_or(ConfigError::MissingCommand)?;
        let parsed = parse_flags(rest)?;

        let command = match command.as_str() {
            "list" => {
                parsed.no_positionals(0)?;
                Command::List
            }
            "query" => {
                let (source, name) = parsed.source_and_name(&env)?;
                Command::Query {
                    source,
                    name,
                    limit: parsed.limit,
                    csv: parsed.csv,
                }
            }
            "chart" => {
                let (source, name) = parsed.source_and_name(&env)?;
                Command::Chart {
                    source,
                    name,
                    kind: parsed.kind.ok_or(ConfigError::MissingArgument("--kind"))?,
                    x: parsed.x.ok_or(ConfigError::MissingArgument("--x"))?,
                    y: parsed.y,
                    limit: parsed.limit,
                    output: parsed.output,
                }
            }
            "report" => {
                parsed.no_positionals(0)?;
                Command::Report {
                    output: parsed
                        .output
                        .unwrap_or_else(|| PathBuf::from("report_warung_padang.pdf")),
                }
            }
            "sample" => {
                parsed.no_positionals(1)?;
                let dataset = parsed
                    .positional
                    .first()
                    .cloned()
                    .ok_or(ConfigError::MissingArgument("dataset"))?;
                if parsed.kind.is_some() && parsed.x.is_none() {
                    return Err(ConfigError::MissingArgument("--x"));
                }
                Command::Sample {
                    dataset,
                    kind: parsed.kind,
                    x: parsed.x,
                    y: parsed.y,
                    output: parsed.output,
                }
            }
            "sql" => {
                parsed.no_positionals(1)?;
                let name = parsed
                    .positional
                    .first()
                    .cloned()
                    .ok_or(ConfigError::MissingArgument("name"))?;
                let dialect = match parsed.dialect {
                    Some(d) => d,
                    None => match env(DIALECT_VAR) {
                        Some(value) => parse_dialect(DIALECT_VAR, &value)?,
                        None => Dialect::Generic,
                    },
                };
                Command::Sql {
                    name,
                    dialect,
                    limit: parsed.limit,
                }
            }
            other => return Err(ConfigError::UnknownCommand(other.to_string())),
        };
        Ok(Self { command })
    }
}

impl Parsed {
    fn no_positionals(&self, allowed: usize) -> Result<(), ConfigError> {
        match self.positional.get(allowed) {
            Some(extra) => Err(ConfigError::Unexpected(extra.clone())),
            None => Ok(()),
        }
    }

    /// `<source> <name>`, or just `<name>` with the source from the env.
    fn source_and_name(&self, env: &impl Fn(&str) -> Option<String>) -> Result<(PathBuf, String), ConfigError> {
        self.no_positionals(2)?;
        match self.positional.as_slice() {
            [source, name] => Ok((PathBuf::from(source), name.clone())),
            [name] => {
                let source = env(SOURCE_VAR).ok_or(ConfigError::MissingArgument("source"))?;
                Ok((PathBuf::from(source), name.clone()))
            }
            _ => Err(ConfigError::MissingArgument("name")),
        }
    }
}

fn parse_flags(args: &[String]) -> Result<Parsed, ConfigError> {
    let mut parsed = Parsed::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i).cloned().ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
        };
        match flag {
            "--limit" | "-n" => {
                let v = value()?;
                let n = v.parse().map_err(|_| ConfigError::InvalidValue {
                    flag: flag.to_string(),
                    value: v.clone(),
                })?;
                parsed.limit = Some(n);
            }
            "--csv" => parsed.csv = Some(PathBuf::from(value()?)),
            "-o" | "--output" => parsed.output = Some(PathBuf::from(value()?)),
            "--kind" | "-k" => {
                let v = value()?;
                parsed.kind = Some(ChartKind::from_str(&v).ok_or_else(|| ConfigError::InvalidValue {
                    flag: flag.to_string(),
                    value: v.clone(),
                })?);
            }
            "--x" => parsed.x = Some(value()?),
            "--y" => parsed.y.push(value()?),
            "--dialect" | "-d" => {
                let v = value()?;
                parsed.dialect = Some(parse_dialect(flag, &v)?);
            }
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(ConfigError::UnknownOption(other.to_string()));
            }
            other => parsed.positional.push(other.to_string()),
        }
        i += 1;
    }
    Ok(parsed)
}

fn parse_dialect(flag: &str, value: &str) -> Result<Dialect, ConfigError> {
    match Dialect::from_str(value) {
        // Compiling needs a concrete dialect.
        Some(Dialect::Auto) => Ok(Dialect::Generic),
        Some(d) => Ok(d),
        None => Err(ConfigError::InvalidValue {
            flag: flag.to_string(),
            value: value.to_string(),
        }),
    }
}
