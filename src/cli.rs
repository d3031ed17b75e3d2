use crate::codegen::generate_db_details;
use crate::config::{load_config, Config};
use crate::connection_string::{build_connection_string, CredentialMode, Credentials, ProcessEnv};
use crate::core::db::connect;
use crate::core::{DataManagerError, Result};
use crate::dataset::Dataset;
use crate::writer::write;
use std::fs;
use std::path::{Path, PathBuf};

pub const USAGE: &str = "\
Usage:
  data-manager url [--env] <host> <user> <password> <database>
  data-manager url [--config <path>]
  data-manager load <database-file> <table> <records.json> [--schema <name>] [--config <path>]
  data-manager generate [--config <path>] [--no-orm]
  data-manager help";

/// Represents a parsed command line.
#[derive(Debug, PartialEq)]
pub enum Command {
    Url {
        credentials: Credentials,
        mode: CredentialMode,
    },
    /// Builds the URI from the `[connection]` section
    UrlFromConfig {
        config: Option<PathBuf>,
    },
    /// Appends JSON records to a table of a SQLite database
    Load {
        database: PathBuf,
        table: String,
        records: PathBuf,
        schema: Option<String>,
        config: Option<PathBuf>,
    },
    Generate {
        config: Option<PathBuf>,
        orm: bool,
    },
    Help,
    Unknown(String),
}

/// Parses the arguments that follow the program name.
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Command {
    let parts: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
    let unknown = || Command::Unknown(parts.join(" "));

    match parts.first().copied() {
        Some("url") => match &parts[1..] {
            [] => Command::UrlFromConfig { config: None },
            ["--config", path] => Command::UrlFromConfig {
                config: Some(PathBuf::from(*path)),
            },
            rest => {
                let use_env = rest.contains(&"--env");
                let fields: Vec<&str> = rest.iter().copied().filter(|p| *p != "--env").collect();
                if fields.len() != 4 {
                    return unknown();
                }
                Command::Url {
                    credentials: Credentials::new(fields[0], fields[1], fields[2], fields[3]),
                    mode: if use_env {
                        CredentialMode::Environment
                    } else {
                        CredentialMode::Literal
                    },
                }
            }
        },
        Some("load") => {
            let mut positional = Vec::new();
            let mut schema = None;
            let mut config = None;
            let mut rest = parts[1..].iter();
            while let Some(arg) = rest.next() {
                match *arg {
                    "--schema" => match rest.next() {
                        Some(name) => schema = Some(name.to_string()),
                        None => return unknown(),
                    },
                    "--config" => match rest.next() {
                        Some(path) => config = Some(PathBuf::from(path)),
                        None => return unknown(),
                    },
                    other => positional.push(other),
                }
            }
            match positional.as_slice() {
                [database, table, records] => Command::Load {
                    database: PathBuf::from(database),
                    table: table.to_string(),
                    records: PathBuf::from(records),
                    schema,
                    config,
                },
                _ => unknown(),
            }
        }
        Some("generate") => {
            let mut config = None;
            let mut orm = true;
            let mut rest = parts[1..].iter();
            while let Some(arg) = rest.next() {
                match *arg {
                    "--config" => match rest.next() {
                        Some(path) => config = Some(PathBuf::from(path)),
                        None => return unknown(),
                    },
                    "--no-orm" => orm = false,
                    _ => return unknown(),
                }
            }
            Command::Generate { config, orm }
        }
        Some("help") | Some("--help") | Some("-h") | None => Command::Help,
        Some(_) => unknown(),
    }
}

/// Runs a parsed command, returning the text to print on success.
pub fn run(command: Command) -> Result<String> {
    match command {
        Command::Url { credentials, mode } => build_connection_string(&credentials, mode),
        Command::UrlFromConfig { config } => {
            let connection = config_from(config)?.connection.ok_or_else(|| {
                DataManagerError::Config("configuration has no [connection] section".to_string())
            })?;
            build_connection_string(&connection.credentials, connection.mode)
        }
        Command::Load {
            database,
            table,
            records,
            schema,
            config,
        } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => Config::default(),
            };
            load(&config, &database, &table, &records, schema.as_deref())
        }
        Command::Generate { config, orm } => generate(&config_from(config)?, orm),
        Command::Help => Ok(USAGE.to_string()),
        Command::Unknown(input) => Err(DataManagerError::InvalidArgument(format!(
            "unrecognized command `{}`\n{}",
            input, USAGE
        ))),
    }
}

/// Loads the given configuration file, or the one at the default location.
fn config_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path
        .or_else(Config::default_path)
        .ok_or_else(|| DataManagerError::Config("no configuration path given".to_string()))?;
    load_config(&path)
}

fn load(
    config: &Config,
    database: &Path,
    table: &str,
    records: &Path,
    schema: Option<&str>,
) -> Result<String> {
    let data = Dataset::from_json_records(&fs::read_to_string(records)?)?;
    let mut options = config.writer.write_options();
    if let Some(schema) = schema {
        options = options.schema(schema);
    }

    let path = database.to_str().ok_or_else(|| {
        DataManagerError::InvalidArgument(format!(
            "database path {} is not valid UTF-8",
            database.display()
        ))
    })?;
    let mut conn = connect(path)?;
    let report = write(&data, &mut conn, table, &options)?;
    Ok(format!(
        "wrote {} rows to {} in {} batches",
        report.rows_written,
        report.target,
        report.batch_sizes.len()
    ))
}

fn generate(config: &Config, orm: bool) -> Result<String> {
    if config.models.is_empty() {
        return Err(DataManagerError::Config(
            "configuration lists no [[models]]".to_string(),
        ));
    }
    let export_dir = config
        .codegen
        .export_path
        .as_deref()
        .unwrap_or_else(|| Path::new("."));
    let orm_dir = if orm && config.codegen.enabled {
        config.codegen.orm_path.as_deref().or(Some(export_dir))
    } else {
        None
    };

    let report = generate_db_details(
        &config.models,
        export_dir,
        orm_dir,
        &config.codegen.generator,
        &ProcessEnv,
    )?;

    let mut lines = vec![format!("wrote {}", report.manifest.display())];
    lines.extend(
        report
            .generated
            .iter()
            .map(|path| format!("generated {}", path.display())),
    );
    Ok(lines.join("\n"))
}
