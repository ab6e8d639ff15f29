//! Pokedex CLI
//!
//! Operator entry point that wires configuration, logging and the SQLite store
//! into `PokemonService`, then runs one service operation per invocation.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{error, info};
use serde_json::Value;

use pokedex_core::db::open_db;
use pokedex_core::{
    core_version, default_log_level, init_logging, CreatePokemon, PaginationQuery, Payload,
    PokemonService, PokemonServiceError, ServiceConfig, SqlitePokemonRepository, UpdatePokemon,
};

#[derive(Parser)]
#[command(name = "pokedex", version)]
#[command(about = "Manage pokemon records in a local pokedex store", long_about = None)]
struct Cli {
    /// Database file (defaults to POKEDEX_DB_PATH, then pokedex.sqlite3)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when omitted
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Fields shared by create and update.
#[derive(Args, Clone)]
struct RecordArgs {
    /// Species index
    #[arg(long)]
    no: Option<u32>,

    /// Extra field as key=value; value is parsed as JSON, else kept as text
    #[arg(long = "field", value_parser = parse_field)]
    fields: Vec<(String, Value)>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a record
    Create {
        /// Name (stored lowercase)
        #[arg(long)]
        name: String,

        #[command(flatten)]
        record: RecordArgs,
    },

    /// List records in store order
    List {
        /// Page size (defaults to DEFAULT_LIMIT)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Records to skip
        #[arg(short, long)]
        offset: Option<u32>,
    },

    /// Look up a record by species index, id or name
    Get { query: String },

    /// Update the record matching a species index, id or name
    Update {
        query: String,

        /// New name (stored lowercase)
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        record: RecordArgs,
    },

    /// Delete a record by exact id
    Delete { id: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = ServiceConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).map_err(|err| err.to_string())?;
        info!("event=cli_start module=cli status=ok version={}", core_version());
    }

    let conn = open_db(&config.db_path)
        .map_err(|err| format!("cannot open {}: {err}", config.db_path.display()))?;
    let repo = SqlitePokemonRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let service = PokemonService::new(repo, &config);

    // `None` means the command succeeded without a record to print.
    let output = match cli.command {
        Commands::Create { name, record } => {
            let dto = CreatePokemon {
                name,
                no: record.no,
                extra: record.payload(),
            };
            Some(to_json(&service.create(dto).map_err(report)?)?)
        }
        Commands::List { limit, offset } => Some(to_json(
            &service
                .find_all(&PaginationQuery { limit, offset })
                .map_err(report)?,
        )?),
        Commands::Get { query } => Some(to_json(&service.find_one(&query).map_err(report)?)?),
        Commands::Update {
            query,
            name,
            record,
        } => {
            let dto = UpdatePokemon {
                name,
                no: record.no,
                extra: record.payload(),
            };
            Some(to_json(&service.update(&query, dto).map_err(report)?)?)
        }
        Commands::Delete { id } => {
            service.remove(&id).map_err(report)?;
            None
        }
    };

    if let Some(value) = output {
        let rendered = serde_json::to_string_pretty(&value).map_err(|err| err.to_string())?;
        println!("{rendered}");
    }
    Ok(())
}

fn report(err: PokemonServiceError) -> String {
    error!(
        "event=cli_command module=cli status=error kind={} status_code={}",
        err.kind(),
        err.status_code()
    );
    format!("error ({} {}): {err}", err.status_code(), err.kind())
}

impl RecordArgs {
    fn payload(&self) -> Payload {
        self.fields.iter().cloned().collect()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|err| format!("cannot render output: {err}"))
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("field name is empty in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
