mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use thread_view_core::{render_cycle, render_single, RenderOptions, SelectionMode};
use thread_view_store_sqlite::SqliteStore;
use tracing_subscriber::EnvFilter;

use crate::config::{Overrides, ViewerConfig};

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "tv")]
#[command(about = "Reply thread viewer")]
struct Cli {
    /// YAML config file; every field is optional.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Post store path, overriding `store.path`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Render {
        #[command(subcommand)]
        command: Box<RenderCommand>,
    },
    Thread(ThreadArgs),
    Db {
        #[command(subcommand)]
        command: Box<DbCommand>,
    },
}

#[derive(Debug, Subcommand)]
enum RenderCommand {
    /// Newest posts by one account, each expanded to its thread.
    Author(RenderAuthorArgs),
    /// Newest posts by anyone, each expanded to its thread.
    Latest(RenderLatestArgs),
}

#[derive(Debug, Args)]
struct RenderAuthorArgs {
    #[arg(long)]
    handle: Option<String>,
    #[arg(long)]
    limit: Option<u32>,
}

#[derive(Debug, Args)]
struct RenderLatestArgs {
    #[arg(long)]
    limit: Option<u32>,
}

#[derive(Debug, Args)]
struct ThreadArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate,
    Import(DbImportArgs),
}

#[derive(Debug, Args)]
struct DbImportArgs {
    /// Newline-delimited JSON post documents.
    #[arg(long = "in")]
    input: PathBuf,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    tracing::debug!(config = ?cli.config, db = ?cli.db, "starting tv");
    let mut overrides = Overrides { db: cli.db, ..Overrides::default() };

    match cli.command {
        Command::Render { command } => {
            match command.as_ref() {
                RenderCommand::Author(args) => {
                    overrides.handle.clone_from(&args.handle);
                    overrides.limit = args.limit;
                }
                RenderCommand::Latest(args) => overrides.limit = args.limit,
            }
            let config = ViewerConfig::build(cli.config.as_deref(), overrides)?;
            run_render(&command, &config)
        }
        Command::Thread(args) => {
            let config = ViewerConfig::build(cli.config.as_deref(), overrides)?;
            run_thread(&args, &config)
        }
        Command::Db { command } => {
            let config = ViewerConfig::build(cli.config.as_deref(), overrides)?;
            let mut store = SqliteStore::open_writable(&config.store)?;
            run_db(*command, &mut store)
        }
    }
}

fn run_render(command: &RenderCommand, config: &ViewerConfig) -> Result<()> {
    let mode = match command {
        RenderCommand::Author(_) => {
            SelectionMode::Author { handle: config.author()?.clone(), limit: config.limit }
        }
        RenderCommand::Latest(_) => SelectionMode::Latest { limit: config.limit },
    };
    let store = SqliteStore::open_read_only(&config.store)?;
    let output = render_cycle(&store, &mode, RenderOptions { resolve: config.resolve })?;
    emit_json(serde_json::to_value(&output).context("failed to serialize render output")?)
}

fn run_thread(args: &ThreadArgs, config: &ViewerConfig) -> Result<()> {
    let store = SqliteStore::open_read_only(&config.store)?;
    let thread = render_single(&store, &args.id, RenderOptions { resolve: config.resolve })?;
    emit_json(serde_json::json!({ "thread": thread }))
}

fn run_db(command: DbCommand, store: &mut SqliteStore) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => {
            emit_json(serde_json::json!({ "current_version": store.schema_version()? }))
        }
        DbCommand::Migrate => {
            let before = store.schema_version()?;
            store.migrate()?;
            emit_json(serde_json::json!({
                "before_version": before,
                "after_version": store.schema_version()?
            }))
        }
        DbCommand::Import(args) => {
            store.migrate()?;
            let summary = store.import_ndjson(&args.input)?;
            emit_json(serde_json::json!({
                "input": args.input.display().to_string(),
                "imported": summary.imported,
                "replaced": summary.replaced,
                "skipped_invalid": summary.skipped_invalid
            }))
        }
    }
}
