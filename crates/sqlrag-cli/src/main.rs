//! `sqlrag`: ask questions about a SQLite database in plain language.
//!
//! # Usage
//!
//! ```text
//! sqlrag seed                      # create the demo database
//! sqlrag                           # interactive question loop
//! sqlrag --config ./sqlrag.toml --print-schema
//! ```
//!
//! Settings come from `sqlrag.toml` (or `--config`) and `SQLRAG_*`
//! environment variables, with a `.env` file loaded first.

mod chat;
mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sqlrag_store_sqlite::seed::seed_demo;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use settings::AppConfig;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sqlrag", version, about = "Ask questions about a SQLite database in plain language")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "sqlrag.toml", global = true)]
  config: PathBuf,

  /// Print the schema description sent to the model and exit.
  #[arg(long)]
  print_schema: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Answer questions interactively (the default).
  Chat,
  /// Create the demo customers/orders database.
  Seed {
    /// Database file to create; defaults to the configured `database_path`.
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
  },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let _ = dotenvy::dotenv();

  // Quiet by default so log lines do not interleave with the prompt.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let config = AppConfig::load(&cli.config)
    .with_context(|| format!("invalid configuration (file: {})", cli.config.display()))?;

  if cli.print_schema {
    println!("{}", config.load_semantic_layer()?.render());
    return Ok(());
  }

  match cli.command.unwrap_or(Command::Chat) {
    Command::Chat => chat::run(&config).await,
    Command::Seed { database } => {
      let path = database.unwrap_or_else(|| config.database_path.clone());
      let today = chrono::Local::now().date_naive();
      let report = seed_demo(&path, today)
        .await
        .with_context(|| format!("failed to seed {}", path.display()))?;
      println!(
        "Seeded {}: {} customer(s) and {} order(s) inserted.",
        path.display(),
        report.customers,
        report.orders
      );
      Ok(())
    }
  }
}
