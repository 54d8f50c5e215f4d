mod api;
mod app;
mod commands;
mod config;
mod event;
mod query;
mod resources;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "l9s")]
#[command(about = "A terminal admin console for the Lawbie marketplace, inspired by k9s")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/l9s/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Resource screen to open at startup (e.g. products, sales)
  #[arg(short, long)]
  resource: Option<String>,
}

/// Log to a rolling file in the data directory; the terminal itself
/// belongs to the TUI. The guard must stay alive for the process
/// lifetime or buffered lines are lost.
fn init_tracing() -> Result<WorkerGuard> {
  let log_dir = dirs::data_dir()
    .unwrap_or_else(std::env::temp_dir)
    .join("l9s");
  std::fs::create_dir_all(&log_dir)?;

  let appender = tracing_appender::rolling::daily(log_dir, "l9s.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_tracing()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;

  let mut app = app::App::new(config, args.resource.as_deref())?;
  app.run().await?;

  Ok(())
}
