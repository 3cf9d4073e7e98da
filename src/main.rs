mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod query;
mod session;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pmdash")]
#[command(about = "A terminal dashboard for performance management: objectives, tasks, reviews")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pmdash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, overriding the configured one
  #[arg(short, long)]
  base_url: Option<String>,
}

/// Log to a file; the terminal is owned by the UI.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let dir = dirs::data_dir()?.join("pmdash").join("logs");
  std::fs::create_dir_all(&dir).ok()?;

  let appender = tracing_appender::rolling::daily(dir, "pmdash.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_logging();

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;

  // Override the base URL if specified on the command line
  let config = if let Some(base_url) = args.base_url {
    config::Config {
      api: config::ApiConfig { base_url },
      ..config
    }
  } else {
    config
  };

  let session = session::SessionStore::open()?;

  let mut app = app::App::new(config, session)?;
  app.run().await?;

  Ok(())
}
