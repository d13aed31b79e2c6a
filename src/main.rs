use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use expgate::config::Config;
use expgate::Experiments;

#[derive(Parser, Debug)]
#[command(name = "expgate")]
#[command(about = "Check whether this installation is in the alternate experiment variant")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/expgate/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Cache file to use instead of the configured one
  #[arg(long)]
  cache_file: Option<PathBuf>,

  /// Assignment service endpoint
  #[arg(long)]
  endpoint: Option<String>,

  /// Flight ring to report instead of the host's
  #[arg(long)]
  flight_ring: Option<String>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  /// Log filter used when RUST_LOG is not set
  #[arg(long, default_value = "warn")]
  log_level: String,

  /// Exit with status 1 when not enrolled
  #[arg(long)]
  exit_code: bool,
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&args.log_level))?;

  match &args.log_file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      let appender = tracing_appender::rolling::never(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);

      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let guard = init_logging(&args)?;

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Command line overrides
  if let Some(endpoint) = args.endpoint {
    config.assignment.endpoint = endpoint;
  }
  if let Some(path) = args.cache_file {
    config.cache.path = Some(path);
  }
  if args.flight_ring.is_some() {
    config.flight_ring = args.flight_ring;
  }

  let experiments = Experiments::from_config(&config)?;
  let enabled = experiments.enable_experiment().await;
  println!("{}", enabled);

  if args.exit_code && !enabled {
    drop(guard);
    std::process::exit(1);
  }
  Ok(())
}
