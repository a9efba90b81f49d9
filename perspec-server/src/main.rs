use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use perspec_common::observability::{LogConfig, LogFormat, init_logging};
use perspec_config::{LoggingConfig, PerspecConfig, PerspecConfigLoader};
use perspec_runtime::PerspecRuntime;

const DEFAULT_CONFIG_FILE: &str = "perspec.yaml";

/// Answer questions as, or about, a Twitter account.
#[derive(Debug, Parser)]
#[command(name = "perspec", version, about)]
struct Args {
    /// YAML configuration file. Without it `perspec.yaml` is used when present.
    #[arg(short, long, env = "PERSPEC_CONFIG")]
    config: Option<PathBuf>,

    /// Override `server.port`.
    #[arg(short, long)]
    port: Option<u16>,
}

fn load_config(args: &Args) -> anyhow::Result<PerspecConfig> {
    let loader = match &args.config {
        Some(path) => PerspecConfigLoader::new().with_file(path),
        None => PerspecConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    let mut cfg = loader.load().context("failed to load configuration")?;
    if let Some(port) = args.port {
        cfg.server.port = port;
    }
    Ok(cfg)
}

fn log_config(logging: &LoggingConfig) -> LogConfig {
    LogConfig {
        app_name: logging.app_name.clone(),
        log_dir: logging.dir.as_ref().map(PathBuf::from),
        emit_stderr: logging.emit_stderr,
        format: LogFormat::from_name(&logging.format),
        default_filter: logging.filter.clone(),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = load_config(&args)?;
    let log_path = init_logging(log_config(&cfg.logging))?;
    tracing::info!(log = %log_path.display(), version = env!("CARGO_PKG_VERSION"), "perspec.start");

    let runtime = PerspecRuntime::build("perspec-worker", cfg.server.worker_threads)?;
    let handle = runtime.handle();
    handle.cancel_on_ctrl_c();

    let result = runtime.block_on(perspec_server::startup::serve(cfg, handle));
    runtime.shutdown(Duration::from_secs(5));
    if let Err(err) = &result {
        tracing::error!(error = ?err, "perspec.failed");
    }
    result
}
