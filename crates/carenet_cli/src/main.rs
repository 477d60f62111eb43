//! Registry server entry point.
//!
//! # Responsibility
//! - Parse flags and environment into a validated `ServerConfig`.
//! - Bootstrap logging, wire the registry, and serve until ctrl-c.

use carenet_rpc::config::{DEFAULT_BIND, DEFAULT_DB_PATH};
use carenet_rpc::{build_registry, serve, ServerConfig};
use clap::Parser;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "carenet")]
#[command(about = "Facility and individual registry server", version)]
struct Args {
    /// Address the RPC server listens on
    #[arg(long, env = "CARENET_BIND", default_value = DEFAULT_BIND)]
    bind: String,

    /// SQLite database file, or `:memory:` for an ephemeral store
    #[arg(long, env = "CARENET_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db_path: String,

    /// trace|debug|info|warn|error; defaults by build mode
    #[arg(long, env = "CARENET_LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for rolling log files; logging stays off when unset
    #[arg(long, env = "CARENET_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(log_dir) = &args.log_dir {
        let level = match args.log_level.as_deref() {
            Some(level) => level,
            None => carenet_core::default_log_level(),
        };
        let log_dir = match absolute_dir(log_dir) {
            Ok(dir) => dir,
            Err(err) => {
                eprintln!("carenet: cannot resolve log dir: {err}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(err) = carenet_core::init_logging(level, &log_dir.to_string_lossy()) {
            eprintln!("carenet: {err}");
            return ExitCode::FAILURE;
        }
    }

    let config = match ServerConfig::from_parts(&args.bind, &args.db_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("carenet: {err}");
            return ExitCode::FAILURE;
        }
    };

    let registry = match build_registry(&config.store) {
        Ok(registry) => registry,
        Err(err) => {
            error!("event=registry_build module=cli status=error error={err}");
            eprintln!("carenet: {err}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "event=cli_start module=cli status=ok bind={} version={}",
        config.bind,
        carenet_core::core_version()
    );
    if let Err(err) = serve(&config, registry).await {
        error!("event=server_run module=cli status=error error={err}");
        eprintln!("carenet: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn absolute_dir(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
