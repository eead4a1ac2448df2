mod config;
mod watch;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use cafepos_config::{load_and_prepare, log_report, CafePosConfig, ValidationReport};
use cafepos_gateway::AppState;
use cafepos_logging::{init_logger, LoggerOptions};

use watch::WatchOptions;

#[derive(Parser)]
#[command(name = "cafepos")]
#[command(about = "CafePOS gateway and table status tools")]
#[command(version)]
struct Cli {
    /// Config file (default: $CAFEPOS_CONFIG_DIR/config.yaml or ~/.cafepos/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway HTTP server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Follow one table's status from a running gateway
    Watch {
        /// Table id
        table: String,
        /// Gateway base URL (default: local gateway on the configured port)
        #[arg(long)]
        url: Option<String>,
        /// Bearer token sent with status requests
        #[arg(long, env = "CAFEPOS_TOKEN")]
        token: Option<String>,
        /// Refresh interval override in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Load and validate the config, then print the report
    CheckConfig,
}

fn init_logging(config: &CafePosConfig) {
    let log_dir = config.logging.dir.as_deref().map(Path::new);
    init_logger(LoggerOptions {
        level: &config.logging.level,
        log_dir,
        json: config.logging.json,
    });
}

fn print_report(path: &Path, report: &ValidationReport) {
    println!("Config: {}", path.display());
    for error in &report.errors {
        println!("  error   {}: {}", error.path, error.message);
    }
    for warning in &report.warnings {
        println!("  warning {}: {}", warning.path, warning.message);
    }
    if report.is_valid() {
        println!("OK ({} warning(s))", report.warnings.len());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = config::resolve_config_path(cli.config);
    let (config, report) = load_and_prepare(&config_path).await?;

    match cli.command {
        Commands::Serve { port } => {
            init_logging(&config);
            log_report(&report);
            if !report.is_valid() {
                bail!("Config at {} has {} error(s)", config_path.display(), report.errors.len());
            }
            run_server(config, port).await?;
        }
        Commands::Watch {
            table,
            url,
            token,
            interval_ms,
        } => {
            init_logging(&config);
            let url = url.unwrap_or_else(|| format!("http://127.0.0.1:{}", config.server.port));
            watch::run_watch(WatchOptions {
                table_id: table,
                url,
                token,
                refresh: config::refresh_config(&config.refresh, interval_ms),
            })
            .await?;
        }
        Commands::CheckConfig => {
            print_report(&config_path, &report);
            if !report.is_valid() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_server(config: CafePosConfig, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", config.server.bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.server.bind, port))?;

    info!(port, bind = %config.server.bind, "Starting CafePOS gateway");

    let backend = config::build_backend(&config.backend)?;
    let state = AppState::from_auth_config(backend, &config.auth);
    if state.authenticator.is_empty() {
        info!("No auth tokens configured; authenticated routes will reject every request");
    }

    cafepos_gateway::start_server(addr, state, config.server.cors).await
}
