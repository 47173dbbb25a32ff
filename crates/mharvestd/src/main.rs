mod access_log;
mod handlers;
mod openapi;
mod state;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use mharvest_core::config::{Config, LogFormat, LoggingConfig};
use mharvest_core::executor::SystemExecutor;
use mharvest_core::pipeline;
use mharvest_core::probe::Platform;

use state::AppState;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(
    name = "mharvestd",
    about = "Harvests host and container metrics from diagnostic commands and serves them for scraping",
    version = mharvest_core::VERSION
)]
struct Args {
    /// Path to the JSON config file. Built-in defaults apply when omitted.
    #[arg(short, long, env = "MHARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (`:8080` or `host:8080`). Overrides `server.port`.
    #[arg(long, env = "MHARVEST_LISTEN")]
    listen: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================
// Main
// ============================================================

fn main() -> ExitCode {
    let args = Args::parse();

    // Logging is configured from the file, so config errors go to stderr.
    let config = match load_config(args.config.as_deref(), args.listen.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mharvestd: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging, args.verbose, args.quiet);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "harvester stopped with an error");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>, listen: Option<&str>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(listen) = listen {
        config.server.port = listen.to_string();
        config.validate().context("invalid --listen")?;
    }
    Ok(config)
}

/// Level comes from `logging.level`, overridden by -v/-q; `RUST_LOG` wins
/// over both.
fn init_logging(logging: &LoggingConfig, verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => logging.level.parse().unwrap_or(Level::INFO),
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let level = level.as_str().to_ascii_lowercase();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("mharvestd={level},mharvest_core={level}"))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn async_main(config: Config) -> Result<()> {
    let platform = Platform::detect();
    info!(version = mharvest_core::VERSION, %platform, "starting metric harvester");

    let pipeline = pipeline::build(&config, Arc::new(SystemExecutor::default()), platform)
        .context("failed to register metric series")?;
    info!(
        collectors = ?pipeline.collector_names(),
        series = pipeline.registry.series_count(),
        "pipeline ready"
    );

    let cancel = CancellationToken::new();
    let scheduler = tokio::spawn(Arc::clone(&pipeline.scheduler).run(cancel.clone()));

    let addr = config.server.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    let app = handlers::app(AppState::new(&config, &pipeline), &config.server)
        .into_make_service_with_connect_info::<SocketAddr>();
    let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await
        }
    });

    let early = tokio::select! {
        _ = shutdown_signal() => None,
        result = &mut server => Some(result),
    };
    cancel.cancel();

    let served = match early {
        Some(result) => result,
        None => {
            info!(
                timeout_ms = config.server.shutdown_timeout.as_millis() as u64,
                "shutting down"
            );
            match tokio::time::timeout(config.server.shutdown_timeout, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("open connections did not drain before shutdown timeout");
                    server.abort();
                    Ok(Ok(()))
                }
            }
        }
    };

    // The scheduler bounds its own in-flight cycle by the shutdown timeout.
    if let Err(e) = scheduler.await {
        error!(error = %e, "scheduler task failed");
    }

    served.context("http server task failed")?.context("http server failed")?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_listen_flag_overrides_config() {
        let config = load_config(None, Some("127.0.0.1:9300")).unwrap();
        assert_eq!(config.server.listen_addr().unwrap(), "127.0.0.1:9300");
    }

    #[test]
    fn test_bad_listen_flag_is_rejected() {
        assert!(load_config(None, Some("9300")).is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/harvester.json")), None).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/harvester.json"));
    }
}
