#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

use std::{path::PathBuf, time::Duration};

use rama::{
    error::BoxError,
    graceful,
    net::socket::Interface,
    telemetry::tracing::{self, Instrument as _},
};

use clap::Parser;

pub mod chaos;
pub mod config;
pub mod http;
pub mod server;
pub mod utils;

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// CLI arguments for configuring the PrintAPI mock.
#[derive(Debug, Clone, Parser)]
#[command(name = "printapi-mock")]
#[command(bin_name = "printapi-mock")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// network interface to bind the mock http server to
    #[arg(
        long,
        short = 'b',
        value_name = "INTERFACE",
        default_value = "127.0.0.1:8080"
    )]
    pub bind: Interface,

    /// JSON config file defining the upload route(s);
    /// POST /upload is used when absent or invalid
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,

    /// enable pretty logging (format for humans)
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// write the tracing output to the provided (log) file instead of stderr
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "SECONDS", default_value_t = 1.)]
    /// the graceful shutdown timeout (<= 0.0 = no timeout)
    pub graceful: f64,

    /// close tcp connections after this duration (e.g. `90s`);
    /// unset by default so timeout mode can hold connections indefinitely
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub connection_timeout: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    utils::telemetry::init_tracing(utils::telemetry::TelemetryConfig {
        verbose: args.verbose,
        pretty: args.pretty,
        output: args.output.as_deref(),
    })?;

    let base_shutdown_signal = graceful::default_signal();
    if let Err(err) = run_with_args(base_shutdown_signal, args).await {
        eprintln!("🚩 exit with error: {err}");
        std::process::exit(1);
    }

    Ok(())
}

/// Runs the mock server and blocks until a critical error
/// occurs or the (graceful) shutdown has been initiated.
async fn run_with_args<F>(base_shutdown_signal: F, args: Args) -> Result<(), BoxError>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    let graceful_timeout = (args.graceful > 0.).then(|| Duration::from_secs_f64(args.graceful));

    let upload_route = config::UploadRouteConfig::load(args.config.as_deref()).await;
    let state = server::MockState::new(upload_route);

    let (error_tx, error_rx) = tokio::sync::mpsc::channel::<BoxError>(1);
    let graceful = graceful::Shutdown::new(new_shutdown_signal(error_rx, base_shutdown_signal));

    graceful.spawn_task_fn(move |guard| async move {
        tracing::info!("spawning printapi mock http server...");
        if let Err(err) =
            server::run_mock_server(args.bind, args.connection_timeout, guard, state)
                .instrument(tracing::debug_span!(
                    "mock server lifetime",
                    server.service.name = utils::env::project_name(),
                    otel.kind = "server",
                    network.protocol.name = "http",
                ))
                .await
        {
            tracing::error!("mock server exited with an error: {err}");
            let _ = error_tx.send(err).await;
        }
    });

    match graceful_timeout {
        Some(duration) => match graceful.shutdown_with_limit(duration).await {
            Ok(delay) => tracing::info!("gracefully shutdown with a delay of: {delay:?}"),
            // connections held open by timeout mode never finish on their own
            Err(err) => tracing::warn!("graceful shutdown did not complete in time: {err}"),
        },
        None => {
            let delay = graceful.shutdown().await;
            tracing::info!("gracefully shutdown with a delay of: {delay:?}");
        }
    }

    Ok(())
}

fn new_shutdown_signal(
    error_rx: tokio::sync::mpsc::Receiver<BoxError>,
    base_shutdown_signal: impl Future<Output: Send + 'static> + Send + 'static,
) -> impl Future + Send + 'static {
    async move {
        let mut mut_error_rx = error_rx;
        let mut signal = Box::pin(base_shutdown_signal);

        tokio::select! {
            _ = signal.as_mut() => {
                tracing::debug!("default signal triggered: init graceful shutdown");
            }
            err = mut_error_rx.recv() => {
                if let Some(err) = err {
                    tracing::error!("fatal err received: {err}; abort");
                } else {
                    tracing::info!("wait for default signal, no error was received");
                    signal.await;
                    tracing::debug!("default signal triggered: init graceful shutdown");
                }
            }
        }
    }
}
