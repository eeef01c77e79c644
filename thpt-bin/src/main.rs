#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

use std::{path::PathBuf, time::Duration};

use rama::{
    error::{BoxError, ErrorContext as _},
    graceful,
    net::socket::Interface,
    telemetry::tracing,
};

use clap::{Parser, Subcommand};
use eventing_thpt_lib::utils;

pub mod cmd;
pub mod memory;
pub mod server;
pub mod transport;

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[cfg(test)]
pub mod test;

/// CLI arguments of the eventing throughput benchmark.
#[derive(Debug, Clone, Parser)]
#[command(name = "eventing-thpt")]
#[command(bin_name = "eventing-thpt")]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    cmds: CliCommands,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false, global = true)]
    pub verbose: bool,

    /// enable pretty logging (format for humans)
    #[arg(long, default_value_t = false, global = true)]
    pub pretty: bool,

    /// write the tracing output to the provided (log) file instead of stderr
    #[arg(long, short = 'o', global = true)]
    pub output: Option<PathBuf>,

    /// network interface to serve the prometheus metrics on
    #[arg(
        long = "metrics",
        value_name = "INTERFACE",
        default_value = "0.0.0.0:2112",
        global = true
    )]
    pub metrics_bind: Interface,

    /// directory in which the bound socket addresses are written
    #[arg(long, default_value = ".eventing-thpt", global = true)]
    pub data: PathBuf,

    #[arg(long, value_name = "SECONDS", default_value_t = 1., global = true)]
    /// the graceful shutdown timeout (<= 0.0 = no timeout)
    pub graceful: f64,
}

#[derive(Debug, Clone, Subcommand)]
enum CliCommands {
    Send(self::cmd::send::SendCommand),
    #[cfg(feature = "kafka")]
    KafkaSend(self::cmd::kafka_send::KafkaSendCommand),
    Receive(self::cmd::receive::ReceiveCommand),
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

/// Run a benchmark command with the given args,
/// returning once the command is done or shutdown was requested.
///
/// Used by both `main` and the e2e test suite.
async fn run_with_args<F>(base_shutdown_signal: F, args: Args) -> Result<(), BoxError>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    tokio::fs::create_dir_all(&args.data)
        .await
        .context("create data directory")
        .with_context_debug_field("path", || args.data.clone())?;

    let graceful_timeout = (args.graceful > 0.).then(|| Duration::from_secs_f64(args.graceful));

    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let (result_tx, result_rx) = tokio::sync::oneshot::channel::<Result<(), BoxError>>();
    let graceful = graceful::Shutdown::new(new_shutdown_signal(done_rx, base_shutdown_signal));

    graceful.spawn_task_fn(async move |guard| {
        let global = cmd::GlobalArgs {
            data: args.data,
            metrics_bind: args.metrics_bind,
        };
        let result = match args.cmds {
            CliCommands::Send(send_args) => cmd::send::exec(global, guard, send_args).await,
            #[cfg(feature = "kafka")]
            CliCommands::KafkaSend(kafka_args) => {
                cmd::kafka_send::exec(global, guard, kafka_args).await
            }
            CliCommands::Receive(receive_args) => {
                cmd::receive::exec(global, guard, receive_args).await
            }
        };
        if let Err(err) = &result {
            tracing::error!("command exited with an error: {err}");
        }
        let _ = result_tx.send(result);
        let _ = done_tx.send(());
    });

    let delay = match graceful_timeout {
        Some(duration) => graceful.shutdown_with_limit(duration).await?,
        None => graceful.shutdown().await,
    };
    tracing::debug!("gracefully shutdown with a delay of: {delay:?}");

    // a command cancelled by the shutdown signal never reports a result
    result_rx.await.unwrap_or(Ok(()))
}

fn new_shutdown_signal(
    done_rx: tokio::sync::oneshot::Receiver<()>,
    base_shutdown_signal: impl Future<Output: Send + 'static> + Send + 'static,
) -> impl Future + Send + 'static {
    async move {
        tokio::select! {
            _ = base_shutdown_signal => {
                tracing::debug!("default signal triggered: init graceful shutdown");
            }
            _ = done_rx => {
                tracing::debug!("command is finished, return control");
            }
        }
    }
}
