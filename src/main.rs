//! wpa-ctrl main entry point
//!
//! Command-line front end for the control interface client: send a single
//! command, stream events, or run a scan.

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wpa_ctrl::{config::ConfigFile, Context, ControlInterface, APP_NAME, VERSION};

/// How long to wait for a cancelled command to wind down after a signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// wpa_supplicant/hostapd control interface client
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Control interface socket path (e.g. /run/wpa_supplicant/wlan0)
    #[arg(short, long, global = true)]
    interface: Option<PathBuf>,

    /// Overall timeout in seconds
    #[arg(short, long, global = true, default_value_t = 60)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a command and print the reply
    Request {
        /// Command words, joined with spaces
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Print daemon events until interrupted
    Events {
        /// Print one JSON object per event
        #[arg(long)]
        json: bool,
    },

    /// Trigger a scan and print the results
    Scan {
        /// Seconds to wait between SCAN and SCAN_RESULTS
        #[arg(short, long, default_value_t = 2)]
        wait: u64,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize structured logging with tracing
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the CLI command
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Version = cli.command {
        println!("{} v{}", APP_NAME, VERSION);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)?,
        None => ConfigFile::default(),
    };

    let Some(path) = cli.interface.or(config.ctrl_interface) else {
        bail!("no control interface given (use --interface or ctrl_interface in --config)");
    };

    let ctrl = ControlInterface::connect_with_options(&path, config.connection)
        .with_context(|| format!("failed to connect to {:?}", path))?;

    let ctx = Context::new().with_timeout(Duration::from_secs(cli.timeout));
    tokio::spawn(cancel_on_signal(ctx.clone()));

    let result = match cli.command {
        Commands::Request { words } => request(&ctrl, &ctx, &words.join(" ")).await,
        Commands::Events { json } => listen(&ctrl, &ctx, json).await,
        Commands::Scan { wait } => scan(&ctrl, &ctx, Duration::from_secs(wait)).await,
        Commands::Version => Ok(()),
    };

    if let Err(e) = ctrl.close().await {
        warn!("Error closing control interface: {}", e);
    }

    result
}

async fn request(ctrl: &ControlInterface, ctx: &Context, command: &str) -> anyhow::Result<()> {
    let reply = ctrl.send_request(ctx, command).await?;
    println!("{}", reply);
    Ok(())
}

async fn listen(ctrl: &ControlInterface, ctx: &Context, json: bool) -> anyhow::Result<()> {
    let result = ctrl
        .listen(ctx, |event| {
            if json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to serialize event: {}", e),
                }
            } else {
                println!("{} - {}", event.priority.as_i32(), event.data);
            }
        })
        .await;

    match result {
        Err(e) if e.is_cancellation() => {
            info!("Stopped listening: {}", e);
            Ok(())
        }
        other => Ok(other?),
    }
}

async fn scan(ctrl: &ControlInterface, ctx: &Context, wait: Duration) -> anyhow::Result<()> {
    let reply = ctrl.send_request(ctx, "SCAN").await?;
    if reply != "OK\n" {
        bail!("failed to request scan: {}", reply.trim_end());
    }

    // Give the radio time to finish scanning
    ctx.sleep(wait).await.context("scan interrupted")?;

    let results = ctrl.send_request(ctx, "SCAN_RESULTS").await?;
    println!("{}", results);
    Ok(())
}

/// Cancel `ctx` on Ctrl+C or SIGTERM, then force exit if the command hangs
async fn cancel_on_signal(ctx: Context) {
    shutdown_signal().await;
    ctx.cancel();

    tokio::time::sleep(SHUTDOWN_GRACE).await;
    error!("Did not stop within {:?} of the signal, exiting", SHUTDOWN_GRACE);
    std::process::exit(1);
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
