//! `ledweave-tui` — terminal UI for Weave LED flasher devices.
//!
//! Shows the devices discovered on the account, and for the tracked
//! flasher device a panel of LED switches that toggle with optimistic
//! local updates while the cloud command is in flight.
//!
//! Logs are written to a file (default `/tmp/ledweave-tui.log`) to avoid
//! corrupting the terminal. A background data bridge task streams
//! session state into the TUI action loop.

mod action;
mod app;
mod component;
mod data_bridge;
mod event;
mod screen;
mod screens;
mod theme;
mod tui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use secrecy::SecretString;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ledweave_api::WeaveApi;
use ledweave_api::cloud::CloudClient;
use ledweave_api::simulated::SimulatedCloud;
use ledweave_config::{Config, Preferences, load_config_from, resolve_access_token};
use ledweave_core::WeaveSession;

use crate::app::App;

/// Terminal UI for toggling Weave LED flasher devices.
#[derive(Parser, Debug)]
#[command(name = "ledweave-tui", version, about)]
struct Cli {
    /// Config file path (defaults to the platform config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Cloud base URL
    #[arg(long, env = "LEDWEAVE_CLOUD_ENDPOINT")]
    endpoint: Option<String>,

    /// Cloud access token
    #[arg(long, env = "LEDWEAVE_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Name of the device to track
    #[arg(short, long)]
    device: Option<String>,

    /// Run against the built-in simulated cloud
    #[arg(long)]
    simulate: bool,

    /// Log file path
    #[arg(long, default_value = "/tmp/ledweave-tui.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Set up file-based tracing. We MUST NOT log to stdout/stderr — that
/// would corrupt the TUI output. Returns a guard that must be held for
/// the lifetime of the application so logs flush on exit.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ledweave={log_level}")));

    let log_dir = cli.log_file.parent().unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("ledweave-tui.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

/// Build the capability implementation from config plus flag overrides.
fn build_api(cli: &Cli, config: &Config) -> Result<Arc<dyn WeaveApi>> {
    if cli.simulate || config.cloud.simulate {
        return Ok(Arc::new(SimulatedCloud::demo()));
    }

    let token = match &cli.token {
        Some(token) => SecretString::from(token.clone()),
        None => resolve_access_token(config)?,
    };
    let endpoint = cli.endpoint.as_deref().unwrap_or(&config.cloud.endpoint);
    let timeout = Duration::from_secs(config.cloud.timeout_secs);

    let client = CloudClient::from_access_token(endpoint, &token, timeout)
        .map_err(|err| eyre!("cloud client setup failed: {err}"))?
        .with_poll_interval(Duration::from_secs(config.cloud.poll_interval_secs));
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Install panic/error hooks BEFORE entering the terminal
    tui::install_hooks()?;

    // Tracing to file — hold the guard so logs flush on exit
    let _log_guard = setup_tracing(&cli);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(ledweave_config::config_path);
    let mut config = load_config_from(&config_path)?;
    if let Some(device) = &cli.device {
        config.device_name.clone_from(device);
    }

    info!(
        config = %config_path.display(),
        device = %config.device_name,
        simulate = cli.simulate || config.cloud.simulate,
        "starting ledweave-tui"
    );

    let api = build_api(&cli, &config)?;
    let prefs = Arc::new(Preferences::new(&config));
    if cli.simulate || config.cloud.simulate {
        // The simulated cloud never touches the network; skip the gate.
        prefs.set_tos_accepted(true);
    }

    let session = WeaveSession::new(api, prefs.device_name());
    let mut app = App::new(session, prefs, config_path);
    app.run().await?;

    Ok(())
}
