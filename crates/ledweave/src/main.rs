mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

use ledweave_api::WeaveApi;
use ledweave_api::cloud::CloudClient;
use ledweave_api::simulated::SimulatedCloud;
use ledweave_config::{Config, load_config_from, resolve_access_token};
use ledweave_core::CoreError;

use crate::cli::{Cli, Command};
use crate::commands::SessionContext;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands never touch the cloud
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "ledweave", &mut std::io::stdout());
            Ok(())
        }

        // Everything else runs a session against the cloud
        cmd => {
            let config = load_cli_config(&cli.global)?;
            ensure_tos_accepted(&cli.global, &config)?;
            let ctx = build_session_context(&cli.global, &config)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &ctx, &cli.global).await
        }
    }
}

/// Load the resolved configuration, honoring `--config`.
fn load_cli_config(global: &cli::GlobalOpts) -> Result<Config, CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(ledweave_config::config_path);
    Ok(load_config_from(&path)?)
}

/// Network commands require ToS acceptance; the simulated cloud is exempt.
fn ensure_tos_accepted(global: &cli::GlobalOpts, config: &Config) -> Result<(), CliError> {
    if global.simulate || config.cloud.simulate || config.tos_accepted {
        return Ok(());
    }
    Err(CliError::TosNotAccepted)
}

/// Build the session context from config plus CLI flag overrides.
fn build_session_context(
    global: &cli::GlobalOpts,
    config: &Config,
) -> Result<SessionContext, CliError> {
    let target_name = global
        .device
        .clone()
        .unwrap_or_else(|| config.device_name.clone());
    let wait = Duration::from_secs(global.timeout.unwrap_or(config.cloud.timeout_secs));

    let api: Arc<dyn WeaveApi> = if global.simulate || config.cloud.simulate {
        Arc::new(SimulatedCloud::demo())
    } else {
        let token = match &global.token {
            Some(token) => SecretString::from(token.clone()),
            None => resolve_access_token(config)?,
        };
        let endpoint = global.endpoint.as_deref().unwrap_or(&config.cloud.endpoint);

        let client = CloudClient::from_access_token(endpoint, &token, wait)
            .map_err(|e| CliError::from(CoreError::from(e)))?
            .with_poll_interval(Duration::from_secs(config.cloud.poll_interval_secs));
        Arc::new(client)
    };

    Ok(SessionContext {
        api,
        target_name,
        wait,
    })
}
