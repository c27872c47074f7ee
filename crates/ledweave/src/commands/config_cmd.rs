//! Config subcommand handlers.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Password};

use ledweave_config::{
    CloudSettings, Config, DEFAULT_DEVICE_NAME, load_config_file, load_config_from, save_config_to,
};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// The config file this invocation reads and writes.
fn target_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(ledweave_config::config_path)
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let config = load_config_from(&target_path(global))?;
            let out = output::render_single(&global.output, &config, |c| {
                toml::to_string_pretty(c).unwrap_or_else(|_| format!("{c:#?}"))
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", target_path(global).display());
            Ok(())
        }

        // ── SetDevice <name> ────────────────────────────────────────
        ConfigCommand::SetDevice { name } => {
            let path = target_path(global);
            let mut config = load_config_file(&path)?;
            config.device_name = name.clone();
            config.validate()?;
            save_config_to(&path, &config)?;
            eprintln!("✓ Target device set to \"{name}\"");
            Ok(())
        }

        // ── AcceptTos ───────────────────────────────────────────────
        ConfigCommand::AcceptTos => {
            let path = target_path(global);
            let mut config = load_config_file(&path)?;
            if config.tos_accepted {
                eprintln!("Terms of service already accepted");
                return Ok(());
            }
            config.tos_accepted = true;
            save_config_to(&path, &config)?;
            eprintln!("✓ Terms of service accepted");
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = target_path(global);
    eprintln!("ledweave configuration wizard");
    eprintln!("  Config path: {}\n", path.display());

    let device_name: String = Input::new()
        .with_prompt("Target device name")
        .default(DEFAULT_DEVICE_NAME.into())
        .interact_text()
        .map_err(prompt_err)?;

    let endpoint: String = Input::new()
        .with_prompt("Cloud endpoint")
        .default(CloudSettings::default().endpoint)
        .interact_text()
        .map_err(prompt_err)?;

    let token = Password::new()
        .with_prompt("Access token (leave blank to use LEDWEAVE_ACCESS_TOKEN)")
        .allow_empty_password(true)
        .interact()
        .map_err(prompt_err)?;

    let tos_accepted = Confirm::new()
        .with_prompt("Accept the Weave terms of service?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;

    let config = Config {
        device_name,
        tos_accepted,
        cloud: CloudSettings {
            endpoint,
            access_token: (!token.is_empty()).then_some(token),
            ..CloudSettings::default()
        },
    };
    config.validate()?;

    save_config_to(&path, &config)?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    if !tos_accepted {
        eprintln!("  Network commands stay disabled until: ledweave config accept-tos");
    }
    Ok(())
}
