//! Clap derive structures for the `ledweave` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ledweave -- toggle the LEDs of a Weave device from the command line
#[derive(Debug, Parser)]
#[command(
    name = "ledweave",
    version,
    about = "Control Weave LED flasher devices from the command line",
    long_about = "Discovers the LED flasher devices registered to your Weave cloud\n\
        account, tracks one of them by name, and drives its LEDs with\n\
        cloud commands.\n\n\
        Pass --simulate to explore against an in-process demo cloud, no\n\
        account required.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the configuration file
    #[arg(long, env = "LEDWEAVE_CONFIG", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Weave cloud endpoint URL (overrides the configured one)
    #[arg(long, short = 'e', env = "LEDWEAVE_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Cloud access token
    #[arg(long, env = "LEDWEAVE_ACCESS_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Target device name (overrides the configured preference)
    #[arg(long, short = 'd', env = "LEDWEAVE_DEVICE_NAME", global = true)]
    pub device: Option<String>,

    /// Run against an in-process simulated cloud with demo devices
    #[arg(long, env = "LEDWEAVE_SIMULATE", global = true)]
    pub simulate: bool,

    /// Request and discovery timeout in seconds
    #[arg(long, env = "LEDWEAVE_TIMEOUT", global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LEDWEAVE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// LED switch position for `ledweave set`.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LedSwitch {
    On,
    Off,
}

impl LedSwitch {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the devices registered to this account
    #[command(alias = "dev", alias = "ls")]
    Devices,

    /// Show the target device's LED panel
    Leds,

    /// Set one LED of the target device to an explicit state
    Set {
        /// LED index (0-based)
        index: usize,

        /// Switch position
        state: LedSwitch,
    },

    /// Flip one LED of the target device to the opposite state
    Toggle {
        /// LED index (0-based)
        index: usize,
    },

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with guided setup
    Init,

    /// Display the current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Set the target device name preference
    SetDevice {
        /// Device name to track
        name: String,
    },

    /// Record acceptance of the Weave terms of service
    AcceptTos,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
