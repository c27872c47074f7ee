//! Command dispatch: bridges CLI args -> session operations -> output.

pub mod config_cmd;
pub mod devices;
pub mod leds;
pub mod util;

use std::sync::Arc;
use std::time::Duration;

use ledweave_api::WeaveApi;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Everything a cloud-bound command needs to run a session.
pub struct SessionContext {
    /// The cloud capability (real client or simulated).
    pub api: Arc<dyn WeaveApi>,
    /// Name of the device to acquire.
    pub target_name: String,
    /// How long to wait for discovery or acquisition before giving up.
    pub wait: Duration,
}

/// Dispatch a cloud-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    ctx: &SessionContext,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices => devices::handle(ctx, global).await,
        Command::Leds => leds::panel(ctx, global).await,
        Command::Set { index, state } => leds::set(ctx, global, index, state.is_on()).await,
        Command::Toggle { index } => leds::toggle(ctx, global, index).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
