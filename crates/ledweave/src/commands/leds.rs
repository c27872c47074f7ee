//! LED command handlers: panel query, set, toggle.
//!
//! All three acquire the target device first; `toggle` additionally reads
//! the current panel so it can issue the opposite state.

use std::future::Future;

use serde::Serialize;
use tabled::Tabled;

use ledweave_core::{CoreError, WeaveSession};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::{SessionContext, util};

// ── Table row ───────────────────────────────────────────────────────

/// One LED of the panel, 0-based to match the `set`/`toggle` arguments.
#[derive(Serialize)]
struct PanelLed {
    index: usize,
    on: bool,
}

#[derive(Tabled)]
struct LedRow {
    #[tabled(rename = "Index")]
    index: usize,
    #[tabled(rename = "State")]
    state: String,
}

impl From<&PanelLed> for LedRow {
    fn from(led: &PanelLed) -> Self {
        Self {
            index: led.index,
            state: if led.on { "on" } else { "off" }.to_owned(),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn panel(ctx: &SessionContext, global: &GlobalOpts) -> Result<(), CliError> {
    let leds = with_target(ctx, global, |session| async move {
        session.refresh_leds().await?;
        Ok(session.leds_snapshot())
    })
    .await?;

    let panel: Vec<PanelLed> = leds
        .iter()
        .enumerate()
        .map(|(index, led)| PanelLed {
            index,
            on: led.is_on(),
        })
        .collect();

    let out = output::render_list(&global.output, &panel, |led| LedRow::from(led));
    output::print_output(&out, global.quiet);
    if panel.is_empty() && !global.quiet {
        eprintln!("The device reports no LEDs");
    }
    Ok(())
}

pub async fn set(
    ctx: &SessionContext,
    global: &GlobalOpts,
    index: usize,
    on: bool,
) -> Result<(), CliError> {
    with_target(ctx, global, |session| async move {
        session.set_led(index, on).await?;
        Ok(())
    })
    .await?;

    if !global.quiet {
        let colored = output::should_color(&global.color);
        eprintln!("LED {index} set to {}", util::state_word(on, colored));
    }
    Ok(())
}

pub async fn toggle(
    ctx: &SessionContext,
    global: &GlobalOpts,
    index: usize,
) -> Result<(), CliError> {
    let desired = with_target(ctx, global, |session| async move {
        session.refresh_leds().await?;
        let panel = session.leds_snapshot();
        let current = panel.get(index).copied().ok_or(CliError::LedOutOfRange {
            index,
            count: panel.len(),
        })?;

        let desired = !current.is_on();
        session.set_led(index, desired).await?;
        Ok(desired)
    })
    .await?;

    if !global.quiet {
        let colored = output::should_color(&global.color);
        eprintln!("LED {index} is now {}", util::state_word(desired, colored));
    }
    Ok(())
}

// ── Target acquisition ──────────────────────────────────────────────

/// Start a session, wait for the target device to be acquired, run `f`
/// against the live session, then shut everything down.
///
/// Gives up with [`CliError::DeviceNotFound`] when the wait window
/// passes without an acquisition.
async fn with_target<F, Fut, T>(
    ctx: &SessionContext,
    global: &GlobalOpts,
    f: F,
) -> Result<T, CliError>
where
    F: FnOnce(WeaveSession) -> Fut,
    Fut: Future<Output = Result<T, CliError>>,
{
    let bar = util::spinner(
        format!("Looking for \"{}\"...", ctx.target_name),
        global.quiet,
    );
    let wait = ctx.wait;
    let name = ctx.target_name.clone();

    let result = WeaveSession::oneshot(ctx.api.clone(), &ctx.target_name, |session| async move {
        match tokio::time::timeout(wait, session.tracked().wait_for(Option::is_some)).await {
            Ok(Ok(_)) => Ok(f(session).await),
            Ok(Err(_)) | Err(_) => Err(CoreError::DeviceNotFound { identifier: name }),
        }
    })
    .await;

    bar.finish_and_clear();
    result.map_err(CliError::from)?
}
