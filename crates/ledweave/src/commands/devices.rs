//! Device listing command handler.

use tabled::Tabled;

use ledweave_core::{DeviceEntry, WeaveSession};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::{SessionContext, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Transport")]
    transport: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl From<&DeviceEntry> for DeviceRow {
    fn from(entry: &DeviceEntry) -> Self {
        let device = &entry.device;
        Self {
            name: device.name.clone(),
            description: device.description.clone().unwrap_or_default(),
            model: entry.model_name().to_owned(),
            transport: transport_label(entry),
            id: device.id.to_string(),
        }
    }
}

fn transport_label(entry: &DeviceEntry) -> String {
    let transport = &entry.device.discovery_transport;
    match (transport.has_cloud(), transport.has_local()) {
        (true, true) => "cloud+local".to_owned(),
        (true, false) => "cloud".to_owned(),
        (false, true) => "local".to_owned(),
        (false, false) => "none".to_owned(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &SessionContext, global: &GlobalOpts) -> Result<(), CliError> {
    let entries = discover(ctx, global).await?;

    let out = output::render_list(&global.output, &entries, |entry| DeviceRow::from(entry));
    output::print_output(&out, global.quiet);
    if entries.is_empty() && !global.quiet {
        eprintln!("No devices reported for this account");
    }
    Ok(())
}

/// Run discovery until the first device batch lands, bounded by the
/// configured wait window. An empty directory after the window is a
/// valid outcome, not an error.
async fn discover(
    ctx: &SessionContext,
    global: &GlobalOpts,
) -> Result<Vec<DeviceEntry>, CliError> {
    let bar = util::spinner("Discovering devices...".into(), global.quiet);
    let wait = ctx.wait;

    let result = WeaveSession::oneshot(ctx.api.clone(), &ctx.target_name, |session| async move {
        let mut devices = session.devices();
        let _ = tokio::time::timeout(wait, devices.wait_for(|snap| !snap.is_empty())).await;
        Ok(session.devices_snapshot().as_ref().clone())
    })
    .await;

    bar.finish_and_clear();
    Ok(result?)
}
