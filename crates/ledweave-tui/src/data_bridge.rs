//! Data bridge — forwards [`WeaveSession`] state into the action loop.
//!
//! Runs as a background task: subscribes to the session's watch and
//! broadcast channels and re-emits every change as an [`Action`], so all
//! UI state mutation happens on the single loop consuming actions.

use ledweave_core::WeaveSession;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::action::Action;

/// Forward session state changes into the TUI action channel.
///
/// Sends initial snapshots first so screens have data immediately, then
/// loops until cancelled or the action channel closes.
pub async fn run_data_bridge(
    session: WeaveSession,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    let mut devices = session.devices();
    let mut leds = session.leds();
    let mut busy = session.busy();
    let mut discovery = session.discovery_state();
    let mut tracked = session.tracked();
    let mut notices = session.notices();

    // Initial snapshots
    let _ = action_tx.send(Action::DevicesUpdated(devices.borrow_and_update().clone()));
    let _ = action_tx.send(Action::LedsUpdated(leds.borrow_and_update().clone()));
    let _ = action_tx.send(Action::BusyChanged(*busy.borrow_and_update()));
    let _ = action_tx.send(Action::DiscoveryChanged(*discovery.borrow_and_update()));
    let _ = action_tx.send(Action::TrackedChanged(tracked.borrow_and_update().clone()));

    loop {
        let action = tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            changed = devices.changed() => match changed {
                Ok(()) => Action::DevicesUpdated(devices.borrow_and_update().clone()),
                Err(_) => break,
            },
            changed = leds.changed() => match changed {
                Ok(()) => Action::LedsUpdated(leds.borrow_and_update().clone()),
                Err(_) => break,
            },
            changed = busy.changed() => match changed {
                Ok(()) => Action::BusyChanged(*busy.borrow_and_update()),
                Err(_) => break,
            },
            changed = discovery.changed() => match changed {
                Ok(()) => Action::DiscoveryChanged(*discovery.borrow_and_update()),
                Err(_) => break,
            },
            changed = tracked.changed() => match changed {
                Ok(()) => Action::TrackedChanged(tracked.borrow_and_update().clone()),
                Err(_) => break,
            },
            notice = notices.recv() => match notice {
                Ok(notice) => Action::NoticePosted(notice),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notice feed lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };

        if action_tx.send(action).is_err() {
            break;
        }
    }

    debug!("data bridge shut down");
}
