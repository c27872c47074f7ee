// End-to-end `WeaveSession` tests against the simulated cloud.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use ledweave_api::simulated::SimulatedCloud;
use ledweave_api::{DeviceId, WeaveApi};
use ledweave_core::{CoreError, DiscoveryState, NoticeLevel, WeaveSession};
use tokio::sync::watch;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    cloud: Arc<SimulatedCloud>,
    session: WeaveSession,
    name_tx: watch::Sender<String>,
}

fn harness(target: &str) -> Harness {
    let cloud = Arc::new(SimulatedCloud::new());
    let (name_tx, name_rx) = watch::channel(target.to_owned());
    let session = WeaveSession::new(cloud.clone(), name_rx);
    Harness {
        cloud,
        session,
        name_tx,
    }
}

async fn wait_tracked(session: &WeaveSession) {
    let mut rx = session.tracked();
    timeout(WAIT, rx.wait_for(|device| device.is_some()))
        .await
        .expect("no target acquired")
        .expect("tracked channel closed");
}

async fn wait_led_count(session: &WeaveSession, len: usize) {
    let mut rx = session.leds();
    timeout(WAIT, rx.wait_for(|update| update.leds.len() == len))
        .await
        .expect("panel did not settle")
        .expect("leds channel closed");
}

async fn wait_device_count(session: &WeaveSession, len: usize) {
    let mut rx = session.devices();
    timeout(WAIT, rx.wait_for(|snapshot| snapshot.len() == len))
        .await
        .expect("directory did not settle")
        .expect("devices channel closed");
}

async fn wait_cloud_leds(cloud: &SimulatedCloud, id: &DeviceId, want: &[bool]) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while cloud.led_states(id).as_deref() != Some(want) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "cloud never saw {want:?}, has {:?}",
            cloud.led_states(id)
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn panel_states(session: &WeaveSession) -> Vec<bool> {
    session
        .leds_snapshot()
        .iter()
        .map(|led| led.is_on())
        .collect()
}

// ── Acquisition and initial state ───────────────────────────────────

#[tokio::test]
async fn test_acquires_target_and_loads_initial_leds() {
    let h = harness("ledflasher");
    h.cloud.add_flasher("ledflasher", &[true, false, true]);

    h.session.start().await.unwrap();
    wait_tracked(&h.session).await;
    wait_led_count(&h.session, 3).await;

    assert_eq!(panel_states(&h.session), [true, false, true]);
    assert_eq!(h.session.tracked_device().unwrap().name, "ledflasher");
    assert!(!*h.session.busy().borrow());

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_discovery_stops_after_acquisition() {
    let h = harness("ledflasher");
    h.cloud.add_flasher("ledflasher", &[false]);

    h.session.start().await.unwrap();
    wait_led_count(&h.session, 1).await;

    let mut state = h.session.discovery_state();
    timeout(WAIT, state.wait_for(|s| *s == DiscoveryState::Idle))
        .await
        .expect("discovery kept running")
        .expect("state channel closed");
    assert!(!h.cloud.is_loading());

    // Without a live discovery feed the session no longer reacts to
    // presence changes, matching the stop-after-acquire semantics.
    let id = h.session.tracked_device().unwrap().id;
    h.cloud.detach(&id);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.session.leds_snapshot().len(), 1);
    assert!(h.session.tracked_device().is_some());

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_target_names_track_the_first() {
    let h = harness("ledflasher");
    let first = h.cloud.add_flasher("ledflasher", &[true]);
    h.cloud.add_flasher("ledflasher", &[false, false]);

    h.session.start().await.unwrap();
    wait_tracked(&h.session).await;
    // One LED proves the state load hit the first device exactly once.
    wait_led_count(&h.session, 1).await;

    assert_eq!(h.session.tracked_device().unwrap().id, first);
    assert_eq!(h.session.devices_snapshot().len(), 2);

    h.session.shutdown().await;
}

// ── LED control ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_toggle_is_optimistic_and_reaches_the_cloud() {
    let h = harness("ledflasher");
    let id = h.cloud.add_flasher("ledflasher", &[false, false]);

    h.session.start().await.unwrap();
    wait_led_count(&h.session, 2).await;

    let on = h.session.toggle_led(1).unwrap();
    assert!(on);
    // The local panel flips before the cloud round-trip completes.
    assert_eq!(panel_states(&h.session), [false, true]);

    wait_cloud_leds(&h.cloud, &id, &[false, true]).await;

    let executed = h.cloud.executed_commands();
    assert_eq!(executed.len(), 1);
    let (device, command) = &executed[0];
    assert_eq!(*device, id);
    assert_eq!(command.name, "_ledflasher._set");
    assert_eq!(
        command.parameters.get("_led"),
        Some(&serde_json::json!(2))
    );
    assert_eq!(command.parameters.get("_on"), Some(&serde_json::json!(true)));

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_cloud_failure_keeps_optimistic_state_and_notifies() {
    let h = harness("ledflasher");
    let id = h.cloud.add_flasher("ledflasher", &[false]);

    h.session.start().await.unwrap();
    wait_led_count(&h.session, 1).await;

    let mut notices = h.session.notices();
    h.cloud.set_offline(true);

    let on = h.session.toggle_led(0).unwrap();
    assert!(on);

    let notice = timeout(WAIT, notices.recv()).await.unwrap().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("ledflasher"));

    // No rollback: the panel keeps the optimistic value even though the
    // cloud never saw it.
    assert_eq!(panel_states(&h.session), [true]);
    assert_eq!(h.cloud.led_states(&id).unwrap(), [false]);

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_set_led_pushes_without_local_flip() {
    let h = harness("ledflasher");
    let id = h.cloud.add_flasher("ledflasher", &[false]);

    h.session.start().await.unwrap();
    wait_led_count(&h.session, 1).await;

    h.session.set_led(0, true).await.unwrap();
    assert_eq!(h.cloud.led_states(&id).unwrap(), [true]);
    // The panel only learns about it on the next refresh.
    assert_eq!(panel_states(&h.session), [false]);

    h.session.refresh_leds().await.unwrap();
    assert_eq!(panel_states(&h.session), [true]);

    h.session.shutdown().await;
}

// ── Refresh and preference flows ────────────────────────────────────

#[tokio::test]
async fn test_refresh_devices_rebuilds_and_reacquires() {
    let h = harness("ledflasher");
    h.cloud.add_flasher("ledflasher", &[true, true]);

    h.session.start().await.unwrap();
    wait_led_count(&h.session, 2).await;

    // A device registered after the feed stopped is invisible until the
    // next refresh rebuilds the listing.
    h.cloud.add_flasher("late arrival", &[false]);
    assert_eq!(h.session.devices_snapshot().len(), 1);

    h.session.refresh_devices().await.unwrap();
    wait_device_count(&h.session, 2).await;
    wait_led_count(&h.session, 2).await;
    assert_eq!(h.session.tracked_device().unwrap().name, "ledflasher");

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_preference_change_switches_target() {
    let h = harness("ledflasher");
    h.cloud.add_flasher("ledflasher", &[true]);
    h.cloud.add_flasher("workbench flasher", &[false, false]);

    h.session.start().await.unwrap();
    wait_led_count(&h.session, 1).await;

    h.name_tx.send("workbench flasher".to_owned()).unwrap();

    let mut tracked = h.session.tracked();
    timeout(
        WAIT,
        tracked.wait_for(|device| {
            device
                .as_ref()
                .is_some_and(|d| d.name == "workbench flasher")
        }),
    )
    .await
    .expect("target never switched")
    .expect("tracked channel closed");
    wait_led_count(&h.session, 2).await;

    h.session.shutdown().await;
}

// ── Failure modes ───────────────────────────────────────────────────

#[tokio::test]
async fn test_requests_without_target_fail() {
    let h = harness("no such device");
    h.cloud.add_flasher("ledflasher", &[true]);

    h.session.start().await.unwrap();
    wait_device_count(&h.session, 1).await;

    assert!(h.session.tracked_device().is_none());
    assert!(matches!(
        h.session.refresh_leds().await,
        Err(CoreError::NoTrackedDevice)
    ));
    assert!(matches!(
        h.session.set_led(0, true).await,
        Err(CoreError::NoTrackedDevice)
    ));

    h.session.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_the_session() {
    let h = harness("ledflasher");
    h.cloud.add_flasher("ledflasher", &[true]);

    h.session.start().await.unwrap();
    wait_led_count(&h.session, 1).await;
    h.session.shutdown().await;

    assert!(!h.cloud.is_loading());
    assert!(matches!(
        h.session.set_led(0, false).await,
        Err(CoreError::SessionClosed)
    ));
}
