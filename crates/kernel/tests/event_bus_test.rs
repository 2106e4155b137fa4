#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for plugin state notification delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use plugdash_kernel::error::{SyncError, SyncResult};
use plugdash_kernel::events::{
    PluginEventBus, PluginStateChanged, PluginStateHandler, run_event_loop,
};
use plugdash_test_utils::Harness;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Handler that records what it saw and optionally fails.
struct Recorder {
    name: &'static str,
    seen: Arc<Mutex<Vec<String>>>,
    fail_on: Option<&'static str>,
}

impl Recorder {
    fn new(name: &'static str, seen: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            seen: seen.clone(),
            fail_on: None,
        })
    }

    fn failing(
        name: &'static str,
        seen: &Arc<Mutex<Vec<String>>>,
        plugin: &'static str,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            seen: seen.clone(),
            fail_on: Some(plugin),
        })
    }
}

#[async_trait]
impl PluginStateHandler for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn on_plugin_state_changed(
        &self,
        event: &PluginStateChanged,
        _cancel: &CancellationToken,
    ) -> SyncResult<()> {
        self.seen
            .lock()
            .push(format!("{}:{}:{}", self.name, event.plugin_id, event.enabled));

        if self.fail_on == Some(event.plugin_id.as_str()) {
            return Err(SyncError::not_found("plugin", &event.plugin_id));
        }
        Ok(())
    }
}

#[tokio::test]
async fn publish_runs_handlers_in_registration_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let bus = PluginEventBus::builder()
        .subscribe(Recorder::new("first", &seen))
        .subscribe(Recorder::new("second", &seen))
        .build();

    assert_eq!(bus.handler_count(), 2);
    bus.publish(
        &PluginStateChanged::enabled(1, "nginx-app"),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        *seen.lock(),
        vec!["first:nginx-app:true", "second:nginx-app:true"]
    );
}

#[tokio::test]
async fn publish_stops_at_first_error() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let bus = PluginEventBus::builder()
        .subscribe(Recorder::failing("first", &seen, "nginx-app"))
        .subscribe(Recorder::new("second", &seen))
        .build();

    let err = bus
        .publish(
            &PluginStateChanged::disabled(1, "nginx-app"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(*seen.lock(), vec!["first:nginx-app:false"]);
}

#[tokio::test]
async fn publish_without_handlers_succeeds() {
    let bus = PluginEventBus::builder().build();
    bus.publish(
        &PluginStateChanged::enabled(1, "nginx-app"),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn event_loop_handles_notifications_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let bus = Arc::new(
        PluginEventBus::builder()
            .subscribe(Recorder::failing("h", &seen, "broken-app"))
            .build(),
    );
    let (tx, rx) = mpsc::channel(8);

    tx.send(PluginStateChanged::enabled(1, "a-app")).await.unwrap();
    tx.send(PluginStateChanged::enabled(1, "broken-app"))
        .await
        .unwrap();
    tx.send(PluginStateChanged::disabled(1, "a-app")).await.unwrap();
    drop(tx);

    let handled = run_event_loop(bus, rx, CancellationToken::new()).await;

    assert_eq!(handled, 3);
    assert_eq!(
        *seen.lock(),
        vec!["h:a-app:true", "h:broken-app:true", "h:a-app:false"]
    );
}

#[tokio::test]
async fn event_loop_stops_on_cancel() {
    let bus = Arc::new(PluginEventBus::builder().build());
    let (_tx, rx) = mpsc::channel::<PluginStateChanged>(8);
    let cancel = CancellationToken::new();

    let worker = tokio::spawn(run_event_loop(bus, rx, cancel.clone()));
    cancel.cancel();

    let handled = tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .expect("event loop should stop")
        .unwrap();
    assert_eq!(handled, 0);
}

#[tokio::test]
async fn enable_then_disable_through_the_bus_leaves_nothing_behind() {
    let h = Harness::new();
    h.install_plugin(
        "nginx-app",
        "1.0.0",
        &[("dashboards/overview.json", "Nginx Overview", 1)],
    );
    h.settings.seed(1, "nginx-app", true, "");

    let bus = Arc::new(
        PluginEventBus::builder()
            .subscribe(Arc::new(h.reconciler()))
            .build(),
    );
    let (tx, rx) = mpsc::channel(8);
    tx.send(PluginStateChanged::enabled(1, "nginx-app"))
        .await
        .unwrap();
    tx.send(PluginStateChanged::disabled(1, "nginx-app"))
        .await
        .unwrap();
    drop(tx);

    let handled = run_event_loop(bus, rx, CancellationToken::new()).await;

    assert_eq!(handled, 2);
    assert_eq!(h.log.imports(), 1);
    assert_eq!(h.log.deletes(), 1);
    assert!(h.dashboards.is_empty());
}
