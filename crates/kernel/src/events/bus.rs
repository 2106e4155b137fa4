//! Event bus - delivers plugin state notifications to registered handlers.
//!
//! Handlers run in registration order. The first failing handler stops
//! delivery and its error is returned to the publisher.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{PluginStateChanged, PluginStateHandler};
use crate::error::SyncResult;

/// Bus with a fixed set of handlers.
pub struct PluginEventBus {
    handlers: Vec<Arc<dyn PluginStateHandler>>,
}

/// Builder collecting handlers before the bus is used.
#[derive(Default)]
pub struct PluginEventBusBuilder {
    handlers: Vec<Arc<dyn PluginStateHandler>>,
}

impl PluginEventBusBuilder {
    /// Register a handler. Handlers run in the order they were added.
    pub fn subscribe(mut self, handler: Arc<dyn PluginStateHandler>) -> Self {
        debug!(handler = handler.name(), "registered plugin state handler");
        self.handlers.push(handler);
        self
    }

    /// Finish building the bus.
    pub fn build(self) -> PluginEventBus {
        PluginEventBus {
            handlers: self.handlers,
        }
    }
}

impl PluginEventBus {
    /// Start building a bus.
    pub fn builder() -> PluginEventBusBuilder {
        PluginEventBusBuilder::default()
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Deliver a notification to every handler, stopping at the first error.
    pub async fn publish(
        &self,
        event: &PluginStateChanged,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        if self.handlers.is_empty() {
            debug!(plugin_id = %event.plugin_id, "no handlers registered for plugin state change");
            return Ok(());
        }

        for handler in &self.handlers {
            if let Err(e) = handler.on_plugin_state_changed(event, cancel).await {
                error!(
                    handler = handler.name(),
                    org_id = event.org_id,
                    plugin_id = %event.plugin_id,
                    enabled = event.enabled,
                    error = %e,
                    "plugin state handler failed"
                );
                return Err(e);
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for PluginEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEventBus")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Consume queued notifications until the queue closes or `cancel` fires.
///
/// Notifications are handled one at a time in arrival order. Handler errors
/// are already logged by the bus; the loop moves on to the next one.
///
/// Returns the number of notifications handled.
pub async fn run_event_loop(
    bus: Arc<PluginEventBus>,
    mut rx: mpsc::Receiver<PluginStateChanged>,
    cancel: CancellationToken,
) -> usize {
    let mut handled = 0usize;

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(handled, "event loop cancelled");
                break;
            }
            event = rx.recv() => match event {
                Some(event) => event,
                None => {
                    info!(handled, "event queue closed");
                    break;
                }
            },
        };

        // Failure is logged by the bus; the delivering side has no redelivery.
        let _ = bus.publish(&event, &cancel).await;
        handled += 1;
    }

    handled
}
