//! Plugin state notifications.
//!
//! Handlers are registered with a [`PluginEventBus`] when it is built, so
//! every consumer of plugin enable/disable notifications is visible at
//! construction time. Notifications reach the bus from an in-process queue
//! fed by [`RedisEventSource`] or by the CLI.

mod bus;
mod redis_source;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub use bus::{PluginEventBus, PluginEventBusBuilder, run_event_loop};
pub use redis_source::RedisEventSource;

use crate::error::SyncResult;

/// A plugin was enabled or disabled in an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginStateChanged {
    pub org_id: i64,
    pub plugin_id: String,
    pub enabled: bool,
}

impl PluginStateChanged {
    /// Notification that `plugin_id` was enabled in `org_id`.
    pub fn enabled(org_id: i64, plugin_id: impl Into<String>) -> Self {
        Self {
            org_id,
            plugin_id: plugin_id.into(),
            enabled: true,
        }
    }

    /// Notification that `plugin_id` was disabled in `org_id`.
    pub fn disabled(org_id: i64, plugin_id: impl Into<String>) -> Self {
        Self {
            org_id,
            plugin_id: plugin_id.into(),
            enabled: false,
        }
    }
}

/// Consumer of plugin state notifications.
#[async_trait]
pub trait PluginStateHandler: Send + Sync {
    /// Handler name for logs.
    fn name(&self) -> &str;

    /// React to a notification. Errors go back to whoever delivered it.
    async fn on_plugin_state_changed(
        &self,
        event: &PluginStateChanged,
        cancel: &CancellationToken,
    ) -> SyncResult<()>;
}
