//! Redis pub/sub source of plugin state notifications.
//!
//! Other services publish JSON-encoded [`PluginStateChanged`] messages on a
//! channel; this source decodes them and forwards them to the in-process
//! queue consumed by [`run_event_loop`](super::run_event_loop). A lost
//! subscription is reopened with backoff.

use std::time::Duration;

use anyhow::{Context, Result};
use redis::Client as RedisClient;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::PluginStateChanged;

/// Delay before the first resubscribe attempt.
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on the delay between resubscribe attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Subscriber forwarding Redis messages into the notification queue.
pub struct RedisEventSource {
    redis: RedisClient,
    channel: String,
}

/// Why a single subscription stopped.
enum SubscriptionEnd {
    /// Cancelled, or the queue closed. Nothing left to do.
    Stopped,
    /// The connection dropped and should be reopened.
    Lost,
}

impl RedisEventSource {
    /// Create a source for `channel`.
    pub fn new(redis: RedisClient, channel: impl Into<String>) -> Self {
        Self {
            redis,
            channel: channel.into(),
        }
    }

    /// Forward notifications until `cancel` fires or the queue closes.
    ///
    /// A failed or dropped subscription is reopened with exponential backoff,
    /// so the source only returns once there is nobody left to deliver to.
    pub async fn run(&self, tx: mpsc::Sender<PluginStateChanged>, cancel: CancellationToken) {
        let mut backoff = RetryBackoff::new(INITIAL_RETRY_DELAY, MAX_RETRY_DELAY);

        loop {
            match self.subscribe_once(&tx, &cancel, &mut backoff).await {
                Ok(SubscriptionEnd::Stopped) => return,
                Ok(SubscriptionEnd::Lost) => {
                    warn!(channel = %self.channel, "Redis subscription ended");
                }
                Err(e) => {
                    error!(channel = %self.channel, error = %e, "Redis subscription failed");
                }
            }

            let delay = backoff.next_delay();
            info!(channel = %self.channel, ?delay, "resubscribing to Redis");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tx.closed() => {
                    info!("notification queue closed, stopping Redis source");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn subscribe_once(
        &self,
        tx: &mpsc::Sender<PluginStateChanged>,
        cancel: &CancellationToken,
        backoff: &mut RetryBackoff,
    ) -> Result<SubscriptionEnd> {
        let mut pubsub = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(SubscriptionEnd::Stopped),
            pubsub = self.redis.get_async_pubsub() => {
                pubsub.context("failed to open Redis pub/sub connection")?
            }
        };

        pubsub
            .subscribe(&self.channel)
            .await
            .with_context(|| format!("failed to subscribe to '{}'", self.channel))?;

        backoff.reset();
        info!(channel = %self.channel, "listening for plugin state changes");

        let mut messages = std::pin::pin!(pubsub.on_message());

        loop {
            let msg = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(SubscriptionEnd::Stopped),
                msg = messages.next() => match msg {
                    Some(msg) => msg,
                    None => return Ok(SubscriptionEnd::Lost),
                },
            };

            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "dropping non-text plugin state message");
                    continue;
                }
            };

            let event = match decode_notification(&payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, payload = %payload, "dropping malformed plugin state message");
                    continue;
                }
            };

            debug!(org_id = event.org_id, plugin_id = %event.plugin_id, "queued plugin state change");
            if tx.send(event).await.is_err() {
                info!("notification queue closed, stopping Redis source");
                return Ok(SubscriptionEnd::Stopped);
            }
        }
    }
}

/// Doubling delay between reconnect attempts, capped at a maximum.
#[derive(Debug, Clone)]
struct RetryBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl RetryBackoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following one doubles up to the cap.
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl std::fmt::Debug for RedisEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventSource")
            .field("channel", &self.channel)
            .finish()
    }
}

/// Decode a JSON notification payload.
pub fn decode_notification(payload: &str) -> Result<PluginStateChanged> {
    let event: PluginStateChanged =
        serde_json::from_str(payload).context("invalid plugin state notification")?;

    if event.plugin_id.trim().is_empty() {
        anyhow::bail!("plugin state notification has empty plugin_id");
    }

    Ok(event)
}
