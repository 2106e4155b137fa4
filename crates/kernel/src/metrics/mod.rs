//! Prometheus metrics collection.
//!
//! Provides reconciliation metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// Sync/teardown pass labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PassLabels {
    /// "sync" or "teardown".
    pub kind: String,
    /// "ok" or the error class.
    pub outcome: String,
}

/// Pass duration labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PassKindLabels {
    pub kind: String,
}

/// Plugin state notification labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EventLabels {
    /// "true" for enable notifications.
    pub enabled: String,
    pub outcome: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// Completed passes by kind and outcome.
    pub passes: Family<PassLabels, Counter>,

    /// Pass duration histogram.
    pub pass_duration_seconds: Family<PassKindLabels, Histogram>,

    /// Dashboards imported or re-imported.
    pub dashboards_imported: Counter,

    /// Dashboards deleted.
    pub dashboards_deleted: Counter,

    /// Plugin state notifications handled.
    pub plugin_events: Family<EventLabels, Counter>,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let passes = Family::<PassLabels, Counter>::default();
        registry.register(
            "sync_passes",
            "Completed dashboard sync and teardown passes",
            passes.clone(),
        );

        let pass_duration_seconds =
            Family::<PassKindLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 14))
            });
        registry.register(
            "sync_pass_duration_seconds",
            "Dashboard pass duration in seconds",
            pass_duration_seconds.clone(),
        );

        let dashboards_imported = Counter::default();
        registry.register(
            "dashboards_imported",
            "Plugin dashboards imported",
            dashboards_imported.clone(),
        );

        let dashboards_deleted = Counter::default();
        registry.register(
            "dashboards_deleted",
            "Plugin dashboards deleted",
            dashboards_deleted.clone(),
        );

        let plugin_events = Family::<EventLabels, Counter>::default();
        registry.register(
            "plugin_events",
            "Plugin state change notifications handled",
            plugin_events.clone(),
        );

        Self {
            registry,
            passes,
            pass_duration_seconds,
            dashboards_imported,
            dashboards_deleted,
            plugin_events,
        }
    }

    /// Record a finished pass.
    pub fn record_pass(&self, kind: &str, outcome: &str, duration_secs: f64) {
        self.passes
            .get_or_create(&PassLabels {
                kind: kind.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
        self.pass_duration_seconds
            .get_or_create(&PassKindLabels {
                kind: kind.to_string(),
            })
            .observe(duration_secs);
    }

    /// Record a dashboard import.
    pub fn record_import(&self) {
        self.dashboards_imported.inc();
    }

    /// Record a dashboard deletion.
    pub fn record_delete(&self) {
        self.dashboards_deleted.inc();
    }

    /// Record a handled plugin state notification.
    pub fn record_event(&self, enabled: bool, outcome: &str) {
        self.plugin_events
            .get_or_create(&EventLabels {
                enabled: enabled.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            tracing::error!(error = %e, "failed to encode metrics");
        }
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_recorded_passes() {
        let metrics = Metrics::new();
        metrics.record_pass("sync", "ok", 0.01);
        metrics.record_import();
        metrics.record_delete();
        metrics.record_event(true, "ok");

        let output = metrics.encode();
        assert!(output.contains("sync_passes_total"));
        assert!(output.contains("kind=\"sync\""));
        assert!(output.contains("dashboards_imported_total 1"));
        assert!(output.contains("dashboards_deleted_total 1"));
        assert!(output.contains("plugin_events_total"));
    }
}
