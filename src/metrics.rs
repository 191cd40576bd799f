//! Metrics collection and export for multipliers

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "metrics")]
use crate::errors::{PoolError, PoolResult};
#[cfg(feature = "metrics")]
use serde::Serialize;

/// Metrics data for a multiplier
///
/// # Examples
///
/// ```
/// use esox_multiplier::MultiplierConfig;
///
/// let multiplier = MultiplierConfig::new(|| {}).with_worker_count(2).run();
/// multiplier.stop();
///
/// let metrics = multiplier.get_metrics();
/// assert_eq!(metrics.live_workers, 0);
/// assert!(metrics.launched_total >= 2);
/// assert!(!metrics.running);
/// assert!(!metrics.maintenance_active);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "metrics", derive(Serialize))]
pub struct WorkerMetrics {
    /// Number of workers the multiplier keeps alive
    pub target_workers: usize,

    /// Workers currently running the work function
    pub live_workers: usize,

    /// Total workers launched
    pub launched_total: usize,

    /// Workers whose invocation returned normally
    pub completed_total: usize,

    /// Workers whose invocation panicked
    pub panicked_total: usize,

    /// Maintenance passes run by the background loop
    pub maintenance_passes: usize,

    /// Whether the multiplier is still topping up workers
    pub running: bool,

    /// Whether the maintenance thread is still alive
    pub maintenance_active: bool,
}

impl WorkerMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("target_workers".to_string(), self.target_workers.to_string());
        metrics.insert("live_workers".to_string(), self.live_workers.to_string());
        metrics.insert("launched_total".to_string(), self.launched_total.to_string());
        metrics.insert("completed_total".to_string(), self.completed_total.to_string());
        metrics.insert("panicked_total".to_string(), self.panicked_total.to_string());
        metrics.insert("maintenance_passes".to_string(), self.maintenance_passes.to_string());
        metrics.insert("running".to_string(), self.running.to_string());
        metrics.insert("maintenance_active".to_string(), self.maintenance_active.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_multiplier::MultiplierConfig;
    /// use std::collections::HashMap;
    ///
    /// let multiplier = MultiplierConfig::new(|| {}).run();
    /// multiplier.stop();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "ingest".to_string());
    ///
    /// let output = multiplier.export_metrics_prometheus("consumers", Some(&tags));
    /// assert!(output.contains("multiplier_workers_live"));
    /// assert!(output.contains("service=\"ingest\""));
    /// ```
    pub fn export_prometheus(
        metrics: &WorkerMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP multiplier_workers_target Target worker count\n");
        output.push_str("# TYPE multiplier_workers_target gauge\n");
        output.push_str(&format!("multiplier_workers_target{{{}}} {}\n", labels, metrics.target_workers));

        output.push_str("# HELP multiplier_workers_live Workers currently running\n");
        output.push_str("# TYPE multiplier_workers_live gauge\n");
        output.push_str(&format!("multiplier_workers_live{{{}}} {}\n", labels, metrics.live_workers));

        output.push_str("# HELP multiplier_running Whether the multiplier is running\n");
        output.push_str("# TYPE multiplier_running gauge\n");
        output.push_str(&format!("multiplier_running{{{}}} {}\n", labels, u8::from(metrics.running)));

        // Counter metrics
        output.push_str("# HELP multiplier_workers_launched_total Total workers launched\n");
        output.push_str("# TYPE multiplier_workers_launched_total counter\n");
        output.push_str(&format!("multiplier_workers_launched_total{{{}}} {}\n", labels, metrics.launched_total));

        output.push_str("# HELP multiplier_workers_completed_total Worker invocations that returned\n");
        output.push_str("# TYPE multiplier_workers_completed_total counter\n");
        output.push_str(&format!("multiplier_workers_completed_total{{{}}} {}\n", labels, metrics.completed_total));

        output.push_str("# HELP multiplier_workers_panicked_total Worker invocations that panicked\n");
        output.push_str("# TYPE multiplier_workers_panicked_total counter\n");
        output.push_str(&format!("multiplier_workers_panicked_total{{{}}} {}\n", labels, metrics.panicked_total));

        output.push_str("# HELP multiplier_maintenance_passes_total Maintenance passes\n");
        output.push_str("# TYPE multiplier_maintenance_passes_total counter\n");
        output.push_str(&format!("multiplier_maintenance_passes_total{{{}}} {}\n", labels, metrics.maintenance_passes));

        output
    }

    /// Build a Prometheus registry holding the same series as [`export_prometheus`](Self::export_prometheus)
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_multiplier::{MetricsExporter, MultiplierConfig};
    ///
    /// let multiplier = MultiplierConfig::new(|| {}).run();
    /// multiplier.stop();
    ///
    /// let registry = MetricsExporter::to_registry(&multiplier.get_metrics(), "consumers").unwrap();
    /// assert_eq!(registry.gather().len(), 7);
    /// ```
    #[cfg(feature = "metrics")]
    pub fn to_registry(metrics: &WorkerMetrics, pool_name: &str) -> PoolResult<prometheus::Registry> {
        use prometheus::{IntCounter, IntGauge, Opts, Registry};

        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_label("pool", pool_name);
        let to_metric_err = |err: prometheus::Error| PoolError::Metrics(err.to_string());

        let gauges = [
            ("multiplier_workers_target", "Target worker count", metrics.target_workers as i64),
            ("multiplier_workers_live", "Workers currently running", metrics.live_workers as i64),
            ("multiplier_running", "Whether the multiplier is running", i64::from(metrics.running)),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help)).map_err(to_metric_err)?;
            gauge.set(value);
            registry.register(Box::new(gauge)).map_err(to_metric_err)?;
        }

        let counters = [
            ("multiplier_workers_launched_total", "Total workers launched", metrics.launched_total),
            ("multiplier_workers_completed_total", "Worker invocations that returned", metrics.completed_total),
            ("multiplier_workers_panicked_total", "Worker invocations that panicked", metrics.panicked_total),
            ("multiplier_maintenance_passes_total", "Maintenance passes", metrics.maintenance_passes),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help)).map_err(to_metric_err)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(to_metric_err)?;
        }

        Ok(registry)
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub launched_total: AtomicUsize,
    pub completed_total: AtomicUsize,
    pub panicked_total: AtomicUsize,
    pub maintenance_passes: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_metrics(
        &self,
        target: usize,
        live: usize,
        running: bool,
        maintenance_active: bool,
    ) -> WorkerMetrics {
        WorkerMetrics {
            target_workers: target,
            live_workers: live,
            launched_total: self.launched_total.load(Ordering::Relaxed),
            completed_total: self.completed_total.load(Ordering::Relaxed),
            panicked_total: self.panicked_total.load(Ordering::Relaxed),
            maintenance_passes: self.maintenance_passes.load(Ordering::Relaxed),
            running,
            maintenance_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorkerMetrics {
        let tracker = MetricsTracker::new();
        tracker.launched_total.fetch_add(5, Ordering::Relaxed);
        tracker.completed_total.fetch_add(3, Ordering::Relaxed);
        tracker.panicked_total.fetch_add(1, Ordering::Relaxed);
        tracker.get_metrics(4, 1, true, true)
    }

    #[test]
    fn test_export_map() {
        let exported = sample().export();

        assert_eq!(exported["launched_total"], "5");
        assert_eq!(exported["panicked_total"], "1");
        assert_eq!(exported["live_workers"], "1");
        assert_eq!(exported["running"], "true");
        assert_eq!(exported["maintenance_active"], "true");
    }

    #[test]
    fn test_export_prometheus_labels() {
        let output = MetricsExporter::export_prometheus(&sample(), "jobs", None);

        assert!(output.contains("multiplier_workers_target{pool=\"jobs\"} 4"));
        assert!(output.contains("multiplier_workers_completed_total{pool=\"jobs\"} 3"));
        assert!(output.contains("multiplier_running{pool=\"jobs\"} 1"));
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_registry_encodes_counters() {
        use prometheus::{Encoder, TextEncoder};

        let registry = MetricsExporter::to_registry(&sample(), "jobs").unwrap();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("multiplier_workers_launched_total{pool=\"jobs\"} 5"));
        assert!(text.contains("multiplier_workers_live{pool=\"jobs\"} 1"));
    }
}
