//! Advanced features: panic isolation, environment configuration, metrics

use esox_multiplier::{env, MetricsExporter, MultiplierConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn main() {
    println!("=== EsoxSolutions.Multiplier - Advanced Features ===\n");

    // Example 1: Panicking workers are replaced
    panic_isolation();

    // Example 2: Environment configuration
    environment_config();

    // Example 3: Prometheus metrics
    prometheus_export();
}

fn panic_isolation() {
    println!("1. Panic Isolation:");
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    let multiplier = MultiplierConfig::new(move || {
        if counter.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            panic!("flaky work");
        }
        thread::sleep(Duration::from_millis(5));
    })
    .with_worker_count(2)
    .with_multiply_interval(Duration::from_millis(20))
    .run();

    thread::sleep(Duration::from_millis(150));
    multiplier.stop();

    let metrics = multiplier.get_metrics();
    println!("   Completed: {}", metrics.completed_total);
    println!("   Panicked: {}", metrics.panicked_total);
    println!("   Healthy: {}\n", multiplier.get_health_status().is_healthy());
}

fn environment_config() {
    println!("2. Environment Configuration:");
    println!(
        "   ADVANCED_WORKER_COUNT={:?} ADVANCED_MULTIPLY_INTERVAL={:?}",
        env::get("ADVANCED_WORKER_COUNT").as_str(),
        env::get("ADVANCED_MULTIPLY_INTERVAL").as_str()
    );

    let config = MultiplierConfig::from_env(|| {}, "ADVANCED");
    println!("   Worker count: {}", config.worker_count());
    println!("   Multiply interval: {:?}\n", config.multiply_interval());
}

fn prometheus_export() {
    println!("3. Prometheus Metrics:");
    let multiplier = MultiplierConfig::new(|| thread::sleep(Duration::from_millis(10)))
        .with_worker_count(3)
        .run();

    let mut tags = HashMap::new();
    tags.insert("service".to_string(), "demo".to_string());

    print!("{}", multiplier.export_metrics_prometheus("demo_pool", Some(&tags)));

    multiplier.stop();
    let registry = MetricsExporter::to_registry(&multiplier.get_metrics(), "demo_pool").unwrap();
    println!("   Registry families: {}", registry.gather().len());
}
