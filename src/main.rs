// EsoxSolutions.Multiplier
// Self-scaling worker pool with panic isolation and draining shutdown

// This is just a binary wrapper - the actual library is in lib.rs
// Run examples with: cargo run --example basic

use esox_multiplier::MultiplierConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "esox_multiplier=debug".into()),
        )
        .init();

    println!("=== EsoxSolutions.Multiplier ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    // Quick demo, tunable through DEMO_WORKER_COUNT and DEMO_MULTIPLY_INTERVAL
    println!("Quick Demo:");
    let (tx, rx) = crossbeam::channel::unbounded::<u64>();
    let processed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&processed);

    let multiplier = MultiplierConfig::from_env(
        move || {
            while let Ok(millis) = rx.recv() {
                std::thread::sleep(Duration::from_millis(millis));
                counter.fetch_add(1, Ordering::SeqCst);
            }
        },
        "DEMO",
    )
    .run();

    for millis in [10, 20, 30, 40, 50] {
        let _ = tx.send(millis);
    }
    drop(tx);

    multiplier.stop();
    println!("  Jobs processed: {}", processed.load(Ordering::SeqCst));
    println!("  Live workers after stop: {}", multiplier.live_workers());
}
