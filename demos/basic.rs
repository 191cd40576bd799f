//! Basic usage examples for Multiplier

use esox_multiplier::{Multiplier, MultiplierConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn main() {
    println!("=== EsoxSolutions.Multiplier - Basic Examples ===\n");

    // Example 1: Queue consumers
    queue_consumers();

    // Example 2: One-shot workers
    one_shot_workers();

    // Example 3: Stopping twice
    stop_twice();
}

fn queue_consumers() {
    println!("1. Queue Consumers:");
    let (tx, rx) = crossbeam::channel::bounded::<String>(8);
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);

    let multiplier = MultiplierConfig::new(move || {
        while let Ok(message) = rx.recv() {
            println!("   {} handled {}", thread::current().name().unwrap_or("?"), message);
            counter.fetch_add(1, Ordering::SeqCst);
        }
    })
    .with_worker_count(3)
    .run();

    for i in 0..6 {
        tx.send(format!("message-{}", i)).unwrap();
    }
    drop(tx);

    multiplier.stop();
    println!("   Handled: {}\n", handled.load(Ordering::SeqCst));
}

fn one_shot_workers() {
    println!("2. One-shot Workers:");
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);

    // Each invocation returns at once; replacements arrive once per interval
    let multiplier = Multiplier::builder(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .with_worker_count(2)
    .with_multiply_interval(Duration::from_millis(50))
    .run();

    thread::sleep(Duration::from_millis(260));
    multiplier.stop();

    println!("   Invocations in ~260ms: {}", invocations.load(Ordering::SeqCst));
    println!("   Maintenance passes: {}\n", multiplier.get_metrics().maintenance_passes);
}

fn stop_twice() {
    println!("3. Stopping Twice:");
    let multiplier = MultiplierConfig::new(|| thread::sleep(Duration::from_millis(100)))
        .with_worker_count(10)
        .run();

    let started = std::time::Instant::now();
    multiplier.stop();
    println!("   First stop took {:?}", started.elapsed());

    let started = std::time::Instant::now();
    multiplier.stop();
    println!("   Second stop took {:?}\n", started.elapsed());
}
