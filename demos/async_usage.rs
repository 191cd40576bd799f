//! Async usage examples

use esox_multiplier::MultiplierConfig;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.Multiplier - Async Examples ===\n");

    // Example 1: Async stop
    async_stop().await;

    // Example 2: Feeding workers from a runtime
    feed_from_runtime().await;
}

async fn async_stop() {
    println!("1. Async Stop:");
    let multiplier = MultiplierConfig::new(|| std::thread::sleep(Duration::from_millis(50)))
        .with_worker_count(4)
        .run();

    sleep(Duration::from_millis(10)).await;
    println!("   Live workers: {}", multiplier.live_workers());

    multiplier.stop_async().await.unwrap();
    println!("   Live workers after stop: {}\n", multiplier.live_workers());
}

async fn feed_from_runtime() {
    println!("2. Feeding Workers From a Runtime:");
    let (tx, rx) = crossbeam::channel::bounded::<u32>(4);

    let multiplier = MultiplierConfig::new(move || {
        while let Ok(n) = rx.recv() {
            println!("   square of {} is {}", n, n * n);
        }
    })
    .with_worker_count(2)
    .run();

    for n in 1..=5 {
        let tx = tx.clone();
        // Sending may block when the queue is full
        tokio::task::spawn_blocking(move || tx.send(n)).await.unwrap().unwrap();
    }
    drop(tx);

    multiplier.stop_async().await.unwrap();
    println!();
}
