//! Retry loop examples
//!
//! Demonstrates:
//! - Tracker-driven retries with a classifying policy
//! - Caller-owned retry loops built on `retry_delay_fn`
//! - Cancelling a pending backoff
//!
//! Run with `RUST_LOG=backoffkit=debug` to see every computed delay.

use backoffkit::prelude::*;
use futures::StreamExt;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

/// Simulated API that fails a fixed number of times before succeeding
struct UnreliableApi {
    failures_remaining: AtomicU32,
    calls: AtomicU32,
}

impl UnreliableApi {
    fn new(failures: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    async fn call(&self) -> Result<String, std::io::Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let remaining = self.failures_remaining.load(Ordering::SeqCst);

        if remaining > 0 {
            self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            println!("  Call {}: network error ({} failures left)", call, remaining - 1);
            Err(std::io::Error::other("network timeout"))
        } else {
            println!("  Call {}: success", call);
            Ok(format!("response #{call}"))
        }
    }
}

fn quick_config() -> BackoffConfig {
    BackoffConfig::default()
        .with_base_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_millis(400))
        .with_jitter_factor(0.2)
}

/// Example 1: tracker with a policy that only retries network errors
async fn example_tracker() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 1: AttemptTracker ===\n");

    let policy = PredicatePolicy::new()
        .with_can_retry(|attempts| attempts < 4)
        .with_should_retry(|error, _| error.to_string().contains("network"));
    let mut tracker = AttemptTracker::with_policy(quick_config(), policy);

    let api = UnreliableApi::new(3);
    let start = Instant::now();
    let response = tracker
        .retry(|| {
            let api = &api;
            async move { api.call().await }
        })
        .await?;

    println!(
        "Got {:?} after {} retries in {:?}",
        response,
        tracker.attempts(),
        start.elapsed()
    );
    println!("Next backoff would be: {}", tracker.peek());

    Ok(())
}

/// Example 2: caller-owned loop driven by a delay function
async fn example_delay_fn() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 2: retry_delay_fn ===\n");

    let delay = retry_delay_fn(EmissionConfig::new(quick_config()));
    let api = UnreliableApi::new(2);
    let max_retries = 5;
    let mut retry_count = 0;

    let response = loop {
        match api.call().await {
            Ok(response) => break response,
            Err(err) if retry_count >= max_retries => return Err(err.into()),
            Err(_) => {
                retry_count += 1;
                if let Some(result) = delay(retry_count).elapsed().await {
                    println!("  {}", result);
                }
            }
        }
    };

    println!("Got {:?} after {} retries", response, retry_count);
    Ok(())
}

/// Example 3: cancelling a pending backoff
async fn example_cancellation() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 3: Cancellation ===\n");

    let config = EmissionConfig::new(BackoffConfig::default().with_jitter_factor(0.0));
    let mut emission = backoff_emission(3, Some(&config));
    let handle = emission.handle();
    println!("Scheduled: {}", emission.result());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        println!("  Cancelling pending backoff");
        handle.cancel();
    });

    let start = Instant::now();
    let fired = emission.next().await;
    println!(
        "Fired: {} (returned after {:?})",
        fired.is_some(),
        start.elapsed()
    );

    Ok(())
}

/// Example 4: jitter spread across repeated calculations
fn example_jitter_spread() {
    println!("\n=== Example 4: Jitter Spread ===\n");

    let config = BackoffConfig::default().with_jitter_factor(0.3);
    let delays: Vec<f64> = (0..10).map(|_| config.compute(1).final_delay_ms()).collect();

    let min = delays.iter().copied().fold(f64::INFINITY, f64::min);
    let max = delays.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = delays.iter().sum::<f64>() / delays.len() as f64;

    println!("  10 samples for attempt 1 with 30% jitter");
    println!("  Expected range: 700-1300ms");
    println!("  Observed: min {:.1}ms, max {:.1}ms, avg {:.1}ms", min, max, avg);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("backoffkit=info")),
        )
        .init();

    println!("==============================================");
    println!("   backoffkit: Retry Loop Examples");
    println!("==============================================");

    example_tracker().await?;
    example_delay_fn().await?;
    example_cancellation().await?;
    example_jitter_spread();

    println!("\n==============================================");
    println!("   All examples completed successfully!");
    println!("==============================================\n");

    Ok(())
}
