//! Guarded fetch example.
//!
//! This example demonstrates putting a verse fetch behind the guard and
//! handling each kind of rejection.
//!
//! # Running
//!
//! ```bash
//! cargo run --example protected_fetch -- "John 3:16"
//! ```
//!
//! # Note
//!
//! The fetch function here is a stand-in. In production it would call the
//! upstream verse API; the guard only needs it to return a `VerseResult`
//! or an error that implements `Display`.

use verseguard::{ApiGuard, GuardConfig, GuardFailure, GuardOutcome, VerseResult};

async fn fetch_from_upstream(reference: String) -> Result<VerseResult, std::io::Error> {
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    Ok(VerseResult::passage(
        format!("(passage text for {})", reference),
        "ESV",
    ))
}

#[tokio::main]
async fn main() {
    let reference = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "John 3:16".to_string());

    let config = GuardConfig {
        identity: "Mozilla/5.0 (X11; Linux x86_64) verse-reader/1.0".to_string(),
        storage_namespace: "verseguard-demo".to_string(),
        ..GuardConfig::default()
    };

    // Create the guard
    let guard = match ApiGuard::new(config) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Run the request twice: the second one is served from cache.
    for attempt in 1..=2 {
        match guard.request(&reference, fetch_from_upstream).await {
            GuardOutcome::Cached(result) => {
                println!("#{} cached: {} ({})", attempt, result.text, result.version);
            }
            GuardOutcome::Fetched(result) if result.success => {
                println!("#{} fetched: {} ({})", attempt, result.text, result.version);
            }
            GuardOutcome::Fetched(result) => {
                println!("#{} upstream refused: {}", attempt, result.text);
            }
            GuardOutcome::Failed(failure) => {
                match &failure {
                    GuardFailure::RateLimited { wait_seconds, .. } => {
                        eprintln!("Rate limited, retry in {}s", wait_seconds);
                    }
                    GuardFailure::VerseLimitExceeded(violation) => {
                        eprintln!("Too many verses: {}", violation);
                    }
                    GuardFailure::BotDetected => {
                        eprintln!("Client identity rejected");
                    }
                    GuardFailure::Upstream { message } => {
                        eprintln!("Upstream error: {}", message);
                    }
                }
                std::process::exit(1);
            }
        }
    }

    let status = guard.status().await;
    println!(
        "Remaining: {}/min {}/hour {}/day, cache {}/{}",
        status.remaining.minute,
        status.remaining.hour,
        status.remaining.day,
        status.cache_size,
        status.max_cache_size
    );
}
