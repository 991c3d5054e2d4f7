//! booking-core command line.
//!
//! ```text
//! booking-core --config core.toml check
//! booking-core --config core.toml probe --service roomService --path /room-types/42 --count 20 --watch
//! ```
//!
//! `check` validates the configuration and prints the policy table.
//! `probe` issues repeated resilient GETs against a configured service and
//! reports whether each answer was live, degraded or failed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use booking_core::config::watcher::{spawn_policy_reloader, ConfigWatcher};
use booking_core::config::{load_config, CoreConfig};
use booking_core::http::ServiceClient;
use booking_core::observability::{logging, metrics};
use booking_core::resilience::{CallOptions, CallOutcome, FallbackCache, PolicyRegistry, ResilientCaller};

#[derive(Parser)]
#[command(name = "booking-core")]
#[command(about = "Resilience policy checker and dependency probe", long_about = None)]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "booking-core.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and list the registered policies
    Check,
    /// Call a service repeatedly through its resilience policy
    Probe {
        #[arg(long)]
        service: String,

        #[arg(long)]
        path: String,

        #[arg(long, default_value_t = 10)]
        count: u32,

        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Reload policies when the configuration file changes
        #[arg(long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Check => check(&config),
        Commands::Probe {
            service,
            path,
            count,
            interval_ms,
            watch,
        } => {
            logging::init_logging(&config.observability)?;
            if config.observability.metrics_enabled {
                let addr = config.observability.metrics_address.parse::<std::net::SocketAddr>()?;
                metrics::init_metrics(addr)?;
            }
            let interval = Duration::from_millis(interval_ms);
            let watch_path = watch.then_some(cli.config.as_path());
            probe(&config, &service, &path, count, interval, watch_path).await?;
        }
    }

    Ok(())
}

fn check(config: &CoreConfig) {
    println!("Configuration OK: {} policies, {} services", config.policies.len(), config.services.len());
    println!(
        "{:<24} {:>9} {:>7} {:>9} {:>10} {:>9} {:>8} {:>10}",
        "POLICY", "FAIL_RATE", "WINDOW", "WAIT_OPEN", "RATE", "BULKHEAD", "RETRIES", "TIMEOUT"
    );
    for p in &config.policies {
        println!(
            "{:<24} {:>8.1}% {:>7} {:>7}ms {:>5}/{:<4} {:>9} {:>8} {:>8}ms",
            p.name,
            p.failure_rate_threshold,
            p.sliding_window_size,
            p.wait_duration_open_ms,
            p.rate_limit_per_period,
            format!("{}ms", p.rate_limit_period_ms),
            p.bulkhead_max_concurrent,
            p.retry_max_attempts,
            p.call_timeout_ms
        );
    }
    for s in &config.services {
        let policy = if config.policy(&s.name).is_some() { "" } else { "  (no policy)" };
        println!("service {:<16} {}{}", s.name, s.base_url, policy);
    }
}

async fn probe(
    config: &CoreConfig,
    service: &str,
    path: &str,
    count: u32,
    interval: Duration,
    watch_path: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(PolicyRegistry::from_configs(&config.policies));
    let cache = Arc::new(FallbackCache::new(&config.fallback_cache));
    let caller = ResilientCaller::new(registry.clone(), cache.clone());
    let client = ServiceClient::new(caller, &config.services)?;

    // Keep the watcher alive for the duration of the probe.
    let _watcher = match watch_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            spawn_policy_reloader(registry.clone(), updates);
            Some(watcher)
        }
        None => None,
    };

    let key = format!("probe:{}:{}", service, path);
    let mut ticker = tokio::time::interval(interval);

    for i in 1..=count {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }

        let options = CallOptions::new().with_fallback_key(key.clone());
        match client.get_json::<serde_json::Value>(service, path, options).await {
            Ok(CallOutcome::Live(body)) => println!("#{:<4} live      {}", i, body),
            Ok(CallOutcome::Degraded(body)) => println!("#{:<4} degraded  {}", i, body),
            Err(e) => println!("#{:<4} error     [{}] {}", i, e.kind(), e),
        }
    }

    if let Ok(snapshot) = registry.snapshot(service) {
        println!(
            "policy {}: circuit={:?} failure_rate={:.1}% tokens={} in_flight={}/{}",
            snapshot.name,
            snapshot.circuit_state,
            snapshot.failure_rate,
            snapshot.tokens_remaining,
            snapshot.in_flight,
            snapshot.max_concurrent
        );
    }
    let stats = cache.stats();
    println!(
        "fallback cache: entries={} hits={} misses={} evicted(expired={}, size={}, explicit={})",
        cache.len(),
        stats.hits,
        stats.misses,
        stats.evictions_expired,
        stats.evictions_size,
        stats.evictions_explicit
    );
    Ok(())
}
