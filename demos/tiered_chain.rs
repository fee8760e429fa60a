//! Two-tier chain: a bounded in-memory tier in front of a filesystem tier.

use cache_chain::{
    backend::{FileBackend, InMemoryBackend},
    error::Result,
    CacheBackend, ChainBuilder, PromotionMode,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Serialize, Deserialize, Debug)]
struct Employment {
    id: String,
    employer_name: String,
    salary: f64,
}

/// Simulates a slow lookup behind the cache.
async fn load_employment(id: &str) -> Result<Employment> {
    println!("  [DB] Fetching employment: {}", id);
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(Employment {
        id: id.to_string(),
        employer_name: "Acme Corp".to_string(),
        salary: 75000.0,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Cache Chain - Tiered Example ===\n");

    let dir = std::env::temp_dir().join("cache-chain-demo");
    let memory = InMemoryBackend::with_limit(1_000);
    let disk = FileBackend::new(&dir).await?;

    println!("1. Building chain [memory -> file({})]...", dir.display());
    let cache = ChainBuilder::new()
        .backend(memory.clone())
        .backend(disk)
        .prefix("demo")
        .promotion(PromotionMode::Inline)
        .build()
        .await?;
    println!("   ✓ {} tiers ready\n", cache.tier_count());

    println!("2. remember() on a cold cache runs the loader:");
    let emp = cache
        .remember("employment:emp_001", Duration::from_secs(60), || {
            load_employment("emp_001")
        })
        .await?;
    println!("   ✓ {} at {} (${:.2})\n", emp.id, emp.employer_name, emp.salary);

    println!("3. remember() again is served from the first tier:");
    let emp = cache
        .remember("employment:emp_001", Duration::from_secs(60), || {
            load_employment("emp_001")
        })
        .await?;
    println!("   ✓ {} from cache\n", emp.id);

    println!("4. Evicting the memory tier, then reading again:");
    memory.clear_all().await?;
    let promoted: Option<Employment> = cache.get("employment:emp_001").await?;
    println!("   ✓ file tier hit: {:?}", promoted.map(|e| e.id));
    println!("   ✓ memory tier back-filled: {}\n", memory.len());

    println!("5. add() only writes absent keys:");
    let first = cache.add("greeting", "hello", Duration::from_secs(30)).await?;
    let second = cache.add("greeting", "bonjour", Duration::from_secs(30)).await?;
    let greeting: Option<String> = cache.get("greeting").await?;
    println!("   ✓ first add: {}, second add: {}, value: {:?}\n", first, second, greeting);

    println!("6. pull() reads and removes:");
    let pulled: Option<String> = cache.pull("greeting").await?;
    println!("   ✓ pulled {:?}, still present: {}\n", pulled, cache.has("greeting").await?);

    cache.clear().await?;
    println!("=== Done ===\n");
    Ok(())
}
