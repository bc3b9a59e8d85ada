//! # Tag-Based Invalidation Example
//!
//! Caches a few user and team records, groups them under tags, and drops a
//! whole group with one call.
//!
//! ## What This Example Shows
//!
//! - Building a cache from TOML configuration
//! - Tagging entries at write time
//! - Invalidating every entry under a tag
//! - Telling an empty value apart from a missing one
//!
//! ## Running This Example
//!
//! ```bash
//! RUST_LOG=taggable_cache=debug cargo run --example tagging
//! ```
//!
//! The example uses a redb file in a temporary directory that is removed
//! on exit.

use anyhow::Result;
use taggable_cache::{CacheConfig, TaggableCache};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== Taggable Cache Example ===\n");

    // =========================================================================
    // Part 1: Configuration
    // =========================================================================

    println!("--- Part 1: Configuration ---\n");

    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("cache.redb");

    let config = CacheConfig::from_toml_str(&format!(
        r#"
[store]
namespace = "demo:"
backend = "redb"
path = {:?}

[ttl]
default_secs = 3600
"#,
        db_path.to_string_lossy()
    ))?;
    let cache = TaggableCache::from_config(&config)?;

    println!("Cache opened at: {}\n", db_path.display());

    // =========================================================================
    // Part 2: Tagged Writes
    // =========================================================================

    println!("--- Part 2: Tagged Writes ---\n");

    cache
        .with_tags(["users", "team:7"])
        .set("user:1", br#"{"name":"alice"}"#, None)
        .await?;
    cache
        .with_tags(["users"])
        .set("user:2", br#"{"name":"bob"}"#, None)
        .await?;
    // Tag records share the keyspace with entries, so no key may reuse a
    // tag name.
    cache
        .with_tags(["team:7"])
        .set("team:7:info", br#"{"name":"platform"}"#, None)
        .await?;
    cache.set("motd", b"", None).await?;

    for tag in ["users", "team:7"] {
        println!("  {tag}: {:?}", cache.tag_members(tag).await?);
    }
    println!();

    // =========================================================================
    // Part 3: Empty vs Missing
    // =========================================================================

    println!("--- Part 3: Empty vs Missing ---\n");

    match cache.get("motd").await? {
        Some(value) if value.is_empty() => println!("  motd is stored and empty"),
        Some(value) => println!("  motd: {}", String::from_utf8_lossy(&value)),
        None => println!("  motd is missing"),
    }
    println!("  nonexistent -> {:?}\n", cache.get("nonexistent").await?);

    // =========================================================================
    // Part 4: Invalidation
    // =========================================================================

    println!("--- Part 4: Invalidation ---\n");

    let report = cache.delete_by_tag("users").await?;
    println!(
        "  Invalidated '{}': {} members, {} deleted",
        report.tag, report.members, report.deleted
    );

    for key in ["user:1", "user:2", "team:7:info"] {
        let state = if cache.get(key).await?.is_some() { "present" } else { "gone" };
        println!("  {key}: {state}");
    }

    // team:7 still lists user:1; invalidating it skips the missing key
    let report = cache.delete_by_tag("team:7").await?;
    println!(
        "  Invalidated '{}': {} members, {} deleted",
        report.tag, report.members, report.deleted
    );

    let report = cache.delete_by_tag("users").await?;
    println!("  Invalidating '{}' again deleted {}\n", report.tag, report.deleted);

    println!("=== Done ===");
    Ok(())
}
