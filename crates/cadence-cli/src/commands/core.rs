//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `build_engine` - Engine with config resolution and the database as knowledge source
//! - `print_json` - JSON output for `--json`
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cadence_core::{Database, Engine, EngineConfig, KnowledgeEnrichment};
use serde::Serialize;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Engine using the resolved config, with the database's facts as knowledge source
pub fn build_engine(db: &Database, config_path: Option<&Path>) -> Result<Engine> {
    let config = EngineConfig::load(config_path).context("Failed to load engine config")?;
    let knowledge: Arc<dyn KnowledgeEnrichment> = Arc::new(db.clone());
    Ok(Engine::new(config, Some(knowledge)))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Log an observation: cadence log alice --mood 0.2 --energy 0.6 --focus 0.7");
    println!("  2. Run the engine: cadence run");

    Ok(())
}
