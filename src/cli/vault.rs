//! `echovault init` and `echovault config` — vault layout and configuration.

use anyhow::Result;
use std::path::Path;

use crate::config::{HomeSource, MemoryConfig};
use crate::service::MemoryService;

/// Default per-vault config written by `init`.
const DEFAULT_CONFIG_YAML: &str = "embedding:
  provider: ollama            # ollama | openai | openrouter | none
  model: nomic-embed-text
  base_url: http://localhost:11434
  # api_key: ...
context:
  semantic: auto              # auto | always | never
  topup_recent: true
";

/// Create the vault layout and a default config file when missing. With
/// `set_default`, the home is also persisted in the global config so later
/// invocations resolve to it without a flag.
pub fn run_init(memory_home: &Path, source: HomeSource, set_default: bool) -> Result<()> {
    std::fs::create_dir_all(memory_home.join("vault"))?;

    let config_path = memory_home.join("config.yaml");
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        std::fs::write(&config_path, DEFAULT_CONFIG_YAML)?;
        println!("Wrote default config to {}", config_path.display());
    }

    // Open once so index.db and its schema exist.
    let _service = MemoryService::new(Some(memory_home))?;

    if set_default {
        let persisted = crate::config::set_persisted_memory_home(memory_home)?;
        println!("Persisted memory_home = {} in the global config", persisted.display());
    }

    println!("Memory home: {} (from {source})", memory_home.display());
    println!("Vault:       {}", memory_home.join("vault").display());
    println!("Index:       {}", memory_home.join("index.db").display());
    Ok(())
}

/// Show the active configuration with secrets masked.
pub fn run_config(memory_home: &Path, source: HomeSource) -> Result<()> {
    let config = MemoryConfig::load(&memory_home.join("config.yaml"))?;
    println!("memory_home: {} (from {source})", memory_home.display());
    println!("{}", config.display());
    Ok(())
}

/// Persist the memory home location in the global config (used when
/// MEMORY_HOME is unset).
pub fn run_set_home(path: &Path) -> Result<()> {
    let resolved = crate::config::set_persisted_memory_home(path)?;
    std::fs::create_dir_all(resolved.join("vault"))?;
    println!("Persisted memory home: {}", resolved.display());
    println!("Override anytime with MEMORY_HOME.");
    Ok(())
}

/// Remove the persisted memory home location from the global config.
pub fn run_clear_home() -> Result<()> {
    if crate::config::clear_persisted_memory_home()? {
        println!("Cleared persisted memory home setting.");
    } else {
        println!("No persisted memory home setting was found.");
    }
    Ok(())
}
