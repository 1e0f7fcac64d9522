//! Configuration loading and memory-home resolution.
//!
//! Two config layers exist: the per-vault `config.yaml` inside the memory
//! home ([`MemoryConfig`]), and a small global file at
//! `~/.config/echovault/config.yaml` that only persists the `memory_home`
//! path itself.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Settings for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "ollama" | "openai" | "openrouter" | "none"
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key: String,
}

/// Controls how memories are retrieved for context injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// "auto" | "always" | "never"
    pub semantic: String,
    /// Fill sparse search results with recent memories.
    pub topup_recent: bool,
}

/// Root per-vault configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub embedding: EmbeddingConfig,
    pub context: ContextConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            model: "nomic-embed-text".into(),
            base_url: "http://localhost:11434".into(),
            api_key: String::new(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            semantic: "auto".into(),
            topup_recent: true,
        }
    }
}

impl MemoryConfig {
    /// Load the per-vault config from `path`. A missing file yields defaults;
    /// missing keys retain their per-field defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::io(path, e)),
        };
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))
    }

    /// Human-facing rendering with the API key masked.
    pub fn display(&self) -> String {
        let api_key = if self.embedding.api_key.is_empty() {
            "(unset)"
        } else {
            "<redacted>"
        };
        format!(
            "embedding:\n  provider: {}\n  model: {}\n  base_url: {}\n  api_key: {}\ncontext:\n  semantic: {}\n  topup_recent: {}",
            self.embedding.provider,
            self.embedding.model,
            self.embedding.base_url,
            api_key,
            self.context.semantic,
            self.context.topup_recent,
        )
    }
}

/// Where the memory-home path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeSource {
    Flag,
    Env,
    Config,
    Default,
}

impl std::fmt::Display for HomeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Config => "config",
            Self::Default => "default",
        })
    }
}

/// Resolve the memory home directory and report where it came from.
///
/// Priority: explicit override → `MEMORY_HOME` env → persisted global config
/// → `~/.memory`.
pub fn resolve_memory_home(flag_override: Option<&Path>) -> (PathBuf, HomeSource) {
    if let Some(p) = flag_override {
        if let Ok(p) = normalize_path(p) {
            return (p, HomeSource::Flag);
        }
    }

    if let Ok(env) = std::env::var("MEMORY_HOME") {
        if !env.is_empty() {
            if let Ok(p) = normalize_path(Path::new(&env)) {
                return (p, HomeSource::Env);
            }
        }
    }

    if let Ok(Some(persisted)) = persisted_memory_home() {
        return (persisted, HomeSource::Config);
    }

    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    (home.join(".memory"), HomeSource::Default)
}

/// Path of the global config file holding `memory_home`.
fn global_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("home directory not found".into()))?;
    Ok(home.join(".config").join("echovault").join("config.yaml"))
}

/// Read `memory_home` from the global config, if set.
pub fn persisted_memory_home() -> Result<Option<PathBuf>> {
    let path = global_config_path()?;
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(path, e)),
    };

    let raw: serde_yaml::Value = match serde_yaml::from_str(&contents) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };
    let val = raw
        .get("memory_home")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match val {
        Some(s) => Ok(Some(normalize_path(Path::new(s))?)),
        None => Ok(None),
    }
}

/// Normalize and persist `memory_home` in the global config, preserving any
/// other keys already present. Returns the normalized path.
pub fn set_persisted_memory_home(path: &Path) -> Result<PathBuf> {
    let normalized = normalize_path(path)?;
    let cfg_path = global_config_path()?;
    if let Some(parent) = cfg_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut raw: serde_yaml::Mapping = std::fs::read_to_string(&cfg_path)
        .ok()
        .and_then(|c| serde_yaml::from_str(&c).ok())
        .unwrap_or_default();
    raw.insert(
        serde_yaml::Value::from("memory_home"),
        serde_yaml::Value::from(normalized.to_string_lossy().into_owned()),
    );

    let out = serde_yaml::to_string(&raw)
        .map_err(|e| Error::Config(format!("serialize global config: {e}")))?;
    std::fs::write(&cfg_path, out).map_err(|e| Error::io(&cfg_path, e))?;
    Ok(normalized)
}

/// Remove `memory_home` from the global config. Returns true if the key was
/// present. A file left empty by the removal is deleted.
pub fn clear_persisted_memory_home() -> Result<bool> {
    let cfg_path = global_config_path()?;
    let contents = match std::fs::read_to_string(&cfg_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(&cfg_path, e)),
    };

    let mut raw: serde_yaml::Mapping = match serde_yaml::from_str(&contents) {
        Ok(m) => m,
        Err(_) => return Ok(false),
    };
    if raw.remove("memory_home").is_none() {
        return Ok(false);
    }

    if raw.is_empty() {
        std::fs::remove_file(&cfg_path).map_err(|e| Error::io(&cfg_path, e))?;
        return Ok(true);
    }

    let out = serde_yaml::to_string(&raw)
        .map_err(|e| Error::Config(format!("serialize global config: {e}")))?;
    std::fs::write(&cfg_path, out).map_err(|e| Error::io(&cfg_path, e))?;
    Ok(true)
}

/// Expand `~` and make the path absolute.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    let expanded = match path.to_str().and_then(|s| s.strip_prefix("~/")) {
        Some(rest) => dirs::home_dir()
            .ok_or_else(|| Error::Config("home directory not found".into()))?
            .join(rest),
        None => path.to_path_buf(),
    };
    std::path::absolute(&expanded).map_err(|e| Error::io(&expanded, e))
}
