// src/config.rs

//! Configuration loading utilities.
//!
//! Loads the TOML configuration, validates it and compiles every source
//! profile, so broken selectors or patterns surface before any fetch.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::SourceRegistry;
use crate::utils::log;

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. A file that exists
/// but does not parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::warn(&format!(
            "Config not found at {}, using built-in sources",
            path.display()
        ));
        return Ok(Config::default());
    }
    Config::load(path)
        .map_err(|e| AppError::config(format!("Failed to load {}: {e}", path.display())))
}

/// Load, validate and compile the configuration.
pub fn load_all(path: &Path) -> Result<(Config, SourceRegistry)> {
    let config = load_config(path)?;
    config.validate()?;
    let registry = SourceRegistry::compile(&config.sources)?;
    Ok((config, registry))
}
