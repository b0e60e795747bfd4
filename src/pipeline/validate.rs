// src/pipeline/validate.rs

use std::path::Path;

use crate::config::load_all;
use crate::error::Result;
use crate::utils::log;

/// Load, validate and compile the configuration, reporting what was found.
pub fn run_validate(path: &Path) -> Result<()> {
    log::header("Validating configuration");

    match load_all(path) {
        Ok((config, registry)) => {
            log::success(&format!("Configuration OK: {}", path.display()));
            log::sub_item(&format!("User agent: {}", config.fetcher.user_agent));
            log::sub_item(&format!("Timeout: {}s", config.fetcher.timeout_secs));
            log::sub_item(&format!(
                "Default TTL: {}s{}",
                config.cache.default_ttl_secs,
                config
                    .cache
                    .ttl_override_secs
                    .map(|s| format!(" (override {s}s)"))
                    .unwrap_or_default()
            ));

            log::success(&format!("{} source(s) compiled", registry.len()));
            for source in registry.iter() {
                log::sub_item(&format!(
                    "{} [{}]: {}",
                    source.profile.display_name(),
                    source.profile.id,
                    source.cascade.strategy_names().join(" -> ")
                ));
            }
            Ok(())
        }
        Err(e) => {
            log::error(&format!("Validation failed: {e}"));
            Err(e)
        }
    }
}
