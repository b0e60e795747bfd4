//! Compiled source profiles, looked up by source id.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::SourceProfile;
use crate::services::ExtractionCascade;

/// A profile together with its compiled cascade.
pub struct CompiledSource {
    pub profile: SourceProfile,
    pub cascade: ExtractionCascade,
}

/// All configured sources, compiled at startup.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<CompiledSource>>,
    order: Vec<String>,
}

impl SourceRegistry {
    /// Compile every profile. Invalid selectors, patterns or empty
    /// cascades fail here rather than at request time.
    pub fn compile(profiles: &[SourceProfile]) -> Result<Self> {
        let mut registry = Self::default();
        for profile in profiles {
            registry.insert(profile.clone())?;
        }
        Ok(registry)
    }

    /// Compile and register a single profile.
    pub fn insert(&mut self, profile: SourceProfile) -> Result<()> {
        if self.sources.contains_key(&profile.id) {
            return Err(AppError::config(format!(
                "duplicate source id '{}'",
                profile.id
            )));
        }
        let cascade = ExtractionCascade::from_profile(&profile)?;
        let id = profile.id.clone();
        self.sources
            .insert(id.clone(), Arc::new(CompiledSource { profile, cascade }));
        self.order.push(id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<CompiledSource>> {
        self.sources.get(id).cloned()
    }

    /// Sources in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledSource> {
        self.order
            .iter()
            .filter_map(|id| self.sources.get(id).map(|s| s.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, StrategySpec};

    #[test]
    fn test_default_sources_compile() {
        let registry = SourceRegistry::compile(&Config::default().sources).unwrap();
        assert_eq!(registry.len(), 3);
        let ids: Vec<&str> = registry.iter().map(|s| s.profile.id.as_str()).collect();
        assert_eq!(ids, vec!["melon", "bugs", "aladin"]);
        assert!(registry.get("aladin").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_invalid_selector_fails_at_compile_time() {
        let mut profile = Config::default().sources.remove(0);
        profile.strategies = vec![StrategySpec::ContainerScan {
            name: "broken".into(),
            container: "[[".into(),
            title: "a".into(),
            rank: None,
            attributes: Default::default(),
            min_title_len: None,
        }];
        let err = SourceRegistry::compile(&[profile]).err().unwrap();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let profile = Config::default().sources.remove(0);
        assert!(SourceRegistry::compile(&[profile.clone(), profile]).is_err());
    }

    #[test]
    fn test_debug_lists_source_ids() {
        let registry = SourceRegistry::compile(&Config::default().sources).unwrap();
        assert_eq!(
            format!("{registry:?}"),
            r#"SourceRegistry { sources: ["melon", "bugs", "aladin"] }"#
        );
    }
}
