//! Cache key scheme.

use std::collections::BTreeMap;
use std::fmt;

/// Source identifier plus the parameters that change its content.
///
/// Rendered as `id` or `id?k1=v1&k2=v2` with parameters sorted by name, so
/// distinct parameterizations never collide and equal ones always match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{name}={value}")?;
        }
        Ok(())
    }
}

impl From<&str> for CacheKey {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}
