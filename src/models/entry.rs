//! Ranked entries and per-document extraction results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value used for any secondary attribute a source did not provide.
pub const UNKNOWN: &str = "unknown";

/// One normalized item of a ranked list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankedEntry {
    /// Position in the list, starting at 1
    pub rank: u32,

    /// Entry title, never empty
    pub title: String,

    /// Secondary attributes (artist, author, publisher, link, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl RankedEntry {
    pub fn new(rank: u32, title: impl Into<String>) -> Self {
        Self {
            rank,
            title: title.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attribute value, or [`UNKNOWN`] when the attribute was never set.
    pub fn attribute(&self, name: &str) -> &str {
        self.attributes.get(name).map_or(UNKNOWN, String::as_str)
    }

    /// Format the entry for display using a template.
    ///
    /// Supported placeholders: `{rank}`, `{title}` and `{<attribute>}` for
    /// every attribute the entry carries.
    /// Unknown placeholders are left as written.
    pub fn format(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + self.title.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let Some(end) = tail.find('}') else {
                rest = tail;
                break;
            };
            let name = &tail[1..end];
            match name {
                "rank" => out.push_str(&self.rank.to_string()),
                "title" => out.push_str(&self.title),
                _ => match self.attributes.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&tail[..=end]),
                },
            }
            rest = &tail[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

/// Entries extracted from one document by the cascade.
///
/// When `success` is true the entries are non-empty, ranks are unique and
/// the sequence is in ascending rank order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub entries: Vec<RankedEntry>,
    pub success: bool,
    /// Name of the strategy that produced the entries
    pub strategy: Option<String>,
}

impl ExtractionResult {
    /// Unsuccessful, empty result. Not an error, only a signal to the caller.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap entries produced by `strategy`. An empty list stays unsuccessful.
    pub fn from_strategy(strategy: impl Into<String>, entries: Vec<RankedEntry>) -> Self {
        if entries.is_empty() {
            return Self::empty();
        }
        Self {
            entries,
            success: true,
            strategy: Some(strategy.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let entry = RankedEntry::new(3, "Ditto").with_attribute("artist", "NewJeans");
        assert_eq!(entry.format("{rank}. {title} - {artist}"), "3. Ditto - NewJeans");
    }

    #[test]
    fn test_format_does_not_expand_values() {
        let entry = RankedEntry::new(1, "Song {artist}").with_attribute("artist", "IVE");
        assert_eq!(entry.format("{title} / {artist}"), "Song {artist} / IVE");
        assert_eq!(entry.format("{rank} {label} {"), "1 {label} {");
    }

    #[test]
    fn test_missing_attribute_reads_as_unknown() {
        let entry = RankedEntry::new(1, "Title");
        assert_eq!(entry.attribute("author"), UNKNOWN);
    }

    #[test]
    fn test_empty_strategy_result_is_unsuccessful() {
        let result = ExtractionResult::from_strategy("container", Vec::new());
        assert!(!result.success);
        assert!(result.strategy.is_none());

        let result = ExtractionResult::from_strategy("container", vec![RankedEntry::new(1, "A")]);
        assert!(result.success);
        assert_eq!(result.strategy.as_deref(), Some("container"));
    }
}
