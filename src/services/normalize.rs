//! Field normalization, rank assignment and title deduplication.
//!
//! Every strategy hands back raw matches; the [`Normalizer`] turns them into
//! [`RankedEntry`] values the same way regardless of which strategy produced
//! them.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::models::{RankedEntry, SourceProfile, TrimRule, UNKNOWN};

static RANK_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static rank pattern"));

/// A field matched by a strategy, before any cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMatch {
    /// Explicit rank text, if the source prints one
    pub rank: Option<String>,
    pub title: String,
    pub attributes: BTreeMap<String, String>,
}

impl RawMatch {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_rank(mut self, rank: impl Into<String>) -> Self {
        self.rank = Some(rank.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Key used to decide whether two titles name the same item.
///
/// Case-folded, trimmed, internal whitespace runs collapsed to one space.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// First-seen-wins set of normalized titles.
#[derive(Debug, Default)]
pub struct TitleDeduplicator {
    seen: HashSet<String>,
}

impl TitleDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a title. Returns false if an equal title was already seen.
    pub fn insert(&mut self, title: &str) -> bool {
        self.seen.insert(normalize_title(title))
    }

    pub fn contains(&self, title: &str) -> bool {
        self.seen.contains(&normalize_title(title))
    }
}

/// Parse an explicit rank token such as `"3"`, `"3위"` or `"No. 3"`.
pub fn parse_rank(token: &str) -> Option<u32> {
    RANK_TOKEN
        .find(token)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|rank| *rank > 0)
}

#[derive(Debug, Clone)]
enum Trim {
    Suffix(String),
    Prefix(String),
    Substring(String),
    Pattern(Regex),
}

impl Trim {
    fn compile(rule: &TrimRule) -> Result<Self> {
        Ok(match rule {
            TrimRule::Suffix(s) => Self::Suffix(s.clone()),
            TrimRule::Prefix(s) => Self::Prefix(s.clone()),
            TrimRule::Substring(s) => Self::Substring(s.clone()),
            TrimRule::Pattern(p) => Self::Pattern(Regex::new(p)?),
        })
    }

    fn apply(&self, text: &str) -> String {
        match self {
            Self::Suffix(s) => text.strip_suffix(s.as_str()).unwrap_or(text).trim_end().to_string(),
            Self::Prefix(s) => text.strip_prefix(s.as_str()).unwrap_or(text).trim_start().to_string(),
            Self::Substring(s) => text.replace(s.as_str(), ""),
            Self::Pattern(re) => re.replace_all(text, "").into_owned(),
        }
    }
}

/// Cleans matched fields and assigns ranks for one source.
#[derive(Debug, Clone)]
pub struct Normalizer {
    trims: Vec<Trim>,
    attributes: Vec<String>,
    max_title_len: usize,
}

impl Normalizer {
    pub fn new(trims: &[TrimRule], attributes: Vec<String>, max_title_len: usize) -> Result<Self> {
        let trims = trims.iter().map(Trim::compile).collect::<Result<Vec<_>>>()?;
        Ok(Self {
            trims,
            attributes,
            max_title_len,
        })
    }

    pub fn from_profile(profile: &SourceProfile) -> Result<Self> {
        Self::new(
            &profile.trims,
            profile.attributes.clone(),
            profile.max_title_len,
        )
    }

    /// Collapse whitespace and apply the trim rules in order.
    pub fn clean(&self, text: &str) -> String {
        let mut result = collapse_whitespace(text);
        for trim in &self.trims {
            result = trim.apply(&result);
        }
        collapse_whitespace(&result)
    }

    /// Clean a title and truncate it; `None` if nothing is left.
    pub fn clean_title(&self, text: &str) -> Option<String> {
        let cleaned = self.clean(text);
        if cleaned.is_empty() {
            return None;
        }
        Some(truncate_graphemes(&cleaned, self.max_title_len))
    }

    /// Clean a secondary attribute, falling back to [`UNKNOWN`].
    pub fn clean_attribute(&self, text: &str) -> String {
        let cleaned = self.clean(text);
        if cleaned.is_empty() {
            UNKNOWN.to_string()
        } else {
            cleaned
        }
    }

    /// Turn raw matches into ranked entries.
    ///
    /// Matches whose title is not longer than `min_title_len` are skipped,
    /// duplicate titles keep their first accepted occurrence, matches without
    /// an explicit rank take their 1-based position among the accepted ones,
    /// and a rank already taken drops the later entry without claiming its
    /// title. The output is sorted by rank.
    pub fn finish(&self, matches: Vec<RawMatch>, min_title_len: usize) -> Vec<RankedEntry> {
        let mut dedup = TitleDeduplicator::new();
        let mut taken_ranks = HashSet::new();
        let mut entries = Vec::new();
        let mut position = 0u32;

        for raw in matches {
            let Some(title) = self.clean_title(&raw.title) else {
                continue;
            };
            if title.chars().count() <= min_title_len {
                continue;
            }
            if dedup.contains(&title) {
                log::debug!("Dropping duplicate title '{title}'");
                continue;
            }

            let rank = raw
                .rank
                .as_deref()
                .and_then(parse_rank)
                .unwrap_or(position + 1);
            if !taken_ranks.insert(rank) {
                log::debug!("Dropping '{title}': rank {rank} already taken");
                continue;
            }
            dedup.insert(&title);
            position += 1;

            let mut attributes: BTreeMap<String, String> = self
                .attributes
                .iter()
                .map(|name| (name.clone(), UNKNOWN.to_string()))
                .collect();
            for (name, value) in &raw.attributes {
                attributes.insert(name.clone(), self.clean_attribute(value));
            }

            entries.push(RankedEntry {
                rank,
                title,
                attributes,
            });
        }

        entries.sort_by_key(|e| e.rank);
        entries
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_graphemes(s: &str, max: usize) -> String {
    if s.graphemes(true).count() <= max {
        return s.to_string();
    }
    s.graphemes(true).take(max).collect::<String>().trim_end().to_string()
}
