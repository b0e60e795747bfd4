// src/services/strategies.rs

//! Extraction strategies.
//!
//! Each strategy is compiled once from a [`StrategySpec`] and is a pure
//! function from a parsed page to a list of raw matches. Cleaning, rank
//! assignment and deduplication are left to the
//! [`Normalizer`](super::Normalizer).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{RawDocument, StrategySpec};
use crate::services::RawMatch;
use crate::utils::resolve_url;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static anchor selector"));

/// Elements whose text never counts as visible content.
const INVISIBLE: &[&str] = &["script", "style", "noscript", "template"];

/// A fetched document parsed once and shared by every strategy of a cascade.
pub struct Page<'a> {
    pub document: &'a RawDocument,
    pub html: Html,
    base_url: Option<Url>,
}

impl<'a> Page<'a> {
    pub fn parse(document: &'a RawDocument) -> Self {
        Self {
            document,
            html: Html::parse_document(&document.body),
            base_url: Url::parse(&document.url).ok(),
        }
    }

    /// Visible text of the whole document, one text node per line.
    pub fn visible_text(&self) -> String {
        self.html
            .root_element()
            .descendants()
            .filter_map(|node| {
                let text = node.value().as_text()?;
                let hidden = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|e| INVISIBLE.contains(&e.name())))
                    .unwrap_or(false);
                (!hidden).then_some(&**text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Resolve an href against the document URL.
    pub fn resolve(&self, href: &str) -> String {
        match &self.base_url {
            Some(base) => resolve_url(base, href),
            None => href.to_string(),
        }
    }
}

/// One step of an extraction cascade.
pub trait Strategy: Send + Sync {
    /// Identifier reported as the producing strategy.
    fn name(&self) -> &str;

    /// Titles must be strictly longer than this many characters.
    fn min_title_len(&self) -> usize {
        0
    }

    /// Scan a page and return raw matches in document order.
    fn scan(&self, page: &Page<'_>) -> Vec<RawMatch>;
}

/// Compile a declarative strategy description.
pub fn build_strategy(spec: &StrategySpec) -> Result<Box<dyn Strategy>> {
    let min_title_len = spec.min_title_len();
    Ok(match spec {
        StrategySpec::ContainerScan {
            name,
            container,
            title,
            rank,
            attributes,
            ..
        } => Box::new(ContainerScan {
            name: name.clone(),
            container: parse_selector(container)?,
            title: parse_selector(title)?,
            rank: rank.as_deref().map(parse_selector).transpose()?,
            attributes: attributes
                .iter()
                .map(|(attr, sel)| Ok((attr.clone(), parse_selector(sel)?)))
                .collect::<Result<Vec<_>>>()?,
            min_title_len,
        }),
        StrategySpec::LinkHarvest {
            name,
            href_contains,
            link_attribute,
            ..
        } => {
            if href_contains.is_empty() {
                return Err(AppError::config(format!(
                    "strategy '{name}': href_contains must not be empty"
                )));
            }
            Box::new(LinkHarvest {
                name: name.clone(),
                href_contains: href_contains.clone(),
                link_attribute: link_attribute.clone(),
                min_title_len,
            })
        }
        StrategySpec::FreeText { name, patterns, .. } => {
            if patterns.is_empty() {
                return Err(AppError::config(format!(
                    "strategy '{name}' declares no patterns"
                )));
            }
            let patterns = patterns
                .iter()
                .map(|p| {
                    let re = Regex::new(p)?;
                    if !re.capture_names().flatten().any(|n| n == "title") {
                        return Err(AppError::config(format!(
                            "strategy '{name}': pattern '{p}' has no (?P<title>...) group"
                        )));
                    }
                    Ok(re)
                })
                .collect::<Result<Vec<_>>>()?;
            Box::new(FreeTextPattern {
                name: name.clone(),
                patterns,
                min_title_len,
            })
        }
    })
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// Repeated containers with fields read by selectors inside each one.
pub struct ContainerScan {
    name: String,
    container: Selector,
    title: Selector,
    rank: Option<Selector>,
    attributes: Vec<(String, Selector)>,
    min_title_len: usize,
}

impl Strategy for ContainerScan {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_title_len(&self) -> usize {
        self.min_title_len
    }

    fn scan(&self, page: &Page<'_>) -> Vec<RawMatch> {
        page.html
            .select(&self.container)
            .filter_map(|container| {
                let title = container.select(&self.title).next()?;
                let rank = self
                    .rank
                    .as_ref()
                    .and_then(|sel| container.select(sel).next())
                    .map(element_text);
                let attributes: BTreeMap<String, String> = self
                    .attributes
                    .iter()
                    .filter_map(|(attr, sel)| {
                        container
                            .select(sel)
                            .next()
                            .map(|el| (attr.clone(), element_text(el)))
                    })
                    .collect();
                Some(RawMatch {
                    rank,
                    title: element_text(title),
                    attributes,
                })
            })
            .collect()
    }
}

/// Anchors whose href contains a marker, with the link text as title.
pub struct LinkHarvest {
    name: String,
    href_contains: String,
    link_attribute: Option<String>,
    min_title_len: usize,
}

impl Strategy for LinkHarvest {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_title_len(&self) -> usize {
        self.min_title_len
    }

    fn scan(&self, page: &Page<'_>) -> Vec<RawMatch> {
        page.html
            .select(&ANCHOR)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                if !href.contains(&self.href_contains) {
                    return None;
                }
                let text = element_text(anchor);
                if text.trim_start().starts_with("http") {
                    return None;
                }
                let mut raw = RawMatch::new(text);
                if let Some(attr) = &self.link_attribute {
                    raw = raw.with_attribute(attr.clone(), page.resolve(href));
                }
                Some(raw)
            })
            .collect()
    }
}

/// Regular expressions over the document's visible text.
pub struct FreeTextPattern {
    name: String,
    patterns: Vec<Regex>,
    min_title_len: usize,
}

impl FreeTextPattern {
    fn matches_for(re: &Regex, text: &str) -> Vec<RawMatch> {
        let attribute_groups: Vec<&str> = re
            .capture_names()
            .flatten()
            .filter(|n| *n != "title" && *n != "rank")
            .collect();

        re.captures_iter(text)
            .filter_map(|caps| {
                let title = caps.name("title")?.as_str();
                let mut raw = RawMatch::new(title);
                raw.rank = caps.name("rank").map(|m| m.as_str().to_string());
                for group in &attribute_groups {
                    if let Some(m) = caps.name(group) {
                        raw.attributes.insert(group.to_string(), m.as_str().to_string());
                    }
                }
                Some(raw)
            })
            .collect()
    }
}

impl Strategy for FreeTextPattern {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_title_len(&self) -> usize {
        self.min_title_len
    }

    fn scan(&self, page: &Page<'_>) -> Vec<RawMatch> {
        let text = page.visible_text();
        self.patterns
            .iter()
            .map(|re| Self::matches_for(re, &text))
            .find(|matches| !matches.is_empty())
            .unwrap_or_default()
    }
}
