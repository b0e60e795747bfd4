//! ranklist CLI
//!
//! Fetches ranked lists from the configured sources and prints them.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use ranklist::{
    config::load_all,
    error::{AppError, Result},
    models::{MergeWarning, MergedResult, RankedEntry},
    pipeline::{self, RankingService},
    storage::Cached,
    utils::log as console,
};
use serde::Serialize;

/// ranklist - ranked list scraper with last-known-good caching
#[derive(Parser, Debug)]
#[command(name = "ranklist", version, about = "Ranked list extraction engine")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured sources
    Sources,

    /// Validate the configuration file and compile every source
    Validate,

    /// Fetch and print rankings
    Fetch {
        /// Source ids to fetch
        #[arg(required = true)]
        ids: Vec<String>,

        /// Only print the first N entries
        #[arg(long)]
        top: Option<usize>,

        /// Line template; `{rank}`, `{title}` and attribute names are replaced
        #[arg(long, default_value = "{rank}. {title}")]
        format: String,

        /// Print JSON instead of formatted lines
        #[arg(long)]
        json: bool,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[derive(Serialize)]
struct FetchReport<'a> {
    source: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    refreshed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ranking: Option<RankingView<'a>>,
}

/// A merged ranking cut down to the requested chart range.
#[derive(Serialize)]
struct RankingView<'a> {
    entries: &'a [RankedEntry],
    pages: &'a [u32],
    missing_pages: &'a [u32],
    warnings: &'a [MergeWarning],
}

impl<'a> RankingView<'a> {
    fn new(merged: &'a MergedResult, top: Option<usize>) -> Self {
        Self {
            entries: match top {
                Some(n) => merged.top(n),
                None => &merged.entries,
            },
            pages: &merged.pages,
            missing_pages: &merged.missing_pages,
            warnings: &merged.warnings,
        }
    }
}

impl<'a> FetchReport<'a> {
    fn new(source: &'a str, result: &'a Cached<MergedResult>, top: Option<usize>) -> Self {
        Self {
            source,
            status: result.label(),
            refreshed_at: result.refreshed_at(),
            error: result.error(),
            ranking: result.payload().map(|p| RankingView::new(p, top)),
        }
    }
}

fn print_ranking(name: &str, result: &Cached<MergedResult>, top: Option<usize>, template: &str) {
    let Some(merged) = result.payload() else {
        console::error(&format!(
            "{name}: unavailable ({})",
            result.error().unwrap_or_default()
        ));
        return;
    };

    let refreshed = result
        .refreshed_at()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default();
    console::header(&format!("{name} ({}, {refreshed})", result.label()));
    if let Some(error) = result.error() {
        console::warn(&format!("Serving last known good ranking: {error}"));
    }
    if merged.is_partial() {
        console::warn(&format!("Missing pages: {:?}", merged.missing_pages));
    }

    let entries = match top {
        Some(n) => merged.top(n),
        None => &merged.entries,
    };
    for entry in entries {
        println!("{}", entry.format(template));
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Validate => {
            console::init(if cli.verbose { "debug" } else { "info" });
            pipeline::run_validate(&cli.config)?;
        }

        Command::Sources => {
            let (config, registry) = load_all(&cli.config)?;
            console::init(&config.logging.level);
            console::header("Configured sources");
            for source in registry.iter() {
                let profile = &source.profile;
                console::info(&format!("{} - {}", profile.id, profile.display_name()));
                console::sub_item(&format!("URL: {}", profile.url));
                console::sub_item(&format!(
                    "Pages: {} x {}",
                    profile.pagination.pages, profile.pagination.page_size
                ));
                console::sub_item(&format!(
                    "TTL: {}s",
                    profile.ttl(config.cache.default_ttl()).as_secs()
                ));
                console::sub_item(&format!(
                    "Strategies: {}",
                    source.cascade.strategy_names().join(" -> ")
                ));
            }
        }

        Command::Fetch {
            ids,
            top,
            format,
            json,
        } => {
            let (config, registry) = load_all(&cli.config)?;
            console::init(if cli.verbose {
                "debug"
            } else {
                config.logging.level.as_str()
            });
            let service = RankingService::from_config(&config, registry)?;

            let mut results = Vec::with_capacity(ids.len());
            for id in &ids {
                results.push((id.as_str(), service.get(id).await?));
            }

            if json {
                let reports: Vec<FetchReport<'_>> = results
                    .iter()
                    .map(|(id, result)| FetchReport::new(id, result, top))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for (id, result) in &results {
                    let name = service
                        .registry()
                        .get(id)
                        .map(|s| s.profile.display_name().to_string())
                        .unwrap_or_else(|| id.to_string());
                    print_ranking(&name, result, top, &format);
                }
                console::summary(
                    "Fetch",
                    &results
                        .iter()
                        .map(|(id, result)| {
                            let count = result.payload().map_or(0, |p| p.len());
                            (*id, format!("{} ({count} entries)", result.label()))
                        })
                        .collect::<Vec<_>>(),
                );
            }

            let unavailable: Vec<&str> = results
                .iter()
                .filter(|(_, r)| r.is_unavailable())
                .map(|(id, _)| *id)
                .collect();
            if !unavailable.is_empty() {
                return Err(AppError::extraction(
                    unavailable.join(", "),
                    "no ranking available",
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn fetched(count: u32) -> Cached<MergedResult> {
        Cached::Fetched {
            payload: Arc::new(MergedResult {
                entries: (1..=count)
                    .map(|i| RankedEntry::new(i, format!("Song {i}")))
                    .collect(),
                pages: vec![1],
                ..MergedResult::default()
            }),
            refreshed_at: Utc::now(),
        }
    }

    #[test]
    fn test_json_report_honors_top() {
        let result = fetched(5);
        let report = FetchReport::new("melon", &result, Some(2));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ranking"]["entries"].as_array().unwrap().len(), 2);
        assert_eq!(json["ranking"]["entries"][1]["rank"], 2);
        assert_eq!(json["ranking"]["pages"][0], 1);
    }

    #[test]
    fn test_json_report_without_top_keeps_everything() {
        let result = fetched(5);
        let json = serde_json::to_value(FetchReport::new("melon", &result, None)).unwrap();
        assert_eq!(json["ranking"]["entries"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_unavailable_report_has_no_ranking() {
        let result: Cached<MergedResult> = Cached::Unavailable {
            error: "timed out".into(),
        };
        let json = serde_json::to_value(FetchReport::new("bugs", &result, Some(2))).unwrap();
        assert!(json.get("ranking").is_none());
        assert_eq!(json["error"], "timed out");
    }
}
