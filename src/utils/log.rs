// src/utils/log.rs

//! CLI console output.
//!
//! Operator-facing lines carry a local timestamp and a tag. Status lines go
//! to stdout; warnings and errors go to stderr so `fetch --json` output
//! stays parseable. Library code logs through the `log` facade instead.

use std::sync::OnceLock;

use chrono::Local;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    /// Console threshold for a `logging.level` setting. `debug` and
    /// `trace` show everything the console prints.
    fn threshold(setting: &str) -> Self {
        match setting.trim().to_ascii_lowercase().as_str() {
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }
}

static THRESHOLD: OnceLock<Level> = OnceLock::new();

/// Set the console threshold. Only the first call takes effect.
pub fn init(level: &str) {
    let _ = THRESHOLD.set(Level::threshold(level));
}

fn enabled(level: Level) -> bool {
    level >= THRESHOLD.get().copied().unwrap_or(Level::Info)
}

fn line(tag: &str, message: &str) -> String {
    format!("[{}] [{tag}] {message}", Local::now().format("%H:%M:%S"))
}

fn emit(level: Level, tag: &str, message: &str) {
    if !enabled(level) {
        return;
    }
    match level {
        Level::Info => println!("{}", line(tag, message)),
        Level::Warn | Level::Error => eprintln!("{}", line(tag, message)),
    }
}

pub fn info(message: &str) {
    emit(Level::Info, "INFO", message);
}

pub fn warn(message: &str) {
    emit(Level::Warn, "WARN", message);
}

pub fn error(message: &str) {
    emit(Level::Error, "ERROR", message);
}

/// A completed check; shown at the info threshold.
pub fn success(message: &str) {
    emit(Level::Info, "OK", message);
}

/// Section title, e.g. one ranking's source and freshness.
pub fn header(title: &str) {
    if enabled(Level::Info) {
        println!();
        println!("{}", line("INFO", &format!("== {title} ==")));
    }
}

pub fn sub_item(message: &str) {
    emit(Level::Info, "INFO", &format!("   {message}"));
}

/// Per-source outcome table printed after a batch.
pub fn summary(title: &str, items: &[(&str, String)]) {
    if !enabled(Level::Info) {
        return;
    }
    let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    println!();
    println!("{}", line("SUMMARY", title));
    for (key, value) in items {
        println!("{}", line("SUMMARY", &format!("   {key:<width$}  {value}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_parsing() {
        assert_eq!(Level::threshold("WARN"), Level::Warn);
        assert_eq!(Level::threshold(" warning "), Level::Warn);
        assert_eq!(Level::threshold("error"), Level::Error);
        assert_eq!(Level::threshold("debug"), Level::Info);
        assert_eq!(Level::threshold("nonsense"), Level::Info);
    }

    #[test]
    fn test_line_carries_tag() {
        let line = line("WARN", "page 2 missing");
        assert!(line.ends_with("[WARN] page 2 missing"));
        assert!(line.starts_with('['));
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }
}
