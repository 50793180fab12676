use crate::utils::time::{default_since, parse_since};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "repo-scout")]
#[command(about = "Discover interesting new GitHub projects")]
pub struct Cli {
    /// Show results without posting to Discord or updating the seen-store
    #[arg(long)]
    pub dry_run: bool,

    /// Time range: relative (7d, 12h, 1m) or ISO date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<String>,

    /// Path to config file
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Path to the interest profile
    #[arg(long, default_value = "prompt.md")]
    pub prompt: PathBuf,

    /// Path to the seen-store database
    #[arg(long, default_value = "seen_repos.db")]
    pub cache: PathBuf,

    /// Path to the rejected repos log
    #[arg(long, default_value = "rejected_repos.log")]
    pub rejected_log: PathBuf,

    /// Minimum stars required (overrides config)
    #[arg(long)]
    pub min_stars: Option<u64>,
}

impl Cli {
    /// Lower bound of the creation window, relative to `now`.
    pub fn since(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        match &self.since {
            Some(value) => parse_since(value, now),
            None => Ok(default_since(now)),
        }
    }
}
