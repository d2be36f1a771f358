use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::delay_manager::Backoff;
use crate::error::{Error, Result};
use crate::input_loader;

pub const DEFAULT_KEYWORD: &str = "Amministratore di condominio";
pub const DEFAULT_MAPS_URL: &str = "https://www.google.com/maps?hl=en";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// Page locations in the map UI.
pub const SEARCH_BOX: &str = "#searchboxinput";
pub const FEED: &str = "div[role='feed']";
pub const FEED_ENTRIES: &str = ".hfpxzc, div[role='article']";
pub const END_OF_LIST_TEXT: &str = "You've reached the end of the list.";
pub const DETAIL_NAME: &str = "h1.DUwDvf";
pub const DETAIL_ADDRESS: &str = "button[data-item-id=\"address\"]";
pub const DETAIL_PHONE: &str = "button[data-item-id*=\"phone\"]";
pub const DETAIL_WEBSITE: &str = "a[data-item-id*=\"authority\"]";

#[derive(Parser, Debug)]
#[command(name = "maps-lead-scraper")]
#[command(about = "Collects business listings and contact emails from map search results")]
#[command(version)]
pub struct Cli {
    /// Search keyword; repeat for several
    #[arg(short, long = "keyword", default_value = DEFAULT_KEYWORD)]
    pub keywords: Vec<String>,

    /// Target city; repeat for several
    #[arg(short, long = "city")]
    pub cities: Vec<String>,

    /// CSV or XLSX file with a cities column
    #[arg(long)]
    pub cities_file: Option<PathBuf>,

    #[arg(short, long, default_value = "results.csv")]
    pub output: PathBuf,

    /// Stop loading a feed once it holds this many entries
    #[arg(long, default_value_t = 200)]
    pub max_results: usize,

    /// Upper bound on scroll rounds per feed
    #[arg(long, default_value_t = 500)]
    pub max_scrolls: usize,

    /// Contact pages probed per website when the home page has no email
    #[arg(long, default_value_t = 5)]
    pub contact_pages: usize,

    #[arg(long, default_value_t = 12)]
    pub http_timeout_secs: u64,

    /// Deadline for the search box, feed and detail panel to render
    #[arg(long, default_value_t = 60)]
    pub page_timeout_secs: u64,

    /// How long a scroll may go without new entries before the feed counts as stalled
    #[arg(long, default_value_t = 8)]
    pub settle_timeout_secs: u64,

    #[arg(long, default_value = DEFAULT_MAPS_URL)]
    pub maps_url: String,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Rewrite the output file after every city
    #[arg(long)]
    pub checkpoint_each_city: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub maps_url: String,
    pub max_results: usize,
    pub max_rounds: usize,
    pub page_wait: Backoff,
    pub settle_wait: Backoff,
}

#[derive(Debug, Clone)]
pub struct DetailSettings {
    pub heading_wait: Backoff,
    pub retry: Backoff,
    pub attempts: u32,
    pub pause_ms: RangeInclusive<u64>,
}

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_contact_pages: usize,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub keywords: Vec<String>,
    pub cities: Vec<String>,
    pub output: PathBuf,
    pub headless: bool,
    pub checkpoint_each_city: bool,
    pub feed: FeedSettings,
    pub detail: DetailSettings,
    pub harvest: HarvestSettings,
}

impl RunConfig {
    /// Resolves the command line, loading `--cities-file` if given.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut cities = cli.cities.clone();
        if let Some(path) = &cli.cities_file {
            cities.extend(input_loader::load_cities(path)?);
        }
        let cities = dedup_trimmed(cities);
        if cities.is_empty() {
            return Err(Error::Config(
                "no cities given; pass --city or --cities-file".to_string(),
            ));
        }

        let keywords = dedup_trimmed(cli.keywords.clone());
        if keywords.is_empty() {
            return Err(Error::Config("no search keywords given".to_string()));
        }

        let page_wait = Backoff::polling(Duration::from_secs(cli.page_timeout_secs));

        Ok(RunConfig {
            keywords,
            cities,
            output: cli.output.clone(),
            headless: !cli.headed,
            checkpoint_each_city: cli.checkpoint_each_city,
            feed: FeedSettings {
                maps_url: cli.maps_url.clone(),
                max_results: cli.max_results,
                max_rounds: cli.max_scrolls,
                page_wait,
                settle_wait: Backoff::polling(Duration::from_secs(cli.settle_timeout_secs)),
            },
            detail: DetailSettings {
                heading_wait: Backoff::polling(Duration::from_secs(cli.page_timeout_secs.min(30))),
                retry: Backoff::new(
                    Duration::from_millis(300),
                    Duration::from_secs(2),
                    Duration::from_secs(5),
                ),
                attempts: 3,
                pause_ms: 800..=1600,
            },
            harvest: HarvestSettings {
                timeout: Duration::from_secs(cli.http_timeout_secs),
                user_agent: DEFAULT_USER_AGENT.to_string(),
                max_contact_pages: cli.contact_pages,
            },
        })
    }
}

/// Trims, drops blanks and removes case-insensitive duplicates, keeping first occurrence.
fn dedup_trimmed(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(value)) {
            out.push(value.to_string());
        }
    }
    out
}
