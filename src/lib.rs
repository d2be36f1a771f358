pub mod browser;
pub mod chrome;
pub mod config;
pub mod delay_manager;
pub mod error;
pub mod extractor;
pub mod input_loader;
pub mod listing;
pub mod logger;
pub mod pipeline;
pub mod row_sink;
pub mod scraper;
pub mod search_engine;

#[cfg(test)]
mod testing;

// Exporting types for convenience
pub use browser::{EntryKey, MapPage};
pub use chrome::ChromeSession;
pub use config::{Cli, RunConfig};
pub use error::{Error, Result};
pub use extractor::Extractor;
pub use listing::ListingRecord;
pub use pipeline::{Pipeline, RunSummary};
pub use row_sink::RowSink;
pub use scraper::{EmailSource, ScrapeStatus, Scraper};
pub use search_engine::SearchEngine;
