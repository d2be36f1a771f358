use std::time::Duration;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Browser error: {0}")]
    Browser(#[from] anyhow::Error),

    #[error("Timed out after {elapsed:?} waiting for {what}")]
    Timeout { what: String, elapsed: Duration },

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Reqwest Error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blocked with HTTP status {0}")]
    Blocked(u16),

    #[error("Invalid URL '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet Error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected script result: {0}")]
    Script(#[from] serde_json::Error),

    #[error("Feed entry {0} is no longer at its position")]
    StaleEntry(usize),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Browser(_) | Error::Timeout { .. } => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
