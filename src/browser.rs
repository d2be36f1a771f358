//! The page operations the pipeline needs from an automated browser.
//!
//! [`MapPage`] is implemented for a real Chrome tab in [`crate::chrome`] and by a
//! scripted page in tests.

use serde::Deserialize;

use crate::delay_manager::{self, Backoff};
use crate::error::Result;

/// A feed entry identified before any detail panel is opened.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct EntryKey {
    /// Position in the feed when the keys were collected.
    pub index: usize,
    /// Accessible label of the entry, usually the business name.
    pub label: Option<String>,
    /// Absolute link to the place detail page.
    pub href: Option<String>,
}

/// Outcome of reading one field from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    /// The element is absent or has no content.
    Missing,
    /// The browser failed while reading the element.
    Failed(String),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Missing | Lookup::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Lookup::Failed(_))
    }
}

impl Lookup<String> {
    /// Classifies a raw read: empty text counts as missing.
    pub fn from_read(read: Result<Option<String>>) -> Self {
        match read {
            Ok(Some(value)) => {
                let value = value.trim();
                if value.is_empty() {
                    Lookup::Missing
                } else {
                    Lookup::Found(value.to_string())
                }
            }
            Ok(None) => Lookup::Missing,
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }
}

pub trait MapPage {
    fn goto(&self, url: &str) -> Result<()>;

    /// Focuses `input_selector`, replaces its value with `query` and presses Enter.
    fn submit_search(&self, input_selector: &str, query: &str) -> Result<()>;

    /// Scrolls the first element matching `selector` to its bottom edge.
    fn scroll_to_bottom(&self, selector: &str) -> Result<()>;

    fn count(&self, selector: &str) -> Result<usize>;

    fn contains_text(&self, needle: &str) -> Result<bool>;

    fn click_nth(&self, selector: &str, index: usize) -> Result<()>;

    /// Trimmed text of the first element matching `selector`, `None` if absent.
    fn text(&self, selector: &str) -> Result<Option<String>>;

    fn attr(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// Label and link of every element matching `selector`, in document order.
    fn entry_keys(&self, selector: &str) -> Result<Vec<EntryKey>>;

    fn current_url(&self) -> String;
}

/// Waits until at least one element matches `selector`.
pub fn wait_for_selector<P: MapPage + ?Sized>(
    page: &P,
    selector: &str,
    policy: &Backoff,
) -> Result<()> {
    delay_manager::wait_for(policy, selector, || Ok(page.count(selector)? > 0))
}
