use std::collections::HashSet;
use std::fmt;

use log::{debug, info};

use crate::browser::{self, EntryKey, MapPage};
use crate::config::{FeedSettings, END_OF_LIST_TEXT, FEED, FEED_ENTRIES, SEARCH_BOX};
use crate::delay_manager;
use crate::error::{Error, Result};

/// Search string for `keyword` in `city`: `"{keyword} {city}"`.
pub fn compose_query(keyword: &str, city: &str) -> String {
    let keyword = keyword.trim();
    let city = city.trim();
    match (keyword.is_empty(), city.is_empty()) {
        (false, false) => format!("{} {}", keyword, city),
        (true, _) => city.to_string(),
        (false, true) => keyword.to_string(),
    }
}

/// Why the feed stopped loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEnd {
    /// The feed showed its end-of-list marker.
    EndOfList,
    /// A scroll brought no new entries before the settle deadline.
    Stalled,
    /// The entry count reached the configured maximum.
    Capped,
    /// The scroll round limit was hit.
    RoundLimit,
}

impl fmt::Display for FeedEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FeedEnd::EndOfList => "end of list reached",
            FeedEnd::Stalled => "no new entries loaded",
            FeedEnd::Capped => "result cap reached",
            FeedEnd::RoundLimit => "scroll limit reached",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Searching,
    Scrolling { round: usize, seen: usize },
    Done(FeedEnd),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedReport {
    pub keys: Vec<EntryKey>,
    pub end: FeedEnd,
    pub rounds: usize,
}

/// Drives one map search and loads its results feed.
pub struct SearchEngine<'a, P: MapPage + ?Sized> {
    page: &'a P,
    settings: &'a FeedSettings,
}

impl<'a, P: MapPage + ?Sized> SearchEngine<'a, P> {
    pub fn new(page: &'a P, settings: &'a FeedSettings) -> Self {
        SearchEngine { page, settings }
    }

    pub fn search(&self, query: &str) -> Result<FeedReport> {
        info!("Searching: {}", query);

        let mut state = FeedState::Idle;
        let mut rounds = 0;
        let end = loop {
            debug!("Feed state: {:?}", state);
            state = match state {
                FeedState::Idle => {
                    self.submit(query)?;
                    FeedState::Searching
                }
                FeedState::Searching => self.await_results()?,
                FeedState::Scrolling { round, seen } => match self.limit_reached(round, seen) {
                    Some(end) => FeedState::Done(end),
                    None => {
                        rounds += 1;
                        self.scroll_once(round, seen)?
                    }
                },
                FeedState::Done(end) => break end,
            };
        };

        let keys = self.collect_keys()?;
        info!(
            "Total cards found: {} after {} scrolls ({})",
            keys.len(),
            rounds,
            end
        );
        Ok(FeedReport { keys, end, rounds })
    }

    /// Runs `query` again after the tab has left the results, scrolling until
    /// `key` is back at its position. Used before clicking an unlinked entry.
    pub fn reopen(&self, query: &str, key: &EntryKey) -> Result<()> {
        debug!("Reloading results for entry {}", key.index + 1);
        self.submit(query)?;
        self.await_results()?;

        let mut rounds = 0;
        while self.page.count(FEED_ENTRIES)? <= key.index {
            if rounds >= self.settings.max_rounds || self.page.contains_text(END_OF_LIST_TEXT)? {
                return Err(Error::StaleEntry(key.index));
            }
            let before = self.page.count(FEED_ENTRIES)?;
            self.page.scroll_to_bottom(FEED)?;
            rounds += 1;
            let grew = delay_manager::wait_until(&self.settings.settle_wait, || {
                Ok(self.page.count(FEED_ENTRIES)? > before || self.page.contains_text(END_OF_LIST_TEXT)?)
            })?;
            if !grew {
                return Err(Error::StaleEntry(key.index));
            }
        }

        let current = self.page.entry_keys(FEED_ENTRIES)?;
        match current.get(key.index) {
            Some(found) if found.label == key.label && found.href == key.href => Ok(()),
            _ => Err(Error::StaleEntry(key.index)),
        }
    }

    fn submit(&self, query: &str) -> Result<()> {
        self.page.goto(&self.settings.maps_url)?;
        browser::wait_for_selector(self.page, SEARCH_BOX, &self.settings.page_wait)?;
        self.page.submit_search(SEARCH_BOX, query)
    }

    fn await_results(&self) -> Result<FeedState> {
        browser::wait_for_selector(self.page, FEED, &self.settings.page_wait)?;
        delay_manager::wait_until(&self.settings.settle_wait, || {
            Ok(self.listing_count()? > 0 || self.page.contains_text(END_OF_LIST_TEXT)?)
        })?;

        let seen = self.listing_count()?;
        if seen == 0 {
            info!("Feed is empty.");
            return Ok(FeedState::Done(FeedEnd::Stalled));
        }
        Ok(FeedState::Scrolling { round: 0, seen })
    }

    fn limit_reached(&self, round: usize, seen: usize) -> Option<FeedEnd> {
        if seen >= self.settings.max_results {
            Some(FeedEnd::Capped)
        } else if round >= self.settings.max_rounds {
            Some(FeedEnd::RoundLimit)
        } else {
            None
        }
    }

    fn scroll_once(&self, round: usize, seen: usize) -> Result<FeedState> {
        self.page.scroll_to_bottom(FEED)?;
        delay_manager::wait_until(&self.settings.settle_wait, || {
            Ok(self.listing_count()? > seen || self.page.contains_text(END_OF_LIST_TEXT)?)
        })?;

        let count = self.listing_count()?;
        debug!("Scroll {}: {} -> {} entries", round + 1, seen, count);

        let next = if self.page.contains_text(END_OF_LIST_TEXT)? {
            FeedState::Done(FeedEnd::EndOfList)
        } else if count <= seen {
            FeedState::Done(FeedEnd::Stalled)
        } else if count >= self.settings.max_results {
            FeedState::Done(FeedEnd::Capped)
        } else {
            FeedState::Scrolling {
                round: round + 1,
                seen: count,
            }
        };
        Ok(next)
    }

    /// Distinct listings loaded so far. A result card and the link inside it
    /// both match the entry selector but share one place link.
    fn listing_count(&self) -> Result<usize> {
        Ok(self.unique_keys()?.len())
    }

    fn unique_keys(&self) -> Result<Vec<EntryKey>> {
        let mut seen_links = HashSet::new();
        let keys = self
            .page
            .entry_keys(FEED_ENTRIES)?
            .into_iter()
            .filter(|key| match &key.href {
                Some(href) => seen_links.insert(href.clone()),
                None => true,
            })
            .collect();
        Ok(keys)
    }

    /// Keys for every loaded listing, capped at the result limit.
    fn collect_keys(&self) -> Result<Vec<EntryKey>> {
        let mut keys = self.unique_keys()?;
        keys.truncate(self.settings.max_results);
        Ok(keys)
    }
}
