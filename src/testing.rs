//! Scripted stand-in for a browser tab, used by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::browser::{EntryKey, MapPage};
use crate::config::{
    DETAIL_ADDRESS, DETAIL_NAME, DETAIL_PHONE, DETAIL_WEBSITE, END_OF_LIST_TEXT, FEED,
    FEED_ENTRIES, SEARCH_BOX,
};
use crate::error::{Error, Result};

pub const MAPS_HOME: &str = "https://maps.example/";

/// Any top-level heading, which the results page has as well.
const PAGE_HEADING: &str = "h1";
const RESULTS_HEADING: &str = "Results";

#[derive(Debug, Clone, Default)]
pub struct DetailPanel {
    /// Place name heading; `None` while it has not rendered.
    pub name: Option<String>,
    /// Unrelated `h1` shown next to the panel.
    pub heading: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    /// Number of upcoming field reads that fail like a detached target.
    pub failing_reads: usize,
}

/// How a results feed grows as it is scrolled.
#[derive(Debug, Clone, Default)]
pub struct FeedScript {
    /// Visible entry count after 0, 1, 2... scrolls; the last value repeats.
    pub counts: Vec<usize>,
    /// Show the end-of-list marker once the last count is reached.
    pub end_marker: bool,
    /// `(label, href)` per entry position.
    pub entries: Vec<(Option<String>, Option<String>)>,
}

impl FeedScript {
    /// A feed whose entries link to `{MAPS_HOME}place/{prefix}-{i}`.
    pub fn linked(prefix: &str, counts: Vec<usize>, end_marker: bool) -> Self {
        let total = counts.iter().copied().max().unwrap_or(0);
        let entries = (0..total)
            .map(|i| {
                (
                    Some(format!("{} {}", prefix, i)),
                    Some(format!("{}place/{}-{}", MAPS_HOME, prefix, i)),
                )
            })
            .collect();
        FeedScript {
            counts,
            end_marker,
            entries,
        }
    }
}

#[derive(Default)]
pub struct ScriptedPage {
    current_url: RefCell<String>,
    no_search_box: Cell<bool>,
    feeds: RefCell<HashMap<String, FeedScript>>,
    active_feed: RefCell<Option<FeedScript>>,
    scrolls: Cell<usize>,
    panels: RefCell<HashMap<String, DetailPanel>>,
    click_targets: RefCell<HashMap<usize, String>>,
    clicked: RefCell<Vec<usize>>,
    queries: RefCell<Vec<String>>,
}

impl ScriptedPage {
    pub fn add_feed(&self, query: &str, feed: FeedScript) {
        self.feeds.borrow_mut().insert(query.to_string(), feed);
    }

    pub fn add_panel(&self, url: &str, panel: DetailPanel) {
        self.panels.borrow_mut().insert(url.to_string(), panel);
    }

    pub fn set_click_target(&self, index: usize, url: &str) {
        self.click_targets.borrow_mut().insert(index, url.to_string());
    }

    pub fn remove_search_box(&self) {
        self.no_search_box.set(true);
    }

    pub fn clicked(&self) -> Vec<usize> {
        self.clicked.borrow().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.get()
    }

    fn visible_entries(&self) -> usize {
        match &*self.active_feed.borrow() {
            Some(feed) if !feed.counts.is_empty() => {
                feed.counts[self.scrolls.get().min(feed.counts.len() - 1)]
            }
            _ => 0,
        }
    }

    fn end_marker_shown(&self) -> bool {
        match &*self.active_feed.borrow() {
            Some(feed) if feed.end_marker && !feed.counts.is_empty() => {
                self.scrolls.get() >= feed.counts.len() - 1
            }
            _ => false,
        }
    }

    fn read_panel<F>(&self, field: F) -> Result<Option<String>>
    where
        F: Fn(&DetailPanel) -> Option<String>,
    {
        let url = self.current_url.borrow().clone();
        let mut panels = self.panels.borrow_mut();
        let Some(panel) = panels.get_mut(&url) else {
            return Ok(None);
        };
        if panel.failing_reads > 0 {
            panel.failing_reads -= 1;
            return Err(Error::Browser(anyhow::anyhow!("target detached")));
        }
        Ok(field(panel))
    }
}

impl MapPage for ScriptedPage {
    fn goto(&self, url: &str) -> Result<()> {
        // Any navigation replaces the results feed.
        self.active_feed.replace(None);
        self.scrolls.set(0);
        self.current_url.replace(url.to_string());
        Ok(())
    }

    fn submit_search(&self, input_selector: &str, query: &str) -> Result<()> {
        if self.count(input_selector)? == 0 {
            return Err(Error::Browser(anyhow::anyhow!("no search box")));
        }
        self.queries.borrow_mut().push(query.to_string());
        let feed = self.feeds.borrow().get(query).cloned();
        self.active_feed.replace(feed);
        self.scrolls.set(0);
        Ok(())
    }

    fn scroll_to_bottom(&self, selector: &str) -> Result<()> {
        if selector != FEED || self.active_feed.borrow().is_none() {
            return Err(Error::Browser(anyhow::anyhow!("nothing to scroll")));
        }
        self.scrolls.set(self.scrolls.get() + 1);
        Ok(())
    }

    fn count(&self, selector: &str) -> Result<usize> {
        let count = match selector {
            SEARCH_BOX => {
                usize::from(*self.current_url.borrow() == MAPS_HOME && !self.no_search_box.get())
            }
            FEED => usize::from(self.active_feed.borrow().is_some()),
            FEED_ENTRIES => self.visible_entries(),
            DETAIL_NAME => usize::from(
                self.panels
                    .borrow()
                    .get(self.current_url.borrow().as_str())
                    .map_or(false, |panel| panel.name.is_some()),
            ),
            PAGE_HEADING => usize::from(self.text(PAGE_HEADING)?.is_some()),
            _ => 0,
        };
        Ok(count)
    }

    fn contains_text(&self, needle: &str) -> Result<bool> {
        Ok(needle == END_OF_LIST_TEXT && self.end_marker_shown())
    }

    fn click_nth(&self, selector: &str, index: usize) -> Result<()> {
        if selector != FEED_ENTRIES || index >= self.visible_entries() {
            return Err(Error::Browser(anyhow::anyhow!("no entry {}", index)));
        }
        let target = self.click_targets.borrow().get(&index).cloned();
        let Some(target) = target else {
            return Err(Error::Browser(anyhow::anyhow!("entry {} is not clickable", index)));
        };
        self.clicked.borrow_mut().push(index);
        self.active_feed.replace(None);
        self.current_url.replace(target);
        Ok(())
    }

    fn text(&self, selector: &str) -> Result<Option<String>> {
        match selector {
            DETAIL_NAME => self.read_panel(|p| p.name.clone()),
            PAGE_HEADING => {
                if self.active_feed.borrow().is_some() {
                    return Ok(Some(RESULTS_HEADING.to_string()));
                }
                let url = self.current_url.borrow().clone();
                let heading = self
                    .panels
                    .borrow()
                    .get(&url)
                    .and_then(|p| p.heading.clone().or_else(|| p.name.clone()));
                Ok(heading)
            }
            DETAIL_ADDRESS => self.read_panel(|p| p.address.clone()),
            DETAIL_PHONE => self.read_panel(|p| p.phone.clone()),
            _ => Ok(None),
        }
    }

    fn attr(&self, selector: &str, name: &str) -> Result<Option<String>> {
        if selector == DETAIL_WEBSITE && name == "href" {
            self.read_panel(|p| p.website.clone())
        } else {
            Ok(None)
        }
    }

    fn entry_keys(&self, selector: &str) -> Result<Vec<EntryKey>> {
        if selector != FEED_ENTRIES {
            return Ok(Vec::new());
        }
        let visible = self.visible_entries();
        let feed = self.active_feed.borrow();
        let entries = feed.as_ref().map(|f| f.entries.as_slice()).unwrap_or(&[]);
        Ok((0..visible)
            .map(|index| {
                let (label, href) = entries.get(index).cloned().unwrap_or((None, None));
                EntryKey { index, label, href }
            })
            .collect())
    }

    fn current_url(&self) -> String {
        self.current_url.borrow().clone()
    }
}
