use log::{debug, warn};

use crate::browser::{self, EntryKey, Lookup, MapPage};
use crate::config::{
    DetailSettings, DETAIL_ADDRESS, DETAIL_NAME, DETAIL_PHONE, DETAIL_WEBSITE, FEED_ENTRIES,
};
use crate::delay_manager;
use crate::error::Result;

/// Separator used when a record holds several email addresses.
pub const EMAIL_SEPARATOR: &str = "; ";

/// One business listing, flattened for the output file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingRecord {
    pub name: String,
    pub address: Option<String>,
    pub city: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub emails: Vec<String>,
    pub source_url: String,
}

impl ListingRecord {
    pub fn email_field(&self) -> String {
        self.emails.join(EMAIL_SEPARATOR)
    }
}

/// Fields read from a listing's detail panel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingDetails {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub source_url: String,
}

impl ListingDetails {
    pub fn into_record(self, city: &str, emails: Vec<String>) -> ListingRecord {
        ListingRecord {
            name: self.name,
            address: self.address,
            city: city.to_string(),
            phone: self.phone,
            website: self.website,
            emails,
            source_url: self.source_url,
        }
    }
}

pub struct ListingExtractor<'a, P: MapPage + ?Sized> {
    page: &'a P,
    settings: &'a DetailSettings,
}

impl<'a, P: MapPage + ?Sized> ListingExtractor<'a, P> {
    pub fn new(page: &'a P, settings: &'a DetailSettings) -> Self {
        ListingExtractor { page, settings }
    }

    /// Opens the entry's detail panel and reads its fields.
    ///
    /// Errors only when the panel cannot be opened; individual fields that are
    /// absent or unreadable come back empty.
    pub fn extract(&self, key: &EntryKey) -> Result<ListingDetails> {
        match &key.href {
            Some(href) => self.page.goto(href)?,
            None => self.page.click_nth(FEED_ENTRIES, key.index)?,
        }
        browser::wait_for_selector(self.page, DETAIL_NAME, &self.settings.heading_wait)?;

        let name = self
            .lookup("name", || self.page.text(DETAIL_NAME))
            .found()
            .or_else(|| key.label.clone().filter(|label| !label.trim().is_empty()))
            .unwrap_or_else(|| "N/A".to_string());

        let address = self.lookup("address", || self.page.text(DETAIL_ADDRESS)).found();
        let phone = self.lookup("phone", || self.page.text(DETAIL_PHONE)).found();
        let website = self
            .lookup("website", || self.page.attr(DETAIL_WEBSITE, "href"))
            .found();

        Ok(ListingDetails {
            name,
            address: address.map(|a| clean_field(&a)),
            phone: phone.map(|p| clean_field(&p)),
            website,
            source_url: self.page.current_url(),
        })
    }

    /// Reads one field, retrying only reads that failed rather than came back empty.
    fn lookup<F>(&self, field: &str, read: F) -> Lookup<String>
    where
        F: FnMut() -> Result<Option<String>>,
    {
        let lookup = Lookup::from_read(delay_manager::retry_transient(
            &self.settings.retry,
            self.settings.attempts,
            read,
        ));
        match &lookup {
            Lookup::Found(_) => {}
            Lookup::Missing => debug!("No {} on detail panel", field),
            Lookup::Failed(reason) => warn!("Could not read {}: {}", field, reason),
        }
        lookup
    }
}

/// Collapses the icon glyphs and line breaks the detail buttons carry around their text.
fn clean_field(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || is_private_use(c))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_private_use(c: char) -> bool {
    matches!(c as u32, 0xE000..=0xF8FF)
}
