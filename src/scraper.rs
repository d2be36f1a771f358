use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;
use log::{debug, info, warn};
use url::Url;

use crate::config::HarvestSettings;
use crate::error::{Error, Result};
use crate::extractor::Extractor;

/// Outcome of mining one website for email addresses.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Harvest {
    pub emails: Vec<String>,
    pub status: ScrapeStatus,
    /// Pages that yielded at least one address.
    pub source_pages: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStatus {
    Success,
    #[default]
    NoData,
    Blocked,
    Error,
}

/// Anything that can turn a website into email addresses.
pub trait EmailSource {
    fn harvest(&self, website: &str) -> Harvest;
}

pub struct Scraper {
    client: Client,
    extractor: Extractor,
    max_contact_pages: usize,
}

impl Scraper {
    pub fn new(settings: &HarvestSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("it-IT,it;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        if let Ok(agent) = HeaderValue::from_str(&settings.user_agent) {
            headers.insert(USER_AGENT, agent);
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .cookie_store(true)
            .build()?;

        Ok(Scraper {
            client,
            extractor: Extractor::new()?,
            max_contact_pages: settings.max_contact_pages,
        })
    }

    /// Runs the harvest with a caller-supplied page fetcher.
    ///
    /// The home page is scanned first; only when it has no address are its
    /// contact-like links probed, stopping at the first page with a match.
    pub fn harvest_with<F>(&self, website: &str, mut fetch: F) -> Harvest
    where
        F: FnMut(&str) -> Result<String>,
    {
        let mut result = Harvest::default();

        let base_url = match parse_site_url(website) {
            Ok(u) => u,
            Err(e) => {
                warn!("{}", e);
                result.status = ScrapeStatus::Error;
                return result;
            }
        };

        debug!("Visiting: {}", base_url);
        let home = match fetch(base_url.as_str()) {
            Ok(html) => html,
            Err(Error::Blocked(code)) => {
                warn!("Blocked at {}: {}", base_url, code);
                result.status = ScrapeStatus::Blocked;
                return result;
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", base_url, e);
                result.status = ScrapeStatus::Error;
                return result;
            }
        };

        let emails = self.extractor.extract_emails_from_html(&home);
        if !emails.is_empty() {
            result.emails = emails;
            result.source_pages.push(base_url.to_string());
            result.status = ScrapeStatus::Success;
            return result;
        }

        let candidates = self
            .extractor
            .discover_contact_links(&home, &base_url, self.max_contact_pages);
        for link in candidates {
            debug!("Visiting contact page: {}", link);
            match fetch(&link) {
                Ok(html) => {
                    let emails = self.extractor.extract_emails_from_html(&html);
                    if !emails.is_empty() {
                        result.emails = emails;
                        result.source_pages.push(link);
                        result.status = ScrapeStatus::Success;
                        return result;
                    }
                }
                Err(e) => warn!("Failed to fetch {}: {}", link, e),
            }
        }

        result.status = ScrapeStatus::NoData;
        result
    }

    fn visit_page(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send()?;

        let status = resp.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::Blocked(status.as_u16()));
        }
        Ok(resp.text()?)
    }
}

impl EmailSource for Scraper {
    fn harvest(&self, website: &str) -> Harvest {
        let harvest = self.harvest_with(website, |url| self.visit_page(url));
        if harvest.status == ScrapeStatus::Success {
            info!("Found {} email(s) on {}", harvest.emails.len(), website);
        }
        harvest
    }
}

/// Parses a listing's website, assuming `http://` when the scheme is missing.
fn parse_site_url(website: &str) -> Result<Url> {
    let website = website.trim();
    let parsed = match Url::parse(website) {
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{}", website)),
        other => other,
    };
    parsed.map_err(|source| Error::Url {
        url: website.to_string(),
        source,
    })
}
