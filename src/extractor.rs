use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{Error, Result};

/// Link texts (lowercase) that suggest a contact page, Italian and English.
pub const CONTACT_KEYWORDS: [&str; 5] = ["contatti", "contact", "chi siamo", "chi-siamo", "about"];

const IMAGE_SUFFIXES: [&str; 6] = [".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg"];

pub struct Extractor {
    email_regex: Regex,
    exact_email_regex: Regex,
    anchor_selector: Selector,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Extractor {
            email_regex: Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}")?,
            exact_email_regex: Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$")?,
            anchor_selector: create_selector("a[href]")?,
        })
    }

    /// Email-like substrings of `text`, lowercased, deduplicated in first-seen order.
    pub fn extract_emails(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.email_regex
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|email| !looks_like_asset(email))
            .filter(|email| seen.insert(email.clone()))
            .collect()
    }

    /// Every address on a page: `mailto:` targets first, then matches in visible text.
    pub fn extract_emails_from_html(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut emails = Vec::new();

        for anchor in document.select(&self.anchor_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            for email in self.mailto_addresses(href) {
                if seen.insert(email.clone()) {
                    emails.push(email);
                }
            }
        }

        for email in self.extract_emails(&visible_text(&document)) {
            if seen.insert(email.clone()) {
                emails.push(email);
            }
        }
        emails
    }

    /// Addresses named by a `mailto:` href. The scheme match ignores case and
    /// the address part may be percent-encoded.
    pub fn mailto_addresses(&self, href: &str) -> Vec<String> {
        let href = href.trim();
        let Some(scheme) = href.get(..7) else {
            return Vec::new();
        };
        if !scheme.eq_ignore_ascii_case("mailto:") {
            return Vec::new();
        }

        let target = href[7..].split('?').next().unwrap_or("");
        let decoded = urlencoding::decode(target)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| target.to_string());

        decoded
            .split(',')
            .map(|part| part.trim().to_lowercase())
            .filter(|email| self.exact_email_regex.is_match(email))
            .collect()
    }

    /// Absolute URLs of same-host anchors whose link text looks like a contact page,
    /// deduplicated in document order and capped at `limit`.
    pub fn discover_contact_links(&self, html: &str, base_url: &Url, limit: usize) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for anchor in document.select(&self.anchor_selector) {
            if links.len() >= limit {
                break;
            }
            if !is_contact_anchor(&anchor) {
                continue;
            }
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Ok(joined) = base_url.join(href.trim()) else {
                continue;
            };
            if !matches!(joined.scheme(), "http" | "https") {
                continue;
            }
            if !same_site(&joined, base_url) {
                continue;
            }
            let link = joined.to_string();
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }
        links
    }
}

pub(crate) fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::Selector(sel_str.into()))
}

fn is_contact_anchor(anchor: &ElementRef<'_>) -> bool {
    let text = anchor.text().collect::<String>().to_lowercase();
    CONTACT_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

/// Same host, ignoring a leading `www.` on either side.
fn same_site(link: &Url, base: &Url) -> bool {
    fn bare(url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
    }
    matches!((bare(link), bare(base)), (Some(a), Some(b)) if a == b)
}

fn looks_like_asset(email: &str) -> bool {
    IMAGE_SUFFIXES.iter().any(|suffix| email.ends_with(suffix))
}

/// Text a reader would see: every text node outside script-like elements.
fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |el| matches!(el.name(), "script" | "style" | "noscript" | "template"))
        });
        if !hidden {
            let fragment = fragment.trim();
            if !fragment.is_empty() {
                text.push_str(fragment);
                text.push(' ');
            }
        }
    }
    text
}
