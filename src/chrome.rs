use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{debug, info};
use serde_json::Value;

use crate::browser::{EntryKey, MapPage};
use crate::error::{Error, Result};

/// A single Chrome tab driven over the DevTools protocol.
pub struct ChromeSession {
    // Dropping the browser kills the Chrome process.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    pub fn launch(headless: bool, page_timeout: Duration) -> Result<Self> {
        info!("Launching Chrome (headless: {})...", headless);
        let browser = Browser::new(LaunchOptions {
            headless,
            window_size: Some((1366, 900)),
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        })?;

        let tab = browser.new_tab()?;
        tab.set_default_timeout(page_timeout);

        Ok(ChromeSession {
            _browser: browser,
            tab,
        })
    }

    fn eval(&self, script: &str) -> Result<Value> {
        let remote = self.tab.evaluate(script, false)?;
        Ok(remote.value.unwrap_or(Value::Null))
    }

    fn eval_optional_string(&self, script: &str) -> Result<Option<String>> {
        match self.eval(script)? {
            Value::String(s) => Ok(Some(s)),
            Value::Null => Ok(None),
            other => Ok(Some(other.to_string())),
        }
    }
}

/// Quotes `s` as a JavaScript string literal.
fn js_str(s: &str) -> Result<String> {
    Ok(serde_json::to_string(s)?)
}

impl MapPage for ChromeSession {
    fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.tab.navigate_to(url)?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }

    fn submit_search(&self, input_selector: &str, query: &str) -> Result<()> {
        let input = self.tab.wait_for_element(input_selector)?;
        input.click()?;
        self.eval(&format!(
            "(() => {{ const el = document.querySelector({}); if (el) {{ el.value = ''; }} }})()",
            js_str(input_selector)?
        ))?;
        self.tab.type_str(query)?;
        self.tab.press_key("Enter")?;
        Ok(())
    }

    fn scroll_to_bottom(&self, selector: &str) -> Result<()> {
        let scrolled = self.eval(&format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) {{ return false; }} el.scrollTo(0, el.scrollHeight); return true; }})()",
            js_str(selector)?
        ))?;
        if scrolled.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(Error::Browser(anyhow::anyhow!("nothing to scroll at '{}'", selector)))
        }
    }

    fn count(&self, selector: &str) -> Result<usize> {
        let count = self.eval(&format!(
            "document.querySelectorAll({}).length",
            js_str(selector)?
        ))?;
        Ok(count.as_u64().unwrap_or(0) as usize)
    }

    fn contains_text(&self, needle: &str) -> Result<bool> {
        let found = self.eval(&format!(
            "!!(document.body && document.body.innerText.includes({}))",
            js_str(needle)?
        ))?;
        Ok(found.as_bool().unwrap_or(false))
    }

    fn click_nth(&self, selector: &str, index: usize) -> Result<()> {
        let clicked = self.eval(&format!(
            "(() => {{ const el = document.querySelectorAll({})[{}]; \
             if (!el) {{ return false; }} el.scrollIntoView({{block: 'center'}}); el.click(); return true; }})()",
            js_str(selector)?,
            index
        ))?;
        if clicked.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(Error::Browser(anyhow::anyhow!(
                "no entry {} for '{}'",
                index,
                selector
            )))
        }
    }

    fn text(&self, selector: &str) -> Result<Option<String>> {
        self.eval_optional_string(&format!(
            "(() => {{ const el = document.querySelector({}); \
             return el ? (el.innerText || el.textContent || '').trim() : null; }})()",
            js_str(selector)?
        ))
    }

    fn attr(&self, selector: &str, name: &str) -> Result<Option<String>> {
        self.eval_optional_string(&format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute({}) : null; }})()",
            js_str(selector)?,
            js_str(name)?
        ))
    }

    fn entry_keys(&self, selector: &str) -> Result<Vec<EntryKey>> {
        // Objects don't come back by value, so the keys travel as a JSON string.
        let json = self.eval(&format!(
            "JSON.stringify(Array.from(document.querySelectorAll({})).map((el, index) => {{ \
               const link = el.matches('a[href]') ? el : el.querySelector('a[href]'); \
               const label = el.getAttribute('aria-label') || (link && link.getAttribute('aria-label')) || null; \
               return {{ index, label, href: link ? link.href : null }}; \
             }}))",
            js_str(selector)?
        ))?;
        match json {
            Value::String(s) => Ok(serde_json::from_str(&s)?),
            _ => Ok(Vec::new()),
        }
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }
}
