use log::{error, info, warn};

use crate::browser::MapPage;
use crate::config::RunConfig;
use crate::delay_manager;
use crate::error::Result;
use crate::listing::ListingExtractor;
use crate::row_sink::RowSink;
use crate::scraper::{EmailSource, ScrapeStatus};
use crate::search_engine::{compose_query, SearchEngine};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub cities: usize,
    pub queries: usize,
    pub failed_queries: usize,
    pub listings: usize,
    pub skipped: usize,
    pub with_email: usize,
}

/// Runs every keyword for every city, one listing at a time.
pub struct Pipeline<'a, P: MapPage + ?Sized, E: EmailSource + ?Sized> {
    page: &'a P,
    emails: &'a E,
    config: &'a RunConfig,
}

impl<'a, P: MapPage + ?Sized, E: EmailSource + ?Sized> Pipeline<'a, P, E> {
    pub fn new(page: &'a P, emails: &'a E, config: &'a RunConfig) -> Self {
        Pipeline { page, emails, config }
    }

    /// Scrapes all configured cities into `sink` and writes the output file.
    ///
    /// Only a failure to write the output file aborts the run.
    pub fn run(&self, sink: &mut RowSink) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for city in &self.config.cities {
            summary.cities += 1;
            for keyword in &self.config.keywords {
                let query = compose_query(keyword, city);
                summary.queries += 1;
                if let Err(e) = self.run_query(&query, city, sink, &mut summary) {
                    error!("Search '{}' failed: {}", query, e);
                    summary.failed_queries += 1;
                }
            }

            if self.config.checkpoint_each_city {
                sink.write()?;
            }
        }

        sink.write()?;
        info!(
            "Run complete: {} listings ({} with email), {} skipped, {}/{} queries failed.",
            summary.listings, summary.with_email, summary.skipped, summary.failed_queries, summary.queries
        );
        Ok(summary)
    }

    fn run_query(
        &self,
        query: &str,
        city: &str,
        sink: &mut RowSink,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let engine = SearchEngine::new(self.page, &self.config.feed);
        let report = engine.search(query)?;
        let extractor = ListingExtractor::new(self.page, &self.config.detail);
        let total = report.keys.len();
        // Opening any entry leaves the results page.
        let mut on_feed = true;

        for (i, key) in report.keys.iter().enumerate() {
            if i > 0 {
                delay_manager::listing_pause(&self.config.detail.pause_ms);
            }

            if key.href.is_none() && !on_feed {
                if let Err(e) = engine.reopen(query, key) {
                    warn!("Error processing card {}: {}", i + 1, e);
                    summary.skipped += 1;
                    continue;
                }
            }
            on_feed = false;

            let details = match extractor.extract(key) {
                Ok(details) => details,
                Err(e) => {
                    warn!("Error processing card {}: {}", i + 1, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            let emails = match details.website.as_deref() {
                Some(website) => {
                    let harvest = self.emails.harvest(website);
                    if harvest.status == ScrapeStatus::Blocked {
                        warn!("Website {} refused the request", website);
                    }
                    harvest.emails
                }
                None => Vec::new(),
            };

            let record = details.into_record(city, emails);
            let email_field = record.email_field();
            info!(
                "[{}/{}] {} | {}",
                i + 1,
                total,
                record.name,
                if email_field.is_empty() { "No email" } else { email_field.as_str() }
            );

            if !record.emails.is_empty() {
                summary.with_email += 1;
            }
            summary.listings += 1;
            sink.push(record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetailSettings, FeedSettings, HarvestSettings};
    use crate::delay_manager::Backoff;
    use crate::row_sink::read_rows;
    use crate::scraper::Harvest;
    use crate::testing::{DetailPanel, FeedScript, ScriptedPage, MAPS_HOME};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    /// Email source with canned answers per website.
    #[derive(Default)]
    struct CannedEmails {
        answers: HashMap<String, Vec<String>>,
        asked: RefCell<Vec<String>>,
    }

    impl EmailSource for CannedEmails {
        fn harvest(&self, website: &str) -> Harvest {
            self.asked.borrow_mut().push(website.to_string());
            match self.answers.get(website) {
                Some(emails) => Harvest {
                    emails: emails.clone(),
                    status: ScrapeStatus::Success,
                    source_pages: vec![website.to_string()],
                },
                None => Harvest::default(),
            }
        }
    }

    fn config(cities: &[&str], keywords: &[&str], output: PathBuf, checkpoint: bool) -> RunConfig {
        let quick = Backoff::new(
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(15),
        );
        RunConfig {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            cities: cities.iter().map(|c| c.to_string()).collect(),
            output,
            headless: true,
            checkpoint_each_city: checkpoint,
            feed: FeedSettings {
                maps_url: MAPS_HOME.to_string(),
                max_results: 50,
                max_rounds: 10,
                page_wait: quick,
                settle_wait: quick,
            },
            detail: DetailSettings {
                heading_wait: quick,
                retry: quick,
                attempts: 2,
                pause_ms: 0..=0,
            },
            harvest: HarvestSettings {
                timeout: Duration::from_secs(1),
                user_agent: "Mozilla/5.0".to_string(),
                max_contact_pages: 5,
            },
        }
    }

    fn panel(name: &str, website: Option<&str>) -> DetailPanel {
        DetailPanel {
            name: Some(name.to_string()),
            address: Some(format!("Via {}, 1", name)),
            phone: Some("06 000 0000".to_string()),
            website: website.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_runs_every_city_and_writes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results.csv");

        let page = ScriptedPage::default();
        page.add_feed("Amministratore Roma", FeedScript::linked("roma", vec![2, 3], true));
        page.add_feed("Amministratore Milano", FeedScript::linked("milano", vec![1], true));
        page.add_panel(&format!("{}place/roma-0", MAPS_HOME), panel("Rossi", Some("https://rossi.it/")));
        page.add_panel(&format!("{}place/roma-1", MAPS_HOME), panel("Verdi", None));
        // roma-2 never renders a detail panel and is skipped.
        page.add_panel(&format!("{}place/milano-0", MAPS_HOME), panel("Neri", Some("https://neri.it/")));

        let emails = CannedEmails {
            answers: HashMap::from([(
                "https://rossi.it/".to_string(),
                vec!["info@rossi.it".to_string(), "pec@rossi.it".to_string()],
            )]),
            ..Default::default()
        };

        let config = config(&["Roma", "Milano"], &["Amministratore"], output.clone(), false);
        let mut sink = RowSink::new(&config.output);
        let summary = Pipeline::new(&page, &emails, &config).run(&mut sink).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                cities: 2,
                queries: 2,
                failed_queries: 0,
                listings: 3,
                skipped: 1,
                with_email: 1,
            }
        );
        assert_eq!(page.queries(), vec!["Amministratore Roma", "Amministratore Milano"]);
        assert_eq!(
            *emails.asked.borrow(),
            vec!["https://rossi.it/".to_string(), "https://neri.it/".to_string()]
        );

        let rows = read_rows(&output).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Rossi", "Verdi", "Neri"]);
        assert_eq!(rows[0].city, "Roma");
        assert_eq!(rows[0].emails, vec!["info@rossi.it", "pec@rossi.it"]);
        assert_eq!(rows[0].source_url, format!("{}place/roma-0", MAPS_HOME));
        assert_eq!(rows[1].website, None);
        assert_eq!(rows[2].city, "Milano");
        assert!(rows[2].emails.is_empty());
    }

    #[test]
    fn test_failed_query_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results.csv");

        let page = ScriptedPage::default();
        page.add_feed("Idraulico Torino", FeedScript::linked("torino", vec![1], true));
        page.add_panel(&format!("{}place/torino-0", MAPS_HOME), panel("Tubi Srl", None));

        let emails = CannedEmails::default();
        // "Idraulico Genova" has no feed and times out.
        let config = config(&["Genova", "Torino"], &["Idraulico"], output.clone(), false);
        let mut sink = RowSink::new(&config.output);
        let summary = Pipeline::new(&page, &emails, &config).run(&mut sink).unwrap();

        assert_eq!(summary.failed_queries, 1);
        assert_eq!(summary.listings, 1);
        assert_eq!(read_rows(&output).unwrap()[0].name, "Tubi Srl");
    }

    #[test]
    fn test_unlinked_entry_after_linked_one_is_reached_from_the_feed() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results.csv");

        let page = ScriptedPage::default();
        page.add_feed(
            "Idraulico Como",
            FeedScript {
                counts: vec![3],
                end_marker: true,
                entries: vec![
                    (Some("Linked".into()), Some(format!("{}place/como-0", MAPS_HOME))),
                    (Some("Unlinked".into()), None),
                    (Some("Also unlinked".into()), None),
                ],
            },
        );
        page.add_panel(&format!("{}place/como-0", MAPS_HOME), panel("Linked", None));
        page.add_panel("https://maps.example/@45.8,9.1", panel("Unlinked", None));
        page.add_panel("https://maps.example/@45.9,9.2", panel("Also unlinked", None));
        page.set_click_target(1, "https://maps.example/@45.8,9.1");
        page.set_click_target(2, "https://maps.example/@45.9,9.2");

        let emails = CannedEmails::default();
        let config = config(&["Como"], &["Idraulico"], output.clone(), false);
        let mut sink = RowSink::new(&config.output);
        let summary = Pipeline::new(&page, &emails, &config).run(&mut sink).unwrap();

        assert_eq!(summary.listings, 3);
        assert_eq!(summary.skipped, 0);
        assert_eq!(page.clicked(), vec![1, 2]);
        assert_eq!(page.queries().len(), 3);

        let rows = read_rows(&output).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Linked", "Unlinked", "Also unlinked"]);
        assert_eq!(rows[1].source_url, "https://maps.example/@45.8,9.1");
    }

    #[test]
    fn test_checkpoint_after_each_city() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results.csv");

        let page = ScriptedPage::default();
        page.add_feed("Idraulico Bari", FeedScript::linked("bari", vec![1], true));
        page.add_panel(&format!("{}place/bari-0", MAPS_HOME), panel("Acqua Bari", None));

        let emails = CannedEmails::default();
        let config = config(&["Bari"], &["Idraulico"], output.clone(), true);
        let mut sink = RowSink::new(&config.output);
        Pipeline::new(&page, &emails, &config).run(&mut sink).unwrap();

        assert_eq!(read_rows(&output).unwrap().len(), 1);
    }
}
