use clap::Parser;
use log::info;

use lead_scraper_lib::{logger, ChromeSession, Cli, Pipeline, RowSink, RunConfig, Scraper};

fn main() -> lead_scraper_lib::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);
    info!("Starting Maps Lead Scraper...");

    let config = RunConfig::from_cli(&cli)?;
    info!(
        "{} keyword(s) x {} city(ies), writing to {:?}",
        config.keywords.len(),
        config.cities.len(),
        config.output
    );

    let session = ChromeSession::launch(config.headless, config.feed.page_wait.deadline)?;
    let scraper = Scraper::new(&config.harvest)?;
    let mut sink = RowSink::new(&config.output);

    let summary = Pipeline::new(&session, &scraper, &config).run(&mut sink)?;
    info!(
        "Done. {} rows saved to {:?} ({} with email).",
        summary.listings,
        sink.path(),
        summary.with_email
    );
    Ok(())
}
