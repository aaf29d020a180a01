use std::collections::BTreeSet;
use std::time::Duration;

use tracing_subscriber::util::SubscriberInitExt;

use vrs_scraper::boundary::Boundary;
use vrs_scraper::cache::StationCache;
use vrs_scraper::config::{ScraperConfig, SearchBackend};
use vrs_scraper::error::ScrapeError;
use vrs_scraper::logging;
use vrs_scraper::pipeline::{Pipeline, ScrapeSummary};
use vrs_scraper::qrcodes::{self, QrCodeClient, QrCodeConfig};
use vrs_scraper::search::{
    ObjectSearchClient, ObjectSearchConfig, StopSearch, StopSearchClient, StopSearchConfig,
};
use vrs_scraper::terms::{TermError, build_search_terms};

#[tokio::main]
async fn main() -> Result<(), ScrapeError> {
    logging::subscriber(logging::default_filter(), std::io::stderr).init();

    let config = ScraperConfig::from_env()?;
    let mode = std::env::args().nth(1).unwrap_or_else(|| "stations".to_string());

    match mode.as_str() {
        "stations" => scrape_stations(&config).await,
        "qrcodes" => scrape_qr_codes(&config).await,
        _ => Err(ScrapeError::UnknownMode(mode)),
    }
}

async fn scrape_qr_codes(config: &ScraperConfig) -> Result<(), ScrapeError> {
    let client = QrCodeClient::new(QrCodeConfig::default())?;
    let codes = client.fetch_all().await;
    qrcodes::write_csv(&config.qr_codes_path, &codes)?;
    Ok(())
}

async fn scrape_stations(config: &ScraperConfig) -> Result<(), ScrapeError> {
    // Both are fatal before any query is made.
    let cache = StationCache::open(&config.cache_path).await?;
    let boundary = Boundary::load(&config.boundary_path)?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(TermError::from)?;
    let names = config.term_source.names(&http).await?;
    let terms = build_search_terms(names);
    tracing::info!(
        source = config.term_source.label(),
        terms = terms.len(),
        "Built search terms"
    );

    let summary = match config.backend {
        SearchBackend::Objects => {
            let mut search_config = ObjectSearchConfig::new();
            if let Some(url) = &config.search_url {
                search_config = search_config.with_url(url);
            }
            if let Some(delay) = config.search_delay {
                search_config = search_config.with_delay(delay);
            }
            let client = ObjectSearchClient::new(search_config)?;
            run(&client, &boundary, &cache, &terms, config.term_interval).await?
        }
        SearchBackend::Stops => {
            let mut search_config =
                StopSearchConfig::new().with_coordinate_system(config.stops_system);
            if let Some(url) = &config.search_url {
                search_config = search_config.with_url(url);
            }
            if let Some(delay) = config.search_delay {
                search_config = search_config.with_delay(delay);
            }
            let client = StopSearchClient::new(search_config)?;
            run(&client, &boundary, &cache, &terms, config.term_interval).await?
        }
    };

    tracing::info!(
        terms_searched = summary.terms_searched,
        terms_failed = summary.terms_failed,
        records_seen = summary.records_seen,
        records_inside = summary.records_inside,
        rows_inserted = summary.rows_inserted,
        "Scrape finished"
    );

    cache.export_csv(&config.output_path).await?;
    cache.close().await;
    Ok(())
}

async fn run<S: StopSearch>(
    client: &S,
    boundary: &Boundary,
    cache: &StationCache,
    terms: &BTreeSet<String>,
    interval: Duration,
) -> Result<ScrapeSummary, ScrapeError> {
    let pipeline = Pipeline::new(client, boundary, cache).with_interval(interval);
    tracing::info!(pause = ?pipeline.pause(), "Pause between terms");
    Ok(pipeline.run(terms).await?)
}
