//! Handlers behind the `revscrape` subcommands.
//!
//! Scraping goes through [`ReviewScraper`]; everything else only reads or
//! writes the [`JsonFileStore`] snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use revscrape_core::{
    load_profile, AppConfig, JsonFileStore, ScrapeMethod, ScrapeResponse, ScrapeResult,
    ScrapeSession, ScrapeStore, StoreSummary,
};
use revscrape_scraper::ReviewScraper;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug)]
pub(crate) struct ScrapeRequest {
    pub url: String,
    pub method: ScrapeMethod,
    pub max_reviews: usize,
    pub store: PathBuf,
    pub export: Option<PathBuf>,
}

/// What one scrape left behind in the store.
#[derive(Debug)]
pub(crate) struct ScrapeReport {
    pub response: ScrapeResponse,
    pub method: ScrapeMethod,
    pub product_id: Option<Uuid>,
    pub new_reviews: usize,
}

/// Scrape `request.url`, persist what was found, and record a session.
///
/// The session is recorded for failed scrapes too; the command then exits
/// with the scrape error.
///
/// # Errors
///
/// Returns an error if the profile or store cannot be loaded, the scraper
/// cannot be built, the export cannot be written, or the scrape failed.
pub(crate) async fn run_scrape(config: &AppConfig, request: &ScrapeRequest) -> anyhow::Result<()> {
    let profile = Arc::new(load_profile(config.profile_path.as_deref())?);
    let mut store = JsonFileStore::open(&request.store)?;
    let scraper = ReviewScraper::new(config, profile)?;

    tracing::info!(url = %request.url, method = %request.method, "starting scrape");
    let started_at = Utc::now();
    let clock = Instant::now();
    let result = scraper
        .scrape_with_limit(&request.url, request.method, request.max_reviews)
        .await;
    scraper.close().await;

    let report = persist(&mut store, &request.url, result, started_at, clock.elapsed())?;

    if let Some(path) = &request.export {
        write_json(path, &report.response)?;
        println!("exported response to {}", path.display());
    }

    match &report.response {
        ScrapeResponse::Completed(data) => {
            println!(
                "scraped {} via {}: {} reviews ({} new)",
                data.product.title.as_deref().unwrap_or("untitled product"),
                report.method,
                data.total_reviews_found,
                report.new_reviews,
            );
            if let Some(rating) = data.product.rating {
                println!("  rating: {rating:.1}");
            }
            if let Some(price) = data.product.price {
                println!("  price:  {price:.2}");
            }
            if let Some(id) = report.product_id {
                println!("  stored as product {id}");
            }
            Ok(())
        }
        ScrapeResponse::Failed { error } => anyhow::bail!("scrape failed: {error}"),
    }
}

/// Writes a scrape result into `store` and records the session whether or
/// not the scrape succeeded.
///
/// # Errors
///
/// Returns an error if any store write fails.
pub(crate) fn persist(
    store: &mut impl ScrapeStore,
    url: &str,
    result: ScrapeResult,
    started_at: DateTime<Utc>,
    elapsed: Duration,
) -> anyhow::Result<ScrapeReport> {
    let method = result.method();
    let success = result.is_success();
    let error = result.error().map(str::to_string);
    let response = result.into_response();

    let mut product_id = None;
    let mut new_reviews = 0;
    let mut reviews_extracted = 0;
    if let ScrapeResponse::Completed(data) = &response {
        reviews_extracted = data.total_reviews_found;
        let id = store.save_product(&data.product)?;
        new_reviews = store.save_reviews(id, &data.reviews)?;
        product_id = Some(id);
    }

    let session_id = store.record_session(ScrapeSession {
        url: url.to_string(),
        method,
        success,
        error,
        reviews_extracted,
        new_reviews_saved: new_reviews,
        duration_secs: elapsed.as_secs_f64(),
        started_at,
    })?;
    tracing::info!(%session_id, url, %method, success, new_reviews, "session recorded");

    Ok(ScrapeReport {
        response,
        method,
        product_id,
        new_reviews,
    })
}

/// Print store statistics.
///
/// # Errors
///
/// Returns an error if the store snapshot cannot be read.
pub(crate) fn run_summary(store_path: &Path) -> anyhow::Result<()> {
    let store = JsonFileStore::open(store_path)?;
    print!("{}", render_summary(&store.summary()));
    Ok(())
}

fn render_summary(summary: &StoreSummary) -> String {
    let rating = summary
        .average_rating
        .map_or_else(|| "n/a".to_string(), |r| format!("{r:.2}"));
    format!(
        "products:          {}\n\
         reviews:           {}\n\
         verified reviews:  {}\n\
         average rating:    {rating}\n\
         sessions:          {} ({} successful)\n",
        summary.products,
        summary.reviews,
        summary.verified_reviews,
        summary.sessions,
        summary.successful_sessions,
    )
}

/// Dump the stored product for `url` and its reviews to `output`.
///
/// # Errors
///
/// Returns an error if the store cannot be read, the product was never
/// scraped, or the output file cannot be written.
pub(crate) fn run_export(store_path: &Path, url: &str, output: &Path) -> anyhow::Result<()> {
    let store = JsonFileStore::open(store_path)?;
    let export = product_export(&store, url)?;
    write_json(output, &export)?;
    println!(
        "exported {} reviews for {url} to {}",
        export.reviews.len(),
        output.display()
    );
    Ok(())
}

#[derive(Debug, Serialize)]
pub(crate) struct ProductExport {
    pub product_id: Uuid,
    pub product: revscrape_core::ProductRecord,
    pub reviews: Vec<revscrape_core::ReviewRecord>,
}

pub(crate) fn product_export(store: &impl ScrapeStore, url: &str) -> anyhow::Result<ProductExport> {
    let stored = store
        .product_by_url(url)
        .ok_or_else(|| anyhow::anyhow!("no stored product for '{url}'; scrape it first"))?;
    Ok(ProductExport {
        product_id: stored.id,
        reviews: store.reviews_for_product(stored.id),
        product: stored.record,
    })
}

fn write_json(path: &Path, value: &impl Serialize) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
#[path = "commands_test.rs"]
mod tests;
