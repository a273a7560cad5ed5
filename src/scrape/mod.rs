//! Scrape orchestration: fetch → parse → store per domain.
//!
//! The [`Scraper`] sequences the listing-page fetch, candidate
//! extraction, per-candidate detail fetches, and item inserts. One bad
//! candidate never aborts the batch: per-candidate failures are reported
//! through the optional progress sink and the batch continues. A failed
//! listing-page fetch aborts the domain's scrape with a single
//! notification.
//!
//! Candidates are processed strictly in document order, so items appear
//! in the store in that same order. Cancellation is checked before every
//! fetch; mid-parse cancellation is not supported (coarse-grained by
//! design).

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use url::Url;

use crate::fetch::{FetchError, PageClient};
use crate::parse::{extract_candidates, extract_detail};
use crate::store::Store;

/// Receives human-readable progress messages during a scrape.
///
/// Optional: its absence never alters pipeline behavior.
pub trait ProgressSink: Send + Sync {
    /// Called once per notable event (found item, failure, cancellation).
    fn notify(&self, message: &str);
}

/// Counters from one domain scrape.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeStats {
    /// Candidates extracted from the listing page.
    pub found: usize,
    /// Items successfully fetched, parsed, and stored.
    pub stored: usize,
    /// Candidates skipped due to fetch or store failure.
    pub failed: usize,
    /// Whether the scrape stopped early on cancellation.
    pub cancelled: bool,
}

/// Orchestrates scraping of registered domains into a [`Store`].
#[derive(Debug, Clone)]
pub struct Scraper {
    client: PageClient,
    store: Store,
}

impl Scraper {
    /// Creates a scraper over the given page client and store.
    #[must_use]
    pub fn new(client: PageClient, store: Store) -> Self {
        Self { client, store }
    }

    /// Scrapes one domain: fetches its listing page, then fetches and
    /// stores every candidate's detail page in document order.
    ///
    /// Per-candidate fetch/store failures are reported via `progress`
    /// and counted in [`ScrapeStats::failed`]; the batch continues.
    /// Cancellation is honored before each fetch and returns the stats
    /// accumulated so far with the `cancelled` flag set.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] only when the listing page itself cannot
    /// be fetched (or `url` is invalid); that aborts the domain's scrape
    /// after a single progress notification.
    #[instrument(skip(self, progress, cancel), fields(url = %url))]
    pub async fn scrape_domain(
        &self,
        url: &str,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<ScrapeStats, FetchError> {
        let mut stats = ScrapeStats::default();

        let base_url = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        if cancel.is_cancelled() {
            stats.cancelled = true;
            notify(progress, "Scrape cancelled");
            return Ok(stats);
        }

        let listing = match self.client.fetch_page(url).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "listing page fetch failed");
                notify(progress, "Failed to fetch page content");
                return Err(e);
            }
        };

        let candidates = extract_candidates(&listing, &base_url);
        stats.found = candidates.len();
        info!(candidates = stats.found, "extracted listing candidates");

        for candidate in candidates {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                notify(progress, "Scrape cancelled");
                break;
            }

            let detail = match self.client.fetch_page(candidate.url.as_str()).await {
                Ok(detail) => detail,
                Err(e) => {
                    warn!(name = %candidate.name, error = %e, "detail page fetch failed");
                    notify(
                        progress,
                        &format!("Failed to fetch details for {}", candidate.name),
                    );
                    stats.failed += 1;
                    continue;
                }
            };

            let item = extract_detail(&detail, &candidate.name);

            match self
                .store
                .add_item(&item.name, item.description.as_deref(), item.category.as_deref())
                .await
            {
                Ok(()) => {
                    notify(progress, &format!("Found item: {}", candidate.name));
                    stats.stored += 1;
                }
                Err(e) => {
                    warn!(name = %candidate.name, error = %e, "item insert failed");
                    notify(progress, &format!("Failed to store {}", candidate.name));
                    stats.failed += 1;
                }
            }
        }

        info!(
            stored = stats.stored,
            failed = stats.failed,
            cancelled = stats.cancelled,
            "domain scrape finished"
        );
        Ok(stats)
    }
}

/// Forwards a message to the sink when one is present.
fn notify(progress: Option<&dyn ProgressSink>, message: &str) {
    if let Some(sink) = progress {
        sink.notify(message);
    }
}
