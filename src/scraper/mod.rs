pub mod extract;
pub mod http_client;

use crate::config::ScraperConfig;
use crate::models::CandidateTicket;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use self::http_client::HttpClient;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable listing source abstraction.
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Fetch one page and extract its validated candidates. A fetch failure
    /// is an error; a successful page with nothing on it is an empty vec.
    async fn fetch_candidates(&self, url: &str) -> Result<Vec<CandidateTicket>>;
}

// ── TicketJam scraper ─────────────────────────────────────────────────────────

pub struct TicketJamScraper {
    client: HttpClient,
}

impl TicketJamScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }
}

#[async_trait]
impl TicketSource for TicketJamScraper {
    async fn fetch_candidates(&self, url: &str) -> Result<Vec<CandidateTicket>> {
        info!("Fetching URL: {}", url);
        let html = self
            .client
            .get_text(url)
            .await
            .with_context(|| format!("Failed to fetch listing page {}", url))?;

        Ok(extract::extract(&html, url))
    }
}
