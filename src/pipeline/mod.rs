//! Cycle orchestrator: ties scraper → tracker → notifications together.
//!
//! One cycle per source url runs fetch → extract → upsert-all → prune →
//! notify, strictly in that order. A fetch failure aborts the cycle before
//! any store mutation; pruning uses exactly the id set produced by the same
//! cycle's extraction. Cycles never overlap: sources are processed
//! sequentially and the monitor loop waits for a full pass before sleeping.

use crate::config::AppConfig;
use crate::models::UpsertAction;
use crate::notify::{self, DiscordWebhookSink, NotificationSink};
use crate::scraper::{TicketJamScraper, TicketSource};
use crate::storage::Repository;
use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub struct Pipeline {
    config: AppConfig,
    repo: Repository,
    source: Box<dyn TicketSource>,
    sink: Option<Box<dyn NotificationSink>>,
}

/// Outcome of one fetch→prune→notify cycle against a single url.
#[derive(Debug, Default)]
pub struct CycleSummary {
    pub scraped: usize,
    pub new_tickets: usize,
    pub price_changes: usize,
    pub touched: usize,
    pub deleted: usize,
    pub notified: usize,
    pub notify_failures: usize,
    pub new_details: Vec<String>,
}

/// Totals over one bot pass (all configured urls).
#[derive(Debug, Default)]
pub struct PassStats {
    pub new_tickets: usize,
    pub price_changes: usize,
    pub errors: usize,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Result<Self> {
        let repo = Repository::open(&config.storage.db_path)
            .context("Failed to open database")?;
        if config.storage.run_migrations {
            repo.run_migrations()?;
        }

        let source: Box<dyn TicketSource> = Box::new(
            TicketJamScraper::new(&config.scraper).context("Failed to build scraper")?,
        );

        let sink: Option<Box<dyn NotificationSink>> = match &config.notify.webhook_url {
            Some(url) => Some(Box::new(DiscordWebhookSink::new(url.clone())?)),
            None => None,
        };

        Ok(Self { config, repo, source, sink })
    }

    /// Wire a pipeline from pre-built parts (fake sources/sinks in tests).
    pub fn with_parts(
        config: AppConfig,
        repo: Repository,
        source: Box<dyn TicketSource>,
        sink: Option<Box<dyn NotificationSink>>,
    ) -> Self {
        Self { config, repo, source, sink }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Run one full cycle against a single source url.
    ///
    /// Fetch failures return an error with the store untouched; store errors
    /// abort the remaining steps of this cycle.
    pub async fn run_cycle(&self, url: &str) -> Result<CycleSummary> {
        let candidates = self.source.fetch_candidates(url).await?;

        let mut summary = CycleSummary {
            scraped: candidates.len(),
            ..CycleSummary::default()
        };

        let mut current_ids = Vec::with_capacity(candidates.len());
        for cand in &candidates {
            let (_, action) = self
                .repo
                .upsert(cand)
                .with_context(|| format!("upsert({})", cand.ticket_id))?;
            current_ids.push(cand.ticket_id.clone());

            match action {
                UpsertAction::Inserted => {
                    summary.new_tickets += 1;
                    summary.new_details.push(format!(
                        "{} | {} | {} | {}",
                        cand.event_name, cand.date, cand.price, cand.venue
                    ));
                }
                UpsertAction::PriceChanged { previous } => {
                    info!(
                        "{}: price changed from {} to {}",
                        cand.ticket_id, previous, cand.price
                    );
                    summary.price_changes += 1;
                }
                UpsertAction::Touched => summary.touched += 1,
            }
        }

        // Prune only after the whole batch, against this cycle's exact id
        // set. An empty snapshot here came from a successful fetch, so it
        // means "nothing listed now" — unless the operator opted out.
        if current_ids.is_empty() && !self.config.monitor.prune_on_empty {
            warn!("{}: empty snapshot, keeping existing records (monitor.prune_on_empty = false)", url);
        } else {
            summary.deleted = self
                .repo
                .prune(&current_ids)
                .context("prune failed")?;
        }

        self.notify_pass(&mut summary).await?;
        Ok(summary)
    }

    /// Deliver every unposted record, one at a time with pacing. Each
    /// successful send marks that single id immediately, so a later failure
    /// in the same pass never causes a re-send.
    async fn notify_pass(&self, summary: &mut CycleSummary) -> Result<()> {
        let Some(sink) = &self.sink else {
            debug!("No notification sink configured, skipping dispatch");
            return Ok(());
        };

        let unposted = self.repo.unposted(None)?;
        if unposted.is_empty() {
            return Ok(());
        }
        info!("Dispatching {} unposted tickets", unposted.len());

        for (i, record) in unposted.iter().enumerate() {
            if i > 0 {
                sleep(Duration::from_millis(self.config.notify.pace_ms)).await;
            }

            let history = self.repo.price_history(&record.ticket_id)?;
            let note = notify::render(record, &history);

            match sink.send(&note).await {
                Ok(()) => {
                    self.repo.mark_posted(std::slice::from_ref(&record.ticket_id))?;
                    summary.notified += 1;
                }
                Err(e) => {
                    // Left unposted for retry on the next cycle.
                    warn!("Notification failed for {}: {:#}", record.ticket_id, e);
                    summary.notify_failures += 1;
                }
            }
        }

        Ok(())
    }

    /// One bot pass: a cycle per url, sequential. A failed url is logged and
    /// skipped; the pass continues.
    pub async fn run_once(&self, urls: &[String]) -> PassStats {
        info!("=== Bot check at {} ===", Utc::now().format("%Y-%m-%d %H:%M:%S"));

        let mut stats = PassStats::default();
        for url in urls {
            match self.run_cycle(url).await {
                Ok(summary) => {
                    stats.new_tickets += summary.new_tickets;
                    stats.price_changes += summary.price_changes;
                    info!(
                        "{}: {} scraped | {} new | {} price changes | {} deleted | {} notified",
                        url,
                        summary.scraped,
                        summary.new_tickets,
                        summary.price_changes,
                        summary.deleted,
                        summary.notified,
                    );
                    for detail in &summary.new_details {
                        info!("  new: {}", detail);
                    }
                }
                Err(e) => {
                    warn!("Error processing {}: {:#}", url, e);
                    stats.errors += 1;
                }
            }
        }

        info!(
            "=== Pass done: {} new tickets | {} price changes | {} errors ===",
            stats.new_tickets, stats.price_changes, stats.errors
        );
        stats
    }

    /// Repeat bot passes until interrupted. The in-flight pass always
    /// finishes; ctrl-c is only honoured between passes.
    pub async fn monitor(&self, urls: &[String]) -> Result<()> {
        let interval = Duration::from_secs(self.config.monitor.interval_secs);
        info!(
            "Monitoring {} url(s) every {}s — press ctrl-c to stop",
            urls.len(),
            interval.as_secs()
        );

        loop {
            self.run_once(urls).await;

            debug!("Sleeping for {}s", interval.as_secs());
            tokio::select! {
                _ = sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Monitor stopped by user");
                    return Ok(());
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateTicket;
    use crate::notify::TicketNotification;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeSource {
        pages: Mutex<Vec<Result<Vec<CandidateTicket>>>>,
    }

    impl FakeSource {
        fn new(pages: Vec<Result<Vec<CandidateTicket>>>) -> Self {
            let mut pages = pages;
            pages.reverse();
            Self { pages: Mutex::new(pages) }
        }
    }

    #[async_trait]
    impl TicketSource for FakeSource {
        async fn fetch_candidates(&self, _url: &str) -> Result<Vec<CandidateTicket>> {
            self.pages
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
        fail_ids: HashSet<String>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, note: &TicketNotification) -> Result<()> {
            if self.fail_ids.contains(&note.ticket_id) {
                return Err(anyhow!("simulated sink failure"));
            }
            self.sent.lock().unwrap().push(note.ticket_id.clone());
            Ok(())
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.notify.pace_ms = 0;
        config
    }

    fn repo() -> Repository {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();
        repo
    }

    fn candidate(id: &str, price: &str) -> CandidateTicket {
        CandidateTicket {
            ticket_id: id.to_string(),
            event_name: format!("event-{id}"),
            price: price.to_string(),
            description: "desc".to_string(),
            ..CandidateTicket::default()
        }
    }

    #[tokio::test]
    async fn test_cycle_upserts_and_prunes_against_snapshot() {
        let repo = repo();
        repo.upsert(&candidate("gone", "9,999円")).unwrap();

        let source = FakeSource::new(vec![Ok(vec![
            candidate("A", "1,000円"),
            candidate("B", "2,000円"),
        ])]);
        let pipeline =
            Pipeline::with_parts(test_config(), repo, Box::new(source), None);

        let summary = pipeline.run_cycle("https://x").await.unwrap();
        assert_eq!(summary.scraped, 2);
        assert_eq!(summary.new_tickets, 2);
        assert_eq!(summary.deleted, 1);

        let ids: Vec<String> = pipeline
            .repository()
            .unposted(None)
            .unwrap()
            .into_iter()
            .map(|t| t.ticket_id)
            .collect();
        assert!(ids.contains(&"A".to_string()));
        assert!(!ids.contains(&"gone".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_store_untouched() {
        let repo = repo();
        repo.upsert(&candidate("keep", "1,000円")).unwrap();

        let source = FakeSource::new(vec![Err(anyhow!("HTTP 503"))]);
        let pipeline =
            Pipeline::with_parts(test_config(), repo, Box::new(source), None);

        assert!(pipeline.run_cycle("https://x").await.is_err());
        assert!(!pipeline.repository().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_empty_snapshot_prunes_all_by_default() {
        let repo = repo();
        repo.upsert(&candidate("A", "1,000円")).unwrap();

        let source = FakeSource::new(vec![Ok(Vec::new())]);
        let pipeline =
            Pipeline::with_parts(test_config(), repo, Box::new(source), None);

        let summary = pipeline.run_cycle("https://x").await.unwrap();
        assert_eq!(summary.deleted, 1);
        assert!(pipeline.repository().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_empty_snapshot_kept_when_opted_out() {
        let repo = repo();
        repo.upsert(&candidate("A", "1,000円")).unwrap();

        let mut config = test_config();
        config.monitor.prune_on_empty = false;

        let source = FakeSource::new(vec![Ok(Vec::new())]);
        let pipeline = Pipeline::with_parts(config, repo, Box::new(source), None);

        let summary = pipeline.run_cycle("https://x").await.unwrap();
        assert_eq!(summary.deleted, 0);
        assert!(!pipeline.repository().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_notify_marks_each_success_and_keeps_failures_unposted() {
        let repo = repo();
        let source = FakeSource::new(vec![Ok(vec![
            candidate("ok-1", "1,000円"),
            candidate("bad", "2,000円"),
            candidate("ok-2", "3,000円"),
        ])]);

        let sink = RecordingSink {
            fail_ids: HashSet::from(["bad".to_string()]),
            ..RecordingSink::default()
        };
        let pipeline = Pipeline::with_parts(
            test_config(),
            repo,
            Box::new(source),
            Some(Box::new(sink)),
        );

        let summary = pipeline.run_cycle("https://x").await.unwrap();
        assert_eq!(summary.notified, 2);
        assert_eq!(summary.notify_failures, 1);

        // Only the failed send stays unposted for the next cycle.
        let unposted = pipeline.repository().unposted(None).unwrap();
        assert_eq!(unposted.len(), 1);
        assert_eq!(unposted[0].ticket_id, "bad");
    }
}
