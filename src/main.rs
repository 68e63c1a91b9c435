mod config;
mod models;
mod notify;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::models::TicketStatus;
use crate::pipeline::Pipeline;
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "ticketwatch", about = "Ticket resale listing tracker", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape once: first-run store fill if the database is empty, update otherwise
    Scrape {
        /// Listing page url (default: configured source url)
        url: Option<String>,
    },

    /// Run one bot pass over the given urls
    Bot {
        /// Listing page urls (default: configured source url)
        urls: Vec<String>,
    },

    /// Repeat bot passes on the configured interval until interrupted
    Monitor {
        /// Listing page urls (default: configured source url)
        urls: Vec<String>,
    },

    /// Show database statistics
    Stats,

    /// Serialize every record plus its price history to stdout
    Dump {
        /// Restrict to one status (active, sold)
        status: Option<String>,
    },

    /// Show tickets not yet delivered to the notification sink
    Unposted {
        /// Restrict to one status (active, sold)
        status: Option<String>,
    },

    /// Mark the given ticket ids as posted
    Posted {
        #[arg(required = true)]
        ticket_ids: Vec<String>,
    },

    /// Empty both tables, keeping the schema
    Clear,

    /// Remove the persisted database file entirely
    Delete,
}

/// Parse an optional operator status filter before any store access.
fn parse_status_filter(status: Option<&str>) -> Result<Option<TicketStatus>> {
    match status {
        None => Ok(None),
        Some(s) => Ok(Some(s.parse::<TicketStatus>()?)),
    }
}

fn urls_or_default(urls: Vec<String>, config: &AppConfig) -> Vec<String> {
    if urls.is_empty() {
        vec![config.scraper.default_url.clone()]
    } else {
        urls
    }
}

fn open_repo(config: &AppConfig) -> Result<Repository> {
    let repo = Repository::open(&config.storage.db_path)?;
    if config.storage.run_migrations {
        repo.run_migrations()?;
    }
    Ok(repo)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "ticketwatch=info,warn",
        1 => "ticketwatch=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Scrape { url } => {
            let _t = utils::Timer::start("Scrape");
            let url = url.unwrap_or_else(|| config.scraper.default_url.clone());

            let pipeline = Pipeline::new(config)?;
            let first_run = pipeline.repository().is_empty()?;

            let summary = pipeline.run_cycle(&url).await?;

            if first_run {
                println!("First scrape completed - tickets stored in database:");
            } else {
                println!("Scrape and update completed:");
            }
            println!("  New tickets: {}", summary.new_tickets);
            println!("  Price changes: {}", summary.price_changes);
            println!("  Deleted tickets: {}", summary.deleted);

            if first_run && !summary.new_details.is_empty() {
                let sample = summary.new_details.len().min(5);
                println!("\nSample of {} tickets added:", sample);
                for (i, detail) in summary.new_details.iter().take(5).enumerate() {
                    println!("  {}. {}", i + 1, detail);
                }
                if summary.new_details.len() > 5 {
                    println!("  ... and {} more tickets", summary.new_details.len() - 5);
                }
            }
        }

        Command::Bot { urls } => {
            let _t = utils::Timer::start("Bot pass");
            let urls = urls_or_default(urls, &config);
            let pipeline = Pipeline::new(config)?;
            let stats = pipeline.run_once(&urls).await;
            if stats.errors > 0 {
                bail!("{} url(s) failed this pass", stats.errors);
            }
        }

        Command::Monitor { urls } => {
            let urls = urls_or_default(urls, &config);
            let pipeline = Pipeline::new(config)?;
            pipeline.monitor(&urls).await?;
        }

        Command::Stats => {
            let repo = open_repo(&config)?;
            let stats = repo.statistics()?;
            println!("─────────────────────────────────");
            println!("  ticketwatch — Database Stats");
            println!("─────────────────────────────────");
            if stats.by_status.is_empty() {
                println!("  No tickets stored.");
            }
            for (status, count) in &stats.by_status {
                println!("  {:<8} : {}", status, utils::fmt_number(*count));
            }
            if !stats.active_by_event.is_empty() {
                println!("  Active tickets by event:");
                for (event, count) in &stats.active_by_event {
                    println!("    {} : {}", event, count);
                }
            }
            println!("─────────────────────────────────");
        }

        Command::Dump { status } => {
            let filter = parse_status_filter(status.as_deref())?;
            let repo = open_repo(&config)?;
            let export = repo.dump(filter, &config.storage.db_path.display().to_string())?;
            println!("{}", serde_json::to_string_pretty(&export)?);
        }

        Command::Unposted { status } => {
            let filter = parse_status_filter(status.as_deref())?;
            let repo = open_repo(&config)?;
            let tickets = repo.unposted(filter)?;

            if tickets.is_empty() {
                println!("No unposted tickets found");
            } else {
                println!("Found {} unposted tickets:", tickets.len());
                for t in &tickets {
                    println!(
                        "  {}... - {} - {} - {}",
                        utils::truncate_chars(&t.ticket_id, 8),
                        utils::truncate_chars(&t.event_name, 40),
                        t.price,
                        t.status,
                    );
                }
                println!("\nJSON output:");
                let json = serde_json::json!({
                    "total_unposted": tickets.len(),
                    "tickets": tickets,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
        }

        Command::Posted { ticket_ids } => {
            let repo = open_repo(&config)?;
            let updated = repo.mark_posted(&ticket_ids)?;
            println!("Marked {} tickets as posted", updated);
        }

        Command::Clear => {
            let repo = open_repo(&config)?;
            repo.clear()?;
            println!("Database cleared successfully");
        }

        Command::Delete => {
            if Repository::delete_store(&config.storage.db_path)? {
                println!("Database file {:?} deleted successfully", config.storage.db_path);
            } else {
                println!("Database file {:?} does not exist", config.storage.db_path);
            }
        }
    }

    Ok(())
}
