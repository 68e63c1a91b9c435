use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub default_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Politeness delay between requests to the source site.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Monitoring loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Seconds between bot passes in `monitor` mode.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// An empty-but-successful scrape means "nothing is listed now" and
    /// prunes every active record. Set to false to keep records through
    /// empty snapshots instead.
    #[serde(default = "default_true")]
    pub prune_on_empty: bool,
}

/// Notification sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
    /// Discord webhook endpoint. Notification dispatch is skipped when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Pacing delay between sends, to respect the sink's rate limits.
    #[serde(default = "default_pace_ms")]
    pub pace_ms: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://ticketjam.jp/tickets/zuttomayonakade-iinoni?sort_query%5BisSellable%5D=true"
        .to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    2000
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36"
        .to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/ticketwatch.db")
}
fn default_interval_secs() -> u64 {
    300
}
fn default_pace_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("TICKETWATCH").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            storage: StorageConfig::default(),
            monitor: MonitorConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            default_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            run_migrations: true,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            pace_ms: default_pace_ms(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            prune_on_empty: true,
        }
    }
}
