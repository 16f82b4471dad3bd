use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Pool to pick a User-Agent from on every request.
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

/// Where day files land
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_prefix")]
    pub prefix: String,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_true")]
    pub skip_existing: bool,

    /// Stadium codes to visit; empty means all 24.
    #[serde(default)]
    pub stadiums: Vec<u8>,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.boatrace.jp/owpc/pc/race".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_request_delay_ms() -> u64 {
    1200
}
fn default_jitter_ms() -> u64 {
    600
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_backoff_ms() -> u64 {
    20_000
}
fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_prefix() -> String {
    "boat".to_string()
}
fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    3
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            max_backoff_ms: default_max_backoff_ms(),
            user_agents: default_user_agents(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            prefix: default_prefix(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            skip_existing: true,
            stadiums: Vec::new(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from `config/default`, `config/local`, an optional
    /// explicit file, then `BOAT__*` environment overrides.
    pub fn load(extra: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            );

        if let Some(path) = extra {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let cfg = builder
            .add_source(
                config::Environment::with_prefix("BOAT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("pipeline.stadiums")
                    .with_list_parse_key("scraper.user_agents")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration")?;

        let app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Invalid configuration")?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.concurrency == 0 {
            anyhow::bail!("pipeline.concurrency must be at least 1");
        }
        if self.scraper.user_agents.is_empty() {
            anyhow::bail!("scraper.user_agents must not be empty");
        }
        if let Some(bad) = self.pipeline.stadiums.iter().find(|c| !(1..=24).contains(*c)) {
            anyhow::bail!("pipeline.stadiums contains unknown code {}", bad);
        }
        Ok(())
    }
}
