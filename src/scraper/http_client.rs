use crate::config::ScraperConfig;
use rand::Rng;
use rand::seq::IndexedRandom;
use reqwest::StatusCode;
use reqwest::header::USER_AGENT;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: StatusCode },
}

impl FetchError {
    /// Transport failures, 429 and 5xx are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Build(_) => false,
            Self::Transport { .. } => true,
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
        }
    }
}

pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()
            .map_err(FetchError::Build)?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text with a polite delay, rotating user agents, and
    /// jittered exponential backoff on retryable failures.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.polite_delay().await;

        let this = self;
        let mut attempt = 0u32;
        RetryIf::spawn(
            self.backoff(),
            move || {
                attempt += 1;
                this.fetch_once(url, attempt)
            },
            |e: &FetchError| {
                let retry = e.is_retryable();
                if retry {
                    warn!("{}; backing off", e);
                }
                retry
            },
        )
        .await
    }

    async fn fetch_once(&self, url: &str, attempt: u32) -> Result<String, FetchError> {
        debug!("GET {} (attempt {})", url, attempt);

        let resp = self
            .inner
            .get(url)
            .header(USER_AGENT, self.pick_user_agent())
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        resp.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })
    }

    /// Delays between retries: 2x, 4x, 8x ... the request delay, capped and
    /// fully jittered.
    fn backoff(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(self.config.request_delay_ms.max(1))
            .max_delay(Duration::from_millis(self.config.max_backoff_ms))
            .map(jitter)
            .take(self.config.max_retries as usize)
    }

    fn pick_user_agent(&self) -> String {
        self.config
            .user_agents
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = rand::rng().random_range(0..=self.config.jitter_ms);
        let total = Duration::from_millis(self.config.request_delay_ms + jitter);
        sleep(total).await;
    }
}
