pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use crate::models::{RaceKey, RaceRow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;
use url::Url;

use self::http_client::HttpClient;
use self::parsers::{parse_beforeinfo, parse_raceresult, parse_racelist};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable race data source.
#[async_trait]
pub trait RaceSource: Send + Sync {
    /// `Ok(None)` when the race has no result (cancelled, not held, not run yet).
    async fn fetch_race(&self, key: &RaceKey) -> Result<Option<RaceRow>>;
}

// ── boatrace.jp scraper ───────────────────────────────────────────────────────

/// The three per-race pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    RaceList,
    BeforeInfo,
    RaceResult,
}

impl Page {
    fn path(self) -> &'static str {
        match self {
            Page::RaceList => "racelist",
            Page::BeforeInfo => "beforeinfo",
            Page::RaceResult => "raceresult",
        }
    }
}

pub struct BoatraceScraper {
    client: HttpClient,
    base_url: String,
}

impl BoatraceScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// e.g. `{base}/racelist?rno=1&jcd=04&hd=20240309`
    pub fn page_url(&self, page: Page, key: &RaceKey) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, page.path());
        Url::parse_with_params(
            &raw,
            &[
                ("rno", key.rno.to_string()),
                ("jcd", key.jcd_str()),
                ("hd", key.hd()),
            ],
        )
        .with_context(|| format!("Bad base URL {:?}", self.base_url))
    }

    async fn fetch_page(&self, page: Page, key: &RaceKey) -> Result<String> {
        let url = self.page_url(page, key)?;
        self.client
            .get_text(url.as_str())
            .await
            .with_context(|| format!("{}: failed to fetch {}", key, page.path()))
    }
}

#[async_trait]
impl RaceSource for BoatraceScraper {
    async fn fetch_race(&self, key: &RaceKey) -> Result<Option<RaceRow>> {
        // Results first: most misses (no race that day) stop here.
        let result_html = self.fetch_page(Page::RaceResult, key).await?;
        let Some(outcome) = parse_raceresult(&result_html)? else {
            debug!("{}: no result", key);
            return Ok(None);
        };

        let list_html = self.fetch_page(Page::RaceList, key).await?;
        let before_html = self.fetch_page(Page::BeforeInfo, key).await?;

        let entries = parse_racelist(&list_html)?;
        let conditions = parse_beforeinfo(&before_html)?;

        debug!(
            "{}: {} entries, winner {:?}, trifecta {:?}",
            key,
            entries.len(),
            outcome.order.first(),
            outcome.payout(crate::models::BetPool::Sanrentan)
        );

        Ok(Some(RaceRow::assemble(key, &entries, &conditions, &outcome)))
    }
}
