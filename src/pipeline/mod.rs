//! Pipeline orchestrator: ties scraper → day files together.
//!
//! `run(start, end)` walks every day of the range. For each day it fans out
//! one task per (stadium, race) through a semaphore-bounded pool, collects
//! the rows that came back, and writes them as one CSV. A failed race is
//! logged and counted; it never sinks the day, but a day with failures is
//! only kept as a `.partial` file so the next run fetches it again.
//!
//! Re-running a range is cheap when `skip_existing` is on: days that already
//! have a file are not fetched again.

use crate::config::{AppConfig, PipelineConfig};
use crate::models::{RACES_PER_DAY, RaceKey, RaceRow, Stadium};
use crate::scraper::{BoatraceScraper, RaceSource};
use crate::storage::CsvStore;
use crate::utils::days_inclusive;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub struct Pipeline {
    source: Arc<dyn RaceSource>,
    store: CsvStore,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(source: Arc<dyn RaceSource>, store: CsvStore, config: PipelineConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Live pipeline against the website, writing where the config says.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let scraper = BoatraceScraper::new(&config.scraper).context("Failed to build scraper")?;
        Ok(Self::new(
            Arc::new(scraper),
            CsvStore::new(&config.output.dir, &config.output.prefix),
            config.pipeline.clone(),
        ))
    }

    fn stadiums(&self) -> Vec<Stadium> {
        if self.config.stadiums.is_empty() {
            Stadium::all().collect()
        } else {
            let mut codes = self.config.stadiums.clone();
            codes.sort_unstable();
            codes.dedup();
            codes.into_iter().filter_map(Stadium::from_code).collect()
        }
    }

    pub async fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<PipelineStats> {
        if start > end {
            bail!("start {} is after end {}", start, end);
        }

        let stadiums = self.stadiums();
        let sem = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut stats = PipelineStats::default();

        for date in days_inclusive(start, end) {
            stats.days += 1;

            if self.config.skip_existing && self.store.exists(date) {
                info!("📅 {} already collected ({:?}), skipping", date, self.store.path_for(date));
                stats.skipped_days += 1;
                continue;
            }

            info!("📅 {} start ({} stadiums)", date.format("%Y%m%d"), stadiums.len());
            let day = self.run_day(date, &stadiums, &sem).await?;

            stats.races += day.rows.len();
            stats.no_result += day.no_result;
            stats.errors += day.errors;

            if day.errors > 0 {
                warn!("📅 {}: {} races failed, day left open for a re-run", date, day.errors);
                stats.incomplete_days += 1;
                if !day.rows.is_empty() {
                    self.store
                        .write_partial(date, &day.rows)
                        .with_context(|| format!("Failed to write partial day {}", date))?;
                }
                continue;
            }
            if day.rows.is_empty() {
                info!("📅 {}: no races, nothing written", date);
                continue;
            }
            self.store
                .write_day(date, &day.rows)
                .with_context(|| format!("Failed to write day {}", date))?;
            stats.files_written += 1;
        }

        info!(
            "=== Done: {} days ({} skipped, {} incomplete) | {} races | {} without result | {} errors | {} files ===",
            stats.days,
            stats.skipped_days,
            stats.incomplete_days,
            stats.races,
            stats.no_result,
            stats.errors,
            stats.files_written,
        );

        Ok(stats)
    }

    async fn run_day(
        &self,
        date: NaiveDate,
        stadiums: &[Stadium],
        sem: &Arc<Semaphore>,
    ) -> Result<DayOutcome> {
        let mut handles = Vec::with_capacity(stadiums.len() * usize::from(RACES_PER_DAY));

        for stadium in stadiums {
            for rno in 1..=RACES_PER_DAY {
                let key = RaceKey::new(date, stadium.code, rno)?;
                let source = Arc::clone(&self.source);
                let sem = Arc::clone(sem);

                let handle = tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await?;
                    source.fetch_race(&key).await
                });

                handles.push((key, handle));
            }
        }

        let mut outcome = DayOutcome::default();
        let mut per_stadium = [0usize; 24];

        for (key, handle) in handles {
            match handle.await {
                Ok(Ok(Some(row))) => {
                    per_stadium[usize::from(key.jcd) - 1] += 1;
                    outcome.rows.push(row);
                }
                Ok(Ok(None)) => outcome.no_result += 1,
                Ok(Err(e)) => {
                    warn!("{}: {:#}", key, e);
                    outcome.errors += 1;
                }
                Err(e) => {
                    error!("Task panic for {}: {}", key, e);
                    outcome.errors += 1;
                }
            }
        }

        for stadium in stadiums {
            let n = per_stadium[usize::from(stadium.code) - 1];
            if n > 0 {
                info!("  {} {}: {} races", stadium.jcd(), stadium.name, n);
            }
        }

        outcome
            .rows
            .sort_by(|a, b| (a.stadium.as_str(), a.rno).cmp(&(b.stadium.as_str(), b.rno)));
        Ok(outcome)
    }
}

#[derive(Debug, Default)]
struct DayOutcome {
    rows: Vec<RaceRow>,
    no_result: usize,
    errors: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub days: usize,
    pub skipped_days: usize,
    /// Days with at least one failed race; no day file was written.
    pub incomplete_days: usize,
    pub races: usize,
    pub no_result: usize,
    pub errors: usize,
    pub files_written: usize,
}
