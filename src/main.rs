mod config;
mod loader;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::loader::{discover_day_files, load_day, summarize};
use crate::models::{RaceKey, Stadium};
use crate::pipeline::Pipeline;
use crate::scraper::{BoatraceScraper, RaceSource};

#[derive(Parser)]
#[command(name = "boatrace-collector", about = "Boat race results collector", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Extra config file layered over config/default and config/local
    #[arg(short, long, global = true, env = "BOAT_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Collect every race in a date range into one CSV per day
    Collect {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,

        /// Last day (inclusive), YYYY-MM-DD
        #[arg(long)]
        end: NaiveDate,

        /// Restrict to these stadium codes (repeatable, 1-24)
        #[arg(short, long = "stadium", value_parser = clap::value_parser!(u8).range(1..=24))]
        stadiums: Vec<u8>,

        /// Output directory (overrides config)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Concurrent race fetches (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Re-collect days that already have a file
        #[arg(long)]
        force: bool,
    },

    /// Fetch a single race and print it as JSON
    Race {
        /// Race day, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,

        /// Stadium code (1-24)
        #[arg(long)]
        jcd: u8,

        /// Race number (1-12)
        #[arg(long)]
        rno: u8,
    },

    /// Summarise collected day files
    Stats {
        /// Directory holding day CSVs (default: output.dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// List stadium codes and names
    Stadiums,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "boatrace_collector=info,warn",
        1 => "boatrace_collector=debug,info",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(env_filter)
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Collect {
            start,
            end,
            stadiums,
            out,
            concurrency,
            force,
        } => {
            if !stadiums.is_empty() {
                config.pipeline.stadiums = stadiums;
            }
            if let Some(dir) = out {
                config.output.dir = dir;
            }
            if let Some(n) = concurrency {
                anyhow::ensure!(n > 0, "--concurrency must be at least 1");
                config.pipeline.concurrency = n;
            }
            if force {
                config.pipeline.skip_existing = false;
            }

            let mut timer = utils::RunTimer::start(format!("Collect {} → {}", start, end));
            let stats = Pipeline::from_config(&config)?.run(start, end).await?;
            timer.record(stats.races);
            info!(
                "Done: {} races over {} days, {} files, {} errors",
                utils::fmt_count(stats.races as u64),
                stats.days,
                stats.files_written,
                stats.errors
            );
            if stats.incomplete_days > 0 {
                warn!(
                    "{} days had failed races; run the same range again to finish them",
                    stats.incomplete_days
                );
            }
        }

        Command::Race { date, jcd, rno } => {
            let key = RaceKey::new(date, jcd, rno)?;
            let scraper = BoatraceScraper::new(&config.scraper)?;
            match scraper.fetch_race(&key).await? {
                Some(row) => {
                    let json = serde_json::to_string_pretty(&row).context("Failed to encode race")?;
                    println!("{}", json);
                }
                None => println!("No result for {}", key),
            }
        }

        Command::Stats { dir } => {
            let dir = dir.unwrap_or_else(|| config.output.dir.clone());
            let files = discover_day_files(&dir)?;
            if files.is_empty() {
                println!("No day files in {:?} — run `boatrace-collector collect` first.", dir);
                return Ok(());
            }

            let mut rows = Vec::new();
            for path in &files {
                rows.extend(load_day(path)?);
            }
            let summary = summarize(&rows);

            println!("─────────────────────────────────");
            println!("  Boat race collection — stats");
            println!("─────────────────────────────────");
            println!("  Day files : {}", files.len());
            println!("  Races     : {}", utils::fmt_count(summary.races as u64));
            for (lane, wins) in summary.wins_by_lane.iter().enumerate() {
                let pct = if summary.races > 0 {
                    100.0 * *wins as f64 / summary.races as f64
                } else {
                    0.0
                };
                println!("  Lane {} wins : {:>6} ({:5.1}%)", lane + 1, utils::fmt_count(*wins as u64), pct);
            }
            println!(
                "  Mean 3連単 : {}",
                summary
                    .mean_sanrentan
                    .map(|m| format!("¥{}", utils::fmt_count(m.round() as u64)))
                    .unwrap_or_else(|| "—".into())
            );
            println!("─────────────────────────────────");
        }

        Command::Stadiums => {
            for s in Stadium::all() {
                println!("  {}  {}", s.jcd(), s.name);
            }
        }
    }

    Ok(())
}
