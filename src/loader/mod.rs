//! Reads day files written by the collector back for inspection.

use crate::models::{LANES, RaceRow};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Parse one day CSV. Malformed rows are logged and skipped.
pub fn load_day(path: &Path) -> Result<Vec<RaceRow>> {
    debug!("Loading {:?}", path);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };

        match RaceRow::from_record(&record) {
            Ok(row) => rows.push(row),
            Err(e) => warn!("Row {} in {:?}: {:#}", i + 1, path, e),
        }
    }

    Ok(rows)
}

/// `*.csv` files in a directory, sorted by name (and so by date).
pub fn discover_day_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "csv").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub races: usize,
    /// Index 0 is lane 1.
    pub wins_by_lane: [usize; LANES],
    /// Mean trifecta payout over races that paid one.
    pub mean_sanrentan: Option<f64>,
}

pub fn summarize(rows: &[RaceRow]) -> Summary {
    let mut wins_by_lane = [0usize; LANES];
    for row in rows {
        if let Some(slot) = usize::from(row.res1)
            .checked_sub(1)
            .and_then(|i| wins_by_lane.get_mut(i))
        {
            *slot += 1;
        }
    }

    let paid: Vec<f64> = rows
        .iter()
        .filter(|r| r.sanrentan > 0)
        .map(|r| f64::from(r.sanrentan))
        .collect();
    let mean_sanrentan = if paid.is_empty() {
        None
    } else {
        Some(paid.iter().sum::<f64>() / paid.len() as f64)
    };

    Summary {
        races: rows.len(),
        wins_by_lane,
        mean_sanrentan,
    }
}
