use crate::models::RaceRow;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ── Day-file store ────────────────────────────────────────────────────────────

/// One CSV per race day: `<dir>/<prefix>_<YYYYMMDD>.csv`.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
    prefix: String,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", self.prefix, date.format("%Y%m%d")))
    }

    pub fn exists(&self, date: NaiveDate) -> bool {
        self.path_for(date).is_file()
    }

    /// Where an incomplete day goes. Not a `.csv`, so neither `exists` nor
    /// the loader sees it.
    pub fn partial_path_for(&self, date: NaiveDate) -> PathBuf {
        with_suffix(&self.path_for(date), "partial")
    }

    /// Write (or overwrite) a complete day. Header first, then one record
    /// per race. Drops any partial file left by an earlier run.
    pub fn write_day(&self, date: NaiveDate, rows: &[RaceRow]) -> Result<PathBuf> {
        let path = self.path_for(date);
        self.write_atomic(&path, rows)?;

        let partial = self.partial_path_for(date);
        if partial.is_file() {
            std::fs::remove_file(&partial)
                .with_context(|| format!("Failed to remove {:?}", partial))?;
        }

        info!("Wrote {} races to {:?}", rows.len(), path);
        Ok(path)
    }

    /// Keep what a day with failed races did collect, without marking the
    /// day as done.
    pub fn write_partial(&self, date: NaiveDate, rows: &[RaceRow]) -> Result<PathBuf> {
        let path = self.partial_path_for(date);
        self.write_atomic(&path, rows)?;
        warn!("Wrote {} races to {:?} (incomplete day)", rows.len(), path);
        Ok(path)
    }

    /// The target only ever appears fully written: rows go to a `.tmp`
    /// sibling which is renamed into place after the flush.
    fn write_atomic(&self, path: &Path, rows: &[RaceRow]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create dir {:?}", self.dir))?;

        let tmp = with_suffix(path, "tmp");
        let mut writer = csv::Writer::from_path(&tmp)
            .with_context(|| format!("Failed to open {:?}", tmp))?;

        writer.write_record(RaceRow::header())?;
        for row in rows {
            writer
                .write_record(row.to_record())
                .with_context(|| format!("write {} {}#{}", row.date, row.stadium, row.rno))?;
        }
        writer.flush().with_context(|| format!("Failed to flush {:?}", tmp))?;
        drop(writer);

        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move {:?} to {:?}", tmp, path))?;
        Ok(())
    }
}

/// `boat_20240105.csv` + `tmp` → `boat_20240105.csv.tmp`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Conditions, RaceKey, RaceOutcome};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("boatrace-store-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_path_layout() {
        let store = CsvStore::new("data", "boat");
        let d = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(store.path_for(d), PathBuf::from("data/boat_20240105.csv"));
    }

    #[test]
    fn test_write_day_creates_dir_and_header() {
        let dir = scratch_dir("write");
        let store = CsvStore::new(&dir, "boat");
        let d = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert!(!store.exists(d));

        let key = RaceKey::new(d, 12, 3).unwrap();
        let outcome = RaceOutcome { order: vec![2], ..Default::default() };
        let row = RaceRow::assemble(&key, &[], &Conditions::default(), &outcome);

        let path = store.write_day(d, &[row]).unwrap();
        assert!(store.exists(d));

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("date,stadium,rno,res1,payout,wind,wave,wr1,mo1,ex1"));
        assert!(lines.next().unwrap().starts_with("20240105,12,3,2,0,"));
        assert!(lines.next().is_none());

        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["boat_20240105.csv".to_string()]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_day_is_not_a_day_file() {
        let dir = scratch_dir("partial");
        let store = CsvStore::new(&dir, "boat");
        let d = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        let key = RaceKey::new(d, 1, 1).unwrap();
        let row = RaceRow::assemble(&key, &[], &Conditions::default(), &RaceOutcome::default());

        let partial = store.write_partial(d, std::slice::from_ref(&row)).unwrap();
        assert_eq!(partial, dir.join("boat_20240106.csv.partial"));
        assert!(partial.is_file());
        assert!(!store.exists(d));
        assert!(crate::loader::discover_day_files(&dir).unwrap().is_empty());

        store.write_day(d, &[row]).unwrap();
        assert!(store.exists(d));
        assert!(!partial.exists());
        assert!(!with_suffix(&store.path_for(d), "tmp").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
