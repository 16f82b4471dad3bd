use chrono::NaiveDate;
use std::time::{Duration, Instant};
use tracing::info;

/// Times one collection run. Logs the race count and throughput when dropped.
pub struct RunTimer {
    label: String,
    start: Instant,
    races: usize,
}

impl RunTimer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  {} started", label);
        Self {
            label,
            start: Instant::now(),
            races: 0,
        }
    }

    pub fn record(&mut self, races: usize) {
        self.races += races;
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn races_per_minute(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 { self.races as f64 * 60.0 / secs } else { 0.0 }
    }
}

impl Drop for RunTimer {
    fn drop(&mut self) {
        info!(
            "⏱  {}: {} races in {:.1?} ({:.1}/min)",
            self.label,
            fmt_count(self.races as u64),
            self.elapsed(),
            self.races_per_minute()
        );
    }
}

/// Race counts and yen amounts with thousands separators: 12340 → "12,340".
pub fn fmt_count(n: u64) -> String {
    let digits = n.to_string();
    let lead = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Every date from `start` to `end`, both included. Empty if `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_count() {
        assert_eq!(fmt_count(1_234_567), "1,234,567");
        assert_eq!(fmt_count(12_340), "12,340");
        assert_eq!(fmt_count(100_000), "100,000");
        assert_eq!(fmt_count(999), "999");
        assert_eq!(fmt_count(0), "0");
    }

    #[test]
    fn test_run_timer_counts_races() {
        let mut timer = RunTimer::start("test run");
        timer.record(12);
        timer.record(30);
        assert_eq!(timer.races, 42);
        std::thread::sleep(Duration::from_millis(5));
        let rate = timer.races_per_minute();
        assert!(rate.is_finite() && rate > 0.0);
    }

    #[test]
    fn test_days_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
        let days: Vec<_> = days_inclusive(d(28), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).collect();
        assert_eq!(days, vec![d(28), d(29), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()]);
        assert_eq!(days_inclusive(d(5), d(5)).count(), 1);
        assert_eq!(days_inclusive(d(6), d(5)).count(), 0);
    }
}
