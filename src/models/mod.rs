use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of boats (lanes) in every race.
pub const LANES: usize = 6;

/// Races in a venue's daily program.
pub const RACES_PER_DAY: u8 = 12;

/// Exhibition time recorded when the pre-race page has none for a lane.
pub const DEFAULT_EXHIBITION_TIME: f64 = 6.99;

// ── Stadium ───────────────────────────────────────────────────────────────────

const STADIUM_NAMES: [&str; 24] = [
    "桐生", "戸田", "江戸川", "平和島", "多摩川", "浜名湖", "蒲郡", "常滑", "津", "三国", "びわこ",
    "住之江", "尼崎", "鳴門", "丸亀", "児島", "宮島", "徳山", "下関", "若松", "芦屋", "福岡", "唐津",
    "大村",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stadium {
    pub code: u8,
    pub name: &'static str,
}

impl Stadium {
    pub fn from_code(code: u8) -> Option<Self> {
        let name = STADIUM_NAMES.get(usize::from(code).checked_sub(1)?)?;
        Some(Self { code, name })
    }

    pub fn all() -> impl Iterator<Item = Stadium> {
        (1..=24u8).filter_map(Stadium::from_code)
    }

    /// Two-digit `jcd` as used in the site's query strings.
    pub fn jcd(&self) -> String {
        format!("{:02}", self.code)
    }
}

// ── Race key ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RaceKey {
    pub date: NaiveDate,
    pub jcd: u8,
    pub rno: u8,
}

impl RaceKey {
    pub fn new(date: NaiveDate, jcd: u8, rno: u8) -> Result<Self> {
        if Stadium::from_code(jcd).is_none() {
            bail!("unknown stadium code {}", jcd);
        }
        if !(1..=RACES_PER_DAY).contains(&rno) {
            bail!("race number {} out of range 1..={}", rno, RACES_PER_DAY);
        }
        Ok(Self { date, jcd, rno })
    }

    /// `hd` query value: YYYYMMDD
    pub fn hd(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    pub fn jcd_str(&self) -> String {
        format!("{:02}", self.jcd)
    }
}

impl std::fmt::Display for RaceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:02}#{}R", self.hd(), self.jcd, self.rno)
    }
}

// ── Betting pools ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetPool {
    Tansho,      // 単勝  win
    Fukusho,     // 複勝  place
    Nirentan,    // 2連単 exacta
    Nirenpuku,   // 2連複 quinella
    Kakurenpuku, // 拡連複 wide
    Sanrentan,   // 3連単 trifecta
    Sanrenpuku,  // 3連複 trio
}

impl BetPool {
    /// Map a results-table label. Accepts ASCII or full-width digits.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalised: String = label
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '２' => '2',
                '３' => '3',
                other => other,
            })
            .collect();

        match normalised.as_str() {
            "単勝" => Some(Self::Tansho),
            "複勝" => Some(Self::Fukusho),
            "2連単" => Some(Self::Nirentan),
            "2連複" => Some(Self::Nirenpuku),
            "拡連複" => Some(Self::Kakurenpuku),
            "3連単" => Some(Self::Sanrentan),
            "3連複" => Some(Self::Sanrenpuku),
            _ => None,
        }
    }
}

// ── Scraped pieces ────────────────────────────────────────────────────────────

/// Entry-list data for one lane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RacerEntry {
    pub lane: u8,
    pub win_rate: Option<f64>,   // national win rate
    pub motor_rate: Option<f64>, // motor 2-rate (%)
}

/// Pre-race page: weather block plus exhibition times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub water_temperature: Option<f64>,
    pub wave_height: Option<f64>,
    pub exhibition_times: [Option<f64>; LANES],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub pool: BetPool,
    pub combination: Vec<u8>,
    pub amount: u32,
}

/// What the results page tells us.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceOutcome {
    /// Boat numbers in finishing order (at least the winner).
    pub order: Vec<u8>,
    pub payouts: Vec<Payout>,
    /// Last `.is-payout1` amount on the page, in document order.
    pub last_payout: Option<u32>,
}

impl RaceOutcome {
    /// First payout listed for a pool. Dead heats list several; the first wins.
    pub fn payout(&self, pool: BetPool) -> Option<u32> {
        self.payouts.iter().find(|p| p.pool == pool).map(|p| p.amount)
    }
}

// ── Output row ────────────────────────────────────────────────────────────────

/// Whole values keep one decimal ("3.0"), as float columns read back by
/// dataframe tools expect. Others use the shortest exact form.
fn fmt_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

/// One flattened CSV row per race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRow {
    pub date: String, // YYYYMMDD
    pub stadium: String,
    pub rno: u8,
    pub res1: u8,
    /// Last payout amount listed on the results page (yen)
    pub payout: u32,
    pub wind: f64,
    pub wave: f64,
    pub win_rates: [f64; LANES],
    pub motor_rates: [f64; LANES],
    pub exhibition: [f64; LANES],
    pub res2: u8,
    pub res3: u8,
    pub tansho: u32,
    pub nirentan: u32,
    pub sanrentan: u32,
    pub sanrenpuku: u32,
    pub temperature: f64,
    pub water_temp: f64,
}

impl RaceRow {
    pub fn assemble(
        key: &RaceKey,
        entries: &[RacerEntry],
        conditions: &Conditions,
        outcome: &RaceOutcome,
    ) -> Self {
        let mut win_rates = [0.0; LANES];
        let mut motor_rates = [0.0; LANES];
        for entry in entries {
            let Some(i) = usize::from(entry.lane).checked_sub(1).filter(|i| *i < LANES) else {
                continue;
            };
            win_rates[i] = entry.win_rate.unwrap_or(0.0);
            motor_rates[i] = entry.motor_rate.unwrap_or(0.0);
        }

        let exhibition = conditions
            .exhibition_times
            .map(|t| t.unwrap_or(DEFAULT_EXHIBITION_TIME));

        let place = |n: usize| outcome.order.get(n).copied().unwrap_or(0);
        Self {
            date: key.hd(),
            stadium: key.jcd_str(),
            rno: key.rno,
            res1: place(0),
            payout: outcome.last_payout.unwrap_or(0),
            wind: conditions.wind_speed.unwrap_or(0.0),
            wave: conditions.wave_height.unwrap_or(0.0),
            win_rates,
            motor_rates,
            exhibition,
            res2: place(1),
            res3: place(2),
            tansho: outcome.payout(BetPool::Tansho).unwrap_or(0),
            nirentan: outcome.payout(BetPool::Nirentan).unwrap_or(0),
            sanrentan: outcome.payout(BetPool::Sanrentan).unwrap_or(0),
            sanrenpuku: outcome.payout(BetPool::Sanrenpuku).unwrap_or(0),
            temperature: conditions.temperature.unwrap_or(0.0),
            water_temp: conditions.water_temperature.unwrap_or(0.0),
        }
    }

    /// Column names, in record order.
    pub fn header() -> Vec<String> {
        let mut cols: Vec<String> = ["date", "stadium", "rno", "res1", "payout", "wind", "wave"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for i in 1..=LANES {
            cols.push(format!("wr{i}"));
            cols.push(format!("mo{i}"));
            cols.push(format!("ex{i}"));
        }
        cols.extend(
            [
                "res2", "res3", "tansho", "nirentan", "sanrentan", "sanrenpuku", "temperature",
                "water_temp",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        cols
    }

    pub fn to_record(&self) -> Vec<String> {
        let mut rec = vec![
            self.date.clone(),
            self.stadium.clone(),
            self.rno.to_string(),
            self.res1.to_string(),
            self.payout.to_string(),
            fmt_float(self.wind),
            fmt_float(self.wave),
        ];
        for i in 0..LANES {
            rec.push(fmt_float(self.win_rates[i]));
            rec.push(fmt_float(self.motor_rates[i]));
            rec.push(fmt_float(self.exhibition[i]));
        }
        rec.extend([
            self.res2.to_string(),
            self.res3.to_string(),
            self.tansho.to_string(),
            self.nirentan.to_string(),
            self.sanrentan.to_string(),
            self.sanrenpuku.to_string(),
            fmt_float(self.temperature),
            fmt_float(self.water_temp),
        ]);
        rec
    }

    /// Inverse of `to_record`, for reading day files back.
    pub fn from_record(rec: &csv::StringRecord) -> Result<Self> {
        let expected = Self::header().len();
        if rec.len() != expected {
            bail!("expected {} columns, got {}", expected, rec.len());
        }

        let field = |i: usize| rec.get(i).unwrap_or_default().trim();
        let num = |i: usize| -> Result<f64> {
            field(i)
                .parse()
                .map_err(|e| anyhow::anyhow!("column {}: {:?} ({})", i, field(i), e))
        };
        let int = |i: usize| -> Result<u32> {
            field(i)
                .parse()
                .map_err(|e| anyhow::anyhow!("column {}: {:?} ({})", i, field(i), e))
        };
        let small = |i: usize| -> Result<u8> {
            field(i)
                .parse()
                .map_err(|e| anyhow::anyhow!("column {}: {:?} ({})", i, field(i), e))
        };

        let mut win_rates = [0.0; LANES];
        let mut motor_rates = [0.0; LANES];
        let mut exhibition = [0.0; LANES];
        for lane in 0..LANES {
            let base = 7 + lane * 3;
            win_rates[lane] = num(base)?;
            motor_rates[lane] = num(base + 1)?;
            exhibition[lane] = num(base + 2)?;
        }
        let tail = 7 + LANES * 3;

        Ok(Self {
            date: field(0).to_string(),
            stadium: field(1).to_string(),
            rno: small(2)?,
            res1: small(3)?,
            payout: int(4)?,
            wind: num(5)?,
            wave: num(6)?,
            win_rates,
            motor_rates,
            exhibition,
            res2: small(tail)?,
            res3: small(tail + 1)?,
            tansho: int(tail + 2)?,
            nirentan: int(tail + 3)?,
            sanrentan: int(tail + 4)?,
            sanrenpuku: int(tail + 5)?,
            temperature: num(tail + 6)?,
            water_temp: num(tail + 7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RaceKey {
        RaceKey::new(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(), 4, 11).unwrap()
    }

    #[test]
    fn test_stadium_table() {
        assert_eq!(Stadium::all().count(), 24);
        assert_eq!(Stadium::from_code(1).unwrap().name, "桐生");
        assert_eq!(Stadium::from_code(24).unwrap().name, "大村");
        assert_eq!(Stadium::from_code(5).unwrap().jcd(), "05");
        assert!(Stadium::from_code(0).is_none());
        assert!(Stadium::from_code(25).is_none());
    }

    #[test]
    fn test_race_key_bounds() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert!(RaceKey::new(d, 0, 1).is_err());
        assert!(RaceKey::new(d, 1, 13).is_err());
        assert!(RaceKey::new(d, 24, 12).is_ok());
        assert_eq!(key().hd(), "20240309");
        assert_eq!(key().jcd_str(), "04");
        assert_eq!(key().to_string(), "20240309 04#11R");
    }

    #[test]
    fn test_bet_pool_labels() {
        assert_eq!(BetPool::from_label("3連単"), Some(BetPool::Sanrentan));
        assert_eq!(BetPool::from_label("３連複"), Some(BetPool::Sanrenpuku));
        assert_eq!(BetPool::from_label(" 2連単 "), Some(BetPool::Nirentan));
        assert_eq!(BetPool::from_label("単勝"), Some(BetPool::Tansho));
        assert_eq!(BetPool::from_label("返還"), None);
    }

    #[test]
    fn test_assemble_fills_defaults() {
        let entries = vec![RacerEntry { lane: 2, win_rate: Some(6.5), motor_rate: None }];
        let mut conditions = Conditions { wind_speed: Some(3.0), ..Default::default() };
        conditions.exhibition_times[0] = Some(6.72);
        let outcome = RaceOutcome {
            order: vec![1],
            payouts: vec![Payout { pool: BetPool::Tansho, combination: vec![1], amount: 150 }],
            ..Default::default()
        };

        let row = RaceRow::assemble(&key(), &entries, &conditions, &outcome);
        assert_eq!(row.date, "20240309");
        assert_eq!(row.stadium, "04");
        assert_eq!(row.res1, 1);
        assert_eq!(row.res2, 0);
        assert_eq!(row.payout, 0);
        assert_eq!(row.sanrentan, 0);
        assert_eq!(row.tansho, 150);
        assert_eq!(row.win_rates, [0.0, 6.5, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(row.exhibition[0], 6.72);
        assert_eq!(row.exhibition[5], DEFAULT_EXHIBITION_TIME);
        assert_eq!(row.wind, 3.0);
    }

    #[test]
    fn test_payout_column_is_last_listed_amount() {
        let outcome = RaceOutcome {
            order: vec![3, 1, 4],
            payouts: vec![
                Payout { pool: BetPool::Sanrentan, combination: vec![3, 1, 4], amount: 12340 },
                Payout { pool: BetPool::Tansho, combination: vec![3], amount: 540 },
            ],
            last_payout: Some(180),
        };
        let row = RaceRow::assemble(&key(), &[], &Conditions::default(), &outcome);
        assert_eq!(row.payout, 180);
        assert_eq!(row.sanrentan, 12340);
        assert_eq!(row.tansho, 540);
    }

    #[test]
    fn test_whole_floats_keep_a_decimal() {
        assert_eq!(fmt_float(3.0), "3.0");
        assert_eq!(fmt_float(0.0), "0.0");
        assert_eq!(fmt_float(6.99), "6.99");
        assert_eq!(fmt_float(38.46), "38.46");

        let conditions = Conditions {
            wind_speed: Some(3.0),
            wave_height: Some(2.0),
            temperature: Some(17.5),
            ..Default::default()
        };
        let row = RaceRow::assemble(&key(), &[], &conditions, &RaceOutcome::default());
        let rec = row.to_record();
        assert_eq!(&rec[4..9], ["0", "3.0", "2.0", "0.0", "0.0"]);
        assert_eq!(rec[9], "6.99");
        assert_eq!(rec[rec.len() - 2], "17.5");
        assert_eq!(rec[rec.len() - 1], "0.0");
    }

    #[test]
    fn test_header_layout() {
        let header = RaceRow::header();
        assert_eq!(header.len(), 7 + 18 + 8);
        assert_eq!(&header[..8], ["date", "stadium", "rno", "res1", "payout", "wind", "wave", "wr1"]);
        assert_eq!(&header[7..10], ["wr1", "mo1", "ex1"]);
        assert_eq!(header.last().map(String::as_str), Some("water_temp"));
    }

    #[test]
    fn test_record_reads_back() {
        let outcome = RaceOutcome {
            order: vec![3, 1, 4],
            payouts: vec![Payout { pool: BetPool::Sanrentan, combination: vec![3, 1, 4], amount: 12340 }],
            last_payout: Some(12340),
        };
        let row = RaceRow::assemble(&key(), &[], &Conditions::default(), &outcome);
        let rec = csv::StringRecord::from(row.to_record());
        assert_eq!(RaceRow::from_record(&rec).unwrap(), row);
        assert_eq!(rec.get(5), Some("0.0"));

        let short = csv::StringRecord::from(vec!["20240309", "04"]);
        assert!(RaceRow::from_record(&short).is_err());
    }
}
