use crate::models::{BetPool, Conditions, LANES, Payout, RaceOutcome, RacerEntry};
use crate::scraper::cleaner::{parse_lane, parse_number, parse_payout, squash_ws};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

/// Marker the results page shows for a race that was not held (or not yet run).
pub const NO_DATA_MARKER: &str = "データがありません";

static EXHIBITION_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-6]\.\d{2})").expect("exhibition time pattern"));

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
}

fn sel(s: &str) -> Result<Selector, ParseError> {
    Selector::parse(s).map_err(|e| ParseError::Selector {
        selector: s.to_string(),
        message: format!("{:?}", e),
    })
}

/// Non-empty trimmed text nodes; `<br>`-separated values come out as lines.
fn text_lines(el: ElementRef<'_>) -> Vec<String> {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn joined_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

// ── Entry list (racelist) ─────────────────────────────────────────────────────

/// One `tbody.is-fs12` per lane, in lane order.
/// Columns of interest (`td.is-lineH2`): [1] national rates, [3] motor.
pub fn parse_racelist(html: &str) -> Result<Vec<RacerEntry>, ParseError> {
    let doc = Html::parse_document(html);
    let body_sel = sel("tbody.is-fs12")?;
    let cell_sel = sel("td.is-lineH2")?;

    let entries = doc
        .select(&body_sel)
        .take(LANES)
        .enumerate()
        .map(|(i, body)| {
            let cells: Vec<Vec<String>> = body.select(&cell_sel).map(text_lines).collect();
            let value = |cell: usize, line: usize| {
                cells
                    .get(cell)
                    .and_then(|lines| lines.get(line))
                    .and_then(|s| parse_number(s))
            };
            RacerEntry {
                lane: i as u8 + 1,
                win_rate: value(1, 0),
                motor_rate: value(3, 1),
            }
        })
        .collect::<Vec<_>>();

    if entries.len() < LANES {
        debug!("racelist: only {} lanes found", entries.len());
    }
    Ok(entries)
}

// ── Pre-race conditions (beforeinfo) ──────────────────────────────────────────

pub fn parse_beforeinfo(html: &str) -> Result<Conditions, ParseError> {
    let doc = Html::parse_document(html);
    let mut conditions = Conditions::default();

    // Weather units carry a title ("風速") and a data cell ("3m").
    let unit_sel = sel(".weather1_bodyUnit")?;
    let title_sel = sel(".weather1_bodyUnitLabelTitle")?;
    let data_sel = sel(".weather1_bodyUnitLabelData")?;

    let mut titled = false;
    for unit in doc.select(&unit_sel) {
        let Some(title) = unit.select(&title_sel).next() else { continue };
        let Some(data) = unit.select(&data_sel).next() else { continue };
        let title = squash_ws(&title.text().collect::<String>());
        let value = parse_number(&data.text().collect::<String>());

        let slot = match title.as_str() {
            "気温" => &mut conditions.temperature,
            "風速" => &mut conditions.wind_speed,
            "水温" => &mut conditions.water_temperature,
            "波高" => &mut conditions.wave_height,
            _ => continue,
        };
        *slot = value;
        titled = true;
    }

    // Untitled layout: fall back to position. A titled unit with a blank
    // reading stays None.
    if !titled {
        let data: Vec<String> = doc
            .select(&data_sel)
            .map(|el| el.text().collect::<String>())
            .collect();
        conditions.wind_speed = data.get(2).and_then(|s| parse_number(s));
        conditions.wave_height = data.get(4).and_then(|s| parse_number(s));
    }

    let body_sel = sel("tbody.is-fs12")?;
    for (i, body) in doc.select(&body_sel).take(LANES).enumerate() {
        let text = joined_text(body);
        conditions.exhibition_times[i] = EXHIBITION_TIME
            .captures(&text)
            .and_then(|caps| caps[1].parse().ok());
    }

    Ok(conditions)
}

// ── Results (raceresult) ──────────────────────────────────────────────────────

/// `Ok(None)` when the race has no result to report.
pub fn parse_raceresult(html: &str) -> Result<Option<RaceOutcome>, ParseError> {
    if html.contains(NO_DATA_MARKER) {
        return Ok(None);
    }

    let doc = Html::parse_document(html);
    let number_sel = sel(".numberSet1_number")?;
    let payout_sel = sel(".is-payout1")?;
    let tbody_sel = sel("tbody")?;
    let tr_sel = sel("tr")?;
    let td_sel = sel("td")?;

    let Some(winner) = doc
        .select(&number_sel)
        .next()
        .and_then(|el| parse_lane(&el.text().collect::<String>()))
    else {
        return Ok(None);
    };

    // Last amount on the page, whatever pool it belongs to.
    let last_payout = doc
        .select(&payout_sel)
        .filter_map(|el| parse_payout(&el.text().collect::<String>()))
        .last();

    // Payout table: one tbody per pool, label in the first cell.
    let mut payouts = Vec::new();
    for tbody in doc.select(&tbody_sel) {
        let Some(label) = tbody.select(&td_sel).next() else { continue };
        let Some(pool) = BetPool::from_label(&squash_ws(&label.text().collect::<String>()))
        else {
            continue;
        };

        // Dead heats add rows; the first row with an amount is kept.
        for tr in tbody.select(&tr_sel) {
            let Some(amount) = tr
                .select(&payout_sel)
                .next()
                .and_then(|el| parse_payout(&el.text().collect::<String>()))
            else {
                continue;
            };
            let combination: Vec<u8> = tr
                .select(&number_sel)
                .filter_map(|el| parse_lane(&el.text().collect::<String>()))
                .collect();
            payouts.push(Payout { pool, combination, amount });
            break;
        }
    }

    let order = payouts
        .iter()
        .find(|p| p.pool == BetPool::Sanrentan && p.combination.len() == 3)
        .map(|p| p.combination.clone())
        .unwrap_or_else(|| vec![winner]);

    Ok(Some(RaceOutcome {
        order,
        payouts,
        last_payout,
    }))
}
