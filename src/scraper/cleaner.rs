// ── Field cleaners ────────────────────────────────────────────────────────────

/// Characters the site glues onto numbers: flying/late-start markers,
/// percent signs, metres, centimetres, degrees.
const UNIT_CHARS: &[char] = &['F', 'L', '%', 'm', 'c', '℃'];

/// Parse a scraped number, stripping unit characters and whitespace.
/// "3m" → 3.0 | "17.0℃" → 17.0 | "F.05" → 0.05 | "-" → None
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "-" || s == "―" {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| !UNIT_CHARS.contains(c) && !c.is_whitespace())
        .collect();
    cleaned.parse().ok()
}

/// Payout amounts: "¥12,340" → 12340
pub fn parse_payout(s: &str) -> Option<u32> {
    let cleaned: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Boat number, ASCII or full-width ("３" → 3). Only 1..=6 is a lane.
pub fn parse_lane(s: &str) -> Option<u8> {
    let mut digits = s.trim().chars().filter_map(|c| match c {
        '0'..='9' => c.to_digit(10),
        '０'..='９' => Some(c as u32 - '０' as u32),
        _ => None,
    });
    let d = digits.next()?;
    if digits.next().is_some() {
        return None;
    }
    u8::try_from(d).ok().filter(|n| (1..=6).contains(n))
}

/// Collapse runs of whitespace (the site pads cells with newlines and
/// full-width spaces).
pub fn squash_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
