//! Signal extraction: ordered pattern cascades over normalized alert text.
//!
//! Two independent cascades, each first-match-wins: the header cascade
//! recovers asset + direction, the entry cascade recovers the entry price.
//! A signal exists only when both yield a result; everything else is a parse
//! miss, the expected outcome for any message that is not a trade alert.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed trading intent. `base` is upper-cased on extraction; `entry` is
/// strictly positive. Targets and scale-ins are independently optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub base: String,
    pub side: Side,
    pub entry: f64,
    pub tp1: Option<f64>,
    pub tp2: Option<f64>,
    pub tp3: Option<f64>,
    pub dca1: Option<f64>,
    pub dca2: Option<f64>,
    pub dca3: Option<f64>,
}

/// Number atom: optional thousands separators, optional decimal part.
/// An optional `$` marker may precede it (handled by the rule patterns).
const NUM: &str = r"([0-9][0-9,]*\.?[0-9]*)";

static HDR_SLASH_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([A-Z0-9]+)\s*/\s*[A-Z0-9]+\b.*\b(LONG|SHORT)\b").unwrap());
static PAIR_LINE_OLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|\n)\s*([A-Z0-9]+)\s+(LONG|SHORT)\s+Signal\s*(\n|$)").unwrap());
static HDR_COIN_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)Coin\s*:\s*([A-Z0-9]+).*?Direction\s*:\s*(LONG|SHORT)").unwrap());

static ENTER_ON_TRIGGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)Enter\s+on\s+Trigger\s*:\s*\$?\s*{NUM}")).unwrap());
static ENTRY_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\bEntry\s*:\s*\$?\s*{NUM}")).unwrap());
static ENTRY_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\bENTRY\b\s*\n\s*\$?\s*{NUM}")).unwrap());

static TP_LINES: Lazy<[Regex; 3]> = Lazy::new(|| level_rules("TP"));
static DCA_LINES: Lazy<[Regex; 3]> = Lazy::new(|| level_rules(r"DCA\s*#?"));

fn level_rules(prefix: &str) -> [Regex; 3] {
    [1u8, 2, 3].map(|n| {
        Regex::new(&format!(r"(?i)\b{prefix}\s*{n}\s*:\s*\$?\s*{NUM}")).unwrap()
    })
}

fn to_price(raw: &str) -> Option<f64> {
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|p| *p > 0.0)
}

fn side_of(raw: &str) -> Side {
    if raw.eq_ignore_ascii_case("LONG") {
        Side::Long
    } else {
        Side::Short
    }
}

/// Every header rule that matches, in priority order.
fn header_readings(txt: &str) -> Vec<(&'static str, String, Side)> {
    let mut readings = Vec::new();
    if let Some(c) = HDR_SLASH_PAIR.captures(txt) {
        readings.push(("slash-pair", c[1].to_uppercase(), side_of(&c[2])));
    }
    if let Some(c) = PAIR_LINE_OLD.captures(txt) {
        readings.push(("legacy-line", c[2].to_uppercase(), side_of(&c[3])));
    }
    if let Some(c) = HDR_COIN_DIR.captures(txt) {
        readings.push(("coin-block", c[1].to_uppercase(), side_of(&c[2])));
    }
    readings
}

/// Header cascade. The highest-priority match wins; a lower-priority rule
/// that reads a different asset or direction is flagged, since such a message
/// is malformed or adversarial.
fn find_base_side(txt: &str) -> Option<(String, Side)> {
    let readings = header_readings(txt);
    let (winner_rule, base, side) = readings.first()?.clone();
    for (rule, other_base, other_side) in readings.iter().skip(1) {
        if *other_base != base || *other_side != side {
            warn!(
                winner = winner_rule,
                conflicting = rule,
                "header rules disagree ({base} {side} vs {other_base} {other_side}); trusting rule priority"
            );
        }
    }
    Some((base, side))
}

/// Entry cascade: `Enter on Trigger:`, then `Entry:`, then a bare number
/// under an `ENTRY` section header.
fn find_entry(txt: &str) -> Option<f64> {
    for rx in [&*ENTER_ON_TRIGGER, &*ENTRY_COLON, &*ENTRY_SECTION] {
        if let Some(c) = rx.captures(txt) {
            return to_price(&c[1]);
        }
    }
    None
}

fn find_levels(rules: &[Regex; 3], txt: &str) -> [Option<f64>; 3] {
    [0, 1, 2].map(|i| rules[i].captures(txt).and_then(|c| to_price(&c[1])))
}

/// Recover a trading intent from normalized text, or `None` when the text is
/// not a recognizable trade alert.
pub fn extract_signal(txt: &str) -> Option<Signal> {
    let (base, side) = find_base_side(txt)?;
    let entry = find_entry(txt)?;
    let [tp1, tp2, tp3] = find_levels(&TP_LINES, txt);
    let [dca1, dca2, dca3] = find_levels(&DCA_LINES, txt);
    Some(Signal {
        base,
        side,
        entry,
        tp1,
        tp2,
        tp3,
        dca1,
        dca2,
        dca3,
    })
}
