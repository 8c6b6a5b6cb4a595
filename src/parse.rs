//! Regex-driven extractors for dates, disc/track numbers, and title text.
//!
//! Audio collections encode the same facts in wildly different ways:
//! `2000.01.01 Venue`, `01.01.2000`, `98-08-23`, `sci160318d1_01_Shine`,
//! `1-01 Title`, `cd2`, and so on. Each extractor here tries an ordered
//! list of patterns and stops at the first hit; later patterns exist to
//! catch conventions the earlier, stricter ones intentionally miss, so
//! the ordering is a tested contract, not an accident.
//!
//! Extractors consume: a successful match removes the matched substring
//! (and anything before it) from the input and returns the remainder for
//! further parsing.

use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

/// Whether a date pattern captures year-month-day or month-day-year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateOrder {
    Ymd,
    Mdy,
}

/// Date conventions in decreasing order of specificity.
static DATE_PATTERNS: LazyLock<Vec<(Regex, DateOrder)>> = LazyLock::new(|| {
    [
        // '2000-1-01' '2000/01/01' '2000.1.1'
        // also multiple days: '2000.01.01-03' '2000.01.31,01'
        (
            r"(?P<year>\d{4})[/.-](?P<month>\d{1,2})[/.-](?P<day>\d{1,2}[-,]*\d*)",
            DateOrder::Ymd,
        ),
        // nugs.net compact form: sci160318d1_01_Shine, ph990710d1_01_Wilson
        (
            r"[a-z0-9]{2,10}(?P<year>\d{2})(?P<month>\d{2})(?P<day>\d{2})",
            DateOrder::Ymd,
        ),
        // '01.01.2000' '1/1/2000' '1-01-2000'
        (
            r"(?P<month>\d{1,2})[/.-](?P<day>\d{1,2})[/.-](?P<year>\d{4})",
            DateOrder::Mdy,
        ),
        // '03-30-69' '06.09.73'
        (
            r"(?P<month>\d{1,2})[/.-](?P<day>\d{1,2})[/.-](?P<year>\d{2})",
            DateOrder::Mdy,
        ),
        // '98-08-23'
        (
            r"(?P<year>\d{2})[/.-](?P<month>\d{1,2})[/.-](?P<day>\d{1,2})",
            DateOrder::Ymd,
        ),
    ]
    .into_iter()
    .map(|(p, o)| (Regex::new(p).unwrap(), o))
    .collect()
});

/// Disc/track conventions; the first two are anchored to the start.
static DISC_TRACK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // '1-01 ', '01-02 ', '1-3 - ', '03 - 02 '
        r"^(?P<disc>\d{1,2})\s*-\s*(?P<track>\d{1,2})\s-*\s*",
        // '01 - ', '1 ', '1-' (track only)
        r"^(?P<disc>)(?P<track>\d{1,2})\s*-*\s*",
        // 's01t01', 'd01t01', 's1 01', 'd301', 'd1_01'
        r"[sd](?P<disc>\d{2})[-. _t]*(?P<track>\d{2})",
        r"[sd](?P<disc>\d)[-. _t]*(?P<track>\d{2})",
        r"[sd](?P<disc>\d)[-. _t]*(?P<track>\d)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static YEAR_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<year>\d{4})\s-*\s*").unwrap());

static DISC_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(cd|disc|set|disk)\s*(?P<disc>\d{1,2})\s*").unwrap());

static LEADING_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+").unwrap());
static SHORT_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{1,2}").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

// Album/Title sanitizer pipeline, applied in order. Later steps assume the
// earlier ones already removed their share of noise.
static SLASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[/\\]+").unwrap());
static BRACKET_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[[^\[\]]*\]\s*$").unwrap());
static TEXT_WHITELIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9',.!?&> _()-]+").unwrap());
static PAREN_NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\([\d\s]*\)\s*").unwrap());
static EXT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-*\s*(?i:flac|m4a|mp3|mp4|shn|wav)$").unwrap());
static BITRATE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-*\s*(?i:128|192|256|320|sbd)$").unwrap());
static LEADING_PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[',.&>_)!?-]+").unwrap());
static TRAILING_PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[',.&>_(-]+$").unwrap());
static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());
static FILENAME_WHITELIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9'!?& _()-]+").unwrap());

/// A calendar-valid date extracted from text. Month is always two digits;
/// day keeps any multi-day suffix verbatim (e.g. `01-03`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParts {
    pub year: String,
    pub month: String,
    pub day: String,
}

/// Match `re` anywhere in `s`, returning the captures plus the remainder
/// after the match. The prefix before the match is consumed too.
fn consume<'a>(re: &Regex, s: &'a str) -> Option<(regex::Captures<'a>, &'a str)> {
    let caps = re.captures(s)?;
    let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
    Some((caps, &s[end..]))
}

fn named(caps: &regex::Captures<'_>, name: &str) -> String {
    caps.name(name).map(|m| m.as_str().to_string()).unwrap_or_default()
}

/// Try each date convention in order; the first match that yields a
/// calendar-valid date wins and consumes the matched text.
pub fn match_date(s: &str) -> Option<(DateParts, String)> {
    for (re, order) in DATE_PATTERNS.iter() {
        let Some((caps, remain)) = consume(re, s) else {
            continue;
        };

        let (year, month, day) = match order {
            DateOrder::Ymd | DateOrder::Mdy => (
                named(&caps, "year"),
                named(&caps, "month"),
                named(&caps, "day"),
            ),
        };

        let month = pad2(&month);
        let day = pad2(&day);
        let year = year_ensure_century(&year);

        // multi-day values validate on the first day only
        let first_day = SHORT_DIGITS
            .find(&day)
            .map(|m| m.as_str())
            .unwrap_or_default();
        if !valid_date(&year, &month, first_day) {
            continue;
        }

        return Some((DateParts { year, month, day }, remain.to_string()));
    }
    None
}

/// Fallback when no full date matched: a bare 4-digit year followed by a
/// space at the start of the text.
pub fn match_year_only(s: &str) -> Option<(String, String)> {
    let (caps, remain) = consume(&YEAR_ONLY, s)?;
    Some((named(&caps, "year"), remain.to_string()))
}

/// Extract disc and track numbers; disc may come back empty for
/// track-only conventions. Leading zeros are stripped from both.
pub fn match_disc_track(s: &str) -> Option<(String, String, String)> {
    for re in DISC_TRACK_PATTERNS.iter() {
        let Some((caps, remain)) = consume(re, s) else {
            continue;
        };
        let disc = strip_leading_zeros(&named(&caps, "disc"));
        let track = strip_leading_zeros(&named(&caps, "track"));
        return Some((disc, track, remain.to_string()));
    }
    None
}

/// Recognize a disc-only phrase like "cd 2", "disc 2", "set 2", "disk 2".
/// Unlike the other extractors only the phrase itself is removed; the
/// marker often trails the date and album text, which must stay
/// parseable. The captured number keeps its padding.
pub fn match_disc_only(s: &str) -> Option<(String, String)> {
    let caps = DISC_ONLY.captures(s)?;
    let phrase = caps.get(0)?;
    let remain = format!("{}{}", &s[..phrase.start()], &s[phrase.end()..]);
    Some((named(&caps, "disc"), remain))
}

/// Clean album or title text after dates and numbering have been stripped.
///
/// Fixed substitution pipeline; order matters. Bracket stripping has to
/// run before the character whitelist eats the brackets, and the suffix
/// removals assume whitespace is already collapsed.
pub fn match_album_or_title(s: &str) -> String {
    let s = SLASHES.replace_all(s, "-");
    let s = BRACKET_SUFFIX.replace_all(&s, "");
    let s = TEXT_WHITELIST.replace_all(&s, "");
    let s = PAREN_NUMERIC.replace_all(&s, "");
    let s = fix_whitespace(&s);
    let s = EXT_SUFFIX.replace_all(&s, "");
    let s = BITRATE_SUFFIX.replace_all(&s, "");
    let s = LEADING_PUNCT.replace_all(&s, "");
    let s = TRAILING_PUNCT.replace_all(&s, "");
    let s = UNDERSCORES.replace_all(&s, " ");
    fix_whitespace(&s)
}

/// Strip characters unsafe for a filename (no path separators, no
/// punctuation outside the whitelist).
pub fn safe_filename(s: &str) -> String {
    FILENAME_WHITELIST.replace_all(s, "").into_owned()
}

/// Collapse all whitespace runs to single spaces and trim the ends.
pub fn fix_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Leading digits of a possibly noisy numeric tag ("1/2" -> "1").
pub fn leading_digits(s: &str) -> String {
    LEADING_DIGITS
        .find(s)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

pub fn strip_leading_zeros(s: &str) -> String {
    s.trim_start_matches('0').to_string()
}

/// Zero-pad to two characters; empty stays empty, longer stays as is.
pub fn pad2(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    format!("{s:0>2}")
}

/// Expand a 2-digit year to four digits. Values above the current year's
/// last two digits land in the previous century ("69" -> "1969"), the
/// rest in the current one ("15" -> "2015").
fn year_ensure_century(year: &str) -> String {
    let mut year = year.to_string();
    if year.len() == 2 {
        let Ok(y) = year.parse::<i32>() else {
            return String::new();
        };
        let now = Local::now().year();
        let century = if y > now % 100 {
            now / 100 - 1
        } else {
            now / 100
        };
        year = format!("{century}{year}");
    }
    if year.len() != 4 {
        return String::new();
    }
    year
}

/// Calendar validity check; year must already be four digits.
fn valid_date(year: &str, month: &str, day: &str) -> bool {
    if year.len() != 4 {
        return false;
    }
    let (Ok(y), Ok(m), Ok(d)) = (year.parse::<i32>(), month.parse::<u32>(), day.parse::<u32>())
    else {
        return false;
    };
    NaiveDate::from_ymd_opt(y, m, d).is_some()
}
