//! Canonical track metadata and its derivation rules.
//!
//! An [`Info`] starts empty and is filled from three sources in order of
//! trust: folder path segments (innermost first), the file name, and
//! finally the tags embedded in the audio stream. Path and file parsing
//! only fill fields that are still empty, so the segment nearest the
//! file wins. [`Info::reconcile`] folds probed tags into the result and
//! reports whether the two sources already agreed.

use std::path::Path;

use crate::parse;
use crate::probe::TagData;

/// Metadata record for one audio track. Empty string means unknown.
/// Year, month, and day are either all set or form no date at all;
/// disc and track are held unpadded and only padded when rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    pub artist: String,
    pub album: String,
    pub year: String,
    pub month: String,
    pub day: String,
    pub disc: String,
    pub track: String,
    pub title: String,
}

impl Info {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive album info from a nested folder path. Segments are walked
    /// innermost first so the folder closest to the file takes
    /// precedence for the album and date.
    ///
    /// Returns the leftover text of each segment after date and disc
    /// markers were consumed, in original segment order. An empty entry
    /// means the segment carried nothing but markers (a stray `cd1`
    /// folder, say) and should not survive into the result path.
    pub fn from_path(&mut self, path: &Path) -> Vec<String> {
        let segments: Vec<String> = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let mut stripped = vec![String::new(); segments.len()];
        for x in (0..segments.len()).rev() {
            stripped[x] = self.from_album(&segments[x]);
        }
        stripped
    }

    /// Derive disc, date, and album from one album-ish string, filling
    /// only fields that are still empty. Returns the sanitized leftover.
    pub fn from_album(&mut self, s: &str) -> String {
        let s = self.consume_markers(s);
        let cleaned = parse::match_album_or_title(&s);
        if self.album.is_empty() {
            self.album = cleaned.clone();
        }
        cleaned
    }

    /// Apply an explicit album override, still consuming any date or
    /// disc markers embedded in it.
    pub fn set_album(&mut self, s: &str) {
        let s = self.consume_markers(s);
        self.album = parse::match_album_or_title(&s);
    }

    /// Derive date, disc, track, and title from a file name (without
    /// extension). A leading artist or album prefix is trimmed first
    /// when those fields are already known.
    pub fn from_file(&mut self, s: &str) {
        let mut s = self.trim_known_prefix(s).to_string();

        if let Some((date, remain)) = parse::match_date(&s) {
            self.fill_date(date);
            s = remain;
        }
        if let Some((disc, track, remain)) = parse::match_disc_track(&s) {
            self.disc = disc;
            self.track = track;
            s = remain;
        }

        self.title = parse::match_album_or_title(&s);
    }

    /// Strip disc-only, full-date, and year-only markers from the front
    /// of an album string, filling still-empty fields from what matched.
    fn consume_markers(&mut self, s: &str) -> String {
        let mut s = s.to_string();

        if let Some((disc, remain)) = parse::match_disc_only(&s) {
            if self.disc.is_empty() {
                self.disc = disc;
            }
            s = remain;
        }
        if let Some((date, remain)) = parse::match_date(&s) {
            self.fill_date(date);
            s = remain;
        }
        if let Some((year, remain)) = parse::match_year_only(&s) {
            if self.year.is_empty() {
                self.year = year;
            }
            s = remain;
        }

        s
    }

    // date fields fill together so a partial date never survives
    fn fill_date(&mut self, date: parse::DateParts) {
        if self.year.is_empty() || self.month.is_empty() || self.day.is_empty() {
            self.year = date.year;
            self.month = date.month;
            self.day = date.day;
        }
    }

    fn trim_known_prefix<'a>(&self, s: &'a str) -> &'a str {
        let mut s = s;
        for known in [self.artist.as_str(), self.album.as_str()] {
            if known.is_empty() {
                continue;
            }
            for sep in [" - ", "-", " "] {
                if let Some(rest) = s.strip_prefix(known).and_then(|r| r.strip_prefix(sep)) {
                    s = rest;
                    break;
                }
            }
        }
        s
    }

    /// Album directory name: `"YYYY.MM.DD Album"` with a full date,
    /// `"YYYY Album"` with only a year, bare album otherwise.
    pub fn to_album(&self) -> String {
        if !self.year.is_empty() {
            if !self.month.is_empty() && !self.day.is_empty() {
                return format!("{}.{}.{} {}", self.year, self.month, self.day, self.album);
            }
            return format!("{} {}", self.year, self.album);
        }
        self.album.clone()
    }

    /// File name without extension: `"DD-TT Title"`, or `"TT Title"`
    /// when no disc is known. Disc and track are zero-padded to two
    /// digits; the title passes through the filename whitelist.
    pub fn to_file(&self) -> String {
        let mut out = String::new();
        if !self.disc.is_empty() {
            out.push_str(&parse::pad2(&self.disc));
            out.push('-');
        }
        out.push_str(&parse::pad2(&self.track));
        out.push(' ');
        out.push_str(&parse::safe_filename(&self.title));
        out
    }

    /// Fold probed tag data into this path-derived info.
    ///
    /// The tags are first run through the same derivation rules (date
    /// and disc markers pulled out of the raw album string, title
    /// sanitized to filename form). If both sources agree the local
    /// info is returned with a `true` match verdict and nothing needs
    /// rewriting. Otherwise a field-by-field merge decides:
    /// local artist wins when present, tag values win for date and
    /// disc/track unless noisy or empty, and the longer album and
    /// title win.
    pub fn reconcile(&self, tags: &TagData) -> (Info, bool) {
        let mut tag = Info {
            artist: tags.artist.clone(),
            // a multi-value disc tag like "1/2" reads as "1"
            disc: parse::leading_digits(&tags.disc),
            track: tags.track.clone(),
            // compare in filename form since local info came from one
            title: parse::safe_filename(&parse::match_album_or_title(&tags.title)),
            ..Info::default()
        };
        tag.from_album(&tags.album);

        if *self == tag {
            return (self.clone(), true);
        }

        let mut result = tag;

        if !self.artist.is_empty() {
            result.artist = self.artist.clone();
        }

        result.disc = prefer_numeric(&tags.disc, &self.disc);
        result.track = prefer_numeric(&tags.track, &self.track);

        if result.year.is_empty() {
            result.year = self.year.clone();
        }
        if result.month.is_empty() {
            result.month = self.month.clone();
        }
        if result.day.is_empty() {
            result.day = self.day.clone();
        }

        if result.album.len() < self.album.len() {
            result.album = self.album.clone();
        }
        if result.title.len() < self.title.len() {
            result.title = self.title.clone();
        }

        (result, false)
    }
}

/// Choose between a raw numeric tag value and the locally derived one.
/// The tag wins only when it is purely its own leading digits; a noisy
/// ("1/2") or empty tag falls back to the local value when one exists.
fn prefer_numeric(tag: &str, local: &str) -> String {
    let digits = parse::leading_digits(tag);
    if (digits.is_empty() || digits != tag) && !local.is_empty() {
        return local.to_string();
    }
    digits
}
