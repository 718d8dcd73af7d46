// Canonicalization of free-text categorical fields and source-file dates.
//
// TrackMan exports spell the same pitch type and handedness a dozen ways
// across ballparks and software versions; everything downstream works on the
// small closed enums defined here.

use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Pitch type
// ---------------------------------------------------------------------------

/// Canonical pitch types. Anything that fails to match an alias is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchType {
    FourSeam,
    Sinker,
    Slider,
    Curveball,
    Changeup,
    Cutter,
    Splitter,
    Other,
}

impl PitchType {
    /// True for the pitch types counted as fastballs (average-fastball-velocity
    /// denominator).
    pub fn is_fastball(self) -> bool {
        matches!(self, PitchType::FourSeam | PitchType::Sinker)
    }
}

/// Normalize a raw pitch-type string. Case-insensitive, whitespace-trimmed;
/// unmatched or empty input maps to `Other`.
pub fn norm_pitch_type(raw: &str) -> PitchType {
    match raw.trim().to_lowercase().as_str() {
        "fastball" | "four-seam" | "fourseam" | "four seam" | "4-seam" | "4seam" | "ff"
        | "fourseamfastball" => PitchType::FourSeam,
        "sinker" | "two-seam" | "twoseam" | "two seam" | "2-seam" | "si" | "ft" => {
            PitchType::Sinker
        }
        "slider" | "sweeper" | "sl" | "st" => PitchType::Slider,
        "curveball" | "curve" | "knuckle curve" | "knucklecurve" | "cb" | "cu" | "kc" => {
            PitchType::Curveball
        }
        "changeup" | "change" | "change-up" | "ch" => PitchType::Changeup,
        "cutter" | "cut fastball" | "cutfastball" | "fc" => PitchType::Cutter,
        "splitter" | "split-finger" | "splitfinger" | "fs" => PitchType::Splitter,
        _ => PitchType::Other,
    }
}

// ---------------------------------------------------------------------------
// Handedness
// ---------------------------------------------------------------------------

/// Batter/pitcher handedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "L",
            Side::Right => "R",
        }
    }

    /// Model feature encoding: Left = 0, Right = 1.
    pub fn as_code(self) -> f64 {
        match self {
            Side::Left => 0.0,
            Side::Right => 1.0,
        }
    }
}

/// Normalize a handedness string by its first character after trimming and
/// uppercasing. Anything that is not 'L', including empty input, defaults to
/// `Right`. This is a lossy default chosen to satisfy the store's non-null
/// constraint, not a correctness guarantee.
pub fn norm_side(raw: &str) -> Side {
    match raw.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('L') => Side::Left,
        _ => Side::Right,
    }
}

// ---------------------------------------------------------------------------
// Source-file dates
// ---------------------------------------------------------------------------

/// Sane year range for embedded file dates.
const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

/// Extract the game date from a TrackMan CSV filename.
///
/// Two grammars are accepted:
/// - `YYYYMMDD-*.csv` (daily export)
/// - `*_YYYY-MM-DDTHHMMSS_*.csv` (session export)
///
/// Returns `None` when neither matches or the embedded year falls outside
/// 2000-2100. Callers treat `None` as fatal for the file: the date is part of
/// the aggregate identity key and cannot be defaulted.
pub fn date_from_filename(name: &str) -> Option<NaiveDate> {
    let stem = name.rsplit('/').next().unwrap_or(name);

    if let Some(date) = parse_compact_prefix(stem) {
        return Some(date);
    }
    parse_session_timestamp(stem)
}

/// `YYYYMMDD-*` prefix form.
fn parse_compact_prefix(stem: &str) -> Option<NaiveDate> {
    let bytes = stem.as_bytes();
    if bytes.len() < 9 || bytes[8] != b'-' {
        return None;
    }
    let digits = &stem[..8];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = digits[0..4].parse().ok()?;
    let month: u32 = digits[4..6].parse().ok()?;
    let day: u32 = digits[6..8].parse().ok()?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `*_YYYY-MM-DDTHHMMSS_*` embedded form: scan underscore-separated segments
/// for one that starts with an ISO date followed by 'T'.
fn parse_session_timestamp(stem: &str) -> Option<NaiveDate> {
    for segment in stem.split('_') {
        if segment.len() < 11 || !segment.is_char_boundary(10) {
            continue;
        }
        let (date_part, rest) = segment.split_at(10);
        if !rest.starts_with('T') {
            continue;
        }
        let mut parts = date_part.split('-');
        let (Some(y), Some(m), Some(d), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if y.len() != 4 || m.len() != 2 || d.len() != 2 {
            continue;
        }
        let (Ok(year), Ok(month), Ok(day)) = (y.parse::<i32>(), m.parse::<u32>(), d.parse::<u32>())
        else {
            continue;
        };
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            continue;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
