// Pitch-event table loading.
//
// Reads TrackMan-format CSV exports: one row per pitch, with identity columns
// (Batter/BatterTeam/Pitcher/PitcherTeam), categorical outcome columns
// (PlayResult, KorBB, PitchCall, TaggedHitType, TaggedPitchType, League) and
// numeric measurement columns (PlateLocHeight, PlateLocSide, ExitSpeed,
// Angle, Direction, RelSpeed). Numeric fields are parsed leniently per field:
// a malformed ExitSpeed drops that row's contribution to exit-velocity stats
// without dropping the row.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One pitch event with identity strings trimmed and numeric fields parsed.
#[derive(Debug, Clone, Default)]
pub struct PitchEvent {
    pub batter: String,
    pub batter_team: String,
    pub pitcher: String,
    pub pitcher_team: String,
    pub play_result: String,
    pub kor_bb: String,
    pub pitch_call: String,
    pub tagged_hit_type: String,
    pub tagged_pitch_type: String,
    pub batter_side: String,
    pub pitcher_throws: String,
    pub league: String,
    pub plate_loc_height: Option<f64>,
    pub plate_loc_side: Option<f64>,
    pub exit_speed: Option<f64>,
    pub angle: Option<f64>,
    pub direction: Option<f64>,
    pub rel_speed: Option<f64>,
}

/// A loaded source file: its identity, the column headers that were actually
/// present, and the parsed rows. Headers are retained so the aggregator can
/// apply its missing-required-columns degrade policy.
#[derive(Debug, Clone)]
pub struct EventTable {
    pub source_id: String,
    pub headers: HashSet<String>,
    pub rows: Vec<PitchEvent>,
}

impl EventTable {
    /// True iff every named column was present in the source header row.
    pub fn has_columns(&self, required: &[&str]) -> bool {
        required.iter().all(|c| self.headers.contains(*c))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Raw CSV serde struct (private), TrackMan column names
// ---------------------------------------------------------------------------

/// Raw TrackMan row. Everything is `Option<String>` so that a malformed value
/// in one column never rejects the whole row; numeric parsing happens after
/// deserialization. Extra columns (TrackMan exports carry dozens) are ignored.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawEvent {
    #[serde(default)]
    Batter: Option<String>,
    #[serde(default)]
    BatterTeam: Option<String>,
    #[serde(default)]
    Pitcher: Option<String>,
    #[serde(default)]
    PitcherTeam: Option<String>,
    #[serde(default)]
    PlayResult: Option<String>,
    #[serde(default)]
    KorBB: Option<String>,
    #[serde(default)]
    PitchCall: Option<String>,
    #[serde(default, alias = "HitType")]
    TaggedHitType: Option<String>,
    #[serde(default, alias = "AutoPitchType")]
    TaggedPitchType: Option<String>,
    #[serde(default)]
    BatterSide: Option<String>,
    #[serde(default)]
    PitcherThrows: Option<String>,
    #[serde(default)]
    League: Option<String>,
    #[serde(default)]
    PlateLocHeight: Option<String>,
    #[serde(default)]
    PlateLocSide: Option<String>,
    #[serde(default)]
    ExitSpeed: Option<String>,
    #[serde(default)]
    Angle: Option<String>,
    #[serde(default)]
    Direction: Option<String>,
    #[serde(default)]
    RelSpeed: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn trimmed(raw: Option<String>) -> String {
    raw.map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Lenient per-field numeric parse: trims, parses, and rejects non-finite
/// values. Anything unparseable becomes `None` rather than an error.
fn parse_float(raw: Option<String>) -> Option<f64> {
    let v: f64 = raw?.trim().parse().ok()?;
    v.is_finite().then_some(v)
}

impl RawEvent {
    fn into_event(self) -> PitchEvent {
        PitchEvent {
            batter: trimmed(self.Batter),
            batter_team: trimmed(self.BatterTeam),
            pitcher: trimmed(self.Pitcher),
            pitcher_team: trimmed(self.PitcherTeam),
            play_result: trimmed(self.PlayResult),
            kor_bb: trimmed(self.KorBB),
            pitch_call: trimmed(self.PitchCall),
            tagged_hit_type: trimmed(self.TaggedHitType),
            tagged_pitch_type: trimmed(self.TaggedPitchType),
            batter_side: trimmed(self.BatterSide),
            pitcher_throws: trimmed(self.PitcherThrows),
            league: trimmed(self.League),
            plate_loc_height: parse_float(self.PlateLocHeight),
            plate_loc_side: parse_float(self.PlateLocSide),
            exit_speed: parse_float(self.ExitSpeed),
            angle: parse_float(self.Angle),
            direction: parse_float(self.Direction),
            rel_speed: parse_float(self.RelSpeed),
        }
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Load an event table from any reader. Exposed for testing without temp
/// files; `load_events` is the path-based wrapper.
pub fn load_events_from_reader<R: Read>(
    rdr: R,
    source_id: &str,
) -> Result<EventTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);

    let headers: HashSet<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.deserialize::<RawEvent>() {
        match result {
            Ok(raw) => rows.push(raw.into_event()),
            Err(e) => {
                warn!("{}: skipping malformed event row: {}", source_id, e);
            }
        }
    }

    Ok(EventTable {
        source_id: source_id.to_string(),
        headers,
        rows,
    })
}

/// Load an event table from a CSV file. The file name (not the full path) is
/// used as the source id, matching how game dates are embedded in TrackMan
/// export names.
pub fn load_events(path: &Path) -> Result<EventTable, EventError> {
    let source_id = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let file = std::fs::File::open(path).map_err(|e| EventError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    load_events_from_reader(file, &source_id).map_err(|e| EventError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
