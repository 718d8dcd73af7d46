// Per-file aggregation: reduces grouped pitch events into per-player
// aggregates with counting stats, derived rate stats, and expected-outcome
// stats.
//
// Batter and pitcher aggregation share one row-scan profile; the only
// differences are the grouping identity, the period granularity (season year
// for batters, game date for pitchers) and which derived rates each side
// reports. The counting predicates here are the load-bearing business logic.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use tracing::warn;

use crate::events::{EventTable, PitchEvent};
use crate::expected::{ContactFeatures, ModelContext};
use crate::normalize::{date_from_filename, norm_pitch_type, norm_side, PitchType, Side};
use crate::zone::{classify, is_in_strike_zone};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Suffix appended to every team code in a source file containing at least
/// one practice-flagged row (League == "team"). This is a per-file decision:
/// a single flagged row remaps the whole file.
pub const PRACTICE_TEAM_SUFFIX: &str = "_PRAC";

/// Exit velocity at or above which a batted ball counts as hard-hit (mph).
const HARD_HIT_EV: f64 = 95.0;

/// Launch-angle band for sweet-spot contact (degrees).
const SWEET_SPOT_LA: (f64, f64) = (8.0, 32.0);

/// Barrel thresholds on per-row expected outcomes.
const BARREL_MIN_XBA: f64 = 0.5;
const BARREL_MIN_XSLG: f64 = 1.5;

/// Linear weights for non-batted-ball outcomes in the xwOBA numerator.
const XWOBA_WEIGHT_WALK: f64 = 0.69;
const XWOBA_WEIGHT_HBP: f64 = 0.72;
const XWOBA_WEIGHT_SACRIFICE: f64 = 0.0;
const XWOBA_WEIGHT_FIELDERS_CHOICE: f64 = 0.0;
const XWOBA_WEIGHT_OUT: f64 = 0.0;

/// Infield spray slices: five 18-degree bands across [-45, 45] degrees.
const SPRAY_SLICES: usize = 5;
const SPRAY_MIN_DEG: f64 = -45.0;
const SPRAY_MAX_DEG: f64 = 45.0;

/// Columns that must be present for batter aggregation to proceed.
const REQUIRED_BATTER_COLUMNS: &[&str] =
    &["Batter", "BatterTeam", "PlayResult", "KorBB", "PitchCall"];

/// Columns that must be present for pitcher aggregation to proceed.
const REQUIRED_PITCHER_COLUMNS: &[&str] =
    &["Pitcher", "PitcherTeam", "PlayResult", "KorBB", "PitchCall"];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("cannot derive a game date from source id `{0}`")]
    UnparseablePeriod(String),
}

// ---------------------------------------------------------------------------
// Entity keys
// ---------------------------------------------------------------------------

/// Identity of a batter-season aggregate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatterKey {
    pub batter: String,
    pub team: String,
    pub year: i32,
}

/// Identity of a pitcher-outing aggregate (one row per game date).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PitcherKey {
    pub pitcher: String,
    pub team: String,
    pub date: NaiveDate,
}

/// Identity of a single strike-zone heat-map bin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneKey {
    pub team: String,
    pub year: i32,
    pub player: String,
    pub zone_id: u8,
}

// ---------------------------------------------------------------------------
// Aggregate records
// ---------------------------------------------------------------------------

/// Percentile ranks for the tracked batter rate stats, filled by the ranking
/// pass and overwritten wholesale on every refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatterRanks {
    pub avg: Option<u32>,
    pub obp: Option<u32>,
    pub slg: Option<u32>,
    pub ops: Option<u32>,
    pub k_per: Option<u32>,
    pub bb_per: Option<u32>,
    pub whiff_per: Option<u32>,
    pub chase_per: Option<u32>,
    pub avg_exit_velo: Option<u32>,
    pub hard_hit_per: Option<u32>,
    pub xba_per: Option<u32>,
    pub xwoba_per: Option<u32>,
    pub barrel_per: Option<u32>,
}

/// A batter's aggregate line for one (batter, team, season).
///
/// Every rate field is `None` exactly when its denominator counting field is
/// zero. `processed_files` records the source files already folded in, so
/// reprocessing an export is a no-op rather than a double count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatterAggregate {
    pub batter: String,
    pub team: String,
    pub year: i32,

    // Counting fields
    pub plate_app: u32,
    pub at_bats: u32,
    pub batted_balls: u32,
    pub strikeouts: u32,
    pub walks: u32,
    pub singles: u32,
    pub doubles: u32,
    pub triples: u32,
    pub home_runs: u32,
    pub in_zone_pitches: u32,
    pub out_of_zone_pitches: u32,
    pub ground_balls: u32,
    pub fastballs: u32,
    pub spray: [u32; SPRAY_SLICES],

    // Rate fields
    pub avg: Option<f64>,
    pub obp: Option<f64>,
    pub slg: Option<f64>,
    pub ops: Option<f64>,
    pub iso: Option<f64>,
    pub k_per: Option<f64>,
    pub bb_per: Option<f64>,
    pub whiff_per: Option<f64>,
    pub chase_per: Option<f64>,
    pub hard_hit_per: Option<f64>,
    pub sweet_spot_per: Option<f64>,
    pub gb_per: Option<f64>,
    pub avg_exit_velo: Option<f64>,
    pub avg_fb_velo: Option<f64>,
    pub xba_per: Option<f64>,
    pub xslg_per: Option<f64>,
    pub xwoba_per: Option<f64>,
    pub barrel_per: Option<f64>,
    pub spray_per: [Option<f64>; SPRAY_SLICES],

    pub ranks: BatterRanks,
    pub processed_files: BTreeSet<String>,
}

impl BatterAggregate {
    pub fn key(&self) -> BatterKey {
        BatterKey {
            batter: self.batter.clone(),
            team: self.team.clone(),
            year: self.year,
        }
    }

    pub fn hits(&self) -> u32 {
        self.singles + self.doubles + self.triples + self.home_runs
    }
}

/// Percentile ranks for the tracked pitcher rate stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PitcherRanks {
    pub k_per: Option<u32>,
    pub bb_per: Option<u32>,
    pub whip: Option<u32>,
    pub avg_against: Option<u32>,
    pub gb_per: Option<u32>,
    pub whiff_per: Option<u32>,
    pub chase_per: Option<u32>,
    pub avg_exit_velo: Option<u32>,
    pub avg_fb_velo: Option<u32>,
}

/// A pitcher's aggregate line for one (pitcher, team, game date).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitcherAggregate {
    pub pitcher: String,
    pub team: String,
    pub date: NaiveDate,

    // Counting fields
    pub batters_faced: u32,
    pub at_bats_against: u32,
    pub hits_allowed: u32,
    pub strikeouts: u32,
    pub walks: u32,
    pub batted_balls: u32,
    pub ground_balls: u32,
    pub in_zone_pitches: u32,
    pub out_of_zone_pitches: u32,
    pub fastballs: u32,
    pub pitches: u32,
    pub outs_recorded: u32,

    // Rate fields
    pub k_per: Option<f64>,
    pub bb_per: Option<f64>,
    pub whip: Option<f64>,
    pub avg_against: Option<f64>,
    pub gb_per: Option<f64>,
    pub whiff_per: Option<f64>,
    pub chase_per: Option<f64>,
    pub avg_exit_velo: Option<f64>,
    pub avg_fb_velo: Option<f64>,

    pub ranks: PitcherRanks,
    pub unique_games: BTreeSet<String>,
}

impl PitcherAggregate {
    pub fn key(&self) -> PitcherKey {
        PitcherKey {
            pitcher: self.pitcher.clone(),
            team: self.team.clone(),
            date: self.date,
        }
    }
}

/// One strike-zone heat-map bin for a batter. All fields are counts; bins
/// merge additively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneBin {
    pub team: String,
    pub year: i32,
    pub player: String,
    pub zone_id: u8,

    pub total_pitches: u32,
    pub fastballs: u32,
    pub breaking_balls: u32,
    pub offspeed: u32,
    pub vs_left: u32,
    pub vs_right: u32,
    pub swings: u32,
    pub whiffs: u32,
    pub hits: u32,
}

impl ZoneBin {
    pub fn key(&self) -> ZoneKey {
        ZoneKey {
            team: self.team.clone(),
            year: self.year,
            player: self.player.clone(),
            zone_id: self.zone_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Row predicates
// ---------------------------------------------------------------------------

fn is_strikeout(row: &PitchEvent) -> bool {
    row.kor_bb.eq_ignore_ascii_case("Strikeout")
}

fn is_walk(row: &PitchEvent) -> bool {
    row.kor_bb.eq_ignore_ascii_case("Walk")
}

fn is_hbp(row: &PitchEvent) -> bool {
    row.pitch_call.eq_ignore_ascii_case("HitByPitch")
}

fn is_in_play(row: &PitchEvent) -> bool {
    row.pitch_call.eq_ignore_ascii_case("InPlay")
}

/// A swing: swinging strike, foul, or ball put in play. TrackMan spells fouls
/// as FoulBall, FoulBallFieldable or FoulBallNotFieldable.
fn is_swing(row: &PitchEvent) -> bool {
    let call = row.pitch_call.to_ascii_lowercase();
    call == "strikeswinging" || call == "inplay" || call.starts_with("foulball")
}

fn is_whiff(row: &PitchEvent) -> bool {
    row.pitch_call.eq_ignore_ascii_case("StrikeSwinging")
}

/// Play results that terminate a plate appearance.
fn has_play_result(row: &PitchEvent) -> bool {
    !row.play_result.is_empty() && !row.play_result.eq_ignore_ascii_case("Undefined")
}

/// At-bat predicate: hit, out, error or fielder's choice result, or a
/// strikeout. Walks, hit-by-pitch and sacrifices are excluded.
fn is_at_bat(row: &PitchEvent) -> bool {
    const AB_RESULTS: &[&str] = &[
        "single",
        "double",
        "triple",
        "homerun",
        "out",
        "error",
        "fielderschoice",
    ];
    AB_RESULTS.contains(&row.play_result.to_ascii_lowercase().as_str()) || is_strikeout(row)
}

/// A complete batted ball: in play with every feature the expected-outcome
/// models need.
fn is_complete_batted_ball(row: &PitchEvent) -> bool {
    is_in_play(row)
        && row.exit_speed.is_some()
        && row.angle.is_some()
        && row.direction.is_some()
        && !row.batter_side.is_empty()
}

// ---------------------------------------------------------------------------
// Shared row-scan profile
// ---------------------------------------------------------------------------

/// Counting profile accumulated over one group's rows. Both the batter and
/// pitcher aggregators reduce through this; they differ only in which derived
/// rates they read out.
#[derive(Debug, Clone, Default)]
struct GroupProfile {
    pitches: u32,
    plate_app: u32,
    at_bats: u32,
    singles: u32,
    doubles: u32,
    triples: u32,
    home_runs: u32,
    strikeouts: u32,
    walks: u32,
    hit_by_pitch: u32,
    sacrifices: u32,
    fielders_choices: u32,
    outs: u32,
    batted_balls: u32,
    ground_balls: u32,
    hard_hits: u32,
    sweet_spots: u32,
    ev_sum: f64,
    ev_count: u32,
    fastballs: u32,
    fb_velo_sum: f64,
    in_zone: u32,
    out_of_zone: u32,
    in_zone_whiffs: u32,
    chases: u32,
    spray: [u32; SPRAY_SLICES],
}

impl GroupProfile {
    fn observe(&mut self, row: &PitchEvent) {
        self.pitches += 1;

        let k = is_strikeout(row);
        let bb = is_walk(row);
        let hbp = is_hbp(row);

        if has_play_result(row) || k || bb || hbp {
            self.plate_app += 1;
        }
        if is_at_bat(row) {
            self.at_bats += 1;
        }
        if k {
            self.strikeouts += 1;
        }
        if bb {
            self.walks += 1;
        }
        if hbp {
            self.hit_by_pitch += 1;
        }

        match row.play_result.to_ascii_lowercase().as_str() {
            "single" => self.singles += 1,
            "double" => self.doubles += 1,
            "triple" => self.triples += 1,
            "homerun" => self.home_runs += 1,
            "out" => self.outs += 1,
            "sacrifice" => self.sacrifices += 1,
            "fielderschoice" => self.fielders_choices += 1,
            _ => {}
        }

        if is_in_play(row) {
            self.batted_balls += 1;
            if row.tagged_hit_type.eq_ignore_ascii_case("GroundBall") {
                self.ground_balls += 1;
                if let Some(dir) = row.direction {
                    let side = norm_side(&row.batter_side);
                    self.spray[spray_slice(dir, side)] += 1;
                }
            }
            if let Some(ev) = row.exit_speed {
                self.ev_sum += ev;
                self.ev_count += 1;
                if ev >= HARD_HIT_EV {
                    self.hard_hits += 1;
                }
            }
            if let Some(la) = row.angle {
                if (SWEET_SPOT_LA.0..=SWEET_SPOT_LA.1).contains(&la) {
                    self.sweet_spots += 1;
                }
            }
        }

        if norm_pitch_type(&row.tagged_pitch_type).is_fastball() {
            if let Some(velo) = row.rel_speed {
                self.fastballs += 1;
                self.fb_velo_sum += velo;
            }
        }

        // Zone pass: rows with an invalid or missing location are skipped
        // entirely (neither in-zone nor out-of-zone).
        if row.plate_loc_height.is_some() && row.plate_loc_side.is_some() {
            if is_in_strike_zone(row.plate_loc_height, row.plate_loc_side) {
                self.in_zone += 1;
                if is_whiff(row) {
                    self.in_zone_whiffs += 1;
                }
            } else {
                self.out_of_zone += 1;
                if is_swing(row) {
                    self.chases += 1;
                }
            }
        }
    }

    fn hits(&self) -> u32 {
        self.singles + self.doubles + self.triples + self.home_runs
    }

    fn total_bases(&self) -> u32 {
        self.singles + 2 * self.doubles + 3 * self.triples + 4 * self.home_runs
    }
}

/// Map a spray direction (degrees, mirrored for left-handed batters so that
/// positive is always the pull side) into one of the five infield slices.
fn spray_slice(direction: f64, side: Side) -> usize {
    let dir = match side {
        Side::Left => -direction,
        Side::Right => direction,
    };
    let clamped = dir.clamp(SPRAY_MIN_DEG, SPRAY_MAX_DEG);
    let width = (SPRAY_MAX_DEG - SPRAY_MIN_DEG) / SPRAY_SLICES as f64;
    (((clamped - SPRAY_MIN_DEG) / width) as usize).min(SPRAY_SLICES - 1)
}

// ---------------------------------------------------------------------------
// Rate helpers
// ---------------------------------------------------------------------------

/// Ratio guarded against a zero denominator.
fn ratio(num: u32, den: u32) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

fn mean(sum: f64, n: u32) -> Option<f64> {
    (n > 0).then(|| sum / n as f64)
}

// ---------------------------------------------------------------------------
// Expected-outcome pass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct ExpectedLine {
    xba: Option<f64>,
    xslg: Option<f64>,
    xwoba: Option<f64>,
    barrel_per: Option<f64>,
}

/// Bin a raw direction to the nearest multiple of 5 degrees, mirroring
/// left-handed batters first.
fn dir_bin(direction: f64, side: Side) -> i32 {
    let dir = match side {
        Side::Left => -direction,
        Side::Right => direction,
    };
    ((dir / 5.0).round() as i32) * 5
}

impl ExpectedLine {
    /// Compute the expected-outcome stats for one entity from its complete
    /// batted balls. A model failure is caught here, logged with the entity
    /// identity, and degrades that stat to 0; one entity's failure never
    /// aborts the batch.
    fn compute(ctx: &ModelContext, rows: &[&PitchEvent], profile: &GroupProfile, who: &str) -> Self {
        let complete: Vec<&PitchEvent> = rows
            .iter()
            .copied()
            .filter(|r| is_complete_batted_ball(r))
            .collect();

        let pa_floor = profile.plate_app.max(1);
        let non_contact = XWOBA_WEIGHT_WALK * profile.walks as f64
            + XWOBA_WEIGHT_HBP * profile.hit_by_pitch as f64
            + XWOBA_WEIGHT_SACRIFICE * profile.sacrifices as f64
            + XWOBA_WEIGHT_FIELDERS_CHOICE * profile.fielders_choices as f64
            + XWOBA_WEIGHT_OUT * profile.outs as f64;

        if complete.is_empty() {
            // No contact to score: contact-quality stats stay at their
            // zero-denominator defaults, xwOBA still folds in walk/HBP value.
            return Self {
                xba: None,
                xslg: None,
                xwoba: Some((non_contact / pa_floor as f64).max(0.0)),
                barrel_per: None,
            };
        }

        let features: Vec<ContactFeatures> = complete
            .iter()
            .map(|r| {
                let side = norm_side(&r.batter_side);
                let ev = r.exit_speed.unwrap_or_default().round();
                let la = r.angle.unwrap_or_default().round();
                let dir = dir_bin(r.direction.unwrap_or_default(), side) as f64;
                ContactFeatures {
                    exit_speed: ev,
                    angle: la,
                    direction: dir,
                    batter_side: side.as_code(),
                }
            })
            .collect();

        let row_xba: Vec<f64> = features
            .iter()
            .map(|f| {
                ctx.grid
                    .lookup(f.exit_speed as i32, f.angle as i32, f.direction as i32)
            })
            .collect();

        // xSLG: absent model degrades every row to 0.
        let row_xslg: Vec<f64> = match &ctx.xslg {
            Some(model) => match model.predict(&features) {
                Ok(v) => v,
                Err(e) => {
                    warn!("xSLG model failed for {}: {}; defaulting to 0", who, e);
                    vec![0.0; features.len()]
                }
            },
            None => vec![0.0; features.len()],
        };

        // xwOBA contact value: absent or failing model contributes 0.
        let row_xwoba: Vec<f64> = match &ctx.xwoba {
            Some(model) => match model.predict(&features) {
                Ok(v) => v,
                Err(e) => {
                    warn!("xwOBA model failed for {}: {}; defaulting to 0", who, e);
                    vec![0.0; features.len()]
                }
            },
            None => vec![0.0; features.len()],
        };

        let n = complete.len() as f64;

        let xba = (profile.at_bats > 0).then(|| {
            let scale = profile.batted_balls as f64 / profile.at_bats as f64;
            ((row_xba.iter().sum::<f64>() / n) * scale).max(0.0)
        });
        let xslg = (profile.at_bats > 0).then(|| {
            let scale = profile.batted_balls as f64 / profile.at_bats as f64;
            ((row_xslg.iter().sum::<f64>() / n) * scale).max(0.0)
        });

        let xwoba =
            ((row_xwoba.iter().sum::<f64>() + non_contact) / pa_floor as f64).max(0.0);

        let barrels = row_xba
            .iter()
            .zip(&row_xslg)
            .filter(|(a, s)| **a >= BARREL_MIN_XBA && **s >= BARREL_MIN_XSLG)
            .count() as u32;

        Self {
            xba,
            xslg,
            xwoba: Some(xwoba),
            barrel_per: ratio(barrels, complete.len() as u32),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Per-file aggregation engine. Holds the loaded expected-outcome grid and
/// model handles; construct once per process and reuse across files.
pub struct Aggregator {
    ctx: ModelContext,
}

impl Aggregator {
    pub fn new(ctx: ModelContext) -> Self {
        Self { ctx }
    }

    /// Reduce a source file to batter-season aggregates keyed by
    /// (batter, team, year).
    ///
    /// Missing required columns degrade to an empty map with a warning; a
    /// source id without a parseable date is an error because the season is
    /// part of the identity key.
    pub fn aggregate_batters(
        &self,
        table: &EventTable,
    ) -> Result<BTreeMap<BatterKey, BatterAggregate>, AggregateError> {
        if !table.has_columns(REQUIRED_BATTER_COLUMNS) {
            warn!(
                "{}: missing required batter columns; producing no aggregates",
                table.source_id
            );
            return Ok(BTreeMap::new());
        }
        let date = source_date(table)?;
        let practice = is_practice_file(table);

        let mut out = BTreeMap::new();
        for ((batter, team), rows) in group_rows(table, |r| (&r.batter, &r.batter_team), practice)
        {
            let mut profile = GroupProfile::default();
            for row in &rows {
                profile.observe(row);
            }
            let expected =
                ExpectedLine::compute(&self.ctx, &rows, &profile, &format!("{batter} ({team})"));

            let spray_total: u32 = profile.spray.iter().sum();
            let mut agg = BatterAggregate {
                batter,
                team,
                year: date.year(),
                plate_app: profile.plate_app,
                at_bats: profile.at_bats,
                batted_balls: profile.batted_balls,
                strikeouts: profile.strikeouts,
                walks: profile.walks,
                singles: profile.singles,
                doubles: profile.doubles,
                triples: profile.triples,
                home_runs: profile.home_runs,
                in_zone_pitches: profile.in_zone,
                out_of_zone_pitches: profile.out_of_zone,
                ground_balls: profile.ground_balls,
                fastballs: profile.fastballs,
                spray: profile.spray,
                avg: ratio(profile.hits(), profile.at_bats),
                obp: ratio(
                    profile.hits() + profile.walks + profile.hit_by_pitch,
                    profile.at_bats + profile.walks + profile.hit_by_pitch + profile.sacrifices,
                ),
                slg: ratio(profile.total_bases(), profile.at_bats),
                ops: None,
                iso: None,
                k_per: ratio(profile.strikeouts, profile.plate_app),
                bb_per: ratio(profile.walks, profile.plate_app),
                whiff_per: ratio(profile.in_zone_whiffs, profile.in_zone),
                chase_per: ratio(profile.chases, profile.out_of_zone),
                hard_hit_per: ratio(profile.hard_hits, profile.batted_balls),
                sweet_spot_per: ratio(profile.sweet_spots, profile.batted_balls),
                gb_per: ratio(profile.ground_balls, profile.batted_balls),
                avg_exit_velo: mean(profile.ev_sum, profile.ev_count),
                avg_fb_velo: mean(profile.fb_velo_sum, profile.fastballs),
                xba_per: expected.xba,
                xslg_per: expected.xslg,
                xwoba_per: expected.xwoba,
                barrel_per: expected.barrel_per,
                spray_per: std::array::from_fn(|i| ratio(profile.spray[i], spray_total)),
                ranks: BatterRanks::default(),
                processed_files: BTreeSet::from([table.source_id.clone()]),
            };
            agg.ops = match (agg.obp, agg.slg) {
                (Some(o), Some(s)) => Some(o + s),
                _ => None,
            };
            agg.iso = match (agg.slg, agg.avg) {
                (Some(s), Some(a)) => Some(s - a),
                _ => None,
            };
            out.insert(agg.key(), agg);
        }
        Ok(out)
    }

    /// Reduce a source file to pitcher-outing aggregates keyed by
    /// (pitcher, team, game date).
    pub fn aggregate_pitchers(
        &self,
        table: &EventTable,
    ) -> Result<BTreeMap<PitcherKey, PitcherAggregate>, AggregateError> {
        if !table.has_columns(REQUIRED_PITCHER_COLUMNS) {
            warn!(
                "{}: missing required pitcher columns; producing no aggregates",
                table.source_id
            );
            return Ok(BTreeMap::new());
        }
        let date = source_date(table)?;
        let practice = is_practice_file(table);

        let mut out = BTreeMap::new();
        for ((pitcher, team), rows) in
            group_rows(table, |r| (&r.pitcher, &r.pitcher_team), practice)
        {
            let mut profile = GroupProfile::default();
            for row in &rows {
                profile.observe(row);
            }

            let outs_recorded =
                profile.strikeouts + profile.outs + profile.fielders_choices + profile.sacrifices;
            let innings = outs_recorded as f64 / 3.0;

            let agg = PitcherAggregate {
                pitcher,
                team,
                date,
                batters_faced: profile.plate_app,
                at_bats_against: profile.at_bats,
                hits_allowed: profile.hits(),
                strikeouts: profile.strikeouts,
                walks: profile.walks,
                batted_balls: profile.batted_balls,
                ground_balls: profile.ground_balls,
                in_zone_pitches: profile.in_zone,
                out_of_zone_pitches: profile.out_of_zone,
                fastballs: profile.fastballs,
                pitches: profile.pitches,
                outs_recorded,
                k_per: ratio(profile.strikeouts, profile.plate_app),
                bb_per: ratio(profile.walks, profile.plate_app),
                whip: (outs_recorded > 0)
                    .then(|| (profile.walks + profile.hits()) as f64 / innings),
                avg_against: ratio(profile.hits(), profile.at_bats),
                gb_per: ratio(profile.ground_balls, profile.batted_balls),
                whiff_per: ratio(profile.in_zone_whiffs, profile.in_zone),
                chase_per: ratio(profile.chases, profile.out_of_zone),
                avg_exit_velo: mean(profile.ev_sum, profile.ev_count),
                avg_fb_velo: mean(profile.fb_velo_sum, profile.fastballs),
                ranks: PitcherRanks::default(),
                unique_games: BTreeSet::from([table.source_id.clone()]),
            };
            out.insert(agg.key(), agg);
        }
        Ok(out)
    }

    /// Reduce a source file to per-batter zone bins. Rows without a valid
    /// plate location contribute to no bin.
    pub fn aggregate_zone_bins(
        &self,
        table: &EventTable,
    ) -> Result<BTreeMap<ZoneKey, ZoneBin>, AggregateError> {
        if !table.has_columns(REQUIRED_BATTER_COLUMNS) {
            warn!(
                "{}: missing required batter columns; producing no zone bins",
                table.source_id
            );
            return Ok(BTreeMap::new());
        }
        let date = source_date(table)?;
        let practice = is_practice_file(table);
        let year = date.year();

        let mut out: BTreeMap<ZoneKey, ZoneBin> = BTreeMap::new();
        for row in &table.rows {
            let batter = row.batter.trim();
            let team = row.batter_team.trim();
            if batter.is_empty() || team.is_empty() {
                continue;
            }
            let (Some(height), Some(side)) = (row.plate_loc_height, row.plate_loc_side) else {
                continue;
            };
            let zone = classify(side, height);
            let key = ZoneKey {
                team: team_code(team, practice),
                year,
                player: batter.to_string(),
                zone_id: zone.zone_id,
            };
            let bin = out.entry(key.clone()).or_insert_with(|| ZoneBin {
                team: key.team.clone(),
                year,
                player: key.player.clone(),
                zone_id: key.zone_id,
                ..ZoneBin::default()
            });

            bin.total_pitches += 1;
            match norm_pitch_type(&row.tagged_pitch_type) {
                PitchType::FourSeam | PitchType::Sinker | PitchType::Cutter => {
                    bin.fastballs += 1
                }
                PitchType::Slider | PitchType::Curveball => bin.breaking_balls += 1,
                PitchType::Changeup | PitchType::Splitter | PitchType::Other => bin.offspeed += 1,
            }
            match norm_side(&row.pitcher_throws) {
                Side::Left => bin.vs_left += 1,
                Side::Right => bin.vs_right += 1,
            }
            if is_swing(row) {
                bin.swings += 1;
            }
            if is_whiff(row) {
                bin.whiffs += 1;
            }
            if matches!(
                row.play_result.to_ascii_lowercase().as_str(),
                "single" | "double" | "triple" | "homerun"
            ) {
                bin.hits += 1;
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Grouping helpers
// ---------------------------------------------------------------------------

fn source_date(table: &EventTable) -> Result<NaiveDate, AggregateError> {
    date_from_filename(&table.source_id)
        .ok_or_else(|| AggregateError::UnparseablePeriod(table.source_id.clone()))
}

/// Practice detection: one League == "team" row flips the whole file.
fn is_practice_file(table: &EventTable) -> bool {
    table
        .rows
        .iter()
        .any(|r| r.league.eq_ignore_ascii_case("team"))
}

fn team_code(team: &str, practice: bool) -> String {
    if practice {
        format!("{team}{PRACTICE_TEAM_SUFFIX}")
    } else {
        team.to_string()
    }
}

/// Group rows by a trimmed (player, team) identity, dropping rows where
/// either part is empty. Returns groups in deterministic order.
fn group_rows<'a>(
    table: &'a EventTable,
    identity: impl Fn(&'a PitchEvent) -> (&'a String, &'a String),
    practice: bool,
) -> Vec<((String, String), Vec<&'a PitchEvent>)> {
    let mut groups: BTreeMap<(String, String), Vec<&'a PitchEvent>> = BTreeMap::new();
    for row in &table.rows {
        let (player, team) = identity(row);
        let player = player.trim();
        let team = team.trim();
        if player.is_empty() || team.is_empty() {
            continue;
        }
        groups
            .entry((player.to_string(), team_code(team, practice)))
            .or_default()
            .push(row);
    }
    groups.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
