// Expected-outcome scoring: the xBA lookup grid and the regression-model
// wrappers for xSLG/xwOBA.
//
// The grid and model handles are loaded once at startup into a ModelContext
// and passed into the aggregator explicitly; nothing here is global state.
// Every lookup path degrades to a documented numeric default; these
// functions never fail once loaded.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::normalize::Side;

/// xBA returned when no grid is loaded at all.
pub const DEFAULT_XBA_MEAN: f64 = 0.25;

/// Direction bins are quantized in multiples of 5 degrees, so one
/// neighborhood step on the direction axis is 5.
const DIR_BIN_STEP: i32 = 5;

// ---------------------------------------------------------------------------
// Contact features
// ---------------------------------------------------------------------------

/// Per-row features for the expected-outcome models, in the fixed column
/// order the models were trained on: ExitSpeed, Angle, Direction, BatterSide.
#[derive(Debug, Clone, Copy)]
pub struct ContactFeatures {
    pub exit_speed: f64,
    pub angle: f64,
    pub direction: f64,
    /// Pre-encoded handedness: Left = 0.0, Right = 1.0.
    pub batter_side: f64,
}

impl ContactFeatures {
    pub fn new(exit_speed: f64, angle: f64, direction: f64, side: Side) -> Self {
        Self {
            exit_speed,
            angle,
            direction,
            batter_side: side.as_code(),
        }
    }
}

// ---------------------------------------------------------------------------
// xBA grid
// ---------------------------------------------------------------------------

/// Precomputed (ev_bin, la_bin, dir_bin) -> xBA lookup grid.
///
/// Lookup policy, in order: exact key; nearest-bin 3x3x3 neighborhood
/// average; global grid mean. With no grid loaded, every lookup returns
/// [`DEFAULT_XBA_MEAN`] and the neighbor search is disabled.
#[derive(Debug, Clone, Default)]
pub struct XbaGrid {
    entries: HashMap<(i32, i32, i32), f64>,
    ev_axis: Vec<i32>,
    la_axis: Vec<i32>,
    dir_axis: Vec<i32>,
    global_mean: f64,
}

/// Raw grid CSV row.
#[derive(Debug, Deserialize)]
struct RawGridRow {
    ev_bin: f64,
    la_bin: f64,
    dir_bin: f64,
    xba: f64,
}

impl XbaGrid {
    /// An empty, disabled grid: every lookup returns [`DEFAULT_XBA_MEAN`].
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Load the grid from a CSV file. A missing or unreadable file degrades
    /// to the disabled grid with a warning rather than failing startup.
    pub fn load(path: &Path) -> Self {
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(
                    "xBA grid unavailable at {}: {}; falling back to mean {}",
                    path.display(),
                    e,
                    DEFAULT_XBA_MEAN
                );
                return Self::disabled();
            }
        };
        match Self::from_reader(file) {
            Ok(grid) => {
                info!("loaded xBA grid: {} bins", grid.entries.len());
                grid
            }
            Err(e) => {
                warn!(
                    "failed to parse xBA grid {}: {}; falling back to mean {}",
                    path.display(),
                    e,
                    DEFAULT_XBA_MEAN
                );
                Self::disabled()
            }
        }
    }

    /// Build the grid from any reader. Exposed for testing.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, csv::Error> {
        let mut reader = csv::Reader::from_reader(rdr);
        let mut entries = HashMap::new();
        for result in reader.deserialize::<RawGridRow>() {
            let row = result?;
            if !row.xba.is_finite() {
                continue;
            }
            entries.insert(
                (
                    row.ev_bin.round() as i32,
                    row.la_bin.round() as i32,
                    row.dir_bin.round() as i32,
                ),
                row.xba,
            );
        }
        Ok(Self::from_entries(entries))
    }

    fn from_entries(entries: HashMap<(i32, i32, i32), f64>) -> Self {
        let mut ev_axis: Vec<i32> = entries.keys().map(|k| k.0).collect();
        let mut la_axis: Vec<i32> = entries.keys().map(|k| k.1).collect();
        let mut dir_axis: Vec<i32> = entries.keys().map(|k| k.2).collect();
        for axis in [&mut ev_axis, &mut la_axis, &mut dir_axis] {
            axis.sort_unstable();
            axis.dedup();
        }
        let global_mean = if entries.is_empty() {
            DEFAULT_XBA_MEAN
        } else {
            entries.values().sum::<f64>() / entries.len() as f64
        };
        Self {
            entries,
            ev_axis,
            la_axis,
            dir_axis,
            global_mean,
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Mean xBA over the whole grid ([`DEFAULT_XBA_MEAN`] when empty).
    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    /// Look up the expected batting average for a binned batted ball.
    pub fn lookup(&self, ev_bin: i32, la_bin: i32, dir_bin: i32) -> f64 {
        if let Some(v) = self.entries.get(&(ev_bin, la_bin, dir_bin)) {
            return *v;
        }
        if !self.is_loaded() {
            return DEFAULT_XBA_MEAN;
        }

        // Snap each axis to its nearest populated bin, then average the
        // populated entries of the 3x3x3 window around the snapped point.
        let ev = nearest(&self.ev_axis, ev_bin);
        let la = nearest(&self.la_axis, la_bin);
        let dir = nearest(&self.dir_axis, dir_bin);

        let mut sum = 0.0;
        let mut n = 0u32;
        for dev in -1..=1 {
            for dla in -1..=1 {
                for ddir in -1..=1 {
                    let key = (ev + dev, la + dla, dir + ddir * DIR_BIN_STEP);
                    if let Some(v) = self.entries.get(&key) {
                        sum += v;
                        n += 1;
                    }
                }
            }
        }
        if n > 0 {
            sum / n as f64
        } else {
            self.global_mean
        }
    }
}

/// Nearest value in a sorted, non-empty slice; ties break toward the lower
/// value.
fn nearest(axis: &[i32], target: i32) -> i32 {
    match axis.binary_search(&target) {
        Ok(i) => axis[i],
        Err(0) => axis[0],
        Err(i) if i == axis.len() => axis[axis.len() - 1],
        Err(i) => {
            let lo = axis[i - 1];
            let hi = axis[i];
            if (target - lo) <= (hi - target) {
                lo
            } else {
                hi
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome models
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read model file {path}: {message}")]
    Load { path: String, message: String },

    #[error("model scoring failed: {0}")]
    Predict(String),
}

/// An opaque expected-outcome scorer. Implementations take the fixed feature
/// row layout of [`ContactFeatures`] and return one score per row.
pub trait OutcomeModel: Send + Sync {
    fn predict(&self, rows: &[ContactFeatures]) -> Result<Vec<f64>, ModelError>;
}

/// Linear regression scorer: intercept + one coefficient per feature, loaded
/// from a TOML coefficient file exported alongside the training pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub exit_speed: f64,
    pub angle: f64,
    pub direction: f64,
    pub batter_side: f64,
}

impl LinearModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path).map_err(|e| ModelError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| ModelError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl OutcomeModel for LinearModel {
    fn predict(&self, rows: &[ContactFeatures]) -> Result<Vec<f64>, ModelError> {
        Ok(rows
            .iter()
            .map(|r| {
                self.intercept
                    + self.exit_speed * r.exit_speed
                    + self.angle * r.angle
                    + self.direction * r.direction
                    + self.batter_side * r.batter_side
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Model context (injected into the aggregator)
// ---------------------------------------------------------------------------

/// Everything the aggregator's expected-outcome pass needs, loaded once per
/// process and read-only thereafter. Absent models degrade the corresponding
/// stat to 0; the grid always has a numeric fallback.
pub struct ModelContext {
    pub grid: XbaGrid,
    pub xslg: Option<Box<dyn OutcomeModel>>,
    pub xwoba: Option<Box<dyn OutcomeModel>>,
}

impl ModelContext {
    /// A context with no grid and no models; every expected stat takes its
    /// documented fallback. Useful for tests and degraded runs.
    pub fn disabled() -> Self {
        Self {
            grid: XbaGrid::disabled(),
            xslg: None,
            xwoba: None,
        }
    }

    /// Load the grid and whichever model coefficient files are configured.
    /// Model load failures are logged and leave that model absent; one
    /// missing model never blocks the rest of the pipeline.
    pub fn load(grid_path: &Path, xslg_path: Option<&Path>, xwoba_path: Option<&Path>) -> Self {
        let grid = XbaGrid::load(grid_path);
        let xslg = xslg_path.and_then(|p| load_model(p, "xSLG"));
        let xwoba = xwoba_path.and_then(|p| load_model(p, "xwOBA"));
        Self { grid, xslg, xwoba }
    }
}

fn load_model(path: &Path, label: &str) -> Option<Box<dyn OutcomeModel>> {
    match LinearModel::load(path) {
        Ok(m) => {
            info!("loaded {} model from {}", label, path.display());
            Some(Box::new(m))
        }
        Err(e) => {
            warn!("{} model unavailable: {}; stat defaults to 0", label, e);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_from(rows: &[(i32, i32, i32, f64)]) -> XbaGrid {
        let entries = rows
            .iter()
            .map(|&(ev, la, dir, xba)| ((ev, la, dir), xba))
            .collect();
        XbaGrid::from_entries(entries)
    }

    // ---- Degraded grid ----

    #[test]
    fn empty_grid_returns_default_mean() {
        let grid = XbaGrid::disabled();
        assert!(!grid.is_loaded());
        assert_eq!(grid.lookup(95, 20, 10), DEFAULT_XBA_MEAN);
        assert_eq!(grid.lookup(0, 0, 0), DEFAULT_XBA_MEAN);
        assert_eq!(grid.global_mean(), DEFAULT_XBA_MEAN);
    }

    #[test]
    fn missing_file_degrades_to_disabled() {
        let grid = XbaGrid::load(Path::new("/nonexistent/xba_grid.csv"));
        assert!(!grid.is_loaded());
        assert_eq!(grid.lookup(100, 25, 0), DEFAULT_XBA_MEAN);
    }

    // ---- Exact and approximate lookup ----

    #[test]
    fn exact_match() {
        let grid = grid_from(&[(95, 20, 10, 0.62), (96, 20, 10, 0.7)]);
        assert_eq!(grid.lookup(95, 20, 10), 0.62);
    }

    #[test]
    fn neighborhood_average_around_snapped_point() {
        // Query (94, 20, 10) has no exact entry; nearest ev bin is 95, and
        // the +/-1 window around (95, 20, 10) contains both entries, so the
        // result is their average.
        let grid = grid_from(&[(95, 20, 10, 0.60), (96, 20, 10, 0.70)]);
        let v = grid.lookup(94, 20, 10);
        assert!((v - 0.65).abs() < 1e-12);
    }

    #[test]
    fn direction_axis_steps_by_five() {
        // Entry at dir 15 is one direction step (+5) from the snapped dir 10,
        // so it participates in the window.
        let grid = grid_from(&[(95, 20, 10, 0.40), (95, 20, 15, 0.60)]);
        let v = grid.lookup(95, 21, 12);
        assert!((v - 0.50).abs() < 1e-12);
    }

    #[test]
    fn empty_neighborhood_falls_back_to_global_mean() {
        // Two entries far apart; querying near one of them but with a window
        // that covers neither populated key yields the global mean.
        let grid = grid_from(&[(80, 5, -30, 0.2), (110, 40, 30, 0.8)]);
        // Query (105, 4, -28) snaps to (110, 5, -30); neither entry sits in
        // the +/-1 (+/-5 on direction) window around that point.
        let v = grid.lookup(105, 4, -28);
        assert!((v - 0.5).abs() < 1e-12);
        assert!((grid.global_mean() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn nearest_ties_break_low() {
        // Target 95 is equidistant from 94 and 96; the lower bin wins.
        assert_eq!(nearest(&[90, 94, 96, 100], 95), 94);
        assert_eq!(nearest(&[90, 94, 96, 100], 89), 90);
        assert_eq!(nearest(&[90, 94, 96, 100], 101), 100);
        assert_eq!(nearest(&[90, 94, 96, 100], 96), 96);
    }

    // ---- Grid CSV parsing ----

    #[test]
    fn grid_csv_roundtrip() {
        let data = "ev_bin,la_bin,dir_bin,xba\n95,20,10,0.62\n96,21,15,0.7";
        let grid = XbaGrid::from_reader(data.as_bytes()).unwrap();
        assert!(grid.is_loaded());
        assert_eq!(grid.lookup(95, 20, 10), 0.62);
        assert!((grid.global_mean() - 0.66).abs() < 1e-12);
    }

    #[test]
    fn grid_csv_skips_nonfinite_values() {
        let data = "ev_bin,la_bin,dir_bin,xba\n95,20,10,NaN\n96,21,15,0.7";
        let grid = XbaGrid::from_reader(data.as_bytes()).unwrap();
        assert_eq!(grid.lookup(96, 21, 15), 0.7);
        assert!((grid.global_mean() - 0.7).abs() < 1e-12);
    }

    // ---- Linear model ----

    #[test]
    fn linear_model_predicts_per_row() {
        let model = LinearModel {
            intercept: 0.1,
            exit_speed: 0.01,
            angle: 0.002,
            direction: 0.0,
            batter_side: -0.05,
        };
        let rows = vec![
            ContactFeatures::new(100.0, 25.0, 0.0, Side::Right),
            ContactFeatures::new(80.0, 5.0, 10.0, Side::Left),
        ];
        let out = model.predict(&rows).unwrap();
        // Row 0: 0.1 + 1.0 + 0.05 - 0.05 = 1.10
        assert!((out[0] - 1.10).abs() < 1e-12);
        // Row 1: 0.1 + 0.8 + 0.01 - 0.0 = 0.91
        assert!((out[1] - 0.91).abs() < 1e-12);
    }

    #[test]
    fn disabled_context_has_no_models() {
        let ctx = ModelContext::disabled();
        assert!(ctx.xslg.is_none());
        assert!(ctx.xwoba.is_none());
        assert!(!ctx.grid.is_loaded());
    }
}
