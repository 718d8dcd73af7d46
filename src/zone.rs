// Plate-location zone classification.
//
// Two separate notions of "the zone" exist in the source data pipeline and
// both are preserved here: the 13-zone heat-map grid (a 3x3 inner grid plus
// four outer quadrants) used for zone-bin aggregates, and the slightly wider
// strike-zone band used when counting in-zone/out-of-zone pitches. Their
// constants differ on purpose.

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Horizontal half-width of the zone-grid rectangle, in feet.
const GRID_HALF_WIDTH: f64 = 0.83;
/// Vertical bounds of the zone-grid rectangle, in feet.
const GRID_BOTTOM: f64 = 1.50;
const GRID_TOP: f64 = 3.50;

/// Strike-zone band used for in/out-of-zone pitch counting.
const SZ_HEIGHT_MIN: f64 = 1.77;
const SZ_HEIGHT_MAX: f64 = 3.55;
const SZ_SIDE_MIN: f64 = -0.86;
const SZ_SIDE_MAX: f64 = 0.86;

// ---------------------------------------------------------------------------
// Zone classification result
// ---------------------------------------------------------------------------

/// Result of classifying a plate-coordinate point into one of 13 zones.
///
/// Zones 1-9 are the 3x3 inner grid (1 = bottom-left, 9 = top-right, numbered
/// row-major from the bottom). Zones 10-13 are the outer quadrants: 10 = over
/// top-left, 11 = over top-right, 12 = over bottom-left, 13 = over
/// bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneResult {
    pub zone_id: u8,
    pub in_zone: bool,
    /// Grid row 1-3 (bottom to top); 0 for outer zones.
    pub row: u8,
    /// Grid column 1-3 (left to right); 0 for outer zones.
    pub col: u8,
    /// Inner cell number 1-9; 0 for outer zones.
    pub cell: u8,
    /// Outer quadrant label ("OTL", "OTR", "OBL", "OBR"), or "NA" inside the grid.
    pub outer_label: &'static str,
}

/// Locate `v` among four evenly spaced edges using left-inclusive bucketing,
/// clamped to buckets 1-3. A value equal to the last edge lands in bucket 3.
fn bucket(v: f64, lo: f64, hi: f64) -> u8 {
    let step = (hi - lo) / 3.0;
    let mut idx = 0u8;
    for i in 0..3 {
        if v >= lo + step * i as f64 {
            idx = i as u8 + 1;
        }
    }
    // v == hi overshoots into a fourth bucket; clamp back.
    if v >= hi { 3 } else { idx.clamp(1, 3) }
}

/// Classify a plate-coordinate point (side, height) into one of the 13 zones.
///
/// Total for all finite input: every point maps to exactly one zone. Boundary
/// rules: the grid rectangle is inclusive on all edges; outside it, a point
/// exactly at the vertical midpoint (y = 2.5) falls to the bottom quadrants
/// and a point exactly at x = 0 falls to the right quadrants.
pub fn classify(x: f64, y: f64) -> ZoneResult {
    let inside = (-GRID_HALF_WIDTH..=GRID_HALF_WIDTH).contains(&x)
        && (GRID_BOTTOM..=GRID_TOP).contains(&y);

    if inside {
        let col = bucket(x, -GRID_HALF_WIDTH, GRID_HALF_WIDTH);
        let row = bucket(y, GRID_BOTTOM, GRID_TOP);
        let cell = (row - 1) * 3 + col;
        return ZoneResult {
            zone_id: cell,
            in_zone: true,
            row,
            col,
            cell,
            outer_label: "NA",
        };
    }

    let mid = (GRID_BOTTOM + GRID_TOP) / 2.0;
    let top = y > mid;
    let left = x < 0.0;
    let (zone_id, outer_label) = match (top, left) {
        (true, true) => (10, "OTL"),
        (true, false) => (11, "OTR"),
        (false, true) => (12, "OBL"),
        (false, false) => (13, "OBR"),
    };

    ZoneResult {
        zone_id,
        in_zone: false,
        row: 0,
        col: 0,
        cell: 0,
        outer_label,
    }
}

// ---------------------------------------------------------------------------
// Strike-zone containment
// ---------------------------------------------------------------------------

/// Returns true iff the pitch location is inside the strike-zone band used
/// for in/out-of-zone counting. Missing or non-finite coordinates are never
/// in the zone (and never an error).
pub fn is_in_strike_zone(height: Option<f64>, side: Option<f64>) -> bool {
    match (height, side) {
        (Some(h), Some(s)) if h.is_finite() && s.is_finite() => {
            (SZ_HEIGHT_MIN..=SZ_HEIGHT_MAX).contains(&h) && (SZ_SIDE_MIN..=SZ_SIDE_MAX).contains(&s)
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Inner grid ----

    #[test]
    fn center_point_is_zone_5() {
        let r = classify(0.0, 2.5);
        assert_eq!(r.zone_id, 5);
        assert!(r.in_zone);
        assert_eq!(r.row, 2);
        assert_eq!(r.col, 2);
        assert_eq!(r.cell, 5);
        assert_eq!(r.outer_label, "NA");
    }

    #[test]
    fn rectangle_corners_map_to_corner_cells() {
        // Bottom-left corner -> cell 1
        let bl = classify(-0.83, 1.50);
        assert_eq!((bl.zone_id, bl.row, bl.col), (1, 1, 1));
        assert!(bl.in_zone);

        // Bottom-right corner -> cell 3 (x == right edge clamps into col 3)
        let br = classify(0.83, 1.50);
        assert_eq!((br.zone_id, br.row, br.col), (3, 1, 3));

        // Top-left corner -> cell 7
        let tl = classify(-0.83, 3.50);
        assert_eq!((tl.zone_id, tl.row, tl.col), (7, 3, 1));

        // Top-right corner -> cell 9
        let tr = classify(0.83, 3.50);
        assert_eq!((tr.zone_id, tr.row, tr.col), (9, 3, 3));
    }

    #[test]
    fn interior_edges_bucket_left_inclusive() {
        // First interior x edge is -0.83 + 2*0.83/3 ≈ -0.2767: a point exactly
        // on it belongs to the second column.
        let step = 2.0 * 0.83 / 3.0;
        let r = classify(-0.83 + step, 2.0);
        assert_eq!(r.col, 2);

        // First interior y edge is 1.5 + 2/3 ≈ 2.1667: exactly on it -> row 2.
        let r = classify(0.0, 1.5 + 2.0 / 3.0);
        assert_eq!(r.row, 2);
    }

    #[test]
    fn all_nine_cells_reachable() {
        let mut seen = [false; 9];
        for (i, y) in [1.8, 2.5, 3.2].iter().enumerate() {
            for (j, x) in [-0.6, 0.0, 0.6].iter().enumerate() {
                let r = classify(*x, *y);
                assert!(r.in_zone);
                assert_eq!(r.cell as usize, i * 3 + j + 1);
                seen[r.cell as usize - 1] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    // ---- Outer quadrants ----

    #[test]
    fn outer_quadrants() {
        let otl = classify(-1.0, 4.0);
        assert_eq!((otl.zone_id, otl.outer_label), (10, "OTL"));
        assert!(!otl.in_zone);
        assert_eq!((otl.row, otl.col, otl.cell), (0, 0, 0));

        assert_eq!(classify(1.0, 4.0).zone_id, 11);
        assert_eq!(classify(-1.0, 1.0).zone_id, 12);
        assert_eq!(classify(1.0, 1.0).zone_id, 13);
    }

    #[test]
    fn outer_tie_rules() {
        // Exactly at the vertical midpoint (y = 2.5) but outside the grid:
        // not top, so bottom quadrants.
        assert_eq!(classify(-2.0, 2.5).zone_id, 12);
        assert_eq!(classify(2.0, 2.5).zone_id, 13);

        // Exactly at x = 0 but above the grid: not left, so right quadrants.
        assert_eq!(classify(0.0, 4.0).zone_id, 11);
        assert_eq!(classify(0.0, 1.0).zone_id, 13);
    }

    #[test]
    fn just_outside_each_edge_is_outer() {
        assert!(!classify(-0.84, 2.5).in_zone);
        assert!(!classify(0.84, 2.5).in_zone);
        assert!(!classify(0.0, 1.49).in_zone);
        assert!(!classify(0.0, 3.51).in_zone);
    }

    // ---- Strike-zone containment ----

    #[test]
    fn strike_zone_bounds_inclusive() {
        assert!(is_in_strike_zone(Some(1.77), Some(0.0)));
        assert!(is_in_strike_zone(Some(3.55), Some(0.0)));
        assert!(is_in_strike_zone(Some(2.5), Some(-0.86)));
        assert!(is_in_strike_zone(Some(2.5), Some(0.86)));

        assert!(!is_in_strike_zone(Some(1.76), Some(0.0)));
        assert!(!is_in_strike_zone(Some(3.56), Some(0.0)));
        assert!(!is_in_strike_zone(Some(2.5), Some(-0.87)));
        assert!(!is_in_strike_zone(Some(2.5), Some(0.87)));
    }

    #[test]
    fn strike_zone_missing_or_nonfinite_is_false() {
        assert!(!is_in_strike_zone(None, Some(0.0)));
        assert!(!is_in_strike_zone(Some(2.5), None));
        assert!(!is_in_strike_zone(None, None));
        assert!(!is_in_strike_zone(Some(f64::NAN), Some(0.0)));
        assert!(!is_in_strike_zone(Some(2.5), Some(f64::INFINITY)));
    }

    #[test]
    fn grid_and_strike_zone_bands_differ() {
        // A pitch at height 1.6 is inside the grid rectangle but below the
        // counting band; the two checks must disagree here.
        assert!(classify(0.0, 1.6).in_zone);
        assert!(!is_in_strike_zone(Some(1.6), Some(0.0)));
    }
}
