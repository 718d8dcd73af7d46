// Incremental merge: combines a freshly computed aggregate with previously
// persisted state for the same entity key.
//
// Counting fields sum; every rate field recombines as a weighted average
// using each side's own prior denominator as its weight, so repeated
// incremental runs converge to the same result as a single batch run. The
// weight field per rate is fixed policy:
//
//   avg, slg, iso, xBA, xSLG, opponent avg      -> at-bats
//   obp, ops, k%, bb%, xwOBA                    -> plate appearances
//   whiff%                                      -> in-zone pitches
//   chase%                                      -> out-of-zone pitches
//   hard-hit%, sweet-spot%, gb%, exit velo,
//   barrel%                                     -> batted balls
//   fastball velo                               -> fastball count
//   WHIP                                        -> outs recorded
//
// Spray percentages are the exception: the five slices are exclusive parts of
// one whole, so their counts sum and the percentages recompute from the new
// totals instead of averaging.
//
// All three combine functions are pure and commutative/associative in effect;
// the processed-files guard makes re-applying the same source a no-op.

use crate::stats::aggregate::{BatterAggregate, PitcherAggregate, ZoneBin};

/// Weighted average of two optional rates, weighting each side by its own
/// prior count. Sides with a missing rate or zero weight drop out; a zero
/// combined weight yields `None`. Results are floored at zero: these are
/// percentages and physical measurements, never negative.
pub fn weighted_rate(a: Option<f64>, wa: u32, b: Option<f64>, wb: u32) -> Option<f64> {
    let mut num = 0.0;
    let mut den = 0u32;
    if let Some(rate) = a {
        if wa > 0 {
            num += rate * wa as f64;
            den += wa;
        }
    }
    if let Some(rate) = b {
        if wb > 0 {
            num += rate * wb as f64;
            den += wb;
        }
    }
    (den > 0).then(|| (num / den as f64).max(0.0))
}

/// Combine a fresh batter aggregate with the persisted one for the same key.
///
/// - No existing row: the fresh aggregate is returned unchanged.
/// - Every source file in the fresh aggregate already processed: the existing
///   row is returned unchanged (reprocessing is a no-op, not a double count).
/// - Otherwise counting fields sum and rates recombine by weight.
pub fn combine_batter(
    existing: Option<&BatterAggregate>,
    fresh: BatterAggregate,
) -> BatterAggregate {
    let Some(prev) = existing else {
        return fresh;
    };
    if fresh
        .processed_files
        .iter()
        .all(|f| prev.processed_files.contains(f))
    {
        return prev.clone();
    }

    let mut spray = [0u32; 5];
    for (i, slot) in spray.iter_mut().enumerate() {
        *slot = prev.spray[i] + fresh.spray[i];
    }
    let spray_total: u32 = spray.iter().sum();

    let mut processed_files = prev.processed_files.clone();
    processed_files.extend(fresh.processed_files.iter().cloned());

    BatterAggregate {
        batter: fresh.batter,
        team: fresh.team,
        year: fresh.year,

        plate_app: prev.plate_app + fresh.plate_app,
        at_bats: prev.at_bats + fresh.at_bats,
        batted_balls: prev.batted_balls + fresh.batted_balls,
        strikeouts: prev.strikeouts + fresh.strikeouts,
        walks: prev.walks + fresh.walks,
        singles: prev.singles + fresh.singles,
        doubles: prev.doubles + fresh.doubles,
        triples: prev.triples + fresh.triples,
        home_runs: prev.home_runs + fresh.home_runs,
        in_zone_pitches: prev.in_zone_pitches + fresh.in_zone_pitches,
        out_of_zone_pitches: prev.out_of_zone_pitches + fresh.out_of_zone_pitches,
        ground_balls: prev.ground_balls + fresh.ground_balls,
        fastballs: prev.fastballs + fresh.fastballs,
        spray,

        avg: weighted_rate(prev.avg, prev.at_bats, fresh.avg, fresh.at_bats),
        obp: weighted_rate(prev.obp, prev.plate_app, fresh.obp, fresh.plate_app),
        slg: weighted_rate(prev.slg, prev.at_bats, fresh.slg, fresh.at_bats),
        ops: weighted_rate(prev.ops, prev.plate_app, fresh.ops, fresh.plate_app),
        iso: weighted_rate(prev.iso, prev.at_bats, fresh.iso, fresh.at_bats),
        k_per: weighted_rate(prev.k_per, prev.plate_app, fresh.k_per, fresh.plate_app),
        bb_per: weighted_rate(prev.bb_per, prev.plate_app, fresh.bb_per, fresh.plate_app),
        whiff_per: weighted_rate(
            prev.whiff_per,
            prev.in_zone_pitches,
            fresh.whiff_per,
            fresh.in_zone_pitches,
        ),
        chase_per: weighted_rate(
            prev.chase_per,
            prev.out_of_zone_pitches,
            fresh.chase_per,
            fresh.out_of_zone_pitches,
        ),
        hard_hit_per: weighted_rate(
            prev.hard_hit_per,
            prev.batted_balls,
            fresh.hard_hit_per,
            fresh.batted_balls,
        ),
        sweet_spot_per: weighted_rate(
            prev.sweet_spot_per,
            prev.batted_balls,
            fresh.sweet_spot_per,
            fresh.batted_balls,
        ),
        gb_per: weighted_rate(
            prev.gb_per,
            prev.batted_balls,
            fresh.gb_per,
            fresh.batted_balls,
        ),
        avg_exit_velo: weighted_rate(
            prev.avg_exit_velo,
            prev.batted_balls,
            fresh.avg_exit_velo,
            fresh.batted_balls,
        ),
        avg_fb_velo: weighted_rate(
            prev.avg_fb_velo,
            prev.fastballs,
            fresh.avg_fb_velo,
            fresh.fastballs,
        ),
        xba_per: weighted_rate(prev.xba_per, prev.at_bats, fresh.xba_per, fresh.at_bats),
        xslg_per: weighted_rate(prev.xslg_per, prev.at_bats, fresh.xslg_per, fresh.at_bats),
        xwoba_per: weighted_rate(
            prev.xwoba_per,
            prev.plate_app,
            fresh.xwoba_per,
            fresh.plate_app,
        ),
        barrel_per: weighted_rate(
            prev.barrel_per,
            prev.batted_balls,
            fresh.barrel_per,
            fresh.batted_balls,
        ),
        spray_per: std::array::from_fn(|i| {
            (spray_total > 0).then(|| spray[i] as f64 / spray_total as f64)
        }),

        // Ranks are cross-sectional; the next ranking pass overwrites them.
        ranks: prev.ranks,
        processed_files,
    }
}

/// Combine a fresh pitcher-outing aggregate with the persisted one.
pub fn combine_pitcher(
    existing: Option<&PitcherAggregate>,
    fresh: PitcherAggregate,
) -> PitcherAggregate {
    let Some(prev) = existing else {
        return fresh;
    };
    if fresh
        .unique_games
        .iter()
        .all(|g| prev.unique_games.contains(g))
    {
        return prev.clone();
    }

    let mut unique_games = prev.unique_games.clone();
    unique_games.extend(fresh.unique_games.iter().cloned());

    PitcherAggregate {
        pitcher: fresh.pitcher,
        team: fresh.team,
        date: fresh.date,

        batters_faced: prev.batters_faced + fresh.batters_faced,
        at_bats_against: prev.at_bats_against + fresh.at_bats_against,
        hits_allowed: prev.hits_allowed + fresh.hits_allowed,
        strikeouts: prev.strikeouts + fresh.strikeouts,
        walks: prev.walks + fresh.walks,
        batted_balls: prev.batted_balls + fresh.batted_balls,
        ground_balls: prev.ground_balls + fresh.ground_balls,
        in_zone_pitches: prev.in_zone_pitches + fresh.in_zone_pitches,
        out_of_zone_pitches: prev.out_of_zone_pitches + fresh.out_of_zone_pitches,
        fastballs: prev.fastballs + fresh.fastballs,
        pitches: prev.pitches + fresh.pitches,
        outs_recorded: prev.outs_recorded + fresh.outs_recorded,

        k_per: weighted_rate(
            prev.k_per,
            prev.batters_faced,
            fresh.k_per,
            fresh.batters_faced,
        ),
        bb_per: weighted_rate(
            prev.bb_per,
            prev.batters_faced,
            fresh.bb_per,
            fresh.batters_faced,
        ),
        whip: weighted_rate(
            prev.whip,
            prev.outs_recorded,
            fresh.whip,
            fresh.outs_recorded,
        ),
        avg_against: weighted_rate(
            prev.avg_against,
            prev.at_bats_against,
            fresh.avg_against,
            fresh.at_bats_against,
        ),
        gb_per: weighted_rate(
            prev.gb_per,
            prev.batted_balls,
            fresh.gb_per,
            fresh.batted_balls,
        ),
        whiff_per: weighted_rate(
            prev.whiff_per,
            prev.in_zone_pitches,
            fresh.whiff_per,
            fresh.in_zone_pitches,
        ),
        chase_per: weighted_rate(
            prev.chase_per,
            prev.out_of_zone_pitches,
            fresh.chase_per,
            fresh.out_of_zone_pitches,
        ),
        avg_exit_velo: weighted_rate(
            prev.avg_exit_velo,
            prev.batted_balls,
            fresh.avg_exit_velo,
            fresh.batted_balls,
        ),
        avg_fb_velo: weighted_rate(
            prev.avg_fb_velo,
            prev.fastballs,
            fresh.avg_fb_velo,
            fresh.fastballs,
        ),

        ranks: prev.ranks,
        unique_games,
    }
}

/// Zone bins hold only counts, so combining is a plain sum.
pub fn combine_zone_bin(existing: Option<&ZoneBin>, fresh: ZoneBin) -> ZoneBin {
    let Some(prev) = existing else {
        return fresh;
    };
    ZoneBin {
        team: fresh.team,
        year: fresh.year,
        player: fresh.player,
        zone_id: fresh.zone_id,
        total_pitches: prev.total_pitches + fresh.total_pitches,
        fastballs: prev.fastballs + fresh.fastballs,
        breaking_balls: prev.breaking_balls + fresh.breaking_balls,
        offspeed: prev.offspeed + fresh.offspeed,
        vs_left: prev.vs_left + fresh.vs_left,
        vs_right: prev.vs_right + fresh.vs_right,
        swings: prev.swings + fresh.swings,
        whiffs: prev.whiffs + fresh.whiffs,
        hits: prev.hits + fresh.hits,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// A batter aggregate with the fields relevant to a test filled in.
    fn batter(file: &str) -> BatterAggregate {
        BatterAggregate {
            batter: "Doe, Jay".to_string(),
            team: "BARN".to_string(),
            year: 2024,
            processed_files: BTreeSet::from([file.to_string()]),
            ..BatterAggregate::default()
        }
    }

    // ---- weighted_rate ----

    #[test]
    fn weighted_rate_documented_example() {
        // existing {avg_exit_velo: 90, batted_balls: 80} merged with
        // {avg_exit_velo: 100, batted_balls: 20}:
        // (90*80 + 100*20) / 100 = 92.0
        let v = weighted_rate(Some(90.0), 80, Some(100.0), 20).unwrap();
        assert!(approx(v, 92.0));
    }

    #[test]
    fn weighted_rate_missing_side_drops_out() {
        assert!(approx(weighted_rate(None, 80, Some(0.3), 20).unwrap(), 0.3));
        assert!(approx(weighted_rate(Some(0.3), 20, None, 80).unwrap(), 0.3));
    }

    #[test]
    fn weighted_rate_zero_weight_is_none() {
        assert!(weighted_rate(None, 0, None, 0).is_none());
        assert!(weighted_rate(Some(0.3), 0, None, 5).is_none());
    }

    #[test]
    fn weighted_rate_floors_at_zero() {
        // Negative inputs (noise) clamp to zero rather than propagating.
        assert!(approx(weighted_rate(Some(-0.2), 10, Some(-0.1), 10).unwrap(), 0.0));
    }

    // ---- First-write and idempotence ----

    #[test]
    fn combine_with_no_existing_returns_fresh_unchanged() {
        let mut fresh = batter("20240601-Main-1.csv");
        fresh.plate_app = 4;
        fresh.avg = Some(0.5);
        let combined = combine_batter(None, fresh.clone());
        assert_eq!(combined, fresh);
    }

    #[test]
    fn reprocessing_same_file_is_a_noop() {
        let mut prev = batter("20240601-Main-1.csv");
        prev.plate_app = 4;
        prev.at_bats = 3;
        prev.avg = Some(1.0 / 3.0);

        let mut fresh = batter("20240601-Main-1.csv");
        fresh.plate_app = 4;
        fresh.at_bats = 3;
        fresh.avg = Some(1.0 / 3.0);

        let combined = combine_batter(Some(&prev), fresh);
        assert_eq!(combined, prev);
        assert_eq!(combined.plate_app, 4); // not 8
    }

    #[test]
    fn subset_of_processed_files_is_a_noop() {
        let mut prev = batter("a.csv");
        prev.processed_files.insert("20240601-Main-1.csv".to_string());
        prev.plate_app = 10;

        let mut fresh = batter("20240601-Main-1.csv");
        fresh.plate_app = 5;

        let combined = combine_batter(Some(&prev), fresh);
        assert_eq!(combined.plate_app, 10);
    }

    // ---- Counting and rate recombination ----

    #[test]
    fn counts_sum_and_rates_reweight() {
        let mut prev = batter("20240601-Main-1.csv");
        prev.plate_app = 10;
        prev.at_bats = 8;
        prev.batted_balls = 80;
        prev.avg = Some(0.250);
        prev.avg_exit_velo = Some(90.0);
        prev.k_per = Some(0.2);

        let mut fresh = batter("20240602-Main-1.csv");
        fresh.plate_app = 5;
        fresh.at_bats = 4;
        fresh.batted_balls = 20;
        fresh.avg = Some(0.500);
        fresh.avg_exit_velo = Some(100.0);
        fresh.k_per = Some(0.4);

        let combined = combine_batter(Some(&prev), fresh);
        assert_eq!(combined.plate_app, 15);
        assert_eq!(combined.at_bats, 12);
        assert_eq!(combined.batted_balls, 100);
        // avg weighted by at-bats: (0.25*8 + 0.5*4) / 12
        assert!(approx(combined.avg.unwrap(), (0.25 * 8.0 + 0.5 * 4.0) / 12.0));
        // exit velo weighted by batted balls: (90*80 + 100*20) / 100 = 92
        assert!(approx(combined.avg_exit_velo.unwrap(), 92.0));
        // k% weighted by PA: (0.2*10 + 0.4*5) / 15
        assert!(approx(combined.k_per.unwrap(), (0.2 * 10.0 + 0.4 * 5.0) / 15.0));
        assert_eq!(combined.processed_files.len(), 2);
    }

    #[test]
    fn merge_matches_single_batch_computation() {
        // Two increments vs one batch over the union: 3-for-8 then 2-for-4
        // must equal 5-for-12.
        let mut p1 = batter("20240601-Main-1.csv");
        p1.at_bats = 8;
        p1.plate_app = 8;
        p1.avg = Some(3.0 / 8.0);

        let mut p2 = batter("20240602-Main-1.csv");
        p2.at_bats = 4;
        p2.plate_app = 4;
        p2.avg = Some(2.0 / 4.0);

        let combined = combine_batter(Some(&p1), p2);
        assert!(approx(combined.avg.unwrap(), 5.0 / 12.0));
    }

    #[test]
    fn merge_order_does_not_matter() {
        let mut a = batter("a20240601-x.csv");
        a.plate_app = 10;
        a.at_bats = 9;
        a.avg = Some(0.3);
        a.processed_files = BTreeSet::from(["f1.csv".to_string()]);

        let mut b = batter("b");
        b.plate_app = 6;
        b.at_bats = 5;
        b.avg = Some(0.4);
        b.processed_files = BTreeSet::from(["f2.csv".to_string()]);

        let ab = combine_batter(Some(&a), b.clone());
        let ba = combine_batter(Some(&b), a.clone());

        assert_eq!(ab.plate_app, ba.plate_app);
        assert_eq!(ab.at_bats, ba.at_bats);
        assert!(approx(ab.avg.unwrap(), ba.avg.unwrap()));
        assert_eq!(ab.processed_files, ba.processed_files);
    }

    #[test]
    fn none_rate_with_zero_weight_takes_other_side() {
        // Prev never put a ball in play; fresh did. The combined exit velo is
        // exactly the fresh side's.
        let mut prev = batter("f1.csv");
        prev.plate_app = 3;
        prev.batted_balls = 0;
        prev.avg_exit_velo = None;

        let mut fresh = batter("f2.csv");
        fresh.plate_app = 2;
        fresh.batted_balls = 2;
        fresh.avg_exit_velo = Some(88.0);

        let combined = combine_batter(Some(&prev), fresh);
        assert!(approx(combined.avg_exit_velo.unwrap(), 88.0));
    }

    // ---- Spray recomputation ----

    #[test]
    fn spray_percentages_recompute_from_summed_counts() {
        let mut prev = batter("f1.csv");
        prev.spray = [3, 1, 0, 0, 0];
        prev.spray_per = [Some(0.75), Some(0.25), Some(0.0), Some(0.0), Some(0.0)];

        let mut fresh = batter("f2.csv");
        fresh.spray = [1, 1, 2, 0, 0];
        fresh.spray_per = [Some(0.25), Some(0.25), Some(0.5), Some(0.0), Some(0.0)];

        let combined = combine_batter(Some(&prev), fresh);
        assert_eq!(combined.spray, [4, 2, 2, 0, 0]);
        // Percentages come from the new totals (8), not a weighted average.
        assert!(approx(combined.spray_per[0].unwrap(), 0.5));
        assert!(approx(combined.spray_per[1].unwrap(), 0.25));
        assert!(approx(combined.spray_per[2].unwrap(), 0.25));
    }

    #[test]
    fn spray_percentages_none_when_no_ground_balls() {
        let prev = batter("f1.csv");
        let fresh = batter("f2.csv");
        let combined = combine_batter(Some(&prev), fresh);
        assert!(combined.spray_per.iter().all(|p| p.is_none()));
    }

    // ---- Pitcher merge ----

    #[test]
    fn pitcher_merge_sums_and_reweights() {
        let mut prev = PitcherAggregate {
            pitcher: "Arm, Strong".to_string(),
            team: "OPP".to_string(),
            batters_faced: 20,
            outs_recorded: 15,
            whip: Some(1.2),
            unique_games: BTreeSet::from(["f1.csv".to_string()]),
            ..PitcherAggregate::default()
        };
        prev.k_per = Some(0.3);

        let fresh = PitcherAggregate {
            pitcher: "Arm, Strong".to_string(),
            team: "OPP".to_string(),
            batters_faced: 10,
            outs_recorded: 5,
            whip: Some(1.8),
            k_per: Some(0.6),
            unique_games: BTreeSet::from(["f2.csv".to_string()]),
            ..PitcherAggregate::default()
        };

        let combined = combine_pitcher(Some(&prev), fresh);
        assert_eq!(combined.batters_faced, 30);
        assert_eq!(combined.outs_recorded, 20);
        // WHIP weighted by outs recorded: (1.2*15 + 1.8*5) / 20 = 1.35
        assert!(approx(combined.whip.unwrap(), 1.35));
        // k% weighted by batters faced: (0.3*20 + 0.6*10) / 30 = 0.4
        assert!(approx(combined.k_per.unwrap(), 0.4));
        assert_eq!(combined.unique_games.len(), 2);
    }

    #[test]
    fn pitcher_reprocessing_is_a_noop() {
        let prev = PitcherAggregate {
            pitcher: "Arm, Strong".to_string(),
            team: "OPP".to_string(),
            batters_faced: 20,
            unique_games: BTreeSet::from(["f1.csv".to_string()]),
            ..PitcherAggregate::default()
        };
        let fresh = PitcherAggregate {
            batters_faced: 20,
            unique_games: BTreeSet::from(["f1.csv".to_string()]),
            ..prev.clone()
        };
        let combined = combine_pitcher(Some(&prev), fresh);
        assert_eq!(combined.batters_faced, 20);
    }

    // ---- Zone bins ----

    #[test]
    fn zone_bins_sum() {
        let prev = ZoneBin {
            team: "BARN".to_string(),
            year: 2024,
            player: "Doe, Jay".to_string(),
            zone_id: 5,
            total_pitches: 10,
            fastballs: 6,
            swings: 4,
            whiffs: 1,
            hits: 2,
            ..ZoneBin::default()
        };
        let fresh = ZoneBin {
            total_pitches: 3,
            fastballs: 1,
            swings: 2,
            whiffs: 1,
            hits: 0,
            ..prev.clone()
        };
        let combined = combine_zone_bin(Some(&prev), fresh);
        assert_eq!(combined.total_pitches, 13);
        assert_eq!(combined.fastballs, 7);
        assert_eq!(combined.swings, 6);
        assert_eq!(combined.whiffs, 2);
        assert_eq!(combined.hits, 2);
    }

    #[test]
    fn zone_bin_first_write_passthrough() {
        let fresh = ZoneBin {
            team: "BARN".to_string(),
            year: 2024,
            player: "Doe, Jay".to_string(),
            zone_id: 7,
            total_pitches: 2,
            ..ZoneBin::default()
        };
        let combined = combine_zone_bin(None, fresh.clone());
        assert_eq!(combined, fresh);
    }
}
