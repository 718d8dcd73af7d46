// Cross-sectional percentile ranking.
//
// Ranks are computed within a season partition, never across seasons. Tie
// handling is competition ("1224") ranking with ties sharing the minimum
// rank, and the rank numbers are rescaled onto a 1-100 (or 1-99) band.
//
// Direction is per-stat, fixed policy: `ascending = true` assigns rank 1
// (score 1) to the lowest raw value, so higher raw values earn higher
// scores; lower-is-better stats therefore rank with `ascending = false`.
// Getting a direction backwards is the classic bug here, which is why the
// per-stat tables below are data, not scattered code.

use std::collections::BTreeMap;

use chrono::Datelike;

use crate::stats::aggregate::{BatterAggregate, PitcherAggregate};

// ---------------------------------------------------------------------------
// Scale
// ---------------------------------------------------------------------------

/// Output band for percentile scores. Both variants exist in downstream
/// tables; the band is configuration, not code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankScale {
    OneTo100,
    OneTo99,
}

impl RankScale {
    fn span(self) -> f64 {
        match self {
            RankScale::OneTo100 => 99.0,
            RankScale::OneTo99 => 98.0,
        }
    }

    pub fn max_score(self) -> u32 {
        match self {
            RankScale::OneTo100 => 100,
            RankScale::OneTo99 => 99,
        }
    }
}

// ---------------------------------------------------------------------------
// Core scoring
// ---------------------------------------------------------------------------

/// Score one partition's values onto the scale.
///
/// Null (or non-finite) values receive a null score and are excluded from the
/// ranking entirely; an all-null input yields an all-null output. When every
/// present value is identical, every row receives the scale maximum.
pub fn percentile_scores(
    values: &[Option<f64>],
    ascending: bool,
    scale: RankScale,
) -> Vec<Option<u32>> {
    let mut sorted: Vec<f64> = values
        .iter()
        .filter_map(|v| *v)
        .filter(|v| v.is_finite())
        .collect();
    if sorted.is_empty() {
        return vec![None; values.len()];
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("non-finite values filtered"));
    let n = sorted.len();

    // Competition rank with ties at the minimum: 1 + number of strictly
    // better values.
    let rank_of = |v: f64| -> u32 {
        let better = if ascending {
            sorted.partition_point(|w| *w < v)
        } else {
            n - sorted.partition_point(|w| *w <= v)
        };
        better as u32 + 1
    };

    let max_rank = if ascending {
        rank_of(sorted[n - 1])
    } else {
        rank_of(sorted[0])
    };

    values
        .iter()
        .map(|v| {
            let v = (*v)?;
            if !v.is_finite() {
                return None;
            }
            if max_rank == 1 {
                // Every present value identical.
                return Some(scale.max_score());
            }
            let rank = rank_of(v);
            let raw = 1.0 + (rank - 1) as f64 / (max_rank - 1) as f64 * scale.span();
            Some(round_half_even(raw).clamp(1, scale.max_score()))
        })
        .collect()
}

/// Round half-to-even, so a raw score of 50.5 lands on 50.
fn round_half_even(x: f64) -> u32 {
    let floor = x.floor();
    let frac = x - floor;
    let f = floor.max(0.0) as u32;
    if (frac - 0.5).abs() < 1e-9 {
        if f % 2 == 0 {
            f
        } else {
            f + 1
        }
    } else {
        x.round().max(0.0) as u32
    }
}

// ---------------------------------------------------------------------------
// Per-stat policy tables
// ---------------------------------------------------------------------------

/// One tracked stat: how to read its value, where to write its rank, and
/// which direction is better.
pub struct StatSpec<T> {
    pub name: &'static str,
    pub ascending: bool,
    pub get: fn(&T) -> Option<f64>,
    pub set_rank: fn(&mut T, Option<u32>),
}

/// Tracked batter stats. Lower is better for strikeout, whiff and chase
/// rates; everything else rewards higher values.
pub const BATTING_RANK_STATS: &[StatSpec<BatterAggregate>] = &[
    StatSpec {
        name: "avg",
        ascending: true,
        get: |r| r.avg,
        set_rank: |r, v| r.ranks.avg = v,
    },
    StatSpec {
        name: "obp",
        ascending: true,
        get: |r| r.obp,
        set_rank: |r, v| r.ranks.obp = v,
    },
    StatSpec {
        name: "slg",
        ascending: true,
        get: |r| r.slg,
        set_rank: |r, v| r.ranks.slg = v,
    },
    StatSpec {
        name: "ops",
        ascending: true,
        get: |r| r.ops,
        set_rank: |r, v| r.ranks.ops = v,
    },
    StatSpec {
        name: "k_per",
        ascending: false,
        get: |r| r.k_per,
        set_rank: |r, v| r.ranks.k_per = v,
    },
    StatSpec {
        name: "bb_per",
        ascending: true,
        get: |r| r.bb_per,
        set_rank: |r, v| r.ranks.bb_per = v,
    },
    StatSpec {
        name: "whiff_per",
        ascending: false,
        get: |r| r.whiff_per,
        set_rank: |r, v| r.ranks.whiff_per = v,
    },
    StatSpec {
        name: "chase_per",
        ascending: false,
        get: |r| r.chase_per,
        set_rank: |r, v| r.ranks.chase_per = v,
    },
    StatSpec {
        name: "avg_exit_velo",
        ascending: true,
        get: |r| r.avg_exit_velo,
        set_rank: |r, v| r.ranks.avg_exit_velo = v,
    },
    StatSpec {
        name: "hard_hit_per",
        ascending: true,
        get: |r| r.hard_hit_per,
        set_rank: |r, v| r.ranks.hard_hit_per = v,
    },
    StatSpec {
        name: "xba_per",
        ascending: true,
        get: |r| r.xba_per,
        set_rank: |r, v| r.ranks.xba_per = v,
    },
    StatSpec {
        name: "xwoba_per",
        ascending: true,
        get: |r| r.xwoba_per,
        set_rank: |r, v| r.ranks.xwoba_per = v,
    },
    StatSpec {
        name: "barrel_per",
        ascending: true,
        get: |r| r.barrel_per,
        set_rank: |r, v| r.ranks.barrel_per = v,
    },
];

/// Tracked pitcher stats. Directions flip relative to batters where the
/// stat's meaning flips: a pitcher wants whiffs and chases, and wants
/// contact quality against to be poor.
pub const PITCHING_RANK_STATS: &[StatSpec<PitcherAggregate>] = &[
    StatSpec {
        name: "k_per",
        ascending: true,
        get: |r| r.k_per,
        set_rank: |r, v| r.ranks.k_per = v,
    },
    StatSpec {
        name: "bb_per",
        ascending: false,
        get: |r| r.bb_per,
        set_rank: |r, v| r.ranks.bb_per = v,
    },
    StatSpec {
        name: "whip",
        ascending: false,
        get: |r| r.whip,
        set_rank: |r, v| r.ranks.whip = v,
    },
    StatSpec {
        name: "avg_against",
        ascending: false,
        get: |r| r.avg_against,
        set_rank: |r, v| r.ranks.avg_against = v,
    },
    StatSpec {
        name: "gb_per",
        ascending: true,
        get: |r| r.gb_per,
        set_rank: |r, v| r.ranks.gb_per = v,
    },
    StatSpec {
        name: "whiff_per",
        ascending: true,
        get: |r| r.whiff_per,
        set_rank: |r, v| r.ranks.whiff_per = v,
    },
    StatSpec {
        name: "chase_per",
        ascending: true,
        get: |r| r.chase_per,
        set_rank: |r, v| r.ranks.chase_per = v,
    },
    StatSpec {
        name: "avg_exit_velo",
        ascending: false,
        get: |r| r.avg_exit_velo,
        set_rank: |r, v| r.ranks.avg_exit_velo = v,
    },
    StatSpec {
        name: "avg_fb_velo",
        ascending: true,
        get: |r| r.avg_fb_velo,
        set_rank: |r, v| r.ranks.avg_fb_velo = v,
    },
];

// ---------------------------------------------------------------------------
// Population ranking
// ---------------------------------------------------------------------------

fn rank_partitioned<T>(
    records: &mut [T],
    specs: &[StatSpec<T>],
    season_of: fn(&T) -> i32,
    scale: RankScale,
) {
    let mut by_season: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, rec) in records.iter().enumerate() {
        by_season.entry(season_of(rec)).or_default().push(i);
    }

    for spec in specs {
        for indices in by_season.values() {
            let values: Vec<Option<f64>> =
                indices.iter().map(|&i| (spec.get)(&records[i])).collect();
            let scores = percentile_scores(&values, spec.ascending, scale);
            for (j, &i) in indices.iter().enumerate() {
                (spec.set_rank)(&mut records[i], scores[j]);
            }
        }
    }
}

/// Rank every tracked batter stat within each season, writing the scores onto
/// the records' rank fields (prior ranks are fully overwritten).
pub fn rank_batters(records: &mut [BatterAggregate], scale: RankScale) {
    rank_partitioned(records, BATTING_RANK_STATS, |r| r.year, scale);
}

/// Rank every tracked pitcher stat within each season (the season of the
/// outing date).
pub fn rank_pitchers(records: &mut [PitcherAggregate], scale: RankScale) {
    rank_partitioned(records, PITCHING_RANK_STATS, |r| r.date.year(), scale);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    // ---- percentile_scores ----

    #[test]
    fn descending_three_values() {
        // [10,20,30], lower-is-better direction: ranks 3/2/1, scores
        // rescale to [100, 50, 1] (50.5 rounds half-even to 50).
        let scores = percentile_scores(&some(&[10.0, 20.0, 30.0]), false, RankScale::OneTo100);
        assert_eq!(scores, vec![Some(100), Some(50), Some(1)]);
    }

    #[test]
    fn ascending_three_values() {
        let scores = percentile_scores(&some(&[10.0, 20.0, 30.0]), true, RankScale::OneTo100);
        assert_eq!(scores, vec![Some(1), Some(50), Some(100)]);
    }

    #[test]
    fn all_tied_scores_max() {
        let scores = percentile_scores(&some(&[10.0, 10.0, 10.0]), false, RankScale::OneTo100);
        assert_eq!(scores, vec![Some(100); 3]);

        let scores = percentile_scores(&some(&[10.0, 10.0, 10.0]), true, RankScale::OneTo99);
        assert_eq!(scores, vec![Some(99); 3]);
    }

    #[test]
    fn ties_share_minimum_rank() {
        // [10, 20, 20, 30] descending: 30 -> rank 1, the tied 20s -> rank 2
        // (both), 10 -> rank 4 ("1224" behavior, not averaged ranks).
        // Scores: 1 + (rank-1)/3 * 99 -> 30 -> 1, 20 -> 34, 10 -> 100.
        let scores =
            percentile_scores(&some(&[10.0, 20.0, 20.0, 30.0]), false, RankScale::OneTo100);
        assert_eq!(scores, vec![Some(100), Some(34), Some(34), Some(1)]);
    }

    #[test]
    fn one_to_99_scale() {
        let scores = percentile_scores(&some(&[10.0, 20.0, 30.0]), false, RankScale::OneTo99);
        assert_eq!(scores, vec![Some(99), Some(50), Some(1)]);
    }

    #[test]
    fn nulls_excluded_and_scored_null() {
        let values = vec![Some(10.0), None, Some(30.0)];
        let scores = percentile_scores(&values, true, RankScale::OneTo100);
        assert_eq!(scores, vec![Some(1), None, Some(100)]);
    }

    #[test]
    fn all_null_population_stays_null() {
        let values = vec![None, None, None];
        let scores = percentile_scores(&values, true, RankScale::OneTo100);
        assert_eq!(scores, vec![None; 3]);
    }

    #[test]
    fn single_value_scores_max() {
        let scores = percentile_scores(&some(&[0.25]), true, RankScale::OneTo100);
        assert_eq!(scores, vec![Some(100)]);
    }

    #[test]
    fn non_finite_treated_as_null() {
        let values = vec![Some(10.0), Some(f64::NAN), Some(30.0)];
        let scores = percentile_scores(&values, true, RankScale::OneTo100);
        assert_eq!(scores, vec![Some(1), None, Some(100)]);
    }

    #[test]
    fn round_half_even_behavior() {
        assert_eq!(round_half_even(50.5), 50);
        assert_eq!(round_half_even(51.5), 52);
        assert_eq!(round_half_even(50.4), 50);
        assert_eq!(round_half_even(50.6), 51);
        assert_eq!(round_half_even(1.0), 1);
    }

    // ---- Direction policy ----

    #[test]
    fn batter_strikeout_rate_rewards_low_values() {
        let spec = BATTING_RANK_STATS
            .iter()
            .find(|s| s.name == "k_per")
            .unwrap();
        assert!(!spec.ascending);

        // And the arithmetic agrees: the low-K% batter scores 100.
        let scores =
            percentile_scores(&some(&[0.10, 0.30]), spec.ascending, RankScale::OneTo100);
        assert_eq!(scores, vec![Some(100), Some(1)]);
    }

    #[test]
    fn pitcher_strikeout_rate_rewards_high_values() {
        let spec = PITCHING_RANK_STATS
            .iter()
            .find(|s| s.name == "k_per")
            .unwrap();
        assert!(spec.ascending);
    }

    // ---- Population ranking ----

    fn batter(year: i32, avg: Option<f64>, k_per: Option<f64>) -> BatterAggregate {
        BatterAggregate {
            batter: format!("b{:?}{:?}", avg, k_per),
            team: "T".to_string(),
            year,
            avg,
            k_per,
            ..BatterAggregate::default()
        }
    }

    #[test]
    fn seasons_rank_independently() {
        let mut records = vec![
            batter(2023, Some(0.200), None),
            batter(2023, Some(0.300), None),
            batter(2024, Some(0.250), None),
        ];
        rank_batters(&mut records, RankScale::OneTo100);

        // 2023: two batters, best avg scores 100, worst scores 1.
        assert_eq!(records[0].ranks.avg, Some(1));
        assert_eq!(records[1].ranks.avg, Some(100));
        // 2024: alone in its season -> max score, despite a middling avg.
        assert_eq!(records[2].ranks.avg, Some(100));
    }

    #[test]
    fn null_stat_column_ranks_null() {
        let mut records = vec![
            batter(2024, Some(0.300), None),
            batter(2024, Some(0.250), None),
        ];
        rank_batters(&mut records, RankScale::OneTo100);
        assert_eq!(records[0].ranks.k_per, None);
        assert_eq!(records[1].ranks.k_per, None);
        assert!(records[0].ranks.avg.is_some());
    }

    #[test]
    fn pitchers_partition_by_outing_year() {
        let mut records = vec![
            PitcherAggregate {
                pitcher: "A".to_string(),
                team: "T".to_string(),
                date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
                whip: Some(1.0),
                ..PitcherAggregate::default()
            },
            PitcherAggregate {
                pitcher: "B".to_string(),
                team: "T".to_string(),
                date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
                whip: Some(2.0),
                ..PitcherAggregate::default()
            },
            PitcherAggregate {
                pitcher: "C".to_string(),
                team: "T".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                whip: Some(3.0),
                ..PitcherAggregate::default()
            },
        ];
        rank_pitchers(&mut records, RankScale::OneTo100);

        // WHIP is lower-is-better: within 2023 the 1.0 WHIP scores 100.
        assert_eq!(records[0].ranks.whip, Some(100));
        assert_eq!(records[1].ranks.whip, Some(1));
        // 2024 has a single pitcher.
        assert_eq!(records[2].ranks.whip, Some(100));
    }

    #[test]
    fn reranking_overwrites_previous_scores() {
        let mut records = vec![
            batter(2024, Some(0.200), None),
            batter(2024, Some(0.300), None),
        ];
        rank_batters(&mut records, RankScale::OneTo100);
        assert_eq!(records[0].ranks.avg, Some(1));

        // Flip the population; the stale score must not survive.
        records[0].avg = Some(0.400);
        rank_batters(&mut records, RankScale::OneTo100);
        assert_eq!(records[0].ranks.avg, Some(100));
        assert_eq!(records[1].ranks.avg, Some(1));
    }
}
