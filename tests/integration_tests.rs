// End-to-end pipeline tests: raw CSV text through event loading, aggregation,
// persistence, incremental re-upload, and the ranking pass, all against an
// in-memory SQLite database.

use trackman_stats::db::Database;
use trackman_stats::events::load_events_from_reader;
use trackman_stats::expected::ModelContext;
use trackman_stats::pipeline::Pipeline;
use trackman_stats::stats::rank::RankScale;

const HEADER: &str = "Batter,BatterTeam,Pitcher,PitcherTeam,PlayResult,KorBB,PitchCall,TaggedHitType,TaggedPitchType,BatterSide,PitcherThrows,League,PlateLocHeight,PlateLocSide,ExitSpeed,Angle,Direction,RelSpeed";

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn pipeline() -> Pipeline {
    let db = Database::open(":memory:").expect("in-memory database should open");
    Pipeline::new(db, ModelContext::disabled(), 50)
}

fn load(source_id: &str, body: &str) -> trackman_stats::events::EventTable {
    let csv = format!("{HEADER}\n{body}");
    load_events_from_reader(csv.as_bytes(), source_id).expect("CSV should parse")
}

// ---------------------------------------------------------------------------
// The canonical three-row scenario
// ---------------------------------------------------------------------------

/// One batter: a complete batted single (in-zone), a swinging strikeout
/// (out-of-zone), and a walk (out-of-zone).
fn three_row_file() -> trackman_stats::events::EventTable {
    load(
        "20240601-Main-1.csv",
        "\
\"Doe, Jay\",BARN,\"Arm, Strong\",OPP,Single,Undefined,InPlay,LineDrive,Fastball,Right,Right,Summer,2.5,0.0,95,20,10,92.4
\"Doe, Jay\",BARN,\"Arm, Strong\",OPP,Undefined,Strikeout,StrikeSwinging,,Slider,Right,Right,Summer,4.2,0.0,,,,84.1
\"Doe, Jay\",BARN,\"Arm, Strong\",OPP,Undefined,Walk,BallCalled,,Fastball,Right,Right,Summer,1.0,0.0,,,,91.8",
    )
}

#[test]
fn three_row_scenario_produces_expected_aggregate() {
    let p = pipeline();
    let summary = p.upload_tables(&[three_row_file()]);
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.failed_batches, 0);

    let agg = p
        .db()
        .fetch_batter("Doe, Jay", "BARN", 2024)
        .unwrap()
        .expect("aggregate should be persisted");

    assert_eq!(agg.plate_app, 3);
    assert_eq!(agg.at_bats, 2);
    assert_eq!(agg.batted_balls, 1);
    assert_eq!(agg.in_zone_pitches, 1);
    assert_eq!(agg.out_of_zone_pitches, 2);
    assert!(approx(agg.k_per.unwrap(), 1.0 / 3.0));
    assert!(approx(agg.bb_per.unwrap(), 1.0 / 3.0));
    assert!(approx(agg.avg.unwrap(), 0.5));
    assert!(approx(agg.avg_exit_velo.unwrap(), 95.0));
    // Both fastballs carried a release speed: (92.4 + 91.8) / 2.
    assert_eq!(agg.fastballs, 2);
    assert!(approx(agg.avg_fb_velo.unwrap(), (92.4 + 91.8) / 2.0));
    assert!(agg.processed_files.contains("20240601-Main-1.csv"));
}

#[test]
fn pitcher_side_of_the_same_file() {
    let p = pipeline();
    p.upload_tables(&[three_row_file()]);

    let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let agg = p
        .db()
        .fetch_pitcher("Arm, Strong", "OPP", date)
        .unwrap()
        .expect("pitcher outing should be persisted");

    assert_eq!(agg.batters_faced, 3);
    assert_eq!(agg.strikeouts, 1);
    assert_eq!(agg.walks, 1);
    assert_eq!(agg.hits_allowed, 1);
    assert_eq!(agg.pitches, 3);
    assert!(approx(agg.avg_against.unwrap(), 0.5));
}

#[test]
fn zone_bins_cover_all_located_pitches() {
    let p = pipeline();
    p.upload_tables(&[three_row_file()]);

    // Pitch locations: (0.0, 2.5) -> zone 5; (0.0, 4.2) -> zone 11 (over the
    // top, right of center tie rule); (0.0, 1.0) -> zone 13.
    let middle = p
        .db()
        .fetch_zone_bin("BARN", 2024, "Doe, Jay", 5)
        .unwrap()
        .expect("middle bin");
    assert_eq!(middle.total_pitches, 1);
    assert_eq!(middle.swings, 1);
    assert_eq!(middle.hits, 1);

    let high = p
        .db()
        .fetch_zone_bin("BARN", 2024, "Doe, Jay", 11)
        .unwrap()
        .expect("over-the-top bin");
    assert_eq!(high.whiffs, 1);

    let low = p
        .db()
        .fetch_zone_bin("BARN", 2024, "Doe, Jay", 13)
        .unwrap()
        .expect("below-the-zone bin");
    assert_eq!(low.swings, 0);

    assert!(p
        .db()
        .fetch_zone_bin("BARN", 2024, "Doe, Jay", 1)
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Incremental behavior through the full stack
// ---------------------------------------------------------------------------

#[test]
fn reupload_of_same_export_does_not_double_count() {
    let p = pipeline();
    p.upload_tables(&[three_row_file()]);
    let first = p
        .db()
        .fetch_batter("Doe, Jay", "BARN", 2024)
        .unwrap()
        .unwrap();

    p.upload_tables(&[three_row_file()]);
    let second = p
        .db()
        .fetch_batter("Doe, Jay", "BARN", 2024)
        .unwrap()
        .unwrap();

    assert_eq!(first, second);
}

#[test]
fn second_game_merges_with_weighted_rates() {
    let p = pipeline();
    p.upload_tables(&[three_row_file()]);

    // A second export a week later: two more singles, both in the zone.
    let week2 = load(
        "20240608-Main-1.csv",
        "\
\"Doe, Jay\",BARN,\"Arm, Strong\",OPP,Single,Undefined,InPlay,GroundBall,Fastball,Right,Right,Summer,2.2,0.1,101,5,-12,93.0
\"Doe, Jay\",BARN,\"Arm, Strong\",OPP,Single,Undefined,InPlay,LineDrive,Fastball,Right,Right,Summer,2.8,-0.2,99,14,4,93.6",
    );
    p.upload_tables(&[week2]);

    let agg = p
        .db()
        .fetch_batter("Doe, Jay", "BARN", 2024)
        .unwrap()
        .unwrap();

    assert_eq!(agg.plate_app, 5);
    assert_eq!(agg.at_bats, 4);
    assert_eq!(agg.batted_balls, 3);
    assert_eq!(agg.processed_files.len(), 2);
    // avg: week1 0.5 over 2 AB, week2 1.0 over 2 AB -> 0.75.
    assert!(approx(agg.avg.unwrap(), 0.75));
    // Exit velo: week1 mean 95 over 1 batted ball, week2 mean 100 over 2.
    assert!(approx(agg.avg_exit_velo.unwrap(), (95.0 + 101.0 + 99.0) / 3.0));
    // The week-2 ground ball landed in a spray slice.
    assert_eq!(agg.spray.iter().sum::<u32>(), 1);
}

// ---------------------------------------------------------------------------
// Ranking through the full stack
// ---------------------------------------------------------------------------

#[test]
fn ranking_pass_scores_and_persists() {
    let p = pipeline();
    // Three batters in one file with averages 1.0, 0.5, 0.0.
    let t = load(
        "20240601-Main-1.csv",
        "\
High,BARN,\"Arm, Strong\",OPP,Single,Undefined,InPlay,LineDrive,Fastball,Right,Right,Summer,2.5,0.0,95,20,10,92.0
Mid,BARN,\"Arm, Strong\",OPP,Single,Undefined,InPlay,LineDrive,Fastball,Right,Right,Summer,2.5,0.0,92,18,5,92.0
Mid,BARN,\"Arm, Strong\",OPP,Undefined,Strikeout,StrikeSwinging,,Slider,Right,Right,Summer,2.5,0.0,,,,85.0
Low,BARN,\"Arm, Strong\",OPP,Undefined,Strikeout,StrikeSwinging,,Slider,Right,Right,Summer,2.5,0.0,,,,85.0",
    );
    p.upload_tables(&[t]);
    p.refresh_rankings(RankScale::OneTo100);

    let high = p.db().fetch_batter("High", "BARN", 2024).unwrap().unwrap();
    let mid = p.db().fetch_batter("Mid", "BARN", 2024).unwrap().unwrap();
    let low = p.db().fetch_batter("Low", "BARN", 2024).unwrap().unwrap();

    assert_eq!(high.ranks.avg, Some(100));
    assert_eq!(mid.ranks.avg, Some(50));
    assert_eq!(low.ranks.avg, Some(1));

    // k%: 0.0 / 0.5 / 1.0, lower-is-better for batters.
    assert_eq!(high.ranks.k_per, Some(100));
    assert_eq!(mid.ranks.k_per, Some(50));
    assert_eq!(low.ranks.k_per, Some(1));

    // Stats with an all-null population stay null (nobody chased: every
    // located pitch above was in the strike zone).
    assert_eq!(high.ranks.chase_per, None);
}

#[test]
fn ranking_respects_the_99_scale_variant() {
    let p = pipeline();
    let t = load(
        "20240601-Main-1.csv",
        "\
High,BARN,P,OPP,Single,Undefined,InPlay,LineDrive,Fastball,Right,Right,Summer,2.5,0.0,95,20,10,92.0
Low,BARN,P,OPP,Undefined,Strikeout,StrikeSwinging,,Slider,Right,Right,Summer,2.5,0.0,,,,85.0",
    );
    p.upload_tables(&[t]);
    p.refresh_rankings(RankScale::OneTo99);

    let high = p.db().fetch_batter("High", "BARN", 2024).unwrap().unwrap();
    let low = p.db().fetch_batter("Low", "BARN", 2024).unwrap().unwrap();
    assert_eq!(high.ranks.avg, Some(99));
    assert_eq!(low.ranks.avg, Some(1));
}

// ---------------------------------------------------------------------------
// Degrade paths through the full stack
// ---------------------------------------------------------------------------

#[test]
fn file_missing_required_columns_uploads_nothing() {
    let p = pipeline();
    let csv = "Batter,BatterTeam\n\"Doe, Jay\",BARN";
    let table = load_events_from_reader(csv.as_bytes(), "20240601-Main-1.csv").unwrap();
    let summary = p.upload_tables(&[table]);

    // The file is processed (not an error) but degrades to zero aggregates.
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.batters_upserted, 0);
    assert!(p
        .db()
        .fetch_batter("Doe, Jay", "BARN", 2024)
        .unwrap()
        .is_none());
}

#[test]
fn practice_file_remaps_team_codes_end_to_end() {
    let p = pipeline();
    let t = load(
        "20240601-Main-1.csv",
        "\"Doe, Jay\",BARN,P,OPP,Single,Undefined,InPlay,LineDrive,Fastball,Right,Right,team,2.5,0.0,95,20,10,92.0",
    );
    p.upload_tables(&[t]);

    assert!(p
        .db()
        .fetch_batter("Doe, Jay", "BARN", 2024)
        .unwrap()
        .is_none());
    assert!(p
        .db()
        .fetch_batter("Doe, Jay", "BARN_PRAC", 2024)
        .unwrap()
        .is_some());
}

#[test]
fn malformed_numeric_cells_only_lose_their_own_stat() {
    let p = pipeline();
    let t = load(
        "20240601-Main-1.csv",
        "\"Doe, Jay\",BARN,P,OPP,Single,Undefined,InPlay,LineDrive,Fastball,Right,Right,Summer,not_a_number,0.0,95,20,10,92.0",
    );
    p.upload_tables(&[t]);

    let agg = p
        .db()
        .fetch_batter("Doe, Jay", "BARN", 2024)
        .unwrap()
        .unwrap();
    // The bad plate location drops the row from the zone pass only.
    assert_eq!(agg.in_zone_pitches, 0);
    assert_eq!(agg.out_of_zone_pitches, 0);
    assert_eq!(agg.plate_app, 1);
    assert_eq!(agg.batted_balls, 1);
    assert!(approx(agg.avg_exit_velo.unwrap(), 95.0));
}
