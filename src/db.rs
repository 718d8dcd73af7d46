// SQLite persistence for aggregate stat lines.
//
// Three tables, one per aggregate family, each keyed by its composite entity
// key and written with idempotent upserts. The engine asks nothing else of
// the store: upsert by key, fetch by key, and offset-paginated selects for
// the population-wide ranking pass.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::stats::aggregate::{
    BatterAggregate, BatterRanks, PitcherAggregate, PitcherRanks, ZoneBin,
};

/// SQLite-backed persistence for batter, pitcher and zone-bin aggregates.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path` and ensure the schema exists.
    /// Pass `":memory:"` for an ephemeral database (useful for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS batter_stats (
                batter              TEXT NOT NULL,
                batter_team         TEXT NOT NULL,
                year                INTEGER NOT NULL,
                plate_app           INTEGER NOT NULL,
                at_bats             INTEGER NOT NULL,
                batted_balls        INTEGER NOT NULL,
                strikeouts          INTEGER NOT NULL,
                walks               INTEGER NOT NULL,
                singles             INTEGER NOT NULL,
                doubles             INTEGER NOT NULL,
                triples             INTEGER NOT NULL,
                home_runs           INTEGER NOT NULL,
                in_zone_pitches     INTEGER NOT NULL,
                out_of_zone_pitches INTEGER NOT NULL,
                ground_balls        INTEGER NOT NULL,
                fastballs           INTEGER NOT NULL,
                spray_1             INTEGER NOT NULL,
                spray_2             INTEGER NOT NULL,
                spray_3             INTEGER NOT NULL,
                spray_4             INTEGER NOT NULL,
                spray_5             INTEGER NOT NULL,
                avg                 REAL,
                obp                 REAL,
                slg                 REAL,
                ops                 REAL,
                iso                 REAL,
                k_per               REAL,
                bb_per              REAL,
                whiff_per           REAL,
                chase_per           REAL,
                hard_hit_per        REAL,
                sweet_spot_per      REAL,
                gb_per              REAL,
                avg_exit_velo       REAL,
                avg_fb_velo         REAL,
                xba_per             REAL,
                xslg_per            REAL,
                xwoba_per           REAL,
                barrel_per          REAL,
                spray_per_1         REAL,
                spray_per_2         REAL,
                spray_per_3         REAL,
                spray_per_4         REAL,
                spray_per_5         REAL,
                avg_rank            INTEGER,
                obp_rank            INTEGER,
                slg_rank            INTEGER,
                ops_rank            INTEGER,
                k_per_rank          INTEGER,
                bb_per_rank         INTEGER,
                whiff_per_rank      INTEGER,
                chase_per_rank      INTEGER,
                avg_exit_velo_rank  INTEGER,
                hard_hit_per_rank   INTEGER,
                xba_per_rank        INTEGER,
                xwoba_per_rank      INTEGER,
                barrel_per_rank     INTEGER,
                processed_files     TEXT NOT NULL,
                PRIMARY KEY (batter, batter_team, year)
            );

            CREATE TABLE IF NOT EXISTS pitcher_stats (
                pitcher             TEXT NOT NULL,
                pitcher_team        TEXT NOT NULL,
                date                TEXT NOT NULL,
                batters_faced       INTEGER NOT NULL,
                at_bats_against     INTEGER NOT NULL,
                hits_allowed        INTEGER NOT NULL,
                strikeouts          INTEGER NOT NULL,
                walks               INTEGER NOT NULL,
                batted_balls        INTEGER NOT NULL,
                ground_balls        INTEGER NOT NULL,
                in_zone_pitches     INTEGER NOT NULL,
                out_of_zone_pitches INTEGER NOT NULL,
                fastballs           INTEGER NOT NULL,
                pitches             INTEGER NOT NULL,
                outs_recorded       INTEGER NOT NULL,
                k_per               REAL,
                bb_per              REAL,
                whip                REAL,
                avg_against         REAL,
                gb_per              REAL,
                whiff_per           REAL,
                chase_per           REAL,
                avg_exit_velo       REAL,
                avg_fb_velo         REAL,
                k_per_rank          INTEGER,
                bb_per_rank         INTEGER,
                whip_rank           INTEGER,
                avg_against_rank    INTEGER,
                gb_per_rank         INTEGER,
                whiff_per_rank      INTEGER,
                chase_per_rank      INTEGER,
                avg_exit_velo_rank  INTEGER,
                avg_fb_velo_rank    INTEGER,
                unique_games        TEXT NOT NULL,
                PRIMARY KEY (pitcher, pitcher_team, date)
            );

            CREATE TABLE IF NOT EXISTS zone_bins (
                team           TEXT NOT NULL,
                year           INTEGER NOT NULL,
                player         TEXT NOT NULL,
                zone_id        INTEGER NOT NULL,
                total_pitches  INTEGER NOT NULL,
                fastballs      INTEGER NOT NULL,
                breaking_balls INTEGER NOT NULL,
                offspeed       INTEGER NOT NULL,
                vs_left        INTEGER NOT NULL,
                vs_right       INTEGER NOT NULL,
                swings         INTEGER NOT NULL,
                whiffs         INTEGER NOT NULL,
                hits           INTEGER NOT NULL,
                PRIMARY KEY (team, year, player, zone_id)
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Batter stats
    // ------------------------------------------------------------------

    /// Upsert a batch of batter aggregates inside one transaction. Conflicts
    /// on (batter, batter_team, year) overwrite every non-key column, so the
    /// merge engine's output fully replaces the stored row.
    pub fn upsert_batters(&self, rows: &[BatterAggregate]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin batter upsert transaction")?;
        for agg in rows {
            let processed = serde_json::to_string(&agg.processed_files)
                .context("failed to serialize processed_files")?;
            tx.execute(
                "INSERT INTO batter_stats (
                    batter, batter_team, year,
                    plate_app, at_bats, batted_balls, strikeouts, walks,
                    singles, doubles, triples, home_runs,
                    in_zone_pitches, out_of_zone_pitches, ground_balls, fastballs,
                    spray_1, spray_2, spray_3, spray_4, spray_5,
                    avg, obp, slg, ops, iso, k_per, bb_per, whiff_per, chase_per,
                    hard_hit_per, sweet_spot_per, gb_per, avg_exit_velo, avg_fb_velo,
                    xba_per, xslg_per, xwoba_per, barrel_per,
                    spray_per_1, spray_per_2, spray_per_3, spray_per_4, spray_per_5,
                    avg_rank, obp_rank, slg_rank, ops_rank, k_per_rank, bb_per_rank,
                    whiff_per_rank, chase_per_rank, avg_exit_velo_rank,
                    hard_hit_per_rank, xba_per_rank, xwoba_per_rank, barrel_per_rank,
                    processed_files
                 ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                    ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38,
                    ?39, ?40, ?41, ?42, ?43, ?44, ?45, ?46, ?47, ?48, ?49, ?50,
                    ?51, ?52, ?53, ?54, ?55, ?56, ?57, ?58
                 )
                 ON CONFLICT(batter, batter_team, year) DO UPDATE SET
                    plate_app = excluded.plate_app,
                    at_bats = excluded.at_bats,
                    batted_balls = excluded.batted_balls,
                    strikeouts = excluded.strikeouts,
                    walks = excluded.walks,
                    singles = excluded.singles,
                    doubles = excluded.doubles,
                    triples = excluded.triples,
                    home_runs = excluded.home_runs,
                    in_zone_pitches = excluded.in_zone_pitches,
                    out_of_zone_pitches = excluded.out_of_zone_pitches,
                    ground_balls = excluded.ground_balls,
                    fastballs = excluded.fastballs,
                    spray_1 = excluded.spray_1,
                    spray_2 = excluded.spray_2,
                    spray_3 = excluded.spray_3,
                    spray_4 = excluded.spray_4,
                    spray_5 = excluded.spray_5,
                    avg = excluded.avg,
                    obp = excluded.obp,
                    slg = excluded.slg,
                    ops = excluded.ops,
                    iso = excluded.iso,
                    k_per = excluded.k_per,
                    bb_per = excluded.bb_per,
                    whiff_per = excluded.whiff_per,
                    chase_per = excluded.chase_per,
                    hard_hit_per = excluded.hard_hit_per,
                    sweet_spot_per = excluded.sweet_spot_per,
                    gb_per = excluded.gb_per,
                    avg_exit_velo = excluded.avg_exit_velo,
                    avg_fb_velo = excluded.avg_fb_velo,
                    xba_per = excluded.xba_per,
                    xslg_per = excluded.xslg_per,
                    xwoba_per = excluded.xwoba_per,
                    barrel_per = excluded.barrel_per,
                    spray_per_1 = excluded.spray_per_1,
                    spray_per_2 = excluded.spray_per_2,
                    spray_per_3 = excluded.spray_per_3,
                    spray_per_4 = excluded.spray_per_4,
                    spray_per_5 = excluded.spray_per_5,
                    avg_rank = excluded.avg_rank,
                    obp_rank = excluded.obp_rank,
                    slg_rank = excluded.slg_rank,
                    ops_rank = excluded.ops_rank,
                    k_per_rank = excluded.k_per_rank,
                    bb_per_rank = excluded.bb_per_rank,
                    whiff_per_rank = excluded.whiff_per_rank,
                    chase_per_rank = excluded.chase_per_rank,
                    avg_exit_velo_rank = excluded.avg_exit_velo_rank,
                    hard_hit_per_rank = excluded.hard_hit_per_rank,
                    xba_per_rank = excluded.xba_per_rank,
                    xwoba_per_rank = excluded.xwoba_per_rank,
                    barrel_per_rank = excluded.barrel_per_rank,
                    processed_files = excluded.processed_files",
                params![
                    agg.batter,
                    agg.team,
                    agg.year,
                    agg.plate_app,
                    agg.at_bats,
                    agg.batted_balls,
                    agg.strikeouts,
                    agg.walks,
                    agg.singles,
                    agg.doubles,
                    agg.triples,
                    agg.home_runs,
                    agg.in_zone_pitches,
                    agg.out_of_zone_pitches,
                    agg.ground_balls,
                    agg.fastballs,
                    agg.spray[0],
                    agg.spray[1],
                    agg.spray[2],
                    agg.spray[3],
                    agg.spray[4],
                    agg.avg,
                    agg.obp,
                    agg.slg,
                    agg.ops,
                    agg.iso,
                    agg.k_per,
                    agg.bb_per,
                    agg.whiff_per,
                    agg.chase_per,
                    agg.hard_hit_per,
                    agg.sweet_spot_per,
                    agg.gb_per,
                    agg.avg_exit_velo,
                    agg.avg_fb_velo,
                    agg.xba_per,
                    agg.xslg_per,
                    agg.xwoba_per,
                    agg.barrel_per,
                    agg.spray_per[0],
                    agg.spray_per[1],
                    agg.spray_per[2],
                    agg.spray_per[3],
                    agg.spray_per[4],
                    agg.ranks.avg,
                    agg.ranks.obp,
                    agg.ranks.slg,
                    agg.ranks.ops,
                    agg.ranks.k_per,
                    agg.ranks.bb_per,
                    agg.ranks.whiff_per,
                    agg.ranks.chase_per,
                    agg.ranks.avg_exit_velo,
                    agg.ranks.hard_hit_per,
                    agg.ranks.xba_per,
                    agg.ranks.xwoba_per,
                    agg.ranks.barrel_per,
                    processed,
                ],
            )
            .with_context(|| format!("failed to upsert batter {} ({})", agg.batter, agg.team))?;
        }
        tx.commit().context("failed to commit batter upsert")?;
        Ok(())
    }

    /// Fetch one batter aggregate by its composite key.
    pub fn fetch_batter(
        &self,
        batter: &str,
        team: &str,
        year: i32,
    ) -> Result<Option<BatterAggregate>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {BATTER_COLUMNS} FROM batter_stats
                 WHERE batter = ?1 AND batter_team = ?2 AND year = ?3"
            ))
            .context("failed to prepare fetch_batter query")?;
        let mut rows = stmt
            .query_map(params![batter, team, year], map_batter_row)
            .context("failed to query batter_stats")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to map batter row")?)),
            None => Ok(None),
        }
    }

    /// One page of a season's batter population, ordered by key.
    pub fn select_batters_page(
        &self,
        year: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<BatterAggregate>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {BATTER_COLUMNS} FROM batter_stats
                 WHERE year = ?1 ORDER BY batter, batter_team LIMIT ?2 OFFSET ?3"
            ))
            .context("failed to prepare batter page query")?;
        let rows = stmt
            .query_map(params![year, limit as i64, offset as i64], map_batter_row)
            .context("failed to query batter page")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map batter page rows")?;
        Ok(rows)
    }

    /// Seasons present in the batter table, ascending.
    pub fn batter_seasons(&self) -> Result<Vec<i32>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT DISTINCT year FROM batter_stats ORDER BY year")
            .context("failed to prepare batter_seasons query")?;
        let years = stmt
            .query_map([], |row| row.get(0))
            .context("failed to query batter seasons")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map batter seasons")?;
        Ok(years)
    }

    // ------------------------------------------------------------------
    // Pitcher stats
    // ------------------------------------------------------------------

    /// Upsert a batch of pitcher-outing aggregates inside one transaction.
    pub fn upsert_pitchers(&self, rows: &[PitcherAggregate]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin pitcher upsert transaction")?;
        for agg in rows {
            let games = serde_json::to_string(&agg.unique_games)
                .context("failed to serialize unique_games")?;
            tx.execute(
                "INSERT INTO pitcher_stats (
                    pitcher, pitcher_team, date,
                    batters_faced, at_bats_against, hits_allowed, strikeouts, walks,
                    batted_balls, ground_balls, in_zone_pitches, out_of_zone_pitches,
                    fastballs, pitches, outs_recorded,
                    k_per, bb_per, whip, avg_against, gb_per, whiff_per, chase_per,
                    avg_exit_velo, avg_fb_velo,
                    k_per_rank, bb_per_rank, whip_rank, avg_against_rank, gb_per_rank,
                    whiff_per_rank, chase_per_rank, avg_exit_velo_rank, avg_fb_velo_rank,
                    unique_games
                 ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                    ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34
                 )
                 ON CONFLICT(pitcher, pitcher_team, date) DO UPDATE SET
                    batters_faced = excluded.batters_faced,
                    at_bats_against = excluded.at_bats_against,
                    hits_allowed = excluded.hits_allowed,
                    strikeouts = excluded.strikeouts,
                    walks = excluded.walks,
                    batted_balls = excluded.batted_balls,
                    ground_balls = excluded.ground_balls,
                    in_zone_pitches = excluded.in_zone_pitches,
                    out_of_zone_pitches = excluded.out_of_zone_pitches,
                    fastballs = excluded.fastballs,
                    pitches = excluded.pitches,
                    outs_recorded = excluded.outs_recorded,
                    k_per = excluded.k_per,
                    bb_per = excluded.bb_per,
                    whip = excluded.whip,
                    avg_against = excluded.avg_against,
                    gb_per = excluded.gb_per,
                    whiff_per = excluded.whiff_per,
                    chase_per = excluded.chase_per,
                    avg_exit_velo = excluded.avg_exit_velo,
                    avg_fb_velo = excluded.avg_fb_velo,
                    k_per_rank = excluded.k_per_rank,
                    bb_per_rank = excluded.bb_per_rank,
                    whip_rank = excluded.whip_rank,
                    avg_against_rank = excluded.avg_against_rank,
                    gb_per_rank = excluded.gb_per_rank,
                    whiff_per_rank = excluded.whiff_per_rank,
                    chase_per_rank = excluded.chase_per_rank,
                    avg_exit_velo_rank = excluded.avg_exit_velo_rank,
                    avg_fb_velo_rank = excluded.avg_fb_velo_rank,
                    unique_games = excluded.unique_games",
                params![
                    agg.pitcher,
                    agg.team,
                    agg.date.format("%Y-%m-%d").to_string(),
                    agg.batters_faced,
                    agg.at_bats_against,
                    agg.hits_allowed,
                    agg.strikeouts,
                    agg.walks,
                    agg.batted_balls,
                    agg.ground_balls,
                    agg.in_zone_pitches,
                    agg.out_of_zone_pitches,
                    agg.fastballs,
                    agg.pitches,
                    agg.outs_recorded,
                    agg.k_per,
                    agg.bb_per,
                    agg.whip,
                    agg.avg_against,
                    agg.gb_per,
                    agg.whiff_per,
                    agg.chase_per,
                    agg.avg_exit_velo,
                    agg.avg_fb_velo,
                    agg.ranks.k_per,
                    agg.ranks.bb_per,
                    agg.ranks.whip,
                    agg.ranks.avg_against,
                    agg.ranks.gb_per,
                    agg.ranks.whiff_per,
                    agg.ranks.chase_per,
                    agg.ranks.avg_exit_velo,
                    agg.ranks.avg_fb_velo,
                    games,
                ],
            )
            .with_context(|| {
                format!("failed to upsert pitcher {} ({})", agg.pitcher, agg.team)
            })?;
        }
        tx.commit().context("failed to commit pitcher upsert")?;
        Ok(())
    }

    /// Fetch one pitcher-outing aggregate by its composite key.
    pub fn fetch_pitcher(
        &self,
        pitcher: &str,
        team: &str,
        date: NaiveDate,
    ) -> Result<Option<PitcherAggregate>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PITCHER_COLUMNS} FROM pitcher_stats
                 WHERE pitcher = ?1 AND pitcher_team = ?2 AND date = ?3"
            ))
            .context("failed to prepare fetch_pitcher query")?;
        let mut rows = stmt
            .query_map(
                params![pitcher, team, date.format("%Y-%m-%d").to_string()],
                map_pitcher_row,
            )
            .context("failed to query pitcher_stats")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to map pitcher row")?)),
            None => Ok(None),
        }
    }

    /// One page of a season's pitcher population, ordered by key.
    pub fn select_pitchers_page(
        &self,
        year: i32,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<PitcherAggregate>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PITCHER_COLUMNS} FROM pitcher_stats
                 WHERE CAST(substr(date, 1, 4) AS INTEGER) = ?1
                 ORDER BY pitcher, pitcher_team, date LIMIT ?2 OFFSET ?3"
            ))
            .context("failed to prepare pitcher page query")?;
        let rows = stmt
            .query_map(params![year, limit as i64, offset as i64], map_pitcher_row)
            .context("failed to query pitcher page")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pitcher page rows")?;
        Ok(rows)
    }

    /// Seasons present in the pitcher table, ascending.
    pub fn pitcher_seasons(&self) -> Result<Vec<i32>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT CAST(substr(date, 1, 4) AS INTEGER)
                 FROM pitcher_stats ORDER BY 1",
            )
            .context("failed to prepare pitcher_seasons query")?;
        let years = stmt
            .query_map([], |row| row.get(0))
            .context("failed to query pitcher seasons")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pitcher seasons")?;
        Ok(years)
    }

    // ------------------------------------------------------------------
    // Zone bins
    // ------------------------------------------------------------------

    /// Upsert a batch of zone bins inside one transaction.
    pub fn upsert_zone_bins(&self, rows: &[ZoneBin]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin zone-bin upsert transaction")?;
        for bin in rows {
            tx.execute(
                "INSERT INTO zone_bins (
                    team, year, player, zone_id,
                    total_pitches, fastballs, breaking_balls, offspeed,
                    vs_left, vs_right, swings, whiffs, hits
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(team, year, player, zone_id) DO UPDATE SET
                    total_pitches = excluded.total_pitches,
                    fastballs = excluded.fastballs,
                    breaking_balls = excluded.breaking_balls,
                    offspeed = excluded.offspeed,
                    vs_left = excluded.vs_left,
                    vs_right = excluded.vs_right,
                    swings = excluded.swings,
                    whiffs = excluded.whiffs,
                    hits = excluded.hits",
                params![
                    bin.team,
                    bin.year,
                    bin.player,
                    bin.zone_id,
                    bin.total_pitches,
                    bin.fastballs,
                    bin.breaking_balls,
                    bin.offspeed,
                    bin.vs_left,
                    bin.vs_right,
                    bin.swings,
                    bin.whiffs,
                    bin.hits,
                ],
            )
            .with_context(|| {
                format!(
                    "failed to upsert zone bin {}/{}/{}",
                    bin.player, bin.team, bin.zone_id
                )
            })?;
        }
        tx.commit().context("failed to commit zone-bin upsert")?;
        Ok(())
    }

    /// Fetch one zone bin by its composite key.
    pub fn fetch_zone_bin(
        &self,
        team: &str,
        year: i32,
        player: &str,
        zone_id: u8,
    ) -> Result<Option<ZoneBin>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team, year, player, zone_id, total_pitches, fastballs,
                        breaking_balls, offspeed, vs_left, vs_right, swings, whiffs, hits
                 FROM zone_bins
                 WHERE team = ?1 AND year = ?2 AND player = ?3 AND zone_id = ?4",
            )
            .context("failed to prepare fetch_zone_bin query")?;
        let mut rows = stmt
            .query_map(params![team, year, player, zone_id], map_zone_bin_row)
            .context("failed to query zone_bins")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("failed to map zone bin row")?)),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const BATTER_COLUMNS: &str = "batter, batter_team, year, plate_app, at_bats, batted_balls, \
    strikeouts, walks, singles, doubles, triples, home_runs, in_zone_pitches, \
    out_of_zone_pitches, ground_balls, fastballs, spray_1, spray_2, spray_3, spray_4, \
    spray_5, avg, obp, slg, ops, iso, k_per, bb_per, whiff_per, chase_per, hard_hit_per, \
    sweet_spot_per, gb_per, avg_exit_velo, avg_fb_velo, xba_per, xslg_per, xwoba_per, \
    barrel_per, spray_per_1, spray_per_2, spray_per_3, spray_per_4, spray_per_5, avg_rank, \
    obp_rank, slg_rank, ops_rank, k_per_rank, bb_per_rank, whiff_per_rank, chase_per_rank, \
    avg_exit_velo_rank, hard_hit_per_rank, xba_per_rank, xwoba_per_rank, barrel_per_rank, \
    processed_files";

fn map_batter_row(row: &Row<'_>) -> rusqlite::Result<BatterAggregate> {
    let processed_json: String = row.get(57)?;
    Ok(BatterAggregate {
        batter: row.get(0)?,
        team: row.get(1)?,
        year: row.get(2)?,
        plate_app: row.get(3)?,
        at_bats: row.get(4)?,
        batted_balls: row.get(5)?,
        strikeouts: row.get(6)?,
        walks: row.get(7)?,
        singles: row.get(8)?,
        doubles: row.get(9)?,
        triples: row.get(10)?,
        home_runs: row.get(11)?,
        in_zone_pitches: row.get(12)?,
        out_of_zone_pitches: row.get(13)?,
        ground_balls: row.get(14)?,
        fastballs: row.get(15)?,
        spray: [
            row.get(16)?,
            row.get(17)?,
            row.get(18)?,
            row.get(19)?,
            row.get(20)?,
        ],
        avg: row.get(21)?,
        obp: row.get(22)?,
        slg: row.get(23)?,
        ops: row.get(24)?,
        iso: row.get(25)?,
        k_per: row.get(26)?,
        bb_per: row.get(27)?,
        whiff_per: row.get(28)?,
        chase_per: row.get(29)?,
        hard_hit_per: row.get(30)?,
        sweet_spot_per: row.get(31)?,
        gb_per: row.get(32)?,
        avg_exit_velo: row.get(33)?,
        avg_fb_velo: row.get(34)?,
        xba_per: row.get(35)?,
        xslg_per: row.get(36)?,
        xwoba_per: row.get(37)?,
        barrel_per: row.get(38)?,
        spray_per: [
            row.get(39)?,
            row.get(40)?,
            row.get(41)?,
            row.get(42)?,
            row.get(43)?,
        ],
        ranks: BatterRanks {
            avg: row.get(44)?,
            obp: row.get(45)?,
            slg: row.get(46)?,
            ops: row.get(47)?,
            k_per: row.get(48)?,
            bb_per: row.get(49)?,
            whiff_per: row.get(50)?,
            chase_per: row.get(51)?,
            avg_exit_velo: row.get(52)?,
            hard_hit_per: row.get(53)?,
            xba_per: row.get(54)?,
            xwoba_per: row.get(55)?,
            barrel_per: row.get(56)?,
        },
        processed_files: serde_json::from_str(&processed_json).unwrap_or_default(),
    })
}

const PITCHER_COLUMNS: &str = "pitcher, pitcher_team, date, batters_faced, at_bats_against, \
    hits_allowed, strikeouts, walks, batted_balls, ground_balls, in_zone_pitches, \
    out_of_zone_pitches, fastballs, pitches, outs_recorded, k_per, bb_per, whip, \
    avg_against, gb_per, whiff_per, chase_per, avg_exit_velo, avg_fb_velo, k_per_rank, \
    bb_per_rank, whip_rank, avg_against_rank, gb_per_rank, whiff_per_rank, chase_per_rank, \
    avg_exit_velo_rank, avg_fb_velo_rank, unique_games";

fn map_pitcher_row(row: &Row<'_>) -> rusqlite::Result<PitcherAggregate> {
    let date_str: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let games_json: String = row.get(33)?;
    Ok(PitcherAggregate {
        pitcher: row.get(0)?,
        team: row.get(1)?,
        date,
        batters_faced: row.get(3)?,
        at_bats_against: row.get(4)?,
        hits_allowed: row.get(5)?,
        strikeouts: row.get(6)?,
        walks: row.get(7)?,
        batted_balls: row.get(8)?,
        ground_balls: row.get(9)?,
        in_zone_pitches: row.get(10)?,
        out_of_zone_pitches: row.get(11)?,
        fastballs: row.get(12)?,
        pitches: row.get(13)?,
        outs_recorded: row.get(14)?,
        k_per: row.get(15)?,
        bb_per: row.get(16)?,
        whip: row.get(17)?,
        avg_against: row.get(18)?,
        gb_per: row.get(19)?,
        whiff_per: row.get(20)?,
        chase_per: row.get(21)?,
        avg_exit_velo: row.get(22)?,
        avg_fb_velo: row.get(23)?,
        ranks: PitcherRanks {
            k_per: row.get(24)?,
            bb_per: row.get(25)?,
            whip: row.get(26)?,
            avg_against: row.get(27)?,
            gb_per: row.get(28)?,
            whiff_per: row.get(29)?,
            chase_per: row.get(30)?,
            avg_exit_velo: row.get(31)?,
            avg_fb_velo: row.get(32)?,
        },
        unique_games: serde_json::from_str(&games_json).unwrap_or_default(),
    })
}

fn map_zone_bin_row(row: &Row<'_>) -> rusqlite::Result<ZoneBin> {
    Ok(ZoneBin {
        team: row.get(0)?,
        year: row.get(1)?,
        player: row.get(2)?,
        zone_id: row.get(3)?,
        total_pitches: row.get(4)?,
        fastballs: row.get(5)?,
        breaking_balls: row.get(6)?,
        offspeed: row.get(7)?,
        vs_left: row.get(8)?,
        vs_right: row.get(9)?,
        swings: row.get(10)?,
        whiffs: row.get(11)?,
        hits: row.get(12)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
