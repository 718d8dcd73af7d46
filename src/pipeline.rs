// Upload and ranking orchestration.
//
// Aggregation is synchronous and per-file; per-file partial aggregates are
// pre-merged at a single accumulation point (the merge engine is associative,
// so this matches a one-shot batch over the union of files) and only then
// reconciled against persisted state and upserted in bounded batches.
//
// The public entry points here are best-effort: store-level failures are
// logged and skipped batch by batch, and nothing in this module panics or
// propagates an error to the caller. A periodic batch job should degrade,
// not crash.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::db::Database;
use crate::events::{load_events, EventTable};
use crate::expected::ModelContext;
use crate::stats::aggregate::{
    Aggregator, BatterAggregate, BatterKey, PitcherAggregate, PitcherKey, ZoneBin, ZoneKey,
};
use crate::stats::merge::{combine_batter, combine_pitcher, combine_zone_bin};
use crate::stats::rank::{rank_batters, rank_pitchers, RankScale};

/// Safety valve on batch loops: a paginated source that never drains (or a
/// runaway accumulation) stops here instead of looping forever.
const MAX_BATCHES: usize = 10_000;

/// Counters reported back from one upload run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub batters_upserted: usize,
    pub pitchers_upserted: usize,
    pub zone_bins_upserted: usize,
    pub failed_batches: usize,
}

/// The batch pipeline: aggregate source files, merge into the store, refresh
/// percentile ranks.
pub struct Pipeline {
    db: Database,
    aggregator: Aggregator,
    batch_size: usize,
}

impl Pipeline {
    pub fn new(db: Database, ctx: ModelContext, batch_size: usize) -> Self {
        Self {
            db,
            aggregator: Aggregator::new(ctx),
            batch_size: batch_size.max(1),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    // ------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------

    /// Load every CSV in `dir` and upload the resulting aggregates. Files
    /// that fail to read are logged and skipped; a missing directory uploads
    /// nothing.
    pub fn upload_dir(&self, dir: &Path) -> UploadSummary {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("cannot read source directory {}: {}", dir.display(), e);
                return UploadSummary::default();
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();
        paths.sort();

        let mut tables = Vec::new();
        let mut skipped = 0usize;
        for path in paths {
            match load_events(&path) {
                Ok(table) => tables.push(table),
                Err(e) => {
                    warn!("skipping unreadable source {}: {}", path.display(), e);
                    skipped += 1;
                }
            }
        }

        let mut summary = self.upload_tables(&tables);
        summary.files_skipped += skipped;
        summary
    }

    /// Aggregate the given event tables, pre-merge per-file results, then
    /// reconcile with persisted state and upsert in bounded batches.
    pub fn upload_tables(&self, tables: &[EventTable]) -> UploadSummary {
        let mut summary = UploadSummary::default();

        let mut batters: BTreeMap<BatterKey, BatterAggregate> = BTreeMap::new();
        let mut pitchers: BTreeMap<PitcherKey, PitcherAggregate> = BTreeMap::new();
        let mut zone_bins: BTreeMap<ZoneKey, ZoneBin> = BTreeMap::new();

        for table in tables {
            // A source id without a parseable date fails the whole file: the
            // period is part of every identity key.
            let per_file = self
                .aggregator
                .aggregate_batters(table)
                .and_then(|b| Ok((b, self.aggregator.aggregate_pitchers(table)?)))
                .and_then(|(b, p)| Ok((b, p, self.aggregator.aggregate_zone_bins(table)?)));
            let (file_batters, file_pitchers, file_bins) = match per_file {
                Ok(maps) => maps,
                Err(e) => {
                    error!("{}: {}; file skipped", table.source_id, e);
                    summary.files_skipped += 1;
                    continue;
                }
            };

            for (key, fresh) in file_batters {
                let merged = combine_batter(batters.get(&key), fresh);
                batters.insert(key, merged);
            }
            for (key, fresh) in file_pitchers {
                let merged = combine_pitcher(pitchers.get(&key), fresh);
                pitchers.insert(key, merged);
            }
            for (key, fresh) in file_bins {
                let merged = combine_zone_bin(zone_bins.get(&key), fresh);
                zone_bins.insert(key, merged);
            }
            summary.files_processed += 1;
        }

        self.flush_batters(batters, &mut summary);
        self.flush_pitchers(pitchers, &mut summary);
        self.flush_zone_bins(zone_bins, &mut summary);

        info!(
            "upload complete: {} files ({} skipped), {} batters, {} pitchers, {} zone bins, {} failed batches",
            summary.files_processed,
            summary.files_skipped,
            summary.batters_upserted,
            summary.pitchers_upserted,
            summary.zone_bins_upserted,
            summary.failed_batches
        );
        summary
    }

    fn flush_batters(
        &self,
        accumulated: BTreeMap<BatterKey, BatterAggregate>,
        summary: &mut UploadSummary,
    ) {
        let rows: Vec<BatterAggregate> = accumulated.into_values().collect();
        for (i, chunk) in rows.chunks(self.batch_size).enumerate() {
            if i >= MAX_BATCHES {
                error!("batter upload stopped after {MAX_BATCHES} batches");
                break;
            }
            match self.merge_and_upsert_batters(chunk) {
                Ok(n) => summary.batters_upserted += n,
                Err(e) => {
                    warn!(
                        "batter batch {} failed (sample key {} {} {}): {:#}; batch skipped",
                        i, chunk[0].batter, chunk[0].team, chunk[0].year, e
                    );
                    summary.failed_batches += 1;
                }
            }
        }
    }

    fn merge_and_upsert_batters(&self, chunk: &[BatterAggregate]) -> Result<usize> {
        let mut merged = Vec::with_capacity(chunk.len());
        for fresh in chunk {
            let existing = self
                .db
                .fetch_batter(&fresh.batter, &fresh.team, fresh.year)
                .context("fetch of existing batter row failed")?;
            merged.push(combine_batter(existing.as_ref(), fresh.clone()));
        }
        self.db.upsert_batters(&merged)?;
        Ok(merged.len())
    }

    fn flush_pitchers(
        &self,
        accumulated: BTreeMap<PitcherKey, PitcherAggregate>,
        summary: &mut UploadSummary,
    ) {
        let rows: Vec<PitcherAggregate> = accumulated.into_values().collect();
        for (i, chunk) in rows.chunks(self.batch_size).enumerate() {
            if i >= MAX_BATCHES {
                error!("pitcher upload stopped after {MAX_BATCHES} batches");
                break;
            }
            match self.merge_and_upsert_pitchers(chunk) {
                Ok(n) => summary.pitchers_upserted += n,
                Err(e) => {
                    warn!(
                        "pitcher batch {} failed (sample key {} {} {}): {:#}; batch skipped",
                        i, chunk[0].pitcher, chunk[0].team, chunk[0].date, e
                    );
                    summary.failed_batches += 1;
                }
            }
        }
    }

    fn merge_and_upsert_pitchers(&self, chunk: &[PitcherAggregate]) -> Result<usize> {
        let mut merged = Vec::with_capacity(chunk.len());
        for fresh in chunk {
            let existing = self
                .db
                .fetch_pitcher(&fresh.pitcher, &fresh.team, fresh.date)
                .context("fetch of existing pitcher row failed")?;
            merged.push(combine_pitcher(existing.as_ref(), fresh.clone()));
        }
        self.db.upsert_pitchers(&merged)?;
        Ok(merged.len())
    }

    fn flush_zone_bins(
        &self,
        accumulated: BTreeMap<ZoneKey, ZoneBin>,
        summary: &mut UploadSummary,
    ) {
        let rows: Vec<ZoneBin> = accumulated.into_values().collect();
        for (i, chunk) in rows.chunks(self.batch_size).enumerate() {
            if i >= MAX_BATCHES {
                error!("zone-bin upload stopped after {MAX_BATCHES} batches");
                break;
            }
            match self.merge_and_upsert_zone_bins(chunk) {
                Ok(n) => summary.zone_bins_upserted += n,
                Err(e) => {
                    warn!(
                        "zone-bin batch {} failed (sample key {}/{} zone {}): {:#}; batch skipped",
                        i, chunk[0].player, chunk[0].team, chunk[0].zone_id, e
                    );
                    summary.failed_batches += 1;
                }
            }
        }
    }

    fn merge_and_upsert_zone_bins(&self, chunk: &[ZoneBin]) -> Result<usize> {
        let mut merged = Vec::with_capacity(chunk.len());
        for fresh in chunk {
            let existing = self
                .db
                .fetch_zone_bin(&fresh.team, fresh.year, &fresh.player, fresh.zone_id)
                .context("fetch of existing zone bin failed")?;
            merged.push(combine_zone_bin(existing.as_ref(), fresh.clone()));
        }
        self.db.upsert_zone_bins(&merged)?;
        Ok(merged.len())
    }

    // ------------------------------------------------------------------
    // Ranking
    // ------------------------------------------------------------------

    /// Recompute percentile ranks for every season in the store, batter and
    /// pitcher tables both. Best-effort: a failure in one table's pass is
    /// logged and does not block the other.
    pub fn refresh_rankings(&self, scale: RankScale) {
        if let Err(e) = self.rank_batter_seasons(scale) {
            error!("batter ranking pass failed: {:#}", e);
        }
        if let Err(e) = self.rank_pitcher_seasons(scale) {
            error!("pitcher ranking pass failed: {:#}", e);
        }
    }

    fn rank_batter_seasons(&self, scale: RankScale) -> Result<()> {
        for year in self.db.batter_seasons()? {
            let mut records: Vec<BatterAggregate> = Vec::new();
            let mut offset = 0usize;
            for page in 0.. {
                if page >= MAX_BATCHES {
                    warn!("batter rank pagination stopped after {MAX_BATCHES} pages");
                    break;
                }
                let rows = self.db.select_batters_page(year, offset, self.batch_size)?;
                if rows.is_empty() {
                    break;
                }
                offset += rows.len();
                records.extend(rows);
            }

            rank_batters(&mut records, scale);

            for chunk in records.chunks(self.batch_size) {
                if let Err(e) = self.db.upsert_batters(chunk) {
                    warn!(
                        "batter rank upsert failed for season {}: {:#}; batch skipped",
                        year, e
                    );
                }
            }
            info!("ranked {} batters for season {}", records.len(), year);
        }
        Ok(())
    }

    fn rank_pitcher_seasons(&self, scale: RankScale) -> Result<()> {
        for year in self.db.pitcher_seasons()? {
            let mut records: Vec<PitcherAggregate> = Vec::new();
            let mut offset = 0usize;
            for page in 0.. {
                if page >= MAX_BATCHES {
                    warn!("pitcher rank pagination stopped after {MAX_BATCHES} pages");
                    break;
                }
                let rows = self
                    .db
                    .select_pitchers_page(year, offset, self.batch_size)?;
                if rows.is_empty() {
                    break;
                }
                offset += rows.len();
                records.extend(rows);
            }

            rank_pitchers(&mut records, scale);

            for chunk in records.chunks(self.batch_size) {
                if let Err(e) = self.db.upsert_pitchers(chunk) {
                    warn!(
                        "pitcher rank upsert failed for season {}: {:#}; batch skipped",
                        year, e
                    );
                }
            }
            info!("ranked {} pitchers for season {}", records.len(), year);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
