// Batch pipeline entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config (copying defaults on first run)
// 3. Open database
// 4. Load the xBA grid and outcome models
// 5. Upload every CSV in the configured directory
// 6. Refresh percentile rankings

use std::path::Path;

use anyhow::Context;
use tracing::info;

use trackman_stats::config;
use trackman_stats::db::Database;
use trackman_stats::expected::ModelContext;
use trackman_stats::pipeline::Pipeline;

fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing();
    info!("TrackMan stats pipeline starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: db={}, csv_dir={}, batch_size={}",
        config.db_path, config.csv_dir, config.batch_size
    );

    // 3. Open database
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 4. Load the expected-outcome grid and models; absence degrades, never
    //    blocks the run.
    let ctx = ModelContext::load(
        Path::new(&config.xba_grid),
        config.xslg_model.as_deref().map(Path::new),
        config.xwoba_model.as_deref().map(Path::new),
    );

    // 5 + 6. Upload, then rank. Both are best-effort past this point.
    let pipeline = Pipeline::new(db, ctx, config.batch_size);
    let summary = pipeline.upload_dir(Path::new(&config.csv_dir));
    info!(
        "Uploaded {} files ({} skipped): {} batters, {} pitchers, {} zone bins",
        summary.files_processed,
        summary.files_skipped,
        summary.batters_upserted,
        summary.pitchers_upserted,
        summary.zone_bins_upserted
    );

    pipeline.refresh_rankings(config.rank_scale);

    info!("Pipeline run complete");
    Ok(())
}

/// Initialize tracing to stderr with an env-filter override
/// (`RUST_LOG=trackman_stats=debug` and friends).
fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trackman_stats=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
