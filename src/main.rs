use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};
use race_mileage::{
    history::collect_histories,
    session::{ScrapeSession, SessionConfig},
    tabular::read_athlete_ids,
};
use race_mileage_utils::fs_json_util::{read_toml, write_json};

/// Extracts weekly mileage and all-time totals of every listed athlete.
#[derive(Parser)]
struct Opts {
    /// CSV file with a header row, e.g. the output of `collect_results`.
    input_csv: PathBuf,
    /// Output JSON file.
    output_json: PathBuf,
    /// Zero-based column of the athlete id.
    #[arg(long, default_value_t = 0)]
    id_column: usize,
    #[arg(long, default_value = "ignore/session.toml")]
    session_config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let opts = Opts::parse();

    let config: SessionConfig = read_toml(&opts.session_config)?;
    let session = ScrapeSession::new(&config)?;

    let ids = read_athlete_ids(&opts.input_csv, opts.id_column)?;
    if ids.is_empty() {
        bail!("No athlete ids found in {:?}", opts.input_csv);
    }
    info!("Extracting histories of {} athletes", ids.len());

    let batch = collect_histories(&session, &ids)
        .await
        .context("Aborted: the site rejected the session cookie")?;
    if batch.upstream_unavailable() {
        bail!(
            "All {} athletes failed upstream; not writing {:?}",
            batch.skipped.len(),
            opts.output_json
        );
    }
    write_json(&opts.output_json, &batch.histories)?;

    info!(
        "{} succeeded, {} skipped. Written to {:?}",
        batch.histories.len(),
        batch.skipped.len(),
        opts.output_json
    );
    for (kind, count) in batch.skipped_by_kind() {
        warn!("  {kind}: {count}");
    }
    Ok(())
}
