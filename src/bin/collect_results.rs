use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use log::{info, warn};
use race_mileage::{
    api::{EffortQuery, SegmentId, StravaClient},
    chrono_util::day_window,
    credentials::Credentials,
    results::collect_results,
    tabular::write_results,
};

/// Lists everyone who completed a segment on the race day.
#[derive(Parser)]
struct Opts {
    segment_id: SegmentId,
    /// Output CSV file.
    output_csv: PathBuf,
    /// Local date of the race, `YYYY-MM-DD`.
    #[arg(long)]
    race_date: NaiveDate,
    /// Number of days, starting at the race date, to look for efforts.
    #[arg(long, default_value_t = 1)]
    days: u64,
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u32).range(1..))]
    per_page: u32,
    #[arg(long, default_value = "ignore/credentials.json")]
    credentials_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let opts = Opts::parse();

    let credentials = Credentials::load(&opts.credentials_path)
        .with_context(|| format!("Failed to load credentials from {:?}", opts.credentials_path))?;
    let client = StravaClient::new(&credentials).await?;
    if credentials.access_token.is_none() {
        credentials
            .with_access_token(client.access_token().clone())
            .save(&opts.credentials_path)?;
        info!("Saved the access token to {:?}", opts.credentials_path);
    }

    let (start_local, end_local) =
        day_window(opts.race_date, opts.days).context("Race window is out of range")?;
    let query = EffortQuery {
        segment_id: opts.segment_id,
        start_local,
        end_local,
        per_page: opts.per_page,
    };
    let batch = collect_results(&client, &query).await?;
    write_results(&opts.output_csv, &batch.records)?;

    info!(
        "{} succeeded, {} skipped. Written to {:?}",
        batch.records.len(),
        batch.skipped.len(),
        opts.output_csv
    );
    if !batch.skipped.is_empty() {
        warn!("Some athletes could not be looked up and are missing from the output.");
    }
    Ok(())
}
