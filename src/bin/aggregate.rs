use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use log::info;
use race_mileage::{
    aggregate::{aggregate, DEFAULT_WINDOWS},
    schema::AthleteHistory,
    tabular::{read_results, write_analysis},
};
use race_mileage_utils::fs_json_util::read_json;

/// Joins race results with mileage histories.
#[derive(Parser)]
struct Opts {
    results_csv: PathBuf,
    histories_json: PathBuf,
    output_csv: PathBuf,
    #[arg(long)]
    race_date: NaiveDate,
    /// Window sizes in weeks, comma separated.
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = DEFAULT_WINDOWS,
        value_parser = clap::value_parser!(u32).range(1..),
    )]
    windows: Vec<u32>,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let opts = Opts::parse();

    let results = read_results(&opts.results_csv)?;
    let histories: Vec<AthleteHistory> = read_json(&opts.histories_json)?;
    info!(
        "Read {} results and {} histories",
        results.len(),
        histories.len()
    );

    let rows = aggregate(&results, &histories, opts.race_date, &opts.windows);
    write_analysis(&opts.output_csv, &opts.windows, &rows)?;
    info!("Wrote {} rows to {:?}", rows.len(), opts.output_csv);
    Ok(())
}
