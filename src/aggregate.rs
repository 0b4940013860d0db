use chrono::{Days, NaiveDate};
use hashbrown::{hash_map::Entry, HashMap};
use log::{info, warn};

use crate::schema::{AnalysisRow, AthleteHistory, AthleteId, MileagePoint, ResultRecord};

/// The window sizes, in weeks, reported when none are configured.
pub const DEFAULT_WINDOWS: [u32; 7] = [1, 4, 6, 8, 12, 16, 26];

/// Histories by athlete id.  Later entries replace earlier ones; the
/// replaced ids are returned so the caller can report them.
pub fn index_histories(
    histories: &[AthleteHistory],
) -> (HashMap<AthleteId, &AthleteHistory>, Vec<AthleteId>) {
    let mut index = HashMap::with_capacity(histories.len());
    let mut duplicates = vec![];
    for history in histories {
        match index.entry(history.id) {
            Entry::Vacant(entry) => {
                entry.insert(history);
            }
            Entry::Occupied(mut entry) => {
                duplicates.push(history.id);
                entry.insert(history);
            }
        }
    }
    (index, duplicates)
}

/// Total miles of the points strictly inside `(race_date - 7 * weeks days, race_date)`,
/// divided by `weeks`.  An empty window averages to zero.
pub fn average_mileage(series: &[MileagePoint], race_date: NaiveDate, weeks: u32) -> f64 {
    if weeks == 0 {
        return 0.0;
    }
    let start = race_date
        .checked_sub_days(Days::new(7 * u64::from(weeks)))
        .unwrap_or(NaiveDate::MIN);
    let total: f64 = series
        .iter()
        .filter(|p| start < p.week_start && p.week_start < race_date)
        .map(|p| p.miles)
        .sum();
    total / f64::from(weeks)
}

/// Inner join of results and histories on the athlete id, keeping the order
/// of `results`.  Results without a history are dropped.
pub fn aggregate(
    results: &[ResultRecord],
    histories: &[AthleteHistory],
    race_date: NaiveDate,
    windows: &[u32],
) -> Vec<AnalysisRow> {
    let (index, duplicates) = index_histories(histories);
    if !duplicates.is_empty() {
        warn!("Duplicate history ids (the last one is used): {duplicates:?}");
    }
    let rows = results
        .iter()
        .filter_map(|result| {
            let history = index.get(&result.athlete_id)?;
            Some(AnalysisRow {
                id: result.athlete_id,
                name: result.full_name(),
                sex: result.sex,
                time: result.elapsed_time_seconds,
                at_run: history.all_time_running_miles,
                at_cycle: history.all_time_cycling_miles,
                averages: windows
                    .iter()
                    .map(|&weeks| average_mileage(&history.mileage_series, race_date, weeks))
                    .collect(),
            })
        })
        .collect::<Vec<_>>();
    info!(
        "Joined {} of {} results ({} without history)",
        rows.len(),
        results.len(),
        results.len() - rows.len()
    );
    rows
}
