use anyhow::Context;
use indexmap::{map::Entry, IndexMap};
use log::{debug, info, warn};
use race_mileage_utils::regex;

use crate::{
    api::{Athlete, EffortQuery, ResultsSource},
    error::CollectError,
    schema::{AthleteId, ResultRecord, Sex},
};

/// Keeps ASCII letters and digits only, so names are safe in any CSV reader.
pub fn sanitize_name(name: &str) -> String {
    regex!("[^0-9a-zA-Z]+").replace_all(name, "").into_owned()
}

pub fn to_record(athlete: &Athlete, elapsed_time_seconds: u32) -> ResultRecord {
    ResultRecord::builder()
        .athlete_id(athlete.id)
        .sex(Sex::from(athlete.sex.as_deref()))
        .first_name(sanitize_name(athlete.firstname.as_deref().unwrap_or_default()))
        .last_name(sanitize_name(athlete.lastname.as_deref().unwrap_or_default()))
        .elapsed_time_seconds(elapsed_time_seconds)
        .build()
}

#[derive(Debug, Default)]
pub struct ResultBatch {
    pub records: Vec<ResultRecord>,
    pub skipped: Vec<CollectError>,
}

/// Fastest effort per athlete, in the order athletes first appear.
pub async fn fetch_best_efforts<S: ResultsSource>(
    source: &S,
    query: &EffortQuery,
) -> anyhow::Result<IndexMap<AthleteId, u32>> {
    let mut best = IndexMap::new();
    for page in 1.. {
        let efforts = source
            .segment_efforts(query, page)
            .await
            .with_context(|| format!("Failed to list efforts (page {page})"))?;
        debug!("Page {page}: {} efforts", efforts.len());
        let last_page = efforts.len() < query.per_page as usize;
        for effort in efforts {
            match best.entry(effort.athlete.id) {
                Entry::Vacant(entry) => {
                    entry.insert(effort.elapsed_time);
                }
                Entry::Occupied(mut entry) => {
                    debug!(
                        "Athlete {} has several efforts; keeping the fastest",
                        effort.athlete.id
                    );
                    let time = entry.get_mut();
                    *time = (*time).min(effort.elapsed_time);
                }
            }
        }
        if last_page {
            break;
        }
    }
    Ok(best)
}

/// Lists the efforts and looks every athlete up.
///
/// Listing failures abort, since nothing meaningful can be written without
/// the participant list.  A failed athlete lookup only skips that athlete.
pub async fn collect_results<S: ResultsSource>(
    source: &S,
    query: &EffortQuery,
) -> anyhow::Result<ResultBatch> {
    let efforts = fetch_best_efforts(source, query).await?;
    info!("{} athletes completed segment {}", efforts.len(), query.segment_id);

    let mut batch = ResultBatch::default();
    for (i, (&id, &time)) in efforts.iter().enumerate() {
        info!("[{}/{}] Athlete {id}", i + 1, efforts.len());
        match source.athlete(id).await {
            Ok(athlete) => batch.records.push(to_record(&athlete, time)),
            Err(e) => {
                let e = CollectError::AthleteLookup { id, source: e };
                warn!("  Skipping: {e}");
                batch.skipped.push(e);
            }
        }
    }
    Ok(batch)
}
