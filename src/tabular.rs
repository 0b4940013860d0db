use std::{fmt::Debug, path::PathBuf};

use anyhow::{bail, Context};
use fs_err::File;
use log::warn;
use race_mileage_utils::regex;

use crate::schema::{AnalysisRow, AthleteId, ResultRecord};

const ANALYSIS_HEADER: [&str; 6] = ["id", "name", "sex", "time", "at_run", "at_cycle"];

fn window_column(weeks: u32) -> String {
    format!("{weeks}_week_avg")
}

pub fn write_results<P: Into<PathBuf>>(path: P, records: &[ResultRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    if records.is_empty() {
        // serde only emits the header together with the first row.
        writer.write_record(["athlete_id", "sex", "first_name", "last_name", "time"])?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_results<P: Into<PathBuf> + Debug>(path: P) -> anyhow::Result<Vec<ResultRecord>> {
    let path = path.into();
    csv::Reader::from_reader(File::open(&path)?)
        .into_deserialize::<ResultRecord>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("While reading results from {path:?}"))
}

/// Athlete ids from the `column`-th field of a CSV file with a header row.
/// Rows without a valid id are skipped.
pub fn read_athlete_ids<P: Into<PathBuf> + Debug>(
    path: P,
    column: usize,
) -> anyhow::Result<Vec<AthleteId>> {
    let path = path.into();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(File::open(&path)?);
    let mut ids = vec![];
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("While reading {path:?}"))?;
        match record.get(column).map(str::parse::<AthleteId>) {
            Some(Ok(id)) => ids.push(id),
            Some(Err(_)) | None => warn!(
                "Skipping row {} of {path:?}: no athlete id in column {column} ({record:?})",
                i + 2,
            ),
        }
    }
    Ok(ids)
}

/// Writes the analysis table.  `windows` names the average columns and must
/// match the length of every row's averages.
pub fn write_analysis<P: Into<PathBuf>>(
    path: P,
    windows: &[u32],
    rows: &[AnalysisRow],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record(
        ANALYSIS_HEADER
            .iter()
            .map(|&s| s.to_owned())
            .chain(windows.iter().map(|&w| window_column(w))),
    )?;
    for row in rows {
        if row.averages.len() != windows.len() {
            bail!(
                "Row of athlete {} has {} averages for {} windows",
                row.id,
                row.averages.len(),
                windows.len()
            );
        }
        writer.write_record(
            [
                row.id.to_string(),
                row.name.clone(),
                row.sex.to_string(),
                row.time.to_string(),
                row.at_run.to_string(),
                row.at_cycle.to_string(),
            ]
            .into_iter()
            .chain(row.averages.iter().map(|x| x.to_string())),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a table written by [`write_analysis`], recovering the window list
/// from its header.
pub fn read_analysis<P: Into<PathBuf> + Debug>(
    path: P,
) -> anyhow::Result<(Vec<u32>, Vec<AnalysisRow>)> {
    let path = path.into();
    let mut reader = csv::Reader::from_reader(File::open(&path)?);
    let headers = reader.headers()?.clone();
    if headers.len() < ANALYSIS_HEADER.len()
        || !headers.iter().zip(ANALYSIS_HEADER).all(|(a, b)| a == b)
    {
        bail!("Unexpected header in {path:?}: {headers:?}");
    }
    let windows = headers
        .iter()
        .skip(ANALYSIS_HEADER.len())
        .map(|column| {
            regex!(r"^(\d+)_week_avg$")
                .captures(column)
                .and_then(|c| c[1].parse().ok())
                .with_context(|| format!("Unexpected column {column:?} in {path:?}"))
        })
        .collect::<anyhow::Result<Vec<u32>>>()?;

    let rows = reader
        .records()
        .map(|record| -> anyhow::Result<AnalysisRow> {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or_default();
            let number = |i: usize| {
                field(i)
                    .parse::<f64>()
                    .with_context(|| format!("Invalid {}: {record:?}", &headers[i]))
            };
            Ok(AnalysisRow {
                id: field(0).parse().with_context(|| format!("Invalid id: {record:?}"))?,
                name: field(1).to_owned(),
                sex: field(2).to_owned().into(),
                time: field(3).parse().with_context(|| format!("Invalid time: {record:?}"))?,
                at_run: number(4)?,
                at_cycle: number(5)?,
                averages: (ANALYSIS_HEADER.len()..headers.len())
                    .map(number)
                    .collect::<anyhow::Result<_>>()?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()
        .with_context(|| format!("While reading {path:?}"))?;
    Ok((windows, rows))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{read_analysis, read_athlete_ids, read_results, write_analysis, write_results};
    use crate::schema::{AnalysisRow, AthleteId, ResultRecord, Sex};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tabular_{}_{name}", std::process::id()))
    }

    fn record(id: u64, sex: Sex, first: &str, time: u32) -> ResultRecord {
        ResultRecord::builder()
            .athlete_id(AthleteId::from(id))
            .sex(sex)
            .first_name(first.to_owned())
            .last_name("Doe".to_owned())
            .elapsed_time_seconds(time)
            .build()
    }

    #[test]
    fn test_results_file() {
        let path = temp_path("results.csv");
        let records = vec![record(1, Sex::Male, "Jo", 3600), record(2, Sex::Unknown, "Pat", 4000)];
        write_results(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "athlete_id,sex,first_name,last_name,time\n1,M,Jo,Doe,3600\n2,,Pat,Doe,4000\n"
        );
        assert_eq!(read_results(&path).unwrap(), records);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_empty_results_file_has_header() {
        let path = temp_path("empty.csv");
        write_results(&path, &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "athlete_id,sex,first_name,last_name,time\n"
        );
        assert!(read_results(&path).unwrap().is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_read_athlete_ids_skips_bad_rows() {
        let path = temp_path("ids.csv");
        std::fs::write(&path, "athlete_id,sex\n1,M\nabc,F\n\n 3 ,F\n4\n").unwrap();
        let ids = read_athlete_ids(&path, 0).unwrap();
        assert_eq!(ids, [1u64, 3, 4].map(AthleteId::from));
        let ids = read_athlete_ids(&path, 1).unwrap();
        assert!(ids.is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_analysis_round_trip() {
        let path = temp_path("analysis.csv");
        let windows = vec![1, 4, 26];
        let rows = vec![
            AnalysisRow {
                id: AthleteId::from(1u64),
                name: "Jo Doe".to_owned(),
                sex: Sex::Male,
                time: 3600,
                at_run: 500.0,
                at_cycle: 100.25,
                averages: vec![0.0, 11.25, 1.0 / 3.0],
            },
            AnalysisRow {
                id: AthleteId::from(2u64),
                name: "Pat Q".to_owned(),
                sex: Sex::Unknown,
                time: 4000,
                at_run: 0.0,
                at_cycle: 0.0,
                averages: vec![2.5, 0.0, 0.0],
            },
        ];
        write_analysis(&path, &windows, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "id,name,sex,time,at_run,at_cycle,1_week_avg,4_week_avg,26_week_avg\n1,Jo Doe,M,3600,500,100.25,0,11.25,"
        ));
        let (read_windows, read_rows) = read_analysis(&path).unwrap();
        assert_eq!(read_windows, windows);
        assert_eq!(read_rows, rows);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_mismatched_averages_are_rejected() {
        let path = temp_path("mismatch.csv");
        let row = AnalysisRow {
            id: AthleteId::from(1u64),
            name: "Jo Doe".to_owned(),
            sex: Sex::Male,
            time: 1,
            at_run: 0.0,
            at_cycle: 0.0,
            averages: vec![1.0],
        };
        assert!(write_analysis(&path, &[1, 4], &[row]).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
