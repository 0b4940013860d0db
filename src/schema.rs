use chrono::NaiveDate;
use derive_more::{Display, From, FromStr, Into};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Athlete identifier shared by the results API and the profile pages.
/// This is the join key of every stage.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Display,
    From,
    FromStr,
    Into,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct AthleteId(u64);

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, strum::Display, strum::EnumString, Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
pub enum Sex {
    #[strum(serialize = "M")]
    Male,
    #[strum(serialize = "F")]
    Female,
    #[strum(serialize = "")]
    Unknown,
}
impl From<String> for Sex {
    fn from(s: String) -> Self {
        s.trim().parse().unwrap_or(Sex::Unknown)
    }
}
impl From<Sex> for String {
    fn from(sex: Sex) -> Self {
        sex.to_string()
    }
}
impl From<Option<&str>> for Sex {
    fn from(s: Option<&str>) -> Self {
        s.map_or(Sex::Unknown, |s| s.to_owned().into())
    }
}

/// One row of the results file.  Column order is the file's header order.
#[derive(Clone, PartialEq, Debug, TypedBuilder, Serialize, Deserialize)]
pub struct ResultRecord {
    pub athlete_id: AthleteId,
    pub sex: Sex,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "time")]
    pub elapsed_time_seconds: u32,
}
impl ResultRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Mileage of the week starting on `week_start` (a Monday).
///
/// Stored on disk as `["YYYY-MM-DD", miles]`.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(from = "(NaiveDate, f64)", into = "(NaiveDate, f64)")]
pub struct MileagePoint {
    pub week_start: NaiveDate,
    pub miles: f64,
}
impl From<(NaiveDate, f64)> for MileagePoint {
    fn from((week_start, miles): (NaiveDate, f64)) -> Self {
        Self { week_start, miles }
    }
}
impl From<MileagePoint> for (NaiveDate, f64) {
    fn from(point: MileagePoint) -> Self {
        (point.week_start, point.miles)
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct AllTimeTotals {
    pub running: f64,
    pub cycling: f64,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AthleteHistory {
    pub id: AthleteId,
    #[serde(rename = "at_run")]
    pub all_time_running_miles: f64,
    #[serde(rename = "at_cycle")]
    pub all_time_cycling_miles: f64,
    #[serde(rename = "mileage")]
    pub mileage_series: Vec<MileagePoint>,
}
impl AthleteHistory {
    pub fn new(id: AthleteId, totals: AllTimeTotals, mileage_series: Vec<MileagePoint>) -> Self {
        Self {
            id,
            all_time_running_miles: totals.running,
            all_time_cycling_miles: totals.cycling,
            mileage_series,
        }
    }
}

/// A joined row of the analysis table.  `averages[i]` belongs to the `i`-th
/// configured window.
#[derive(Clone, PartialEq, Debug, Getters, CopyGetters)]
pub struct AnalysisRow {
    #[getset(get_copy = "pub")]
    pub(crate) id: AthleteId,
    #[getset(get = "pub")]
    pub(crate) name: String,
    #[getset(get_copy = "pub")]
    pub(crate) sex: Sex,
    #[getset(get_copy = "pub")]
    pub(crate) time: u32,
    #[getset(get_copy = "pub")]
    pub(crate) at_run: f64,
    #[getset(get_copy = "pub")]
    pub(crate) at_cycle: f64,
    #[getset(get = "pub")]
    pub(crate) averages: Vec<f64>,
}
