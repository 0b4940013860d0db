use std::collections::BTreeMap;

use itertools::Itertools;
use log::{error, info, trace, warn};
use scraper::Html;
use tokio::time::sleep;

use crate::{
    error::HistoryError,
    parser::{chart, sidebar},
    schema::{AthleteHistory, AthleteId},
    session::{PageKind, PageSource},
};

/// Fetches the profile page and then the sidebar fragment of one athlete.
pub async fn fetch_history<S: PageSource>(
    source: &S,
    id: AthleteId,
) -> Result<AthleteHistory, HistoryError> {
    let url = source.profile_url(id);
    let text = source.fetch(&url, PageKind::Document).await?;
    let mileage = chart::parse(&Html::parse_document(&text))
        .map_err(|source| HistoryError::Malformed { url, source })?;
    trace!("  {} weeks of mileage", mileage.len());

    let url = source.sidebar_url(id);
    let text = source.fetch(&url, PageKind::Xhr).await?;
    let totals = sidebar::parse(&Html::parse_document(&text))
        .map_err(|source| HistoryError::Malformed { url, source })?;
    trace!("  All-time totals: {totals:?}");

    Ok(AthleteHistory::new(id, totals, mileage))
}

#[derive(Debug, Default)]
pub struct HistoryBatch {
    pub histories: Vec<AthleteHistory>,
    pub skipped: Vec<(AthleteId, HistoryError)>,
}

impl HistoryBatch {
    pub fn skipped_by_kind(&self) -> BTreeMap<&'static str, usize> {
        self.skipped
            .iter()
            .map(|(_, e)| e.kind())
            .counts()
            .into_iter()
            .collect()
    }

    /// Nothing was extracted and every athlete failed upstream.
    pub fn upstream_unavailable(&self) -> bool {
        self.histories.is_empty()
            && !self.skipped.is_empty()
            && self
                .skipped
                .iter()
                .all(|(_, e)| e.kind() == "upstream unavailable")
    }
}

/// Extracts every athlete in turn.  A failure only drops that athlete,
/// except a rejected session, which ends the run.
pub async fn collect_histories<S: PageSource>(
    source: &S,
    ids: &[AthleteId],
) -> Result<HistoryBatch, HistoryError> {
    let mut batch = HistoryBatch::default();
    for (i, &id) in ids.iter().enumerate() {
        if i > 0 {
            sleep(source.request_interval()).await;
        }
        info!("[{}/{}] Athlete {id}", i + 1, ids.len());
        match fetch_history(source, id).await {
            Ok(history) => batch.histories.push(history),
            Err(e) if e.is_auth_failure() => {
                error!("  The session was rejected at athlete {id}: {e}");
                return Err(e);
            }
            Err(e) => {
                warn!("  Skipping athlete {id}: {e}");
                batch.skipped.push((id, e));
            }
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashMap, time::Duration};

    use chrono::NaiveDate;
    use reqwest::{StatusCode, Url};

    use super::{collect_histories, fetch_history};
    use crate::{
        error::HistoryError,
        schema::AthleteId,
        session::{PageKind, PageSource},
    };

    const PROFILE: &str = r#"<html><body><div class="athlete-graph">
        <ul class="y-axis"><li>0</li><li>40</li></ul>
        <ul class="intervals">
          <li id="interval-201541"><div class="bar"><div class="fill" style="height:50px;"></div></div></li>
          <li id="interval-201542"><div class="bar"></div></li>
        </ul></div></body></html>"#;
    const SIDEBAR: &str = r#"<div class="running hidden"><table>
          <tbody id="running-ytd"><tr><th></th></tr><tr><td>Distance</td><td>120.5</td></tr></tbody>
          <tbody><tr><th></th></tr><tr><td>Distance</td><td>2,000</td></tr></tbody>
        </table></div>
        <div class="cycling hidden"><table>
          <tbody><tr><th></th></tr><tr><td>Distance</td><td>15</td></tr></tbody>
        </table></div>"#;

    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, (PageKind, &'static str)>,
        requests: RefCell<Vec<String>>,
    }

    impl FakeSite {
        fn with_athlete(mut self, id: u64, profile: &'static str, sidebar: &'static str) -> Self {
            let id = AthleteId::from(id);
            self.pages.insert(
                self.profile_url(id).to_string(),
                (PageKind::Document, profile),
            );
            self.pages
                .insert(self.sidebar_url(id).to_string(), (PageKind::Xhr, sidebar));
            self
        }
    }

    impl PageSource for FakeSite {
        fn profile_url(&self, id: AthleteId) -> Url {
            Url::parse(&format!("https://example.com/athletes/{id}")).unwrap()
        }
        fn sidebar_url(&self, id: AthleteId) -> Url {
            Url::parse(&format!("https://example.com/athletes/{id}/sidebar")).unwrap()
        }
        async fn fetch(&self, url: &Url, kind: PageKind) -> Result<String, HistoryError> {
            self.requests.borrow_mut().push(url.to_string());
            match self.pages.get(url.as_str()) {
                Some(&(expected, body)) if expected == kind => Ok(body.to_owned()),
                _ => Err(HistoryError::Status {
                    status: StatusCode::NOT_FOUND,
                    url: url.clone(),
                }),
            }
        }
        fn request_interval(&self) -> Duration {
            Duration::ZERO
        }
    }

    #[tokio::test]
    async fn test_fetch_history() {
        let site = FakeSite::default().with_athlete(7, PROFILE, SIDEBAR);
        let history = fetch_history(&site, AthleteId::from(7)).await.unwrap();
        assert_eq!(history.id, AthleteId::from(7));
        assert_eq!(history.all_time_running_miles, 2000.0);
        assert_eq!(history.all_time_cycling_miles, 15.0);
        let series = history
            .mileage_series
            .iter()
            .map(|p| (p.week_start, p.miles))
            .collect::<Vec<_>>();
        assert_eq!(
            series,
            [
                (NaiveDate::from_ymd_opt(2015, 10, 5).unwrap(), 20.0),
                (NaiveDate::from_ymd_opt(2015, 10, 12).unwrap(), 0.0),
            ]
        );
        assert_eq!(
            *site.requests.borrow(),
            [
                "https://example.com/athletes/7",
                "https://example.com/athletes/7/sidebar"
            ]
        );
    }

    #[tokio::test]
    async fn test_sidebar_is_not_requested_after_bad_profile() {
        let site = FakeSite::default().with_athlete(3, "<html></html>", SIDEBAR);
        let err = fetch_history(&site, AthleteId::from(3)).await.unwrap_err();
        assert_eq!(err.kind(), "malformed document");
        assert_eq!(site.requests.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let site = FakeSite::default()
            .with_athlete(1, PROFILE, SIDEBAR)
            .with_athlete(2, PROFILE, "<div class=\"running hidden\"></div>")
            .with_athlete(4, PROFILE, SIDEBAR);
        let ids = [1u64, 2, 3, 4].map(AthleteId::from);
        let batch = collect_histories(&site, &ids).await.unwrap();
        assert_eq!(
            batch.histories.iter().map(|h| h.id).collect::<Vec<_>>(),
            [AthleteId::from(1), AthleteId::from(4)]
        );
        assert_eq!(
            batch.skipped.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            [AthleteId::from(2), AthleteId::from(3)]
        );
        let kinds = batch.skipped_by_kind();
        assert_eq!(kinds["malformed document"], 1);
        assert_eq!(kinds["upstream unavailable"], 1);
        assert!(!batch.upstream_unavailable());
    }

    struct RejectingSite {
        requests: RefCell<usize>,
    }

    impl PageSource for RejectingSite {
        fn profile_url(&self, id: AthleteId) -> Url {
            Url::parse(&format!("https://example.com/athletes/{id}")).unwrap()
        }
        fn sidebar_url(&self, id: AthleteId) -> Url {
            Url::parse(&format!("https://example.com/athletes/{id}/sidebar")).unwrap()
        }
        async fn fetch(&self, url: &Url, _: PageKind) -> Result<String, HistoryError> {
            *self.requests.borrow_mut() += 1;
            Err(HistoryError::Status {
                status: StatusCode::UNAUTHORIZED,
                url: url.clone(),
            })
        }
        fn request_interval(&self) -> Duration {
            Duration::from_secs(3600)
        }
    }

    #[tokio::test]
    async fn test_rejected_session_aborts_the_run() {
        let site = RejectingSite {
            requests: RefCell::new(0),
        };
        let ids = (1u64..=5).map(AthleteId::from).collect::<Vec<_>>();
        let err = collect_histories(&site, &ids).await.unwrap_err();
        assert!(err.is_auth_failure());
        assert_eq!(*site.requests.borrow(), 1);
    }

    #[tokio::test]
    async fn test_all_athletes_missing_is_upstream_unavailable() {
        let site = FakeSite::default();
        let ids = [1u64, 2].map(AthleteId::from);
        let batch = collect_histories(&site, &ids).await.unwrap();
        assert!(batch.histories.is_empty());
        assert!(batch.upstream_unavailable());
    }
}
