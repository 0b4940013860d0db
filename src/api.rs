use anyhow::{bail, Context};
use chrono::NaiveDateTime;
use derive_more::{Display, From, FromStr};
use log::{debug, info};
use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    credentials::{AccessToken, Authorization, Credentials},
    error::ApiError,
    schema::AthleteId,
};

pub const API_BASE_URL: &str = "https://www.strava.com/api/v3/";
pub const TOKEN_URL: &str = "https://www.strava.com/oauth/token";

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, From, FromStr, Serialize, Deserialize)]
pub struct SegmentId(u64);

#[derive(Clone, Debug, Deserialize)]
pub struct SegmentEffort {
    pub elapsed_time: u32,
    pub athlete: AthleteRef,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct AthleteRef {
    pub id: AthleteId,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Athlete {
    pub id: AthleteId,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
}

/// The efforts of one segment inside a local-time window.
#[derive(Clone, Debug)]
pub struct EffortQuery {
    pub segment_id: SegmentId,
    pub start_local: NaiveDateTime,
    pub end_local: NaiveDateTime,
    pub per_page: u32,
}

/// The hosted results service, as far as the collector needs it.
#[allow(async_fn_in_trait)]
pub trait ResultsSource {
    /// `page` starts at 1.
    async fn segment_efforts(
        &self,
        query: &EffortQuery,
        page: u32,
    ) -> Result<Vec<SegmentEffort>, ApiError>;
    async fn athlete(&self, id: AthleteId) -> Result<Athlete, ApiError>;
}

pub struct StravaClient {
    client: reqwest::Client,
    api_base: Url,
    access_token: AccessToken,
}

impl StravaClient {
    /// Obtains an access token if needed.  Any failure here is fatal for the run.
    pub async fn new(credentials: &Credentials) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connection_verbose(true)
            .build()?;
        let access_token = match credentials.authorization() {
            Some(Authorization::Token(token)) => {
                info!("Using the stored access token.");
                token.clone()
            }
            Some(Authorization::Exchange {
                client_id,
                client_secret,
                code,
            }) => {
                info!("Exchanging the authorization code for an access token.");
                let response = client
                    .post(TOKEN_URL)
                    .form(&TokenRequest {
                        client_id: client_id.to_string(),
                        client_secret: client_secret.clone().into(),
                        code: code.clone().into(),
                        grant_type: "authorization_code",
                    })
                    .send()
                    .await?;
                if !response.status().is_success() {
                    bail!(
                        "Failed to exchange the code: server returned {:?}",
                        response.status()
                    );
                }
                let token: TokenResponse = response
                    .json()
                    .await
                    .context("Unexpected token response")?;
                token.access_token.into()
            }
            None => bail!("The credentials contain neither an access token nor a code to exchange"),
        };
        Ok(Self {
            client,
            api_base: Url::parse(API_BASE_URL)?,
            access_token,
        })
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .bearer_auth(self.access_token.as_str())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status(),
                url: response.url().clone(),
            });
        }
        Ok(response.json().await?)
    }
}

impl ResultsSource for StravaClient {
    async fn segment_efforts(
        &self,
        query: &EffortQuery,
        page: u32,
    ) -> Result<Vec<SegmentEffort>, ApiError> {
        debug!("Fetching page {page} of efforts on segment {}", query.segment_id);
        let url = self.api_base.join("segment_efforts")?;
        self.get_json(self.client.get(url).query(&EffortParams::new(query, page)))
            .await
    }

    async fn athlete(&self, id: AthleteId) -> Result<Athlete, ApiError> {
        let url = self.api_base.join(&format!("athletes/{id}"))?;
        self.get_json(self.client.get(url)).await
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest {
    client_id: String,
    client_secret: String,
    code: String,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct EffortParams {
    segment_id: SegmentId,
    start_date_local: String,
    end_date_local: String,
    page: u32,
    per_page: u32,
}
impl EffortParams {
    fn new(query: &EffortQuery, page: u32) -> Self {
        const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
        Self {
            segment_id: query.segment_id,
            start_date_local: query.start_local.format(FORMAT).to_string(),
            end_date_local: query.end_local.format(FORMAT).to_string(),
            page,
            per_page: query.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Athlete, EffortParams, EffortQuery, SegmentEffort, SegmentId};
    use crate::{chrono_util::day_window, schema::AthleteId};

    #[test]
    fn test_effort_params() {
        let (start_local, end_local) =
            day_window(NaiveDate::from_ymd_opt(2015, 11, 15).unwrap(), 1).unwrap();
        let query = EffortQuery {
            segment_id: SegmentId::from(8516849),
            start_local,
            end_local,
            per_page: 200,
        };
        let encoded = serde_json::to_string(&EffortParams::new(&query, 3)).unwrap();
        assert_eq!(
            encoded,
            r#"{"segment_id":8516849,"start_date_local":"2015-11-15T00:00:00Z","end_date_local":"2015-11-16T00:00:00Z","page":3,"per_page":200}"#
        );
    }

    #[test]
    fn test_deserialize_api_payloads() {
        let effort: SegmentEffort = serde_json::from_str(
            r#"{"id":1,"name":"Abbey Dash","elapsed_time":1985,"moving_time":1980,
                "athlete":{"id":42,"resource_state":1}}"#,
        )
        .unwrap();
        assert_eq!(effort.elapsed_time, 1985);
        assert_eq!(effort.athlete.id, AthleteId::from(42));

        let athlete: Athlete =
            serde_json::from_str(r#"{"id":42,"firstname":"Zoë","lastname":null,"sex":"F"}"#)
                .unwrap();
        assert_eq!(athlete.firstname.as_deref(), Some("Zoë"));
        assert_eq!(athlete.lastname, None);
        assert_eq!(athlete.sex.as_deref(), Some("F"));
    }
}
