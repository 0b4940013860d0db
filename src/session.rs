use std::{collections::BTreeMap, time::Duration};

use anyhow::{bail, Context};
use itertools::Itertools;
use log::debug;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Url,
};
use serde::Deserialize;

use crate::{error::HistoryError, schema::AthleteId};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Contents of the session TOML file.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Raw `Cookie` header of a logged-in browser session.
    pub cookie: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_interval_secs")]
    pub request_interval_secs: u64,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_base_url() -> Url {
    Url::parse("https://www.strava.com/").expect("constant url")
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_owned()
}
fn default_request_interval_secs() -> u64 {
    2
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PageKind {
    /// A full page navigation.
    Document,
    /// A fragment loaded by the page's scripts.
    Xhr,
}

/// Something that can hand out the HTML behind a URL.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    fn profile_url(&self, id: AthleteId) -> Url;
    fn sidebar_url(&self, id: AthleteId) -> Url;
    async fn fetch(&self, url: &Url, kind: PageKind) -> Result<String, HistoryError>;
    fn request_interval(&self) -> Duration;
}

/// One extraction run's HTTP state.  Built once and reused for every athlete.
pub struct ScrapeSession {
    client: reqwest::Client,
    base_url: Url,
    cookie: HeaderValue,
    request_interval: Duration,
}

impl ScrapeSession {
    pub fn new(config: &SessionConfig) -> anyhow::Result<Self> {
        if config.base_url.cannot_be_a_base() {
            bail!("Base url {} cannot have a path", config.base_url);
        }
        let cookies = parse_cookie_string(&config.cookie);
        if cookies.is_empty() {
            bail!("The cookie string contains no cookies.");
        }
        debug!(
            "Using cookies: {:?}",
            cookies.iter().map(|(name, _)| name).collect_vec()
        );
        let cookie = HeaderValue::from_str(
            &cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .join("; "),
        )
        .context("The cookie string is not a valid header value")?;

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(default_headers(&config.headers)?)
            .connection_verbose(true)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            cookie,
            request_interval: Duration::from_secs(config.request_interval_secs),
        })
    }

    fn athlete_url(&self, id: AthleteId, tail: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("athletes")
                .push(&id.to_string())
                .extend(tail);
        }
        url
    }
}

impl PageSource for ScrapeSession {
    fn profile_url(&self, id: AthleteId) -> Url {
        self.athlete_url(id, None)
    }

    fn sidebar_url(&self, id: AthleteId) -> Url {
        self.athlete_url(id, Some("profile_sidebar_comparison"))
    }

    async fn fetch(&self, url: &Url, kind: PageKind) -> Result<String, HistoryError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(header::COOKIE, self.cookie.clone());
        if kind == PageKind::Xhr {
            request = request.header("X-Requested-With", "XMLHttpRequest");
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(HistoryError::Status {
                status: response.status(),
                url: url.clone(),
            });
        }
        Ok(response.text().await?)
    }

    fn request_interval(&self) -> Duration {
        self.request_interval
    }
}

fn default_headers(extra: &BTreeMap<String, String>) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("Invalid header name {name:?}"))?;
        let value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid value for header {name}"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Splits a browser `Cookie` header into name/value pairs.
/// Segments without `=` are ignored and quoted values are unquoted.
pub fn parse_cookie_string(s: &str) -> Vec<(String, String)> {
    s.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (!name.is_empty()).then(|| (name.to_owned(), value.to_owned()))
        })
        .collect()
}
