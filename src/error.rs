use reqwest::StatusCode;
use url::Url;

use crate::schema::AthleteId;

/// A scraped document did not have the expected shape.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Element `{0}` was not found")]
    MissingElement(&'static str),
    #[error("Attribute `{attr}` was not found on `{element}`")]
    MissingAttribute {
        element: &'static str,
        attr: &'static str,
    },
    #[error("Could not parse {what} from {text:?}")]
    InvalidNumber { what: &'static str, text: String },
    #[error("Invalid week key: {0:?}")]
    InvalidWeekKey(String),
}

/// Why a single athlete's history could not be extracted.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("Server returned {status} for {url}")]
    Status { status: StatusCode, url: Url },
    #[error("Malformed page {url}: {source}")]
    Malformed { url: Url, source: ParseError },
}

impl HistoryError {
    /// Short label used when summarising skipped athletes.
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryError::Upstream(_) | HistoryError::Status { .. } => "upstream unavailable",
            HistoryError::Malformed {
                source: ParseError::MissingElement(_) | ParseError::MissingAttribute { .. },
                ..
            } => "malformed document",
            HistoryError::Malformed { .. } => "parse failure",
        }
    }

    /// The site rejected the session itself, so every further request would
    /// fail the same way.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            HistoryError::Status {
                status: StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN,
                ..
            }
        )
    }
}

/// A call to the results API failed.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server returned {status} for {url}")]
    Status { status: StatusCode, url: Url },
    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Lookup of athlete {id} failed: {source}")]
    AthleteLookup { id: AthleteId, source: ApiError },
}
