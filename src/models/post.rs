//! Post submission as received from the compose form, and the payload
//! forwarded to the upstream `/post` endpoint.

use crate::services::temp_upload::TemporaryUploadedFile;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Malformed client input. These are the only failures whose description is
/// returned to the client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("missing form field `{0}`")]
    MissingField(&'static str),
    #[error("post text must not be empty")]
    EmptyText,
    #[error("networks must be a JSON object of booleans: {0}")]
    InvalidNetworks(String),
    #[error("at least one platform must be selected")]
    NoPlatforms,
    #[error("scheduledDate `{0}` is not a valid date")]
    InvalidScheduleDate(String),
}

/// Fields of a `POST /api/post` multipart submission.
///
/// `networks` holds the raw JSON-encoded mapping of platform to selection;
/// it is validated by [`UpstreamPostPayload::compose`].
#[derive(Debug, Default)]
pub struct PostRequest {
    pub text: Option<String>,
    pub networks: Option<String>,
    pub scheduled_date: Option<String>,
    pub media: Option<TemporaryUploadedFile>,
}

/// Body of the upstream `/post` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamPostPayload {
    pub post: String,
    pub platforms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_urls: Option<Vec<String>>,
}

impl UpstreamPostPayload {
    /// Build the payload from the textual fields of a request.
    ///
    /// `media_urls` is left empty; it is filled once the media relay
    /// has produced a URL.
    pub fn compose(request: &PostRequest) -> Result<Self, InputError> {
        let text = request
            .text
            .as_deref()
            .ok_or(InputError::MissingField("text"))?;
        if text.trim().is_empty() {
            return Err(InputError::EmptyText);
        }

        let networks = request
            .networks
            .as_deref()
            .ok_or(InputError::MissingField("networks"))?;
        let platforms = selected_platforms(networks)?;
        if platforms.is_empty() {
            return Err(InputError::NoPlatforms);
        }

        Ok(Self {
            post: text.to_string(),
            platforms,
            schedule_date: normalize_schedule_date(request.scheduled_date.as_deref())?,
            media_urls: None,
        })
    }
}

/// Keys of the JSON object whose value is `true`, in document order.
pub fn selected_platforms(networks: &str) -> Result<Vec<String>, InputError> {
    let map: Map<String, Value> = serde_json::from_str(networks)
        .map_err(|err| InputError::InvalidNetworks(err.to_string()))?;

    let mut platforms = Vec::new();
    for (platform, selected) in map {
        match selected {
            Value::Bool(true) => platforms.push(platform),
            Value::Bool(false) => {}
            other => {
                return Err(InputError::InvalidNetworks(format!(
                    "`{}` maps to {} instead of a boolean",
                    platform, other
                )));
            }
        }
    }
    Ok(platforms)
}

/// Convert a client-supplied schedule date to an ISO-8601 UTC string with
/// millisecond precision. A missing or empty value means "publish now";
/// whitespace alone is not a date.
///
/// Offsets are honoured; date-times without one are read in the server's
/// local timezone; a bare date is midnight UTC.
pub fn normalize_schedule_date(raw: Option<&str>) -> Result<Option<String>, InputError> {
    let Some(original) = raw.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let invalid = || InputError::InvalidScheduleDate(original.to_string());
    let raw = original.trim();

    let instant = if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        parsed.with_timezone(&Utc)
    } else if let Some(naive) = parse_naive_datetime(raw) {
        // Spring-forward gaps have no local instant.
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(invalid)?
            .with_timezone(&Utc)
    } else if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?.and_utc()
    } else {
        return Err(invalid());
    };

    Ok(Some(instant.to_rfc3339_opts(SecondsFormat::Millis, true)))
}

fn parse_naive_datetime(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
