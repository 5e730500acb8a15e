use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::{AppError, Result};

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api/";

/// Failure modes of a Slack Web API call, classified from the HTTP status and
/// the `error` code in the response body. Call sites match on variants instead
/// of inspecting strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("rate limited, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("not_in_channel")]
    NotInChannel,

    #[error("missing permission: {code}")]
    PermissionDenied { code: String },

    #[error("{code}")]
    Other { code: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Errors that mean "this channel is not readable with this token";
    /// the exporter skips the channel instead of failing the run.
    pub fn is_channel_access(&self) -> bool {
        matches!(
            self,
            ApiError::NotInChannel | ApiError::PermissionDenied { .. }
        )
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
}

fn unknown_name() -> String {
    "unknown".to_string()
}

/// One page of a cursor-paged endpoint. `next_cursor` is `None` on the last
/// page; empty-string cursors from the wire are normalized away.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// The three paged read endpoints the exporter consumes. Kept as a trait so
/// the exporter can run against a stub in tests.
pub trait SlackApi {
    fn list_channels(&self, limit: u32, cursor: Option<&str>) -> ApiResult<Page<Channel>>;

    fn channel_history(
        &self,
        channel_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> ApiResult<Page<Value>>;

    fn thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> ApiResult<Page<Value>>;
}

pub struct SlackClient {
    http: reqwest::blocking::Client,
    token: String,
    base_url: Url,
}

impl SlackClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| AppError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            http: reqwest::blocking::Client::new(),
            token: token.to_string(),
            base_url,
        })
    }

    fn call(&self, method: &str, params: &[(&str, String)]) -> ApiResult<Value> {
        let url = self
            .base_url
            .join(method)
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if response.status().as_u16() == 429 {
            let header = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(ApiError::RateLimited {
                retry_after: retry_after_delay(header.as_deref()),
            });
        }

        let body: Value = response
            .json()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        check_ok(&body)?;
        Ok(body)
    }
}

impl SlackApi for SlackClient {
    fn list_channels(&self, limit: u32, cursor: Option<&str>) -> ApiResult<Page<Channel>> {
        let mut params = vec![
            ("types", "public_channel,private_channel".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        let body = self.call("conversations.list", &params)?;
        let page = parse_page(body, "channels")?;
        let items = page
            .items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        Ok(Page {
            items,
            next_cursor: page.next_cursor,
        })
    }

    fn channel_history(
        &self,
        channel_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> ApiResult<Page<Value>> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        let body = self.call("conversations.history", &params)?;
        parse_page(body, "messages")
    }

    fn thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> ApiResult<Page<Value>> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("ts", thread_ts.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        let body = self.call("conversations.replies", &params)?;
        parse_page(body, "messages")
    }
}

/// Sleep duration for a 429: the `Retry-After` header value plus one second,
/// defaulting to one second when the header is absent or unparseable.
pub(crate) fn retry_after_delay(header: Option<&str>) -> Duration {
    let secs = header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(1);
    Duration::from_secs(secs.saturating_add(1))
}

/// Classify an `ok: false` response body into a typed error.
pub(crate) fn check_ok(body: &Value) -> ApiResult<()> {
    if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(());
    }
    let code = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");
    Err(match code {
        "ratelimited" => ApiError::RateLimited {
            retry_after: retry_after_delay(None),
        },
        "not_in_channel" => ApiError::NotInChannel,
        "missing_scope" => ApiError::PermissionDenied {
            code: code.to_string(),
        },
        _ => ApiError::Other {
            code: code.to_string(),
        },
    })
}

pub(crate) fn parse_page(mut body: Value, key: &str) -> ApiResult<Page<Value>> {
    let next_cursor = next_cursor(&body);
    let items = match body.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(ApiError::Transport(format!(
                "response missing `{key}` array"
            )));
        }
    };
    Ok(Page { items, next_cursor })
}

fn next_cursor(body: &Value) -> Option<String> {
    body.get("response_metadata")?
        .get("next_cursor")?
        .as_str()
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}
