//! Remote alert source adapter.
//!
//! Talks directly to the Elasticsearch `_search` API of the Wazuh alert
//! index over authenticated HTTPS. The cluster commonly runs with a
//! self-signed certificate, so certificate verification can be disabled
//! through configuration.

mod mapping;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

pub use mapping::map_hit;

/// Severity floor used when no explicit level is requested
pub const DEFAULT_MIN_LEVEL: i64 = 5;

/// Default fetch timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Level filtering requested from the remote index.
///
/// The two modes are intentionally not specializations of each other: the
/// default is a `>= 5` range, an explicit level is an exact match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelFilter {
    /// Severity >= 5, applied when no explicit level is requested
    #[default]
    Default,
    /// Exact severity match, applied when a level is explicitly requested
    Exact(i64),
}

impl LevelFilter {
    /// Build the filter from an optional explicitly-requested level
    #[must_use]
    pub fn from_requested(level: Option<i64>) -> Self {
        level.map_or(Self::Default, Self::Exact)
    }

    fn to_query(self) -> serde_json::Value {
        match self {
            Self::Default => json!({"range": {"rule.level": {"gte": DEFAULT_MIN_LEVEL}}}),
            Self::Exact(level) => json!({"term": {"rule.level": level}}),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid alert source configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Alert fetch request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Alert source API error: {0}")]
    Api(String),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Connection settings for the remote index.
#[derive(Clone, PartialEq, Eq)]
pub struct WazuhConfig {
    /// Cluster base URL, e.g. `https://wazuh.internal:9200`
    pub base_url: String,
    /// Alert index pattern
    pub index: String,
    pub username: String,
    pub password: String,
    /// Whole-request timeout; a timeout is a full failure of the call
    pub timeout: Duration,
    /// Accept the cluster's self-signed certificate
    pub accept_invalid_certs: bool,
    /// Additional attempts after a failed call (0 = no automatic retry)
    pub retries: u32,
}

impl Default for WazuhConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            index: "wazuh-alerts-*".to_string(),
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            accept_invalid_certs: false,
            retries: 0,
        }
    }
}

impl fmt::Debug for WazuhConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WazuhConfig")
            .field("base_url", &self.base_url)
            .field("index", &self.index)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("retries", &self.retries)
            .finish()
    }
}

/// One raw hit from the remote index. The `_source` document is kept as-is
/// for passthrough responses; the typed mapping extracts the flat row.
#[derive(Debug, Clone, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_source", default)]
    pub source: serde_json::Value,
}

/// Total hit count; ES 7+ reports `{"value": n}`, older responses a bare
/// integer. Both are accepted.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Counted { value: u64 },
    Plain(u64),
}

impl Default for TotalHits {
    fn default() -> Self {
        Self::Plain(0)
    }
}

impl TotalHits {
    #[must_use]
    pub const fn value(self) -> u64 {
        match self {
            Self::Counted { value } | Self::Plain(value) => value,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<RawHit>,
    #[serde(default)]
    total: TotalHits,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: SearchHits,
}

/// One fetched page of alerts plus the remote total.
#[derive(Debug, Clone)]
pub struct AlertBatch {
    pub hits: Vec<RawHit>,
    pub total: u64,
}

/// Seam for the sync orchestrator; the production implementation is
/// [`WazuhClient`], tests substitute a mock.
pub trait AlertSource {
    fn fetch_batch(
        &self,
        limit: usize,
        offset: usize,
        level: LevelFilter,
    ) -> impl Future<Output = FetchResult<AlertBatch>> + Send;
}

/// HTTP client for the remote alert index.
#[derive(Clone)]
pub struct WazuhClient {
    config: WazuhConfig,
    client: reqwest::Client,
}

impl WazuhClient {
    pub fn new(config: WazuhConfig) -> FetchResult<Self> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(FetchError::InvalidConfiguration(
                "base URL must include http:// or https://".to_string(),
            ));
        }
        if config.index.trim().is_empty() {
            return Err(FetchError::InvalidConfiguration(
                "index pattern must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self { config, client })
    }

    fn search_url(&self) -> String {
        format!(
            "{}/{}/_search",
            self.config.base_url.trim_end_matches('/'),
            self.config.index
        )
    }

    /// The `_search` request body: level filter, page, newest first.
    fn payload(limit: usize, offset: usize, level: LevelFilter) -> serde_json::Value {
        json!({
            "query": {"bool": {"filter": [level.to_query()]}},
            "size": limit,
            "from": offset,
            "sort": [{"@timestamp": {"order": "desc"}}],
        })
    }

    async fn fetch_once(
        &self,
        limit: usize,
        offset: usize,
        level: LevelFilter,
    ) -> FetchResult<AlertBatch> {
        let response = self
            .client
            .post(self.search_url())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Accept", "application/json")
            .json(&Self::payload(limit, offset, level))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api(parse_api_error(status, &body)));
        }

        let payload = response.json::<SearchResponse>().await?;
        Ok(AlertBatch {
            total: payload.hits.total.value(),
            hits: payload.hits.hits,
        })
    }
}

impl AlertSource for WazuhClient {
    async fn fetch_batch(
        &self,
        limit: usize,
        offset: usize,
        level: LevelFilter,
    ) -> FetchResult<AlertBatch> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(limit, offset, level).await {
                Ok(batch) => return Ok(batch),
                Err(err) if attempt < self.config.retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Alert fetch failed: {err}; retry {attempt}/{}",
                        self.config.retries
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<serde_json::Value>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(error) = payload.error {
            let message = match &error {
                serde_json::Value::String(s) => s.clone(),
                other => other
                    .get("reason")
                    .and_then(serde_json::Value::as_str)
                    .map_or_else(|| other.to_string(), ToString::to_string),
            };
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_level_filter_is_a_range() {
        let payload = WazuhClient::payload(50, 0, LevelFilter::Default);
        assert_eq!(
            payload["query"]["bool"]["filter"][0],
            json!({"range": {"rule.level": {"gte": 5}}})
        );
    }

    #[test]
    fn explicit_level_filter_is_an_exact_match() {
        let payload = WazuhClient::payload(50, 0, LevelFilter::Exact(7));
        assert_eq!(
            payload["query"]["bool"]["filter"][0],
            json!({"term": {"rule.level": 7}})
        );
    }

    #[test]
    fn payload_carries_page_and_sort() {
        let payload = WazuhClient::payload(25, 50, LevelFilter::Default);
        assert_eq!(payload["size"], 25);
        assert_eq!(payload["from"], 50);
        assert_eq!(payload["sort"], json!([{"@timestamp": {"order": "desc"}}]));
    }

    #[test]
    fn from_requested_maps_presence_to_mode() {
        assert_eq!(LevelFilter::from_requested(None), LevelFilter::Default);
        assert_eq!(LevelFilter::from_requested(Some(3)), LevelFilter::Exact(3));
    }

    #[test]
    fn total_hits_accepts_both_shapes() {
        let counted: TotalHits = serde_json::from_value(json!({"value": 128})).unwrap();
        assert_eq!(counted.value(), 128);

        let plain: TotalHits = serde_json::from_value(json!(128)).unwrap();
        assert_eq!(plain.value(), 128);
    }

    #[test]
    fn search_response_parses_hits() {
        let body = json!({
            "hits": {
                "total": {"value": 2, "relation": "eq"},
                "hits": [
                    {"_id": "a1", "_index": "wazuh-alerts-4.x", "_source": {"rule": {"level": 5}}},
                    {"_id": "a2", "_source": {}}
                ]
            }
        });
        let parsed: SearchResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.hits.total.value(), 2);
        assert_eq!(parsed.hits.hits.len(), 2);
        assert_eq!(parsed.hits.hits[0].id, "a1");
    }

    #[test]
    fn client_rejects_bad_config() {
        let config = WazuhConfig {
            base_url: "wazuh.internal:9200".to_string(),
            ..WazuhConfig::default()
        };
        assert!(matches!(
            WazuhClient::new(config),
            Err(FetchError::InvalidConfiguration(_))
        ));

        let config = WazuhConfig {
            base_url: "https://wazuh.internal:9200".to_string(),
            index: "  ".to_string(),
            ..WazuhConfig::default()
        };
        assert!(matches!(
            WazuhClient::new(config),
            Err(FetchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn config_debug_redacts_password() {
        let config = WazuhConfig {
            base_url: "https://wazuh.internal:9200".to_string(),
            password: "hunter2".to_string(),
            ..WazuhConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn api_error_extracts_reason() {
        let body = r#"{"error": {"type": "security_exception", "reason": "unable to authenticate"}}"#;
        let message = parse_api_error(StatusCode::UNAUTHORIZED, body);
        assert_eq!(message, "unable to authenticate (401)");
    }

    #[test]
    fn api_error_falls_back_to_body_preview() {
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, " upstream down "),
            "upstream down (502)"
        );
    }
}
