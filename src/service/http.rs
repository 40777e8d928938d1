use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;

use super::{PollError, PollResponse, ReportService, ServiceError, SubmissionError};
use crate::report::{ReportId, ResultSet, RowPolicy, DEFAULT_DELIMITER};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_SUBMIT_PATH: &str = "/get_report";
pub const DEFAULT_POLL_PATH: &str = "/get_report";

const DETAIL_MAX_CHARS: usize = 200;
const USER_AGENT: &str = concat!("reportwatch/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct HttpServiceConfig {
    pub base_url: String,
    pub submit_path: String,
    pub poll_path: String,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
    pub delimiter: u8,
    pub row_policy: RowPolicy,
}

impl Default for HttpServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            submit_path: DEFAULT_SUBMIT_PATH.to_string(),
            poll_path: DEFAULT_POLL_PATH.to_string(),
            timeout_seconds: 10,
            proxy: None,
            delimiter: DEFAULT_DELIMITER,
            row_policy: RowPolicy::Fill,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitBody {
    report_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct HttpReportService {
    client: reqwest::Client,
    submit_url: String,
    poll_base: String,
    delimiter: u8,
    row_policy: RowPolicy,
}

impl HttpReportService {
    pub fn new(config: HttpServiceConfig) -> Result<Self, ServiceError> {
        let base = config.base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base).map_err(|e| ServiceError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let client = build_client(config.proxy.as_deref(), config.timeout_seconds)?;
        Ok(Self {
            client,
            submit_url: join_path(&base, &config.submit_path),
            poll_base: join_path(&base, &config.poll_path),
            delimiter: config.delimiter,
            row_policy: config.row_policy,
        })
    }

    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }

    pub fn poll_url(&self, id: &ReportId) -> String {
        format!("{}/{}", self.poll_base.trim_end_matches('/'), id.as_str())
    }
}

impl ReportService for HttpReportService {
    fn submit(&self) -> BoxFuture<'_, Result<ReportId, SubmissionError>> {
        Box::pin(async move {
            tracing::debug!(
                target: "reportwatch.service",
                url = %self.submit_url,
                "submitting report"
            );
            let resp = self
                .client
                .post(&self.submit_url)
                .send()
                .await
                .map_err(|e| SubmissionError::Transport { source: Box::new(e) })?;
            let status = resp.status().as_u16();
            let body = resp
                .bytes()
                .await
                .map_err(|e| SubmissionError::Transport { source: Box::new(e) })?;
            decode_submit_response(status, &body)
        })
    }

    fn poll<'a>(&'a self, id: &'a ReportId) -> BoxFuture<'a, Result<PollResponse, PollError>> {
        Box::pin(async move {
            let url = self.poll_url(id);
            tracing::debug!(target: "reportwatch.service", url = %url, "checking status");
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| PollError::Transport { source: Box::new(e) })?;
            let status = resp.status().as_u16();
            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let body = resp
                .bytes()
                .await
                .map_err(|e| PollError::Transport { source: Box::new(e) })?;
            decode_poll_response(status, &content_type, &body, self.delimiter, self.row_policy)
        })
    }
}

fn join_path(base: &str, path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn build_client(
    proxy: Option<&str>,
    timeout_seconds: u64,
) -> Result<reqwest::Client, ServiceError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(USER_AGENT),
    );

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(Duration::from_secs(timeout_seconds));

    if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| ServiceError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ServiceError::HttpClientBuild { source: e })
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

// `detail` (FastAPI style) or `error` from a JSON body, else a clipped body sample.
fn error_detail(body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        if let Some(detail) = parsed.detail.or(parsed.error) {
            return detail;
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        "no response body".to_string()
    } else {
        text.chars().take(DETAIL_MAX_CHARS).collect()
    }
}

pub fn decode_submit_response(status: u16, body: &[u8]) -> Result<ReportId, SubmissionError> {
    if !is_success(status) {
        return Err(SubmissionError::Http {
            status,
            detail: error_detail(body),
        });
    }
    let parsed: SubmitBody = serde_json::from_slice(body).map_err(|e| SubmissionError::Decode {
        message: e.to_string(),
    })?;
    let id = parsed.report_id.trim();
    if id.is_empty() {
        return Err(SubmissionError::Decode {
            message: "empty report_id".to_string(),
        });
    }
    Ok(ReportId::new(id))
}

fn is_tabular(content_type: &str) -> bool {
    content_type.starts_with("text/csv") || content_type.starts_with("text/plain")
}

fn is_json(content_type: &str) -> bool {
    content_type.starts_with("application/json") || content_type.contains("+json")
}

/// Classifies one status-check response.
///
/// A tabular body is proof of completion. A JSON body carries a `status`
/// field: `Running`, `Pending` and `Queued` keep the session polling,
/// `Failed` ends it, and any other value is reported as unknown.
pub fn decode_poll_response(
    status: u16,
    content_type: &str,
    body: &[u8],
    delimiter: u8,
    policy: RowPolicy,
) -> Result<PollResponse, PollError> {
    if !is_success(status) {
        return Err(PollError::Http {
            status,
            detail: error_detail(body),
        });
    }

    let content_type = content_type.trim().to_ascii_lowercase();
    if is_tabular(&content_type) {
        let text = String::from_utf8_lossy(body);
        let rows = ResultSet::parse(&text, delimiter, policy)?;
        return Ok(PollResponse::Complete(rows));
    }
    if !is_json(&content_type) {
        return Err(PollError::UnexpectedContentType { content_type });
    }

    let parsed: StatusBody = serde_json::from_slice(body).map_err(|e| PollError::Decode {
        message: e.to_string(),
    })?;
    let state = parsed.status.trim();
    if ["running", "pending", "queued"]
        .iter()
        .any(|s| state.eq_ignore_ascii_case(s))
    {
        return Ok(PollResponse::Running);
    }
    if state.eq_ignore_ascii_case("failed") {
        let reason = parsed
            .error
            .or(parsed.detail)
            .unwrap_or_else(|| "no reason given".to_string());
        return Ok(PollResponse::Failed { reason });
    }
    Err(PollError::UnknownStatus {
        status: state.to_string(),
    })
}
